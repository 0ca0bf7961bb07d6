//! State tree, transition engine, and event dispatch.

use std::fmt;
use std::time::{Duration, SystemTime};

use crate::timer::{TimerFire, Timers};

/// Identity of a state in the tree.
///
/// Implemented by a plain `Copy` enum. `TOP` is the root; every other state
/// reports its parent. The tree must be static: `parent()` always returns
/// the same answer for the same identity.
pub trait StateId: Copy + PartialEq + Eq + fmt::Debug + 'static {
    /// The root of the state tree.
    const TOP: Self;

    /// Parent of this state, `None` for `TOP`.
    fn parent(self) -> Option<Self>;
}

/// Outcome of an event handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction<I> {
    /// The event was consumed; no transition.
    Handled,

    /// Delegate to the parent state's handler (inherited-default dispatch).
    Parent,

    /// Consume the event and transition to the given state.
    Transition(I),
}

/// Description of one state machine: identities plus behavior.
///
/// All callbacks are associated functions — the model type itself carries no
/// data. Context and timers are passed in by the engine, and transitions are
/// returned rather than performed so the engine can finish the current step
/// before moving the state pointer.
pub trait StateModel {
    /// State identity enum.
    type Id: StateId;

    /// Mutable context shared by all states.
    type Ctx;

    /// Event type dispatched into the machine.
    type Event;

    /// Type posted by the timer backend into the owner's input queue.
    type Wake: From<TimerFire> + Send + 'static;

    /// Called on the target state after a transition completes. Returning
    /// `Some(id)` drills into a substate; the engine repeats until a state
    /// returns `None`.
    fn init(
        id: Self::Id,
        ctx: &mut Self::Ctx,
        timers: &mut Timers<Self::Wake>,
    ) -> Option<Self::Id>;

    /// Called top-down on every state entered by a transition. Returning
    /// `Some(id)` requests a follow-up transition which the engine performs
    /// only after the in-progress transition (including `init`) has fully
    /// completed.
    fn entry(
        id: Self::Id,
        ctx: &mut Self::Ctx,
        timers: &mut Timers<Self::Wake>,
    ) -> Option<Self::Id>;

    /// Called bottom-up on every state exited by a transition. Exits cannot
    /// request transitions.
    fn exit(id: Self::Id, ctx: &mut Self::Ctx, timers: &mut Timers<Self::Wake>);

    /// Handle an event in the given state. Return [`Reaction::Parent`] to
    /// delegate to the parent state.
    fn on_event(
        id: Self::Id,
        ctx: &mut Self::Ctx,
        timers: &mut Timers<Self::Wake>,
        event: &Self::Event,
    ) -> Reaction<Self::Id>;
}

/// The engine: current state, context, and the two state-scoped timers.
pub struct Machine<M: StateModel> {
    state: Option<M::Id>,
    ctx: M::Ctx,
    timers: Timers<M::Wake>,
}

impl<M: StateModel> Machine<M> {
    /// Create a stopped machine. Call [`start`](Machine::start) before
    /// dispatching anything.
    pub fn new(ctx: M::Ctx, timers: Timers<M::Wake>) -> Self {
        Self {
            state: None,
            ctx,
            timers,
        }
    }

    /// Enter the top state and run its init chain down to the initial leaf.
    ///
    /// Must be called exactly once, before any dispatch.
    pub fn start(&mut self) {
        assert!(self.state.is_none(), "state machine started twice");
        self.state = Some(M::Id::TOP);
        tracing::debug!(state = ?M::Id::TOP, "state machine starting");
        let mut visited = vec![M::Id::TOP];
        let mut pending = M::entry(M::Id::TOP, &mut self.ctx, &mut self.timers);
        self.run_init(&mut visited, &mut pending);
        self.drain_pending(pending);
    }

    /// The active leaf state.
    pub fn state(&self) -> M::Id {
        self.state.expect("state machine not started")
    }

    /// Whether the given state is the active leaf.
    pub fn is_active(&self, id: M::Id) -> bool {
        self.state == Some(id)
    }

    /// Shared access to the context.
    pub fn ctx(&self) -> &M::Ctx {
        &self.ctx
    }

    /// Mutable access to the context.
    pub fn ctx_mut(&mut self) -> &mut M::Ctx {
        &mut self.ctx
    }

    /// The machine's timer pair. Expirations are posted as `Wake` values to
    /// the queue the timers were constructed with; the queue owner decides
    /// whether they are still current (see [`Timers::accept`]).
    pub fn timers(&mut self) -> &mut Timers<M::Wake> {
        &mut self.timers
    }

    /// Dispatch an event to the active leaf, walking up the tree until some
    /// state handles it. An unhandled event (every ancestor delegated) is
    /// dropped.
    pub fn dispatch(&mut self, event: &M::Event) {
        let mut s = self.state.expect("dispatch before start");
        loop {
            match M::on_event(s, &mut self.ctx, &mut self.timers, event) {
                Reaction::Handled => return,
                Reaction::Parent => match s.parent() {
                    Some(p) => s = p,
                    None => return,
                },
                Reaction::Transition(target) => {
                    self.set_state(target);
                    return;
                }
            }
        }
    }

    /// Transition to `target`. A transition to the active leaf is a no-op:
    /// no exit, entry, or init callbacks fire.
    pub fn set_state(&mut self, target: M::Id) {
        assert!(self.state.is_some(), "set_state before start");
        let mut visited = vec![target];
        let mut pending = None;
        self.transition(target, &mut visited, &mut pending);
        self.drain_pending(pending);
    }

    /// Exit up to the LCA, enter down to `target`, then run its init chain.
    fn transition(
        &mut self,
        target: M::Id,
        visited: &mut Vec<M::Id>,
        pending: &mut Option<M::Id>,
    ) {
        let current = self.state.expect("transition before start");
        if current == target {
            return;
        }
        let lca = Self::lca(current, target);

        let mut s = current;
        while s != lca {
            M::exit(s, &mut self.ctx, &mut self.timers);
            s = s.parent().expect("exit walk passed the root");
        }

        let mut path = Vec::new();
        let mut t = target;
        while t != lca {
            path.push(t);
            t = t.parent().expect("entry walk passed the root");
        }
        for st in path.iter().rev() {
            if let Some(follow) = M::entry(*st, &mut self.ctx, &mut self.timers) {
                *pending = Some(follow);
            }
        }

        self.state = Some(target);
        tracing::debug!(from = ?current, to = ?target, "state transition");
        self.run_init(visited, pending);
    }

    /// Run the init step of the active state, recursing while init keeps
    /// drilling into substates. Revisiting a state within one transition is
    /// a programming error.
    fn run_init(&mut self, visited: &mut Vec<M::Id>, pending: &mut Option<M::Id>) {
        let current = self.state.expect("init before start");
        let Some(next) = M::init(current, &mut self.ctx, &mut self.timers) else {
            return;
        };
        if visited.contains(&next) {
            debug_assert!(
                false,
                "state switching loop: {next:?} revisited during one transition"
            );
            return;
        }
        visited.push(next);
        self.transition(next, visited, pending);
    }

    /// Apply follow-up transitions requested by entry handlers. Each one is
    /// a fresh transition of its own.
    fn drain_pending(&mut self, mut pending: Option<M::Id>) {
        while let Some(target) = pending.take() {
            let mut visited = vec![target];
            self.transition(target, &mut visited, &mut pending);
        }
    }

    /// Least common ancestor of two states. `TOP` is a shared root, so this
    /// always exists.
    fn lca(a: M::Id, b: M::Id) -> M::Id {
        let mut ancestors = Vec::new();
        let mut t = Some(b);
        while let Some(s) = t {
            ancestors.push(s);
            t = s.parent();
        }
        let mut s = a;
        loop {
            if ancestors.contains(&s) {
                return s;
            }
            s = s.parent().expect("states do not share a root");
        }
    }

    /// Arm the relative timer. See [`Timers::set_timeout`].
    pub fn set_timeout(&mut self, delay: Duration) {
        self.timers.set_timeout(delay);
    }

    /// Cancel the relative timer. See [`Timers::clear_timeout`].
    pub fn clear_timeout(&mut self) {
        self.timers.clear_timeout();
    }

    /// Arm the absolute wall-clock timer. See [`Timers::set_timeout_at`].
    pub fn set_timeout_at(&mut self, at: SystemTime, offset: Duration) {
        self.timers.set_timeout_at(at, offset);
    }

    /// Cancel the absolute timer. See [`Timers::clear_timeout_at`].
    pub fn clear_timeout_at(&mut self) {
        self.timers.clear_timeout_at();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Id {
        Top,
        A,
        A1,
        A2,
        B,
    }

    impl StateId for Id {
        const TOP: Self = Id::Top;

        fn parent(self) -> Option<Self> {
            match self {
                Id::Top => None,
                Id::A | Id::B => Some(Id::Top),
                Id::A1 | Id::A2 => Some(Id::A),
            }
        }
    }

    #[derive(Default)]
    struct Ctx {
        log: Vec<String>,
        /// When set, entering A2 requests a follow-up transition to B.
        bounce_a2: bool,
        /// When set, A1's init loops back to A.
        loop_init: bool,
    }

    enum Ev {
        ToA2,
        ToB,
        Ping,
    }

    enum Wake {
        #[allow(dead_code)]
        Timer(TimerFire),
    }

    impl From<TimerFire> for Wake {
        fn from(fire: TimerFire) -> Self {
            Wake::Timer(fire)
        }
    }

    struct Demo;

    impl StateModel for Demo {
        type Id = Id;
        type Ctx = Ctx;
        type Event = Ev;
        type Wake = Wake;

        fn init(id: Id, ctx: &mut Ctx, _timers: &mut Timers<Wake>) -> Option<Id> {
            match id {
                Id::Top => Some(Id::A),
                Id::A => Some(Id::A1),
                Id::A1 if ctx.loop_init => Some(Id::A),
                _ => None,
            }
        }

        fn entry(id: Id, ctx: &mut Ctx, _timers: &mut Timers<Wake>) -> Option<Id> {
            ctx.log.push(format!("enter {id:?}"));
            if id == Id::A2 && ctx.bounce_a2 {
                return Some(Id::B);
            }
            None
        }

        fn exit(id: Id, ctx: &mut Ctx, _timers: &mut Timers<Wake>) {
            ctx.log.push(format!("exit {id:?}"));
        }

        fn on_event(id: Id, ctx: &mut Ctx, _timers: &mut Timers<Wake>, event: &Ev) -> Reaction<Id> {
            match (id, event) {
                (Id::A1, Ev::ToA2) => Reaction::Transition(Id::A2),
                (Id::Top, Ev::ToB) => Reaction::Transition(Id::B),
                (Id::A, Ev::Ping) => {
                    ctx.log.push("ping in A".into());
                    Reaction::Handled
                }
                (Id::Top, _) => Reaction::Handled,
                _ => Reaction::Parent,
            }
        }
    }

    fn machine() -> Machine<Demo> {
        let (tx, _rx) = mpsc::unbounded_channel();
        Machine::new(Ctx::default(), Timers::new(tx))
    }

    #[test]
    fn start_runs_entry_and_init_chain() {
        let mut m = machine();
        m.start();
        assert_eq!(m.state(), Id::A1);
        assert_eq!(m.ctx().log, ["enter Top", "enter A", "enter A1"]);
    }

    #[test]
    fn unhandled_event_walks_up_to_top() {
        let mut m = machine();
        m.start();
        m.ctx_mut().log.clear();
        // A1 does not handle ToB; neither does A; Top transitions.
        m.dispatch(&Ev::ToB);
        assert_eq!(m.state(), Id::B);
        assert_eq!(m.ctx().log, ["exit A1", "exit A", "enter B"]);
    }

    #[test]
    fn inherited_handler_runs_without_transition() {
        let mut m = machine();
        m.start();
        m.ctx_mut().log.clear();
        m.dispatch(&Ev::Ping);
        assert_eq!(m.state(), Id::A1);
        assert_eq!(m.ctx().log, ["ping in A"]);
    }

    #[test]
    fn sibling_transition_stops_at_lca() {
        let mut m = machine();
        m.start();
        m.ctx_mut().log.clear();
        m.dispatch(&Ev::ToA2);
        assert_eq!(m.state(), Id::A2);
        // A is the LCA: it is neither exited nor re-entered.
        assert_eq!(m.ctx().log, ["exit A1", "enter A2"]);
    }

    #[test]
    fn same_state_transition_is_a_noop() {
        let mut m = machine();
        m.start();
        m.ctx_mut().log.clear();
        m.set_state(Id::A1);
        assert_eq!(m.state(), Id::A1);
        assert!(m.ctx().log.is_empty());
    }

    #[test]
    fn transition_to_ancestor_reruns_its_init() {
        let mut m = machine();
        m.start();
        m.dispatch(&Ev::ToA2);
        m.ctx_mut().log.clear();
        // A2 -> A: exit A2 only, then A's init drills back to A1.
        m.set_state(Id::A);
        assert_eq!(m.state(), Id::A1);
        assert_eq!(m.ctx().log, ["exit A2", "enter A1"]);
    }

    #[test]
    fn entry_follow_up_runs_after_transition_completes() {
        let mut m = machine();
        m.start();
        m.ctx_mut().bounce_a2 = true;
        m.ctx_mut().log.clear();
        m.dispatch(&Ev::ToA2);
        assert_eq!(m.state(), Id::B);
        assert_eq!(
            m.ctx().log,
            ["exit A1", "enter A2", "exit A2", "exit A", "enter B"]
        );
    }

    #[test]
    #[should_panic(expected = "state switching loop")]
    fn init_loop_is_detected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut m: Machine<Demo> = Machine::new(
            Ctx {
                loop_init: true,
                ..Ctx::default()
            },
            Timers::new(tx),
        );
        m.start();
    }

    #[test]
    #[should_panic(expected = "dispatch before start")]
    fn dispatch_before_start_is_fatal() {
        let mut m = machine();
        m.dispatch(&Ev::Ping);
    }
}
