//! Hierarchical finite state machine engine
//!
//! States form a static tree rooted at a single top state. The active leaf
//! plus its chain of ancestors define the current configuration. Events are
//! dispatched to the leaf first; a state that does not handle an event
//! delegates to its parent, which gives the same effect as overriding a
//! virtual handler in a class hierarchy.
//!
//! Behavior is described by a [`StateModel`]: an identity enum implementing
//! [`StateId`] plus `init`/`entry`/`exit`/`on_event` callbacks. Callbacks
//! never hold a reference back to the engine — transitions are *returned*
//! ([`Reaction::Transition`], or the `Option<Id>` from `init`/`entry`) and
//! the engine routes them after the callback finishes. That keeps the
//! current-state pointer consistent while exit handlers run.
//!
//! Transition order on `set_state`: exit handlers run from the current leaf
//! up to (but not including) the least common ancestor of the two states,
//! then entry handlers run from below the LCA down to the target, then the
//! target's `init` runs and may drill further into a substate.
//!
//! [`Timers`] is the companion timer pair (one relative, one absolute
//! wall-clock timer) that posts expirations into the owner's event queue.

mod machine;
mod timer;

pub use machine::{Machine, Reaction, StateId, StateModel};
pub use timer::{TimerFire, Timers};
