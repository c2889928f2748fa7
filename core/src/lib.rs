//! # Helpdesk Core
//!
//! Functional-core abstractions shared by the helpdesk lifecycle crates.
//!
//! Business rules live in reducers: pure functions that take the current
//! state, an action and an injected environment, update the state in place
//! and return descriptions of the side effects the shell should run.
//!
//! ## Core Concepts
//!
//! - **State**: The snapshot a reducer works on (for example one ticket)
//! - **Action**: Every input the reducer understands
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: A description of I/O, executed later by the runtime
//! - **Environment**: Injected dependencies such as the [`environment::Clock`]
//!
//! ## Example
//!
//! ```
//! use helpdesk_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! struct Counter;
//!
//! impl Reducer for Counter {
//!     type State = u32;
//!     type Action = u32;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut u32,
//!         action: u32,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<u32>; 4]> {
//!         *state += action;
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! let mut state = 1;
//! let effects = Counter.reduce(&mut state, 2, &());
//! assert_eq!(state, 3);
//! assert_eq!(effects.len(), 1);
//! ```

pub use chrono::{DateTime, Utc};
pub use smallvec::{SmallVec, smallvec};

/// Reducers: where the business rules live.
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// Pure state transition driven by commands.
    ///
    /// Implementations read only `state`, `action` and `env`, mutate `state`
    /// in place and describe any I/O as [`Effect`] values for the shell.
    pub trait Reducer {
        /// Snapshot the reducer works on
        type State;

        /// Commands the reducer understands
        type Action;

        /// Injected dependencies (clock, transports)
        type Environment;

        /// Apply one action.
        ///
        /// A rejected action leaves the state's domain data untouched and
        /// returns only no-op effects. Up to four effects stay inline.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Side effects as data.
///
/// Effects are values, not execution. The runtime decides when (and whether)
/// to run them, which is how a rejected or conflicting commit can drop every
/// effect a reducer produced without anything having been sent.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Work for the shell to run after a reduction.
    pub enum Effect<Action> {
        /// Nothing to do
        None,

        /// Run one after another; top-level effects already run concurrently
        Sequential(Vec<Effect<Action>>),

        /// Async work; a `Some` output is a follow-up action
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::None => f.write_str("None"),
                Self::Sequential(effects) => f.debug_tuple("Sequential").field(effects).finish(),
                Self::Future(_) => f.write_str("Future(..)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// [`Effect::Sequential`] over `effects`.
        #[must_use]
        pub const fn chain(effects: Vec<Self>) -> Self {
            Self::Sequential(effects)
        }

        /// Returns true for [`Effect::None`] and for chains of nothing.
        #[must_use]
        pub fn is_none(&self) -> bool {
            match self {
                Effect::None => true,
                Effect::Sequential(effects) => effects.iter().all(Effect::is_none),
                Effect::Future(_) => false,
            }
        }

        /// Number of `Future` effects contained, counting nested compositions.
        #[must_use]
        pub fn future_count(&self) -> usize {
            match self {
                Effect::None => 0,
                Effect::Sequential(effects) => effects.iter().map(Effect::future_count).sum(),
                Effect::Future(_) => 1,
            }
        }
    }
}

/// Injected dependencies shared by every environment.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Source of "now".
    ///
    /// Every timestamp and duration the engine computes goes through this
    /// trait, so a single operation samples "now" exactly once.
    pub trait Clock: Send + Sync {
        /// Current instant
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
