//! # Helpdesk Testing
//!
//! Testing utilities for reducers built on `helpdesk-core`.
//!
//! This crate provides:
//! - Deterministic [`Clock`] implementations
//! - The Given-When-Then [`ReducerTest`] harness
//! - Assertion helpers for effects
//!
//! ## Example
//!
//! ```ignore
//! use helpdesk_testing::{ReducerTest, test_clock};
//!
//! ReducerTest::new(TicketReducer::new())
//!     .with_env(environment(test_clock()))
//!     .given_state(TicketState::loaded(ticket))
//!     .when_action(TicketAction::Close { actor })
//!     .then_state(|state| assert!(state.last_error.is_some()))
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use helpdesk_core::environment::Clock;

pub mod reducer_test;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::Mutex;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use helpdesk_testing::mocks::FixedClock;
    /// use helpdesk_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when a test tells it to.
    ///
    /// Lifecycle scenarios ("resolve an hour later, reopen, resolve again")
    /// share one clock between the engine and the test body.
    ///
    /// ```
    /// use helpdesk_testing::mocks::ManualClock;
    /// use helpdesk_core::environment::Clock;
    /// use chrono::Duration;
    ///
    /// let clock = ManualClock::starting_at(helpdesk_testing::t0());
    /// clock.advance(Duration::minutes(61));
    /// assert_eq!(clock.now() - helpdesk_testing::t0(), Duration::minutes(61));
    /// ```
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Create a clock frozen at `time`.
        #[must_use]
        pub const fn starting_at(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward (or backward, for a negative duration).
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute instant.
        pub fn set(&self, to: DateTime<Utc>) {
            let mut time = self.time.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *time = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(super::t0())
    }
}

/// 2025-01-01 00:00:00 UTC, the instant every default test clock starts at.
#[must_use]
pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default()
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};
