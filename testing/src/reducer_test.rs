//! Given-When-Then harness for reducers.
//!
//! ```
//! # use helpdesk_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
//! # use helpdesk_testing::{ReducerTest, assertions};
//! # struct Add;
//! # impl Reducer for Add {
//! #     type State = u32;
//! #     type Action = u32;
//! #     type Environment = ();
//! #     fn reduce(&self, s: &mut u32, a: u32, _: &()) -> SmallVec<[Effect<u32>; 4]> {
//! #         *s += a;
//! #         smallvec![Effect::None]
//! #     }
//! # }
//! let total = ReducerTest::new(Add)
//!     .with_env(())
//!     .given_state(1)
//!     .when_action(2)
//!     .when_action(3)
//!     .then_state(|total| assert_eq!(*total, 6))
//!     .then_effects(assertions::assert_no_effects)
//!     .run();
//! assert_eq!(total, 6);
//! ```

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use helpdesk_core::{effect::Effect, reducer::Reducer};

type StateCheck<S> = Box<dyn FnOnce(&S)>;
type EffectCheck<A> = Box<dyn FnOnce(&[Effect<A>])>;

enum Check<S, A> {
    State(StateCheck<S>),
    LastEffects(EffectCheck<A>),
    AllEffects(EffectCheck<A>),
}

/// Reduces queued actions against a given state, then runs the checks.
///
/// Actions are reduced in the order they were queued. Effects are collected
/// from every action; [`ReducerTest::then_effects`] sees only those of the
/// last action, [`ReducerTest::then_all_effects`] sees all of them.
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    state: Option<S>,
    actions: Vec<A>,
    checks: Vec<Check<S, A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Harness around `reducer`.
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            state: None,
            actions: Vec::new(),
            checks: Vec::new(),
        }
    }

    /// Environment passed to every `reduce` call.
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Given: the starting state.
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.state = Some(state);
        self
    }

    /// When: queue one action.
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// When: queue several actions.
    #[must_use]
    pub fn when_actions(mut self, actions: impl IntoIterator<Item = A>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Then: check the final state.
    #[must_use]
    pub fn then_state<F>(mut self, check: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.checks.push(Check::State(Box::new(check)));
        self
    }

    /// Then: check the effects of the last action.
    #[must_use]
    pub fn then_effects<F>(mut self, check: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.checks.push(Check::LastEffects(Box::new(check)));
        self
    }

    /// Then: check the effects of every action, in order.
    #[must_use]
    pub fn then_all_effects<F>(mut self, check: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.checks.push(Check::AllEffects(Box::new(check)));
        self
    }

    /// Reduce every action, run the checks in the order they were added and
    /// hand back the final state.
    ///
    /// # Panics
    ///
    /// Panics when the state, the environment or every action is missing,
    /// or when a check fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) -> S {
        let mut state = self.state.expect("given_state() was never called");
        let env = self.environment.expect("with_env() was never called");
        assert!(!self.actions.is_empty(), "when_action() was never called");

        let mut effects = Vec::new();
        let mut last_start = 0;
        for action in self.actions {
            last_start = effects.len();
            effects.extend(self.reducer.reduce(&mut state, action, &env));
        }

        for check in self.checks {
            match check {
                Check::State(check) => check(&state),
                Check::LastEffects(check) => check(&effects[last_start..]),
                Check::AllEffects(check) => check(&effects),
            }
        }
        state
    }
}

/// Effect assertions for use inside `then_effects`.
pub mod assertions {
    use helpdesk_core::effect::Effect;

    /// Every effect is a no-op (an empty slice passes).
    ///
    /// # Panics
    ///
    /// Panics if any effect does work.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(Effect::is_none),
            "expected only no-op effects, got {effects:?}"
        );
    }

    /// Exactly `expected` top-level effects.
    ///
    /// # Panics
    ///
    /// Panics on a count mismatch.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(effects.len(), expected, "top-level effect count");
    }

    /// Exactly `expected` `Future` effects, counting nested compositions.
    ///
    /// # Panics
    ///
    /// Panics on a count mismatch.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_future_count<A>(effects: &[Effect<A>], expected: usize) {
        let actual: usize = effects.iter().map(Effect::future_count).sum();
        assert_eq!(actual, expected, "future effect count");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_core::{SmallVec, smallvec};

    /// Counts up; `Ping` emits one future per call.
    struct Tally;

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Up,
        Ping,
    }

    impl Reducer for Tally {
        type State = u32;
        type Action = Step;
        type Environment = ();

        fn reduce(&self, count: &mut u32, step: Step, _env: &()) -> SmallVec<[Effect<Step>; 4]> {
            match step {
                Step::Up => {
                    *count += 1;
                    smallvec![Effect::None]
                },
                Step::Ping => smallvec![Effect::Future(Box::pin(async { None }))],
            }
        }
    }

    #[test]
    fn single_action() {
        let count = ReducerTest::new(Tally)
            .with_env(())
            .given_state(0)
            .when_action(Step::Up)
            .then_state(|count| assert_eq!(*count, 1))
            .then_effects(assertions::assert_no_effects)
            .run();
        assert_eq!(count, 1);
    }

    #[test]
    fn last_and_all_effects_differ() {
        ReducerTest::new(Tally)
            .with_env(())
            .given_state(5)
            .when_actions([Step::Ping, Step::Up, Step::Ping, Step::Up])
            .then_state(|count| assert_eq!(*count, 7))
            .then_effects(assertions::assert_no_effects)
            .then_all_effects(|effects| {
                assertions::assert_effects_count(effects, 4);
                assertions::assert_future_count(effects, 2);
            })
            .run();
    }

    #[test]
    fn empty_slices_have_no_effects() {
        assertions::assert_no_effects::<Step>(&[]);
        assertions::assert_future_count::<Step>(&[Effect::None], 0);
    }
}
