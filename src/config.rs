//! Search configuration parameters.

use crate::error::ConfigError;
use std::time::Duration;

/// When a search stops. Checked only between iterations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Budget {
    /// Run exactly this many iterations.
    Iterations(u64),
    /// Start new iterations until the wall clock runs out.
    Time(Duration),
    /// Stop at whichever limit is hit first.
    Both { iterations: u64, time: Duration },
}

impl Budget {
    pub fn iteration_limit(&self) -> Option<u64> {
        match *self {
            Budget::Iterations(n) | Budget::Both { iterations: n, .. } => Some(n),
            Budget::Time(_) => None,
        }
    }

    pub fn time_limit(&self) -> Option<Duration> {
        match *self {
            Budget::Time(t) | Budget::Both { time: t, .. } => Some(t),
            Budget::Iterations(_) => None,
        }
    }
}

/// Configuration for a Monte Carlo search.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Iteration and/or wall-clock budget of one `search` call.
    pub budget: Budget,

    /// Exploration constant `C` of the UCB1 formula.
    /// Higher values favour rarely tried actions, lower values favour the
    /// best average so far.
    pub exploration: f64,

    /// Worker threads. 0 or 1 runs iterations sequentially on the caller's
    /// thread.
    pub threads: usize,

    /// Seed from which every iteration derives its random number generator.
    pub seed: u64,

    /// Playouts longer than this are cut off and score the neutral utility 0.
    pub max_playout_depth: usize,

    /// Abort when more than this fraction of iterations hit a model error.
    pub max_model_error_rate: f64,

    /// The error rate is not judged before this many iterations.
    pub min_iterations_for_error_rate: u64,

    /// Break UCB ties at random instead of by edge creation order.
    pub random_tie_break: bool,

    /// Check graph invariants after every iteration instead of once per
    /// search.
    pub verify_invariants: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            budget: Budget::Iterations(10_000),
            exploration: std::f64::consts::SQRT_2,
            threads: 1,
            seed: 0x5eed,
            max_playout_depth: 10_000,
            max_model_error_rate: 0.5,
            min_iterations_for_error_rate: 100,
            random_tie_break: false,
            verify_invariants: false,
        }
    }
}

impl SearchConfig {
    /// Small, fully checked configuration for tests.
    pub fn for_testing() -> Self {
        Self {
            budget: Budget::Iterations(200),
            verify_invariants: true,
            ..Self::default()
        }
    }

    /// Builder pattern: run a fixed number of iterations.
    pub fn with_iterations(mut self, n: u64) -> Self {
        self.budget = Budget::Iterations(n);
        self
    }

    /// Builder pattern: run until `time` has elapsed.
    pub fn with_time(mut self, time: Duration) -> Self {
        self.budget = Budget::Time(time);
        self
    }

    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    /// Builder pattern: set the UCB1 exploration constant.
    pub fn with_exploration(mut self, c: f64) -> Self {
        self.exploration = c;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_playout_depth(mut self, depth: usize) -> Self {
        self.max_playout_depth = depth;
        self
    }

    pub fn with_max_model_error_rate(mut self, rate: f64) -> Self {
        self.max_model_error_rate = rate;
        self
    }

    pub fn with_random_tie_break(mut self, enabled: bool) -> Self {
        self.random_tie_break = enabled;
        self
    }

    /// Rejects parameters a search cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.budget.iteration_limit() == Some(0) {
            return Err(ConfigError::ZeroIterations);
        }
        if self.budget.time_limit() == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroDuration);
        }
        if !self.exploration.is_finite() || self.exploration < 0.0 {
            return Err(ConfigError::InvalidExploration(self.exploration));
        }
        if self.max_playout_depth == 0 {
            return Err(ConfigError::ZeroPlayoutDepth);
        }
        if !(0.0..=1.0).contains(&self.max_model_error_rate) {
            return Err(ConfigError::InvalidErrorRate(self.max_model_error_rate));
        }
        Ok(())
    }
}
