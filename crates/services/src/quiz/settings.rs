use std::env;
use std::time::Duration;

const DEFAULT_EVALUATION_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_EVALUATOR_DELAY: Duration = Duration::from_millis(800);

/// Tunables for speaking-question evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizSettings {
    /// Upper bound on a single evaluation; exceeding it counts as a failed attempt.
    pub evaluation_timeout: Duration,
    /// Simulated latency of the stub evaluator.
    pub evaluator_delay: Duration,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            evaluation_timeout: DEFAULT_EVALUATION_TIMEOUT,
            evaluator_delay: DEFAULT_EVALUATOR_DELAY,
        }
    }
}

impl QuizSettings {
    /// Read overrides from `PHRASE_EVAL_TIMEOUT_MS` and `PHRASE_EVAL_DELAY_MS`.
    ///
    /// Missing or unparsable values keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            evaluation_timeout: millis_from_env("PHRASE_EVAL_TIMEOUT_MS")
                .filter(|d| !d.is_zero())
                .unwrap_or(defaults.evaluation_timeout),
            evaluator_delay: millis_from_env("PHRASE_EVAL_DELAY_MS")
                .unwrap_or(defaults.evaluator_delay),
        }
    }

    #[must_use]
    pub fn with_evaluation_timeout(mut self, timeout: Duration) -> Self {
        self.evaluation_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_evaluator_delay(mut self, delay: Duration) -> Self {
        self.evaluator_delay = delay;
        self
    }
}

fn millis_from_env(key: &str) -> Option<Duration> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(err) => {
            tracing::warn!("ignoring {key}={raw:?}: {err}");
            None
        }
    }
}
