//! Retry policy with a fixed back-off schedule.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How many times a job may be attempted, and how long to wait between
/// attempts.
///
/// The schedule is indexed by the number of failures so far: the first
/// failure waits `backoff[0]`, the second `backoff[1]`, and so on. A
/// schedule shorter than the attempt ceiling repeats its last entry.
///
/// Policies are attached to the job type, not to individual submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,

    /// Delay before each retry, indexed by failure count.
    #[serde(with = "durations_millis")]
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::podcast()
    }
}

impl RetryPolicy {
    /// The policy for podcast generation jobs: 3 attempts, waiting
    /// 10s, 30s, 60s after successive failures.
    pub fn podcast() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![
                Duration::from_secs(10),
                Duration::from_secs(30),
                Duration::from_secs(60),
            ],
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: vec![],
        }
    }

    /// A fixed-interval policy, mostly useful in tests.
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: vec![interval],
        }
    }

    /// Whether another attempt may run after `attempt` attempts have
    /// completed.
    pub fn has_attempts_remaining(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the retry following the `failed_attempt`-th failure
    /// (1-based).
    pub fn delay_after_failure(&self, failed_attempt: u32) -> Duration {
        if self.backoff.is_empty() {
            return Duration::ZERO;
        }
        let index = (failed_attempt.max(1) as usize - 1).min(self.backoff.len() - 1);
        self.backoff[index]
    }
}

/// Serde support for Vec<Duration> as milliseconds
mod durations_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        durations
            .iter()
            .map(|d| d.as_millis() as u64)
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Vec::<u64>::deserialize(deserializer)?;
        Ok(millis.into_iter().map(Duration::from_millis).collect())
    }
}
