//! Bounded wait-and-poll for asynchronous external jobs

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

/// Poll cadence and total time budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two checks
    pub interval: Duration,

    /// Total wait after which the job is given up on
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(120),
        }
    }
}

/// Outcome of one status check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    /// Still running; check again later
    Pending,

    /// Finished with a value
    Ready(T),
}

/// Failure of a bounded poll
#[derive(Debug, Error)]
pub enum PollError<E> {
    /// The job did not finish in time
    #[error("gave up after waiting {waited:?}")]
    TimedOut { waited: Duration },

    /// A check itself failed
    #[error("{0}")]
    Failed(E),
}

/// Call `check` every `config.interval` until it is ready, fails, or
/// `config.max_wait` has elapsed.
///
/// The first check runs immediately. No check is started once the budget is
/// spent, so at most `max_wait / interval + 1` checks are made.
pub async fn poll_until<T, E, F, Fut>(config: PollConfig, mut check: F) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, E>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match check().await.map_err(PollError::Failed)? {
            PollStatus::Ready(value) => {
                debug!(attempts, "Poll finished");
                return Ok(value);
            }
            PollStatus::Pending => {}
        }

        let waited = started.elapsed();
        if waited + config.interval > config.max_wait {
            return Err(PollError::TimedOut { waited });
        }
        tokio::time::sleep(config.interval).await;
    }
}
