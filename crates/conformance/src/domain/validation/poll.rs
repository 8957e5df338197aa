//! Fixed-interval polling with a hard deadline.
//!
//! The loop always runs to its deadline unless an attempt reports completion.
//! A [`CancellationToken`] is accepted so callers can abort early; tokens that
//! are never cancelled preserve run-to-timeout behaviour. Both the deadline and
//! the token also interrupt an attempt that is still in flight.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Interval and deadline for one poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

/// How a poll loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T, S> {
    Done { value: T, waited: Duration },
    /// Deadline passed; `last` is the final observation, if any
    TimedOut { last: Option<S>, waited: Duration },
    Cancelled { last: Option<S>, waited: Duration },
}

/// Calls `attempt` immediately, then every `settings.interval`, until it returns
/// [`ControlFlow::Break`] or `settings.timeout` elapses.
///
/// An attempt is always started once more at the deadline, so a state that is
/// already observable at the timeout still counts. An attempt that has not
/// completed by the deadline is dropped.
pub async fn poll_until<F, Fut, T, S>(
    settings: PollSettings,
    cancellation_token: &CancellationToken,
    mut attempt: F,
) -> PollOutcome<T, S>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ControlFlow<T, S>>,
{
    let started = Instant::now();
    let deadline = started + settings.timeout;
    let mut last = None;

    loop {
        let flow = tokio::select! {
            biased;
            flow = attempt() => flow,
            _ = cancellation_token.cancelled() => {
                return PollOutcome::Cancelled {
                    last,
                    waited: started.elapsed(),
                };
            }
            _ = tokio::time::sleep_until(deadline) => {
                return PollOutcome::TimedOut {
                    last,
                    waited: started.elapsed(),
                };
            }
        };

        match flow {
            ControlFlow::Break(value) => {
                return PollOutcome::Done {
                    value,
                    waited: started.elapsed(),
                }
            }
            ControlFlow::Continue(state) => last = Some(state),
        }

        let now = Instant::now();
        if now >= deadline {
            return PollOutcome::TimedOut {
                last,
                waited: started.elapsed(),
            };
        }

        let pause = settings.interval.min(deadline - now);
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                return PollOutcome::Cancelled {
                    last,
                    waited: started.elapsed(),
                };
            }
            _ = tokio::time::sleep(pause) => {}
        }
    }
}
