//! Live cron timers.
//!
//! Each armed task owns one tokio task that sleeps until the next fire time,
//! invokes its callback, and repeats. Timers are kept apart from the
//! persisted [`TaskDef`](crate::types::TaskDef) so task records stay plain
//! data.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::schedule::CronSchedule;

/// Longest single sleep. Waking at least this often lets a timer notice
/// system clock steps and host suspends instead of firing late.
const MAX_NAP: Duration = Duration::from_secs(60);

/// Source of wall-clock time for timers.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    /// `Utc::now()` on every read.
    #[default]
    System,
    /// Wall time captured at creation, advanced by `tokio::time::Instant`.
    ///
    /// Follows `tokio::time::pause` / `advance`, which makes it the clock for
    /// paused-time tests. It drifts from the system clock across suspends and
    /// NTP steps, so servers use [`Clock::System`].
    Tokio {
        wall: DateTime<Utc>,
        instant: tokio::time::Instant,
    },
}

impl Clock {
    pub fn tokio() -> Self {
        Clock::Tokio {
            wall: Utc::now(),
            instant: tokio::time::Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Tokio { wall, instant } => {
                let elapsed = tokio::time::Instant::now().saturating_duration_since(*instant);
                match chrono::Duration::from_std(elapsed) {
                    Ok(delta) => *wall + delta,
                    Err(_) => *wall,
                }
            }
        }
    }
}

/// Handle to a running timer. Dropping it does not stop the timer; call
/// [`TimerHandle::stop`].
#[derive(Debug)]
pub struct TimerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl TimerHandle {
    /// Stop the timer. Once this returns no further firing will start, even
    /// if the fire time already elapsed and the timer task has not yet run.
    pub fn stop(self) {
        self.cancel.cancel();
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Arm a timer that calls `on_fire` at every occurrence of `schedule`.
///
/// `cancel` stops the timer; the caller keeps a clone so it can check it
/// again at fire time. `on_fire` runs on the timer task and must not block;
/// long work belongs on a spawned task. Must be called from within a tokio
/// runtime.
pub fn arm<F>(
    schedule: CronSchedule,
    clock: Clock,
    cancel: CancellationToken,
    mut on_fire: F,
) -> TimerHandle
where
    F: FnMut(DateTime<Utc>) + Send + 'static,
{
    let token = cancel.clone();

    let join = tokio::spawn(async move {
        let mut after = clock.now();
        'timer: loop {
            let Some(next) = schedule.next_after(after) else {
                warn!(expression = %schedule.expression(), "cron expression has no future occurrence");
                break;
            };
            debug!(expression = %schedule.expression(), %next, "timer armed");

            // Re-read the clock after every nap so steps and suspends are
            // noticed within MAX_NAP.
            loop {
                let wait = (next - clock.now()).to_std().unwrap_or(Duration::ZERO);
                if wait.is_zero() {
                    break;
                }
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break 'timer,
                    _ = tokio::time::sleep(wait.min(MAX_NAP)) => {}
                }
            }
            // A stop that landed while we slept still wins.
            if token.is_cancelled() {
                break;
            }

            on_fire(next);
            // Occurrences that passed while the host was away are skipped.
            after = next.max(clock.now());
        }
    });

    TimerHandle { cancel, join }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn counting_timer(expr: &str) -> (TimerHandle, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let handle = arm(
            CronSchedule::parse(expr).unwrap(),
            Clock::tokio(),
            CancellationToken::new(),
            move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
        );
        (handle, count)
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = Clock::tokio();
        let before = clock.now();
        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!((clock.now() - before).num_seconds(), 90);
    }

    #[tokio::test(start_paused = true)]
    async fn system_clock_ignores_monotonic_time() {
        let clock = Clock::System;
        tokio::time::advance(Duration::from_secs(3600)).await;
        let skew = (clock.now() - Utc::now()).num_seconds().abs();
        assert!(skew < 5, "system clock drifted by {skew}s");
    }

    #[tokio::test(start_paused = true)]
    async fn long_waits_are_split_into_naps() {
        // Daily at midnight: the first occurrence is up to 24h away.
        let (handle, count) = counting_timer("0 0 * * *");
        tokio::time::sleep(MAX_NAP * 3).await;
        assert!(!handle.is_finished());
        assert!(count.load(Ordering::SeqCst) <= 1);
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_per_minute() {
        let (handle, count) = counting_timer("* * * * *");
        // Anywhere from 0 to 60 s to the first boundary, then 60 s apart.
        tokio::time::sleep(Duration::from_secs(60 * 3 + 1)).await;
        let fired = count.load(Ordering::SeqCst);
        assert!((3..=4).contains(&fired), "fired {fired} times");
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_first_poll_prevents_firing() {
        let (handle, count) = counting_timer("* * * * *");
        handle.stop();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_after_firing_halts_further_firings() {
        let (handle, count) = counting_timer("* * * * *");
        tokio::time::sleep(Duration::from_secs(61)).await;
        let fired = count.load(Ordering::SeqCst);
        assert!(fired >= 1);

        handle.stop();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(count.load(Ordering::SeqCst), fired);
    }
}
