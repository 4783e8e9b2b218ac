//! # Poll Scheduler
//!
//! `start(interval, task) -> PollHandle`, `handle.stop()`. That is the
//! whole interface.
//!
//! ## Timing
//!
//! The timer fires immediately, then every `interval`. Missed ticks are
//! skipped, not burst: a laptop waking from sleep gets one round, not
//! forty.
//!
//! ## One round at a time
//!
//! Each round runs on its own task so the timer keeps its cadence. An
//! atomic in-flight flag guards it: a tick that fires while the previous
//! round is still running is dropped with a `debug!` line. It is not
//! queued. A slow ledger therefore sees at most one outstanding round per
//! poll, however short the interval.
//!
//! ## Stopping
//!
//! [`PollHandle::stop`] is idempotent. It raises the [`StopSignal`] and
//! aborts the timer. A round already in flight is allowed to finish, but it
//! can see the signal and must throw its result away.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Shared "this poll has been stopped" flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Raises the flag. Returns `true` only for the call that raised it.
    fn raise(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }
}

/// What a round is told about itself.
#[derive(Debug, Clone)]
pub struct Tick {
    /// 1-based round number. Skipped ticks do not consume a number.
    pub round: u64,
    pub stop: StopSignal,
}

/// Clears the in-flight flag when the round ends, panics included.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A running poll. Dropping the handle stops it.
#[derive(Debug)]
pub struct PollHandle {
    stop: StopSignal,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl PollHandle {
    /// Stops the poll. Safe to call any number of times.
    pub fn stop(&self) {
        if self.stop.raise() {
            debug!("poll stopped");
        }
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    pub fn signal(&self) -> StopSignal {
        self.stop.clone()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs `task` every `interval`, starting now. Must be called inside a
/// tokio runtime.
///
/// # Panics
///
/// Panics if `interval` is zero, as `tokio::time::interval` does.
pub fn start<F, Fut>(interval: Duration, task: F) -> PollHandle
where
    F: Fn(Tick) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let stop = StopSignal::default();
    let in_flight = Arc::new(AtomicBool::new(false));

    let signal = stop.clone();
    let timer = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut rounds = 0u64;
        loop {
            ticker.tick().await;
            if signal.is_stopped() {
                break;
            }
            if in_flight.swap(true, Ordering::AcqRel) {
                debug!("previous round still in flight, skipping tick");
                continue;
            }
            rounds += 1;
            let round = rounds;
            debug!(round, "poll tick");

            let guard = InFlight(Arc::clone(&in_flight));
            let fut = task(Tick {
                round,
                stop: signal.clone(),
            });
            tokio::spawn(async move {
                let _guard = guard;
                fut.await;
            });
        }
    });

    PollHandle {
        stop,
        timer: Mutex::new(Some(timer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = start(Duration::from_secs(60), move |_| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_interval() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = start(Duration::from_millis(10), move |_| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        // Ticks at 0, 10, 20, 30.
        tokio::time::sleep(Duration::from_millis(35)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_round_skips_ticks() {
        let started = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let (s, g) = (Arc::clone(&started), Arc::clone(&gate));
        let handle = start(Duration::from_millis(10), move |_| {
            let (s, g) = (Arc::clone(&s), Arc::clone(&g));
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                g.notified().await;
            }
        });

        tokio::time::sleep(Duration::from_millis(45)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);

        // Once the round finishes the next tick starts a new one.
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(started.load(Ordering::SeqCst), 2);
        handle.stop();
        gate.notify_one();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_final() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = start(Duration::from_millis(10), move |_| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        handle.stop();
        handle.stop();
        assert!(handle.is_stopped());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_sees_stop_signal() {
        let gate = Arc::new(Notify::new());
        let saw_stop = Arc::new(AtomicBool::new(false));
        let (g, seen) = (Arc::clone(&gate), Arc::clone(&saw_stop));
        let handle = start(Duration::from_millis(10), move |tick| {
            let (g, seen) = (Arc::clone(&g), Arc::clone(&seen));
            async move {
                g.notified().await;
                seen.store(tick.stop.is_stopped(), Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        handle.stop();
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(saw_stop.load(Ordering::SeqCst));
    }
}
