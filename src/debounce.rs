/// GridSync Debounce Utility
///
/// Search boxes fire per keystroke; recomputing filter → sort → paginate on
/// every one is wasteful. `Debouncer` gives trailing-edge debouncing with a
/// configurable delay: only the last call inside the window fires. It is
/// UI-framework-independent and carries no table state; the delay is a
/// policy knob, not a correctness requirement.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default delay for search-input debouncing.
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(350);

/// Trailing-edge debouncer. Each `call` supersedes any unfired prior call.
///
/// Requires a tokio runtime; the deferred closure runs on a spawned task.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `f` to run after the delay unless another call arrives
    /// first. Superseded calls never fire.
    pub fn call<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let scheduled = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if generation.load(Ordering::SeqCst) == scheduled {
                f();
            }
        });
    }

    /// Drop any scheduled call without firing it.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Debouncer::new(DEFAULT_DEBOUNCE_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_single_call_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_millis(300));

        let counter = Arc::clone(&fired);
        debouncer.call(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_calls_collapse_to_last() {
        let fired = Arc::new(AtomicUsize::new(0));
        let last_value = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_millis(300));

        for i in 1..=5 {
            let counter = Arc::clone(&fired);
            let value = Arc::clone(&last_value);
            debouncer.call(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                value.store(i, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(last_value.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_pending_call() {
        let fired = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_millis(300));

        let counter = Arc::clone(&fired);
        debouncer.call(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_calls_each_fire() {
        let fired = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_millis(100));

        for _ in 0..3 {
            let counter = Arc::clone(&fired);
            debouncer.call(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }
}
