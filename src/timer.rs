//! One-shot expiring timers.
//!
//! Each connector owns at most one running timer; arming a new one
//! replaces the previous. Dropping a timer cancels it.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Cancellable one-shot timer backed by a spawned task.
#[derive(Debug, Default)]
pub(crate) struct OneShotTimer {
    handle: Option<JoinHandle<()>>,
}

impl OneShotTimer {
    pub(crate) fn new() -> Self {
        Self { handle: None }
    }

    /// Arm the timer; a previously running timer is cancelled first.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn start<F>(&mut self, delay: Duration, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.stop();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        }));
    }

    /// Cancel the timer if it is running.
    pub(crate) fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for OneShotTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_timer_fires_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = OneShotTimer::new();

        let counter = Arc::clone(&fired);
        timer.start(Duration::from_millis(20), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restart_cancels_previous() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = OneShotTimer::new();

        let counter = Arc::clone(&fired);
        timer.start(Duration::from_millis(30), move || {
            counter.fetch_add(10, Ordering::SeqCst);
        });

        let counter = Arc::clone(&fired);
        timer.start(Duration::from_millis(60), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_prevents_firing() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = OneShotTimer::new();

        let counter = Arc::clone(&fired);
        timer.start(Duration::from_millis(20), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        timer.stop();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drop_cancels() {
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let mut timer = OneShotTimer::new();
            let counter = Arc::clone(&fired);
            timer.start(Duration::from_millis(20), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
