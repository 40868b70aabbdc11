//! Debounce timer for the App actor's select loop

use std::future;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Fires once, `delay` after the last `schedule` call.
///
/// `due` is cancel-safe: dropping it before the deadline leaves the timer armed.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            deadline: None,
        }
    }

    /// Arm the timer, pushing back any pending deadline
    pub fn schedule(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    /// Disarm; returns whether anything was pending
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Resolves at the deadline and disarms. Never resolves while idle.
    pub async fn due(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_last_schedule() {
        let mut timer = Debouncer::new(Duration::from_millis(100));
        timer.schedule();
        tokio::time::advance(Duration::from_millis(60)).await;
        timer.schedule();

        let start = Instant::now();
        timer.due().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(!timer.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timer_never_fires() {
        let mut timer = Debouncer::new(Duration::from_millis(10));
        let fired = tokio::time::timeout(Duration::from_secs(5), timer.due()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_disarms() {
        let mut timer = Debouncer::new(Duration::from_millis(10));
        timer.schedule();
        assert!(timer.cancel());
        assert!(!timer.cancel());
        let fired = tokio::time::timeout(Duration::from_secs(1), timer.due()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_wait_keeps_deadline() {
        let mut timer = Debouncer::new(Duration::from_millis(100));
        let start = Instant::now();
        timer.schedule();
        let early = tokio::time::timeout(Duration::from_millis(50), timer.due()).await;
        assert!(early.is_err());
        timer.due().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(!timer.cancel());
    }
}
