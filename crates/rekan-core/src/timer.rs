//! Session countdown.
//!
//! The timer counts down from a fixed budget that depends on the session
//! kind. Reaching zero only stops the countdown; submitting stays an explicit
//! action of the student.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::model::SessionKind;

/// Countdown state in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimer {
    budget_secs: u32,
    remaining_secs: u32,
}

impl SessionTimer {
    pub fn new(budget_secs: u32) -> Self {
        Self {
            budget_secs,
            remaining_secs: budget_secs,
        }
    }

    pub fn for_kind(kind: SessionKind) -> Self {
        Self::new(kind.default_budget_secs())
    }

    /// A timer resumed at `remaining_secs`, capped at the budget.
    pub fn resumed(budget_secs: u32, remaining_secs: u32) -> Self {
        Self {
            budget_secs,
            remaining_secs: remaining_secs.min(budget_secs),
        }
    }

    /// Count one second down. Saturates at zero.
    pub fn tick(&mut self) -> u32 {
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        self.remaining_secs
    }

    pub fn budget_secs(&self) -> u32 {
        self.budget_secs
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    /// Seconds used so far: `budget - remaining`.
    pub fn elapsed_secs(&self) -> u32 {
        self.budget_secs - self.remaining_secs
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_secs == 0
    }

    /// Remaining time as `MM:SS`.
    pub fn format_clock(&self) -> String {
        format_clock(self.remaining_secs)
    }
}

/// Formats seconds as `MM:SS`; minutes are not wrapped into hours.
pub fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// A timer shared between the session and its countdown task.
pub type SharedTimer = Arc<Mutex<SessionTimer>>;

pub fn shared(timer: SessionTimer) -> SharedTimer {
    Arc::new(Mutex::new(timer))
}

/// Read a snapshot of a shared timer.
pub fn snapshot(timer: &SharedTimer) -> SessionTimer {
    *timer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a running countdown task. Dropping it stops the countdown.
#[derive(Debug)]
pub struct Countdown {
    task: JoinHandle<()>,
    remaining: watch::Receiver<u32>,
}

impl Countdown {
    /// Start ticking `timer` once per second until it expires.
    pub fn spawn(timer: SharedTimer) -> Self {
        let initial = snapshot(&timer).remaining_secs();
        let (tx, rx) = watch::channel(initial);
        let period = Duration::from_secs(1);

        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                ticks.tick().await;
                let remaining = {
                    let mut guard = timer.lock().unwrap_or_else(PoisonError::into_inner);
                    guard.tick()
                };
                // Nobody listening is fine; the shared timer is the source of truth.
                let _ = tx.send(remaining);
                if remaining == 0 {
                    tracing::info!("session time is up");
                    break;
                }
            }
        });

        Self {
            task,
            remaining: rx,
        }
    }

    /// Receiver that observes every published remaining-seconds value.
    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.remaining.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budgets_follow_session_kind() {
        assert_eq!(SessionTimer::for_kind(SessionKind::Assessment).budget_secs(), 3600);
        assert_eq!(SessionTimer::for_kind(SessionKind::Survey).budget_secs(), 1800);
    }

    #[test]
    fn tick_saturates_at_zero() {
        let mut timer = SessionTimer::new(2);
        assert_eq!(timer.tick(), 1);
        assert_eq!(timer.tick(), 0);
        assert_eq!(timer.tick(), 0);
        assert!(timer.is_expired());
        assert_eq!(timer.elapsed_secs(), 2);
    }

    #[test]
    fn resumed_timer_is_capped() {
        let timer = SessionTimer::resumed(60, 600);
        assert_eq!(timer.remaining_secs(), 60);
        assert_eq!(SessionTimer::resumed(3600, 3000).elapsed_secs(), 600);
    }

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(3600), "60:00");
        assert_eq!(format_clock(125), "02:05");
        assert_eq!(format_clock(0), "00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_once_per_second() {
        let timer = shared(SessionTimer::new(10));
        let countdown = Countdown::spawn(Arc::clone(&timer));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(snapshot(&timer).remaining_secs(), 7);
        assert_eq!(*countdown.subscribe().borrow(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_stops_at_zero() {
        let timer = shared(SessionTimer::new(3));
        let countdown = Countdown::spawn(Arc::clone(&timer));

        tokio::time::sleep(Duration::from_secs(10)).await;
        let state = snapshot(&timer);
        assert!(state.is_expired());
        assert_eq!(state.elapsed_secs(), 3);
        assert!(countdown.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_countdown_freezes_timer() {
        let timer = shared(SessionTimer::new(60));
        let countdown = Countdown::spawn(Arc::clone(&timer));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        countdown.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(snapshot(&timer).remaining_secs(), 58);
    }
}
