//! Wall-clock source for timer arming, swappable in tests.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

/// Longest single sleep before re-reading the wall clock, so timers follow
/// clock adjustments and host suspend.
const MAX_SLEEP_SLICE: Duration = Duration::from_secs(60);

#[async_trait]
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;

    /// Resolve once `now() >= deadline`.
    async fn sleep_until(&self, deadline: DateTime<Utc>);
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        loop {
            let Ok(remaining) = (deadline - Utc::now()).to_std() else {
                return;
            };
            if remaining.is_zero() {
                return;
            }
            tokio::time::sleep(remaining.min(MAX_SLEEP_SLICE)).await;
        }
    }
}

/// Clock that only moves when told to. Sleepers wake as soon as an
/// `advance` or `set` reaches their deadline.
#[derive(Debug)]
pub struct ManualClock {
    current: watch::Sender<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        let (current, _) = watch::channel(start);
        Self { current }
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.current.send_modify(|now| *now += by);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.current.send_replace(to);
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.borrow()
    }

    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        let mut rx = self.current.subscribe();
        loop {
            if *rx.borrow_and_update() >= deadline {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
