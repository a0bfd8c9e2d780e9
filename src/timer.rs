//! Tick sources for the event loop

use std::future::Future;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, Interval, MissedTickBehavior};

pub trait Timer {
    /// Wait for the next tick. `false` once the timer can never fire again.
    fn tick(&mut self) -> impl Future<Output = bool>;
}

/// Wall-clock period; missed ticks are skipped, never replayed
pub struct IntervalTimer {
    interval: Interval,
}

impl IntervalTimer {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        IntervalTimer { interval }
    }

    pub fn every_second() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Timer for IntervalTimer {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Timer fired by hand, for tests and replays
pub struct ManualTimer {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Firing side of a [`ManualTimer`]; dropping it stops the timer
#[derive(Clone)]
pub struct ManualTicker {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTimer {
    pub fn pair() -> (ManualTimer, ManualTicker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ManualTimer { rx }, ManualTicker { tx })
    }
}

impl ManualTicker {
    pub fn fire(&self) {
        let _ = self.tx.send(());
    }

    pub fn fire_n(&self, n: usize) {
        for _ in 0..n {
            self.fire();
        }
    }
}

impl Timer for ManualTimer {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}
