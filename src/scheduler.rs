// src/scheduler.rs

//! Fixed-interval background runner.
//!
//! A tick runs to completion before the next one is awaited, so ticks never
//! overlap. Tasks can also be driven directly through [`PeriodicTask::tick`].

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

#[async_trait]
pub trait PeriodicTask: Send + Sync {
    fn name(&self) -> &'static str;

    async fn tick(&self);
}

#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Runs `task` every interval until `shutdown` turns true or its sender
    /// goes away. The first tick fires immediately.
    pub async fn run(self, task: Arc<dyn PeriodicTask>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("{} scheduled every {:?}", task.name(), self.interval);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {
                    task.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("{} stopped", task.name());
    }

    pub fn spawn(
        self,
        task: Arc<dyn PeriodicTask>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(task, shutdown))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct Counter {
        ticks: AtomicUsize,
    }

    #[async_trait]
    impl PeriodicTask for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        async fn tick(&self) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_ticks_until_shutdown() {
        let counter = Arc::new(Counter::default());
        let (tx, rx) = watch::channel(false);

        let handle = Scheduler::new(Duration::from_millis(10)).spawn(counter.clone(), rx);
        tokio::time::sleep(Duration::from_millis(60)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        let seen = counter.ticks.load(Ordering::SeqCst);
        assert!(seen >= 2, "expected several ticks, saw {}", seen);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(counter.ticks.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_already_shut_down_never_ticks() {
        let counter = Arc::new(Counter::default());
        let (_tx, rx) = watch::channel(true);

        Scheduler::new(Duration::from_millis(5))
            .run(counter.clone(), rx)
            .await;
        assert_eq!(counter.ticks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dropped_sender_stops_runner() {
        let counter = Arc::new(Counter::default());
        let (tx, rx) = watch::channel(false);
        drop(tx);

        tokio::time::timeout(
            Duration::from_secs(1),
            Scheduler::new(Duration::from_secs(3600)).run(counter.clone(), rx),
        )
        .await
        .unwrap();
    }
}
