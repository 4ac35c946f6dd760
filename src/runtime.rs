use crate::errors::Result;
use crate::util::now_secs;
use async_trait::async_trait;
use log::{error, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// Clock skew guard subtracted before bucketing, so a tick landing exactly on
/// a boundary counts toward the period that just ended.
pub const TIME_SYNC_OFFSET: i64 = 1;

#[derive(Clone, Copy, Debug)]
pub enum Every {
    Seconds(i64),
    Minutes(i64),
    Hours(i64),
    Days(i64),
}

impl Every {
    pub fn period_secs(&self) -> i64 {
        match self {
            Every::Seconds(n) => *n,
            Every::Minutes(n) => n * 60,
            Every::Hours(n) => n * 3600,
            Every::Days(n) => n * 86_400,
        }
    }
}

/// Period gate for the 1s strategy loops.
///
/// Each named bucket remembers the quotient `(now - offset) / period` of its
/// last firing and fires when the quotient moves. Buckets start at zero, so
/// every bucket fires on the first loop iteration after process start; the
/// strategies rely on that to run immediately instead of waiting out a full
/// period.
#[derive(Debug, Default)]
pub struct TickGate {
    prev_quotient: HashMap<&'static str, i64>,
}

impl TickGate {
    pub fn new() -> Self {
        TickGate::default()
    }

    pub fn fires(&mut self, bucket: &'static str, every: Every) -> bool {
        self.fires_at(bucket, every, now_secs())
    }

    pub fn fires_at(&mut self, bucket: &'static str, every: Every, now: i64) -> bool {
        let quotient = (now - TIME_SYNC_OFFSET).div_euclid(every.period_secs());
        let prev = self.prev_quotient.entry(bucket).or_insert(0);
        if quotient != *prev {
            *prev = quotient;
            true
        } else {
            false
        }
    }
}

/// One strategy state machine as the runtime sees it: a named `tick` invoked
/// every second (the strategy gates its own periods), and a shutdown hook.
#[async_trait]
pub trait Strategy: Send {
    fn name(&self) -> &'static str;

    async fn tick(&mut self) -> Result<()>;

    /// Called once after the loop exits; cancels whatever the strategy left
    /// open on the exchange.
    async fn shutdown(&mut self);
}

/// Owns one strategy's loop task. The loop sleeps 1s between iterations,
/// logs and swallows tick errors, and never aborts on its own. Stopping lets
/// the in-flight tick finish, runs the strategy's shutdown hook, then joins.
pub struct TradeLoop {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl TradeLoop {
    pub fn start<S: Strategy + 'static>(mut strategy: S) -> TradeLoop {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = tokio::spawn(async move {
            info!("Start {} trade loop", strategy.name());
            sleep(Duration::from_millis(100)).await;
            while !stop_flag.load(Ordering::Relaxed) {
                if let Err(err) = strategy.tick().await {
                    error!("Caught error in {} trade loop: {err}", strategy.name());
                }
                sleep(Duration::from_secs(1)).await;
            }
            strategy.shutdown().await;
            info!("Successfully stopped {} trade loop", strategy.name());
        });
        TradeLoop { stop, handle }
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub async fn stop(self) {
        self.request_stop();
        let _ = self.handle.await;
    }
}
