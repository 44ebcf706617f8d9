use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::tasks::deferral::ScheduledRun;
use crate::tasks::monitor_task::MonitorTask;

/// Fires a monitor pass every `every` until Ctrl-C. The first pass runs
/// immediately. Passes are spawned so a slow one cannot delay the timer;
/// the task's run lock keeps them from overlapping.
pub async fn run_watch(task: Arc<MonitorTask>, every: Duration) {
    run_watch_until(task, every, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
        }
    })
    .await;
}

/// Like [`run_watch`], stopping when `shutdown` resolves. Passes still in
/// flight are awaited before returning so their status write and deferral
/// completion are not lost.
pub async fn run_watch_until<F>(task: Arc<MonitorTask>, every: Duration, shutdown: F)
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut passes = JoinSet::new();
    let mut tick: u64 = 0;
    tokio::pin!(shutdown);
    info!(every_secs = every.as_secs(), "monitoring lunch appointments");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick += 1;
                let task = task.clone();
                passes.spawn(async move {
                    let outcome = task.run(&ScheduledRun { tick }, Utc::now()).await;
                    debug!(tick, ?outcome, "monitor pass finished");
                });
            }
            Some(finished) = passes.join_next(), if !passes.is_empty() => {
                if let Err(e) = finished {
                    error!(error = %e, "monitor pass panicked");
                }
            }
            _ = &mut shutdown => {
                info!(in_flight = passes.len(), "stopping monitor");
                break;
            }
        }
    }
    while let Some(finished) = passes.join_next().await {
        if let Err(e) = finished {
            error!(error = %e, "monitor pass panicked");
        }
    }
}
