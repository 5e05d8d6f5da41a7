// =============================================================================
// Backfill loop — submit `get_klines`, wait for the exchange worker to land
// it, read the cache back (spec §4.9 startup step "on failure" + runtime
// "gap > interval * 1.5" repair)
// =============================================================================
//
// `get_klines` completes with a null result (the exchange worker writes
// straight to `klines_history`, see exchange-worker/src/task_handler.rs) so
// "did it land" is answered by re-reading `klines_history`, not by reading
// the task row's `result`. The task row is only consulted to stop waiting
// early on `status = 'failed'`.
// =============================================================================

use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::broadcast;
use tracing::warn;

use crate::admission;
use crate::bar::Bar;
use crate::db;

const NOTIFY_WAIT: Duration = Duration::from_secs(5);
const RETRY_INTERVAL: Duration = Duration::from_secs(2);
const BACKFILL_LIMIT: u32 = 1000;

/// One event relevant to a pending backfill task: completed or failed, keyed
/// by task id. The engine's listener-dispatch loop broadcasts these as
/// `task.completed`/`task.failed` notifications arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed(i64),
    Failed(i64),
}

/// Submit a `get_klines` backfill and block until `klines_history` has at
/// least `required` contiguous bars for `(symbol, interval)`, retrying
/// indefinitely. `task_events` is the broadcast channel the engine's
/// notification dispatcher feeds with `task.completed`/`task.failed`.
pub async fn backfill_until_ready(
    pool: &PgPool,
    symbol: &str,
    interval: &str,
    required: usize,
    mut task_events: broadcast::Receiver<TaskOutcome>,
) -> Vec<Bar> {
    loop {
        let task_id = match db::insert_get_klines_task(pool, symbol, interval, BACKFILL_LIMIT).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, symbol, interval, "failed to submit get_klines backfill task, retrying");
                tokio::time::sleep(RETRY_INTERVAL).await;
                continue;
            }
        };

        wait_for_task(pool, task_id, &mut task_events).await;

        match db::klines_tail(pool, symbol, interval, required as i64 * 2).await {
            Ok(rows) => {
                let bars: Vec<Bar> = rows.into_iter().map(Bar::from).collect();
                if admission::is_admissible(&bars) {
                    return bars;
                }
            }
            Err(e) => {
                warn!(error = %e, symbol, interval, "failed to read klines_history after backfill");
            }
        }

        tokio::time::sleep(RETRY_INTERVAL).await;
    }
}

/// Wait up to `NOTIFY_WAIT` for `task_id`'s completion notification; on
/// timeout, probe the row directly once before giving up this round.
async fn wait_for_task(pool: &PgPool, task_id: i64, task_events: &mut broadcast::Receiver<TaskOutcome>) {
    let deadline = tokio::time::sleep(NOTIFY_WAIT);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            event = task_events.recv() => {
                match event {
                    Ok(TaskOutcome::Completed(id)) | Ok(TaskOutcome::Failed(id)) if id == task_id => return,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
            _ = &mut deadline => {
                if let Ok(Some(row)) = db::get_task(pool, task_id).await {
                    if row.status == "completed" || row.status == "failed" {
                        return;
                    }
                }
                return;
            }
        }
    }
}
