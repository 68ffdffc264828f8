//! Background download job worker: drains [`proxy_transfer::JobQueue`],
//! pushing locally-written files into the content-addressed store so a
//! CLOSE doesn't block on a full upload. Grounded on `fs_cache.py`'s
//! `http_write_file_queue` consumer thread.

use proxy_transfer::{CacheClient as TransferClient, JobQueue, POLL_INTERVAL};
use std::path::Path;
use std::sync::Arc;

/// Runs until the process exits: claims one job at a time, uploads it, and
/// retries or gives up per [`proxy_transfer::MAX_ATTEMPTS`] on failure.
pub async fn run(queue: Arc<JobQueue>, transfer: Arc<TransferClient>) {
    loop {
        match queue.claim_next().await {
            Ok(Some(job)) => {
                let local_path = Path::new(&job.path);
                match transfer.cache_file(&job.key, local_path).await {
                    Ok(_manifest) => {
                        if let Err(e) = queue.mark_succeeded(&job).await {
                            log::warn!(target: "smbproxy::background", "failed to mark job {} succeeded: {e}", job.job_id);
                        }
                    }
                    Err(e) => {
                        log::warn!(target: "smbproxy::background", "background upload of {} failed (attempt {}): {e}", job.path, job.attempts + 1);
                        if let Err(e) = queue.mark_failed_or_retry(&job).await {
                            log::warn!(target: "smbproxy::background", "failed to requeue job {}: {e}", job.job_id);
                        }
                    }
                }
            }
            Ok(None) => {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            Err(e) => {
                log::warn!(target: "smbproxy::background", "job queue error: {e}");
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}
