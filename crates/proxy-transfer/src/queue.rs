//! Background download job queue.
//!
//! Grounded on the `bkgrd_dl:*` Redis lists used by `fs_cache.py`'s
//! `http_write_file_queue`: a job is pushed onto `bkgrd_dl:pending`, an
//! atomic `RPOPLPUSH` moves it to `bkgrd_dl:processing` while a worker owns
//! it, and it lands on `bkgrd_dl:succeeded` or `bkgrd_dl:failed` when done.
//! Each job's fields live in a companion hash, `bkgrd_dl:job:<uuid>`.

use std::time::Duration;
use uuid::Uuid;

const PENDING: &str = "bkgrd_dl:pending";
const PROCESSING: &str = "bkgrd_dl:processing";
const SUCCEEDED: &str = "bkgrd_dl:succeeded";
const FAILED: &str = "bkgrd_dl:failed";

/// Worker loops poll the pending queue on this interval when it's empty,
/// matching the original's `time.sleep(0.5)` polling cadence.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A background-download job is retried up to this many times before it's
/// moved to `bkgrd_dl:failed` for good.
pub const MAX_ATTEMPTS: u32 = 3;

fn job_key(job_id: &str) -> String {
    format!("bkgrd_dl:job:{job_id}")
}

#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: String,
    pub path: String,
    pub key: String,
    pub attempts: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

pub struct JobQueue {
    client: redis::Client,
}

impl JobQueue {
    pub fn new(redis_url: &str) -> Result<JobQueue, QueueError> {
        Ok(JobQueue {
            client: redis::Client::open(redis_url)?,
        })
    }

    /// Enqueues a new job and returns its generated id.
    pub async fn enqueue(&self, path: &str, key: &str) -> Result<String, QueueError> {
        let job_id = Uuid::new_v4().to_string();
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let _: () = redis::pipe()
            .hset(job_key(&job_id), "path", path)
            .hset(job_key(&job_id), "key", key)
            .hset(job_key(&job_id), "attempts", 0)
            .lpush(PENDING, &job_id)
            .query_async(&mut conn)
            .await?;

        Ok(job_id)
    }

    /// Atomically moves the oldest pending job to the processing list and
    /// returns its record, or `None` if the pending queue is empty.
    pub async fn claim_next(&self) -> Result<Option<JobRecord>, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let job_id: Option<String> = redis::Cmd::rpoplpush(PENDING, PROCESSING)
            .query_async(&mut conn)
            .await?;

        let Some(job_id) = job_id else {
            return Ok(None);
        };

        let (path, key, attempts): (String, String, u32) = redis::pipe()
            .hget(job_key(&job_id), "path")
            .hget(job_key(&job_id), "key")
            .hget(job_key(&job_id), "attempts")
            .query_async(&mut conn)
            .await?;

        Ok(Some(JobRecord {
            job_id,
            path,
            key,
            attempts,
        }))
    }

    pub async fn mark_succeeded(&self, job: &JobRecord) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = redis::pipe()
            .lrem(PROCESSING, 1, &job.job_id)
            .lpush(SUCCEEDED, &job.job_id)
            .hset(job_key(&job.job_id), "state", "SUCCESS")
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Re-queues the job for another attempt, or gives up and marks it
    /// failed once [`MAX_ATTEMPTS`] has been reached.
    pub async fn mark_failed_or_retry(&self, job: &JobRecord) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let next_attempts = job.attempts + 1;

        if next_attempts >= MAX_ATTEMPTS {
            let _: () = redis::pipe()
                .lrem(PROCESSING, 1, &job.job_id)
                .lpush(FAILED, &job.job_id)
                .hset(job_key(&job.job_id), "state", "FAILURE")
                .query_async(&mut conn)
                .await?;
        } else {
            let _: () = redis::pipe()
                .lrem(PROCESSING, 1, &job.job_id)
                .hset(job_key(&job.job_id), "attempts", next_attempts)
                .lpush(PENDING, &job.job_id)
                .query_async(&mut conn)
                .await?;
        }
        Ok(())
    }
}
