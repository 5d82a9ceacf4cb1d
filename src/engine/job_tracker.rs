// ==========================================
// 表格导入系统 - 异步导入任务跟踪器
// ==========================================
// 状态机: PENDING → PROCESSING → {COMPLETED, FAILED, CANCELLED}
// 并发: 每个任务一个 tokio 工作任务；块内逐行顺序处理
// 取消: CancellationToken，仅在块边界生效，不回滚已落库的块
// ==========================================

use crate::config::ImportConfig;
use crate::domain::import::{ImportJob, JobProgress, JobStatus};
use crate::domain::row::{FieldMapping, RawRow};
use crate::importer::batch_processor::BatchRun;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::registry::{ImportHandler, ImportRegistry};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 单个任务的共享句柄
///
/// job 只由工作任务写入；取消只触碰 token 与 message。
pub struct JobHandle {
    job: RwLock<ImportJob>,
    cancel: CancellationToken,
}

impl JobHandle {
    fn new(job: ImportJob) -> Self {
        Self {
            job: RwLock::new(job),
            cancel: CancellationToken::new(),
        }
    }

    pub async fn snapshot(&self) -> ImportJob {
        self.job.read().await.clone()
    }
}

// ==========================================
// JobTracker
// ==========================================
pub struct JobTracker {
    registry: Arc<ImportRegistry>,
    config: ImportConfig,
    jobs: RwLock<HashMap<String, Arc<JobHandle>>>,
}

impl JobTracker {
    pub fn new(registry: Arc<ImportRegistry>, config: ImportConfig) -> Self {
        Self {
            registry,
            config,
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// 提交异步导入任务
    ///
    /// # 返回
    /// - Ok(job_id): 新生成的 UUID
    /// - Err(UnsupportedImportType): 未创建任务
    #[instrument(skip(self, rows, mapping), fields(import_type = %import_type, rows = rows.len()))]
    pub async fn start(
        &self,
        import_type: &str,
        rows: Vec<RawRow>,
        mapping: FieldMapping,
    ) -> ImportResult<String> {
        self.purge_expired().await;

        let handler = self.registry.dispatch(import_type)?;
        let job_id = Uuid::new_v4().to_string();
        let mut job = ImportJob::new(job_id.clone(), handler.tag, rows.len());

        if rows.is_empty() {
            let now = Utc::now();
            job.status = JobStatus::Completed;
            job.started_at = Some(now);
            job.finished_at = Some(now);
            job.message = Some("no rows to import".to_string());
            self.jobs
                .write()
                .await
                .insert(job_id.clone(), Arc::new(JobHandle::new(job)));
            info!(job_id = %job_id, "空任务直接完成");
            return Ok(job_id);
        }

        let handle = Arc::new(JobHandle::new(job));
        self.jobs
            .write()
            .await
            .insert(job_id.clone(), handle.clone());

        let config = self.config.clone();
        let worker = tokio::spawn(run_job(handle.clone(), handler, rows, mapping, config));

        tokio::spawn(watch_worker(handle, job_id.clone(), worker));

        info!(job_id = %job_id, "导入任务已提交");
        Ok(job_id)
    }

    /// 查询任务进度
    pub async fn progress(&self, job_id: &str) -> Option<JobProgress> {
        let handle = self.jobs.read().await.get(job_id).cloned()?;
        let job = handle.job.read().await;
        Some(job.progress())
    }

    /// 查询完整任务（含失败行）
    pub async fn job(&self, job_id: &str) -> Option<ImportJob> {
        let handle = self.jobs.read().await.get(job_id).cloned()?;
        Some(handle.snapshot().await)
    }

    /// 全部任务进度（按创建时间）
    pub async fn list(&self) -> Vec<JobProgress> {
        let handles: Vec<Arc<JobHandle>> = self.jobs.read().await.values().cloned().collect();
        let mut jobs = Vec::with_capacity(handles.len());
        for handle in handles {
            jobs.push(handle.snapshot().await);
        }
        jobs.sort_by_key(|job| job.created_at);
        jobs.iter().map(ImportJob::progress).collect()
    }

    /// 请求取消
    ///
    /// # 返回
    /// - true: 任务处于 PROCESSING，已请求在下一块边界停止
    /// - false: 任务不存在或不在 PROCESSING
    pub async fn cancel(&self, job_id: &str) -> bool {
        let handle = match self.jobs.read().await.get(job_id).cloned() {
            Some(handle) => handle,
            None => return false,
        };

        let mut job = handle.job.write().await;
        if job.status != JobStatus::Processing {
            debug!(job_id, status = job.status.as_str(), "任务不在处理中，忽略取消");
            return false;
        }

        handle.cancel.cancel();
        job.message = Some("cancellation requested".to_string());
        info!(job_id, "已请求取消导入任务");
        true
    }

    /// 清理过期终态任务
    ///
    /// # 返回
    /// - 被清理的任务数
    pub async fn purge_expired(&self) -> usize {
        let ttl = match chrono::Duration::from_std(self.config.job_ttl()) {
            Ok(ttl) => ttl,
            Err(_) => return 0,
        };
        let now = Utc::now();

        let mut jobs = self.jobs.write().await;
        let mut expired = Vec::new();
        for (id, handle) in jobs.iter() {
            let job = handle.job.read().await;
            let finished_long_ago = job
                .finished_at
                .map_or(false, |finished| now - finished >= ttl);
            if job.status.is_terminal() && finished_long_ago {
                expired.push(id.clone());
            }
        }

        for id in &expired {
            jobs.remove(id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "已清理过期导入任务");
        }
        expired.len()
    }
}

// ==========================================
// 工作任务
// ==========================================
async fn run_job(
    handle: Arc<JobHandle>,
    handler: Arc<ImportHandler>,
    rows: Vec<RawRow>,
    mapping: FieldMapping,
    config: ImportConfig,
) {
    let job_id = {
        let mut job = handle.job.write().await;
        job.status = JobStatus::Processing;
        job.started_at = Some(Utc::now());
        job.id.clone()
    };
    info!(job_id = %job_id, import_type = handler.tag, total = rows.len(), "导入任务开始处理");

    let started = Instant::now();
    let chunk_size = config.effective_chunk_size();
    let chunk_count = rows.len().div_ceil(chunk_size);
    let mut run = BatchRun::new(handler, mapping, &config);

    for (index, chunk) in rows.chunks(chunk_size).enumerate() {
        if handle.cancel.is_cancelled() {
            let message = format!("cancelled after {} rows", run.result().total_records);
            finish(&handle, &run, JobStatus::Cancelled, message).await;
            return;
        }

        if let Some(deadline) = config.job_deadline() {
            if started.elapsed() >= deadline {
                let message = format!("job deadline of {:?} exceeded", deadline);
                finish(&handle, &run, JobStatus::Failed, message).await;
                return;
            }
        }

        let offset = index * chunk_size;
        match config.chunk_timeout() {
            Some(limit) => {
                // 挂起的 future 由 timeout 截断，阻塞的行由逐行截止检查截断
                let deadline = Instant::now() + limit;
                let chunk_run = run.process_chunk_until(chunk, offset, Some(deadline));
                let completed = tokio::time::timeout(limit, chunk_run).await.unwrap_or(false);
                if !completed {
                    warn!(job_id = %job_id, chunk = index, "分块处理超时");
                    let message = format!("chunk {} timed out after {:?}", index + 1, limit);
                    finish(&handle, &run, JobStatus::Failed, message).await;
                    return;
                }
            }
            None => run.process_chunk(chunk, offset).await,
        }

        {
            let result = run.result();
            let mut job = handle.job.write().await;
            job.processed_rows = result.total_records;
            job.success_count = result.success_count;
            job.error_count = result.error_count;
            debug!(
                job_id = %job_id,
                processed = job.processed_rows,
                total = job.total_rows,
                "分块处理完成"
            );
        }

        if index + 1 < chunk_count {
            let pause = config.chunk_pause();
            if pause.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(pause).await;
            }
        }
    }

    if handle.cancel.is_cancelled() {
        let message = format!("cancelled after {} rows", run.result().total_records);
        finish(&handle, &run, JobStatus::Cancelled, message).await;
        return;
    }

    let result = run.result();
    let (status, message) = if result.success_count > 0 {
        (
            JobStatus::Completed,
            format!(
                "imported {} of {} rows ({} failed)",
                result.success_count, result.total_records, result.error_count
            ),
        )
    } else {
        (
            JobStatus::Failed,
            format!("no rows imported ({} failed)", result.error_count),
        )
    };
    finish(&handle, &run, status, message).await;
}

/// 监视工作任务：panic 或被中止时标记失败
async fn watch_worker(handle: Arc<JobHandle>, job_id: String, worker: JoinHandle<()>) {
    if let Err(join_err) = worker.await {
        error!(job_id = %job_id, error = %join_err, "导入工作任务异常退出");
        let failure = ImportError::JobFailure {
            job_id,
            message: join_err.to_string(),
        };
        let mut job = handle.job.write().await;
        job.status = JobStatus::Failed;
        job.finished_at = Some(Utc::now());
        job.message = Some(failure.to_string());
    }
}

/// 写入终态（计数以运行结果为准）
async fn finish(handle: &JobHandle, run: &BatchRun, status: JobStatus, message: String) {
    let result = run.result();
    let mut job = handle.job.write().await;
    job.status = status;
    job.processed_rows = result.total_records;
    job.success_count = result.success_count;
    job.error_count = result.error_count;
    job.failures = result.failures.clone();
    job.finished_at = Some(Utc::now());
    job.message = Some(message);

    info!(
        job_id = %job.id,
        status = status.as_str(),
        processed = job.processed_rows,
        success = job.success_count,
        errors = job.error_count,
        "导入任务结束"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{EntityRepository, EntityRepositoryImpl};
    use std::time::Duration;

    fn tracker(config: ImportConfig) -> JobTracker {
        let repo: Arc<dyn EntityRepository> =
            Arc::new(EntityRepositoryImpl::new(":memory:").unwrap());
        JobTracker::new(Arc::new(ImportRegistry::new(repo)), config)
    }

    async fn wait_terminal(tracker: &JobTracker, job_id: &str) -> JobProgress {
        for _ in 0..500 {
            let progress = tracker.progress(job_id).await.unwrap();
            if progress.status.is_terminal() {
                return progress;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", job_id);
    }

    fn group_rows(n: usize) -> Vec<RawRow> {
        (0..n)
            .map(|i| RawRow::from_pairs(vec![("name", format!("G{}", i))]))
            .collect()
    }

    #[tokio::test]
    async fn test_zero_rows_completes_immediately() {
        let tracker = tracker(ImportConfig::default());

        let job_id = tracker
            .start("group", Vec::new(), FieldMapping::new())
            .await
            .unwrap();

        let progress = tracker.progress(&job_id).await.unwrap();
        assert_eq!(progress.status, JobStatus::Completed);
        assert_eq!(progress.processed_rows, 0);
        assert_eq!(progress.success_count, 0);
        assert_eq!(progress.progress_percent, 0.0);
    }

    #[tokio::test]
    async fn test_job_runs_in_chunks_to_completion() {
        let config = ImportConfig {
            chunk_size: 2,
            chunk_pause_ms: 0,
            ..Default::default()
        };
        let tracker = tracker(config);

        let job_id = tracker
            .start("group", group_rows(5), FieldMapping::new())
            .await
            .unwrap();
        let progress = wait_terminal(&tracker, &job_id).await;

        assert_eq!(progress.status, JobStatus::Completed);
        assert_eq!(progress.processed_rows, 5);
        assert_eq!(progress.success_count, 5);
        assert_eq!(progress.progress_percent, 100.0);
    }

    #[tokio::test]
    async fn test_all_rows_failing_marks_failed() {
        let tracker = tracker(ImportConfig::default());
        let rows = vec![RawRow::from_pairs(vec![("name", "")])];

        let job_id = tracker
            .start("group", rows, FieldMapping::new())
            .await
            .unwrap();
        let progress = wait_terminal(&tracker, &job_id).await;

        assert_eq!(progress.status, JobStatus::Failed);
        assert_eq!(progress.error_count, 1);

        let job = tracker.job(&job_id).await.unwrap();
        assert_eq!(job.failures.len(), 1);
        assert_eq!(job.failures[0].row_number, 1);
    }

    #[tokio::test]
    async fn test_unknown_type_creates_no_job() {
        let tracker = tracker(ImportConfig::default());

        let result = tracker.start("invoice", group_rows(1), FieldMapping::new()).await;

        assert!(result.is_err());
        assert!(tracker.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_unknown_or_finished_job_returns_false() {
        let tracker = tracker(ImportConfig::default());
        assert!(!tracker.cancel("missing").await);

        let job_id = tracker
            .start("group", Vec::new(), FieldMapping::new())
            .await
            .unwrap();
        assert!(!tracker.cancel(&job_id).await);
    }

    #[tokio::test]
    async fn test_purge_expired_terminal_jobs() {
        let config = ImportConfig {
            job_ttl_secs: 0,
            ..Default::default()
        };
        let tracker = tracker(config);
        tracker
            .start("group", Vec::new(), FieldMapping::new())
            .await
            .unwrap();

        assert_eq!(tracker.purge_expired().await, 1);
        assert!(tracker.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_panicked_worker_marks_job_failed() {
        let mut job = ImportJob::new("job-1".to_string(), "group", 3);
        job.status = JobStatus::Processing;
        let handle = Arc::new(JobHandle::new(job));
        let worker = tokio::spawn(async { panic!("worker exploded") });

        watch_worker(handle.clone(), "job-1".to_string(), worker).await;

        let job = handle.snapshot().await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.finished_at.is_some());
        let message = job.message.unwrap();
        assert!(message.starts_with("导入任务失败 (job job-1): "), "{}", message);
        assert!(message.contains("panicked"), "{}", message);
    }

    #[tokio::test]
    async fn test_job_ids_are_unique() {
        let tracker = tracker(ImportConfig::default());
        let a = tracker.start("group", Vec::new(), FieldMapping::new()).await.unwrap();
        let b = tracker.start("group", Vec::new(), FieldMapping::new()).await.unwrap();
        assert_ne!(a, b);
    }
}
