// ==========================================
// 表格导入系统 - 导入结果与任务模型
// ==========================================
// 职责: 校验结果 / 批量结果 / 异步任务 / 映射模板 / 运行内序号
// ==========================================

use crate::domain::row::{FieldMapping, RawRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ValidationResult - 校验结果
// ==========================================
// 不变量: valid == errors.is_empty()（仅能通过 add_error 追加错误）
// 反序列化时 valid 由 errors 重新计算
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ValidationResultData")]
pub struct ValidationResult {
    valid: bool,
    errors: Vec<String>,
    identifier: Option<String>,
}

#[derive(Deserialize)]
struct ValidationResultData {
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    identifier: Option<String>,
}

impl From<ValidationResultData> for ValidationResult {
    fn from(data: ValidationResultData) -> Self {
        Self {
            valid: data.errors.is_empty(),
            errors: data.errors,
            identifier: data.identifier,
        }
    }
}

impl ValidationResult {
    pub fn new(identifier: Option<String>) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            identifier,
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn into_errors(self) -> Vec<String> {
        self.errors
    }
}

// ==========================================
// FieldInfo - 导入类型的规范字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    pub name: String,
    pub required: bool,
}

// ==========================================
// BatchResult - 批量导入结果
// ==========================================

/// 单行失败记录（row_number 为批内 1-based 位置）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFailure {
    pub row_number: usize,
    pub original_row: RawRow,
    pub errors: Vec<String>,
}

/// 不变量: success_count + error_count == total_records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub import_type: String,
    pub total_records: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub saved_identifiers: Vec<String>,
    pub failures: Vec<RowFailure>,
}

impl BatchResult {
    pub fn new(import_type: impl Into<String>) -> Self {
        Self {
            import_type: import_type.into(),
            total_records: 0,
            success_count: 0,
            error_count: 0,
            saved_identifiers: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn record_success(&mut self, identifier: String) {
        self.total_records += 1;
        self.success_count += 1;
        self.saved_identifiers.push(identifier);
    }

    pub fn record_failure(&mut self, failure: RowFailure) {
        self.total_records += 1;
        self.error_count += 1;
        self.failures.push(failure);
    }
}

// ==========================================
// JobStatus - 异步任务状态
// ==========================================
// 状态机: PENDING → PROCESSING → {COMPLETED, FAILED, CANCELLED}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// 等待中
    Pending,
    /// 处理中
    Processing,
    /// 已完成
    Completed,
    /// 失败
    Failed,
    /// 已取消
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

// ==========================================
// ImportJob - 异步导入任务
// ==========================================
// 不变量: processed_rows <= total_rows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    pub id: String,
    pub import_type: String,
    pub status: JobStatus,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failures: Vec<RowFailure>,
}

impl ImportJob {
    pub fn new(id: String, import_type: impl Into<String>, total_rows: usize) -> Self {
        Self {
            id,
            import_type: import_type.into(),
            status: JobStatus::Pending,
            total_rows,
            processed_rows: 0,
            success_count: 0,
            error_count: 0,
            message: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            failures: Vec::new(),
        }
    }

    /// 进度百分比（total_rows 为 0 时返回 0）
    pub fn progress_percent(&self) -> f64 {
        if self.total_rows == 0 {
            return 0.0;
        }
        self.processed_rows as f64 / self.total_rows as f64 * 100.0
    }

    pub fn progress(&self) -> JobProgress {
        JobProgress {
            job_id: self.id.clone(),
            import_type: self.import_type.clone(),
            status: self.status,
            total_rows: self.total_rows,
            processed_rows: self.processed_rows,
            success_count: self.success_count,
            error_count: self.error_count,
            message: self.message.clone(),
            progress_percent: self.progress_percent(),
        }
    }
}

/// 任务进度快照（轮询返回值）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub job_id: String,
    pub import_type: String,
    pub status: JobStatus,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub message: Option<String>,
    pub progress_percent: f64,
}

// ==========================================
// MappingTemplate - 映射模板
// ==========================================
// 不变量: 每个导入类型至多一个 有效 + 默认 模板
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingTemplate {
    /// 未保存时为 None
    pub id: Option<i64>,
    pub name: String,
    pub import_type: String,
    pub description: Option<String>,
    pub mapping: FieldMapping,
    pub created_by: Option<String>,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MappingTemplate {
    pub fn new(
        name: impl Into<String>,
        import_type: impl Into<String>,
        mapping: FieldMapping,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            import_type: import_type.into(),
            description: None,
            mapping,
            created_by: None,
            is_default: false,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }
}

// ==========================================
// ImportSequence - 运行内标识序号
// ==========================================
// 作用域: 单次批量运行（非全局）
#[derive(Debug, Clone, Default)]
pub struct ImportSequence {
    counter: u64,
}

impl ImportSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// 生成下一个标识: "{prefix}-{n:04}"
    pub fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{}-{:04}", prefix, self.counter)
    }
}
