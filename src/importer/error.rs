// ==========================================
// 表格导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: 行级错误（校验/持久化失败）在批处理内收集，不经此类型向上抛出
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 分发错误 =====
    #[error("不支持的导入类型: {0}")]
    UnsupportedImportType(String),

    // ===== 字段转换错误 =====
    #[error("字段 {field} 转换被拒绝 (值: {value}): {message}")]
    CoercionRejected {
        field: String,
        value: String,
        message: String,
    },

    // ===== 引用解析错误 =====
    #[error("引用解析失败 (字段 {field}, 键 {key}): {message}")]
    ReferenceResolution {
        field: String,
        key: String,
        message: String,
    },

    // ===== 持久化错误 =====
    #[error("持久化失败: {0}")]
    Persistence(String),

    // ===== 异步任务错误 =====
    #[error("导入任务失败 (job {job_id}): {message}")]
    JobFailure { job_id: String, message: String },

    #[error("导入任务不存在: {0}")]
    JobNotFound(String),

    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 配置错误 =====
    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    ConfigValueError {
        key: String,
        value: String,
        message: String,
    },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 行级提示文本（写入 RowFailure.errors）
    pub fn row_message(&self) -> String {
        match self {
            ImportError::CoercionRejected { field, value, message } => {
                format!("invalid {}: '{}' ({})", field, value, message)
            }
            ImportError::ReferenceResolution { field, key, message } => {
                format!("unresolved {} '{}': {}", field, key, message)
            }
            ImportError::Persistence(msg) => format!("persistence failed: {}", msg),
            other => other.to_string(),
        }
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::Persistence(err.to_string())
    }
}

// 实现 From<RepositoryError>
impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        ImportError::Persistence(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<calamine::XlsxError>
impl From<calamine::XlsxError> for ImportError {
    fn from(err: calamine::XlsxError) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::InternalError(format!("JSON 序列化失败: {}", err))
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
