// ==========================================
// 表格导入系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + tokio
// 系统定位: 表格行 → 规范化实体记录的导入管道
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 行、记录与导入结果
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 异步任务
pub mod engine;

// 导入层 - 映射/清洗/校验/批处理
pub mod importer;

// 配置层 - 导入参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 对外接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

pub use api::{ApiError, ApiResult, ImportApi};
pub use config::ImportConfig;
pub use domain::{
    BatchResult, EntityKind, FieldInfo, FieldMapping, ImportJob, JobProgress, JobStatus,
    MappingTemplate, NormalizedRecord, RawRow, RowFailure, TabularData, ValidationResult,
};
pub use engine::JobTracker;
pub use importer::{BatchProcessor, ImportError, ImportRegistry};

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "表格导入系统";
