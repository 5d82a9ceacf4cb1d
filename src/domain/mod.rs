// ==========================================
// 表格导入系统 - 领域模型层
// ==========================================
// 职责: 原始行、规范化记录、导入结果与任务模型、固定词表
// 红线: 不含数据访问逻辑,不含管道逻辑
// ==========================================

pub mod import;
pub mod record;
pub mod row;
pub mod types;

// 重导出核心类型
pub use import::{
    BatchResult, FieldInfo, ImportJob, ImportSequence, JobProgress, JobStatus, MappingTemplate,
    RowFailure, ValidationResult,
};
pub use record::{
    CustomFieldRecord, EntityKind, GroupRecord, NaturalKey, NormalizedRecord, OrganizationRecord,
    TicketRecord, UserRecord,
};
pub use row::{placeholder_column, FieldMapping, MappingEntry, RawRow, TabularData};
pub use types::{
    Channel, CustomFieldType, FieldEnum, Language, PermissionLevel, Role, TicketPriority,
    TicketStatus, TicketType,
};
