// ==========================================
// 表格导入系统 - 导入层
// ==========================================
// 职责: 原始行 → 规范化实体记录 → 持久化
// 流程: 字段映射 → 清洗/转换 → 引用解析 → 校验 → 查重 → 落库
// ==========================================

pub mod batch_processor;
pub mod conflict_handler;
pub mod data_cleaner;
pub mod dq_validator;
pub mod entity_builder;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod reference_resolver;
pub mod registry;

// 重导出核心类型
pub use batch_processor::{BatchProcessor, BatchRun};
pub use conflict_handler::ConflictHandler;
pub use data_cleaner::{DataCleaner, ListDelimiter, OnParseFailure};
pub use dq_validator::EntityValidator;
pub use entity_builder::{BuildContext, EntityBuilder};
pub use error::{ImportError, ImportResult};
pub use field_mapper::{FieldMapper, FieldSpec, ResolvedFields};
pub use file_parser::{CsvParser, ExcelParser, FileParser, UniversalFileParser};
pub use reference_resolver::{ReferenceResolver, ReferenceSpec};
pub use registry::{ImportHandler, ImportRegistry};
