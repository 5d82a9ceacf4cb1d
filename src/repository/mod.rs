// ==========================================
// 表格导入系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod entity_repo;
pub mod entity_repo_impl;
pub mod error;
pub mod mapping_template_repo;
pub mod mapping_template_repo_impl;

pub use entity_repo::EntityRepository;
pub use entity_repo_impl::EntityRepositoryImpl;
pub use error::{RepositoryError, RepositoryResult};
pub use mapping_template_repo::MappingTemplateRepository;
pub use mapping_template_repo_impl::MappingTemplateRepositoryImpl;
