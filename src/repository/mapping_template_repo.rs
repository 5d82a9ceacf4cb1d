// ==========================================
// 表格导入系统 - 映射模板仓储 Trait
// ==========================================
// 职责: 映射模板 CRUD + 默认模板唯一性
// 不变量: 每个导入类型至多一个 有效 + 默认 模板
// ==========================================

use crate::domain::import::MappingTemplate;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// MappingTemplateRepository Trait
// ==========================================
// 实现者: MappingTemplateRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait MappingTemplateRepository: Send + Sync {
    /// 新建模板（is_default=true 时同事务内清除同类型其它默认）
    ///
    /// # 返回
    /// - Ok(i64): 新模板 ID
    async fn save(&self, template: &MappingTemplate) -> RepositoryResult<i64>;

    /// 更新模板（按 template.id）
    ///
    /// # 返回
    /// - Err(NotFound): ID 缺失或模板不存在
    async fn update(&self, template: &MappingTemplate) -> RepositoryResult<()>;

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<MappingTemplate>>;

    /// 某导入类型的有效模板（按名称升序）
    async fn list_by_type(&self, import_type: &str) -> RepositoryResult<Vec<MappingTemplate>>;

    /// 某导入类型的有效默认模板
    async fn find_default(&self, import_type: &str) -> RepositoryResult<Option<MappingTemplate>>;

    /// 设为默认（同事务内清除同类型其它默认）
    async fn set_default(&self, id: i64) -> RepositoryResult<()>;

    /// 软删除（is_active=0，同时取消默认）
    async fn soft_delete(&self, id: i64) -> RepositoryResult<()>;

    /// 按名称模糊搜索有效模板
    async fn search_by_name(&self, term: &str) -> RepositoryResult<Vec<MappingTemplate>>;

    /// 全部有效模板（按导入类型、名称排序）
    async fn list_active(&self) -> RepositoryResult<Vec<MappingTemplate>>;
}
