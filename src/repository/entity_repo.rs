// ==========================================
// 表格导入系统 - 实体仓储 Trait
// ==========================================
// 职责: 定义规范化记录的持久化接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::record::{EntityKind, NormalizedRecord};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// EntityRepository Trait
// ==========================================
// 用途: 导入管道的持久化端 + 引用解析的查找端
// 实现者: EntityRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// 按自然键查找记录
    ///
    /// # 参数
    /// - kind: 实体类型
    /// - natural_key: 自然键值（用户 externalId/邮箱/电话，分组 name 等）
    ///
    /// # 返回
    /// - Ok(Some): 已存在的记录
    /// - Ok(None): 不存在
    async fn find_by_natural_key(
        &self,
        kind: EntityKind,
        natural_key: &str,
    ) -> RepositoryResult<Option<NormalizedRecord>>;

    /// 保存记录（同类型同自然键覆盖）
    ///
    /// # 返回
    /// - Ok(String): 保存后的标识（自然键）
    /// - Err: 记录无自然键或数据库错误
    async fn save(&self, record: &NormalizedRecord) -> RepositoryResult<String>;

    /// 统计某类型记录数
    async fn count_by_kind(&self, kind: EntityKind) -> RepositoryResult<usize>;
}
