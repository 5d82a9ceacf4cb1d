// ==========================================
// 表格导入系统 - 交叉引用解析器
// ==========================================
// 职责: 按自然键查找被引用实体，必要时创建最小存根
// 约定: 管道中唯一在校验前产生副作用的组件
// 缓存: 单次运行内有效（异步互斥锁保护）
// ==========================================

use crate::domain::import::ImportSequence;
use crate::domain::record::{EntityKind, GroupRecord, NormalizedRecord, OrganizationRecord};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::entity_repo::EntityRepository;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 分组存根的 externalId 前缀
pub const GROUP_ID_PREFIX: &str = "GRP";

/// 引用字段声明
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceSpec {
    /// 引用方字段名（日志 / 错误信息）
    pub field: &'static str,
    /// 被引用实体类型
    pub target: EntityKind,
    /// 缺失时是否创建存根
    pub create_if_missing: bool,
}

impl ReferenceSpec {
    pub const fn new(field: &'static str, target: EntityKind, create_if_missing: bool) -> Self {
        Self {
            field,
            target,
            create_if_missing,
        }
    }
}

// ==========================================
// ReferenceResolver
// ==========================================
pub struct ReferenceResolver {
    repository: Arc<dyn EntityRepository>,
    /// 已确认存在的 (类型, 自然键)
    known: Mutex<HashSet<(EntityKind, String)>>,
}

impl ReferenceResolver {
    pub fn new(repository: Arc<dyn EntityRepository>) -> Self {
        Self {
            repository,
            known: Mutex::new(HashSet::new()),
        }
    }

    /// 解析单个引用
    ///
    /// # 返回
    /// - Ok(Some(key)): 已存在或已创建
    /// - Ok(None): 不存在且不允许创建（仅记录日志）
    /// - Err(ReferenceResolution): 查询或创建失败
    pub async fn resolve(
        &self,
        spec: &ReferenceSpec,
        key: &str,
        sequence: &mut ImportSequence,
    ) -> ImportResult<Option<String>> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(None);
        }

        let cache_key = (spec.target, key.to_string());
        let mut known = self.known.lock().await;
        if known.contains(&cache_key) {
            return Ok(Some(key.to_string()));
        }

        let existing = self
            .repository
            .find_by_natural_key(spec.target, key)
            .await
            .map_err(|e| ImportError::ReferenceResolution {
                field: spec.field.to_string(),
                key: key.to_string(),
                message: e.to_string(),
            })?;

        if existing.is_some() {
            debug!(field = spec.field, target = %spec.target, key, "引用已存在");
            known.insert(cache_key);
            return Ok(Some(key.to_string()));
        }

        if !spec.create_if_missing {
            warn!(field = spec.field, target = %spec.target, key, "引用不存在，字段留空");
            return Ok(None);
        }

        let stub = match spec.target {
            EntityKind::Organization => NormalizedRecord::Organization(OrganizationRecord {
                external_id: Some(key.to_string()),
                name: Some(key.to_string()),
                ..Default::default()
            }),
            EntityKind::Group => NormalizedRecord::Group(GroupRecord {
                external_id: Some(sequence.next_id(GROUP_ID_PREFIX)),
                name: Some(key.to_string()),
            }),
            other => {
                warn!(field = spec.field, target = %other, key, "该类型不支持自动创建，字段留空");
                return Ok(None);
            }
        };

        self.repository
            .save(&stub)
            .await
            .map_err(|e| ImportError::ReferenceResolution {
                field: spec.field.to_string(),
                key: key.to_string(),
                message: e.to_string(),
            })?;

        info!(field = spec.field, target = %spec.target, key, "已自动创建引用实体");
        known.insert(cache_key);
        Ok(Some(key.to_string()))
    }

    /// 解析引用列表（未解析的元素被丢弃）
    pub async fn resolve_all(
        &self,
        spec: &ReferenceSpec,
        keys: &[String],
        sequence: &mut ImportSequence,
    ) -> ImportResult<Vec<String>> {
        let mut resolved = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(found) = self.resolve(spec, key, sequence).await? {
                resolved.push(found);
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::EntityRepositoryImpl;

    fn resolver() -> (ReferenceResolver, Arc<dyn EntityRepository>) {
        let repo: Arc<dyn EntityRepository> = Arc::new(EntityRepositoryImpl::new(":memory:").unwrap());
        (ReferenceResolver::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn test_creates_missing_organization_stub() {
        let (resolver, repo) = resolver();
        let spec = ReferenceSpec::new("organization", EntityKind::Organization, true);
        let mut seq = ImportSequence::new();

        let resolved = resolver.resolve(&spec, " ORG9 ", &mut seq).await.unwrap();

        assert_eq!(resolved, Some("ORG9".to_string()));
        let stored = repo
            .find_by_natural_key(EntityKind::Organization, "ORG9")
            .await
            .unwrap();
        match stored {
            Some(NormalizedRecord::Organization(org)) => {
                assert_eq!(org.name.as_deref(), Some("ORG9"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_group_stub_uses_run_sequence_once() {
        let (resolver, repo) = resolver();
        let spec = ReferenceSpec::new("groups", EntityKind::Group, true);
        let mut seq = ImportSequence::new();

        let keys = vec!["Support".to_string(), "Support".to_string(), "Sales".to_string()];
        let resolved = resolver.resolve_all(&spec, &keys, &mut seq).await.unwrap();

        assert_eq!(resolved, vec!["Support", "Support", "Sales"]);
        assert_eq!(repo.count_by_kind(EntityKind::Group).await.unwrap(), 2);
        assert_eq!(seq.next_id(GROUP_ID_PREFIX), "GRP-0003");
    }

    #[tokio::test]
    async fn test_missing_without_create_is_unset() {
        let (resolver, repo) = resolver();
        let spec = ReferenceSpec::new("assignee", EntityKind::User, false);
        let mut seq = ImportSequence::new();

        let resolved = resolver.resolve(&spec, "nobody", &mut seq).await.unwrap();

        assert_eq!(resolved, None);
        assert_eq!(repo.count_by_kind(EntityKind::User).await.unwrap(), 0);
    }
}
