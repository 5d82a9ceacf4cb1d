// ==========================================
// 表格导入系统 - 导入类型注册表
// ==========================================
// 职责: 导入类型标签 → {构建器, 校验器, 持久化}
// 约定: 构建完成后不可变，以 Arc 注入 API 与任务跟踪器
// ==========================================

use crate::domain::record::EntityKind;
use crate::importer::dq_validator::{
    CustomFieldValidator, EntityValidator, GroupValidator, OrganizationValidator, TicketValidator,
    UserValidator,
};
use crate::importer::entity_builder::{
    CustomFieldBuilder, EntityBuilder, GroupBuilder, OrganizationBuilder, TicketBuilder,
    UserBuilder,
};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::entity_repo::EntityRepository;
use std::collections::HashMap;
use std::sync::Arc;

/// 单个导入类型的处理组件
pub struct ImportHandler {
    /// 规范标签（写入 BatchResult.import_type）
    pub tag: &'static str,
    pub kind: EntityKind,
    pub builder: Arc<dyn EntityBuilder>,
    pub validator: Arc<dyn EntityValidator>,
    pub persister: Arc<dyn EntityRepository>,
}

// ==========================================
// ImportRegistry
// ==========================================
pub struct ImportRegistry {
    handlers: HashMap<String, Arc<ImportHandler>>,
}

impl ImportRegistry {
    /// 空注册表（用于自定义组合）
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// 内置五种实体类型，全部写入同一实体仓储
    ///
    /// 标签（大小写不敏感）:
    /// - user / contact
    /// - ticket
    /// - organization
    /// - group
    /// - customfield / custom_field / custom-field
    pub fn new(persister: Arc<dyn EntityRepository>) -> Self {
        Self::empty()
            .register(
                &["user", "contact"],
                ImportHandler {
                    tag: "user",
                    kind: EntityKind::User,
                    builder: Arc::new(UserBuilder),
                    validator: Arc::new(UserValidator),
                    persister: persister.clone(),
                },
            )
            .register(
                &["ticket"],
                ImportHandler {
                    tag: "ticket",
                    kind: EntityKind::Ticket,
                    builder: Arc::new(TicketBuilder),
                    validator: Arc::new(TicketValidator),
                    persister: persister.clone(),
                },
            )
            .register(
                &["organization"],
                ImportHandler {
                    tag: "organization",
                    kind: EntityKind::Organization,
                    builder: Arc::new(OrganizationBuilder),
                    validator: Arc::new(OrganizationValidator),
                    persister: persister.clone(),
                },
            )
            .register(
                &["group"],
                ImportHandler {
                    tag: "group",
                    kind: EntityKind::Group,
                    builder: Arc::new(GroupBuilder),
                    validator: Arc::new(GroupValidator),
                    persister: persister.clone(),
                },
            )
            .register(
                &["customfield", "custom_field", "custom-field"],
                ImportHandler {
                    tag: "customfield",
                    kind: EntityKind::CustomField,
                    builder: Arc::new(CustomFieldBuilder),
                    validator: Arc::new(CustomFieldValidator),
                    persister,
                },
            )
    }

    /// 注册处理组件（同名标签覆盖）
    pub fn register(mut self, tags: &[&str], handler: ImportHandler) -> Self {
        let handler = Arc::new(handler);
        for tag in tags {
            self.handlers.insert(normalize_tag(tag), handler.clone());
        }
        self
    }

    /// 按标签分发（O(1)）
    ///
    /// # 返回
    /// - Err(UnsupportedImportType): 未注册的标签
    pub fn dispatch(&self, tag: &str) -> ImportResult<Arc<ImportHandler>> {
        self.handlers
            .get(&normalize_tag(tag))
            .cloned()
            .ok_or_else(|| ImportError::UnsupportedImportType(tag.to_string()))
    }

    /// 全部已注册标签（排序）
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.handlers.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// 规范标签（别名折叠，排序）
    pub fn canonical_tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<&'static str> = self.handlers.values().map(|h| h.tag).collect();
        tags.sort_unstable();
        tags.dedup();
        tags
    }
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}
