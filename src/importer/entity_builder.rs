// ==========================================
// 表格导入系统 - 实体构建器
// ==========================================
// 职责: 规范字段取值 → 强类型记录（每个实体类型一个构建器）
// 流程: 清洗/转换（DataCleaner）+ 引用解析（ReferenceResolver）
// ==========================================

use crate::config::ImportConfig;
use crate::domain::import::ImportSequence;
use crate::domain::record::{
    CustomFieldRecord, EntityKind, GroupRecord, NormalizedRecord, OrganizationRecord,
    TicketRecord, UserRecord,
};
use crate::domain::types::{
    Channel, CustomFieldType, Language, PermissionLevel, Role, TicketPriority, TicketStatus,
    TicketType,
};
use crate::importer::data_cleaner::{DataCleaner, ListDelimiter, OnParseFailure};
use crate::importer::error::ImportResult;
use crate::importer::field_mapper::{FieldSpec, ResolvedFields};
use crate::importer::reference_resolver::{ReferenceResolver, ReferenceSpec, GROUP_ID_PREFIX};
use async_trait::async_trait;

/// 构建上下文（单次运行内共享）
pub struct BuildContext<'a> {
    pub cleaner: &'a DataCleaner,
    pub resolver: &'a ReferenceResolver,
    pub sequence: &'a mut ImportSequence,
    pub config: &'a ImportConfig,
}

impl BuildContext<'_> {
    fn text(&self, fields: &ResolvedFields, name: &str) -> Option<String> {
        self.cleaner.normalize_null(fields.get(name))
    }

    fn list(&self, fields: &ResolvedFields, name: &str, delimiter: ListDelimiter) -> Vec<String> {
        self.cleaner.split_list(fields.get(name), delimiter)
    }

    async fn reference(
        &mut self,
        spec: ReferenceSpec,
        key: Option<String>,
    ) -> ImportResult<Option<String>> {
        match key {
            Some(key) => self.resolver.resolve(&spec, &key, self.sequence).await,
            None => Ok(None),
        }
    }

    async fn references(
        &mut self,
        spec: ReferenceSpec,
        keys: Vec<String>,
    ) -> ImportResult<Vec<String>> {
        self.resolver.resolve_all(&spec, &keys, self.sequence).await
    }
}

// ==========================================
// EntityBuilder Trait
// ==========================================
#[async_trait]
pub trait EntityBuilder: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// 该实体类型的规范字段（含关键词规则）
    fn schema(&self) -> &'static [FieldSpec];

    /// 构建规范化记录
    ///
    /// # 返回
    /// - Err(CoercionRejected / ReferenceResolution): 行级失败
    async fn build(
        &self,
        fields: &ResolvedFields,
        ctx: &mut BuildContext<'_>,
    ) -> ImportResult<NormalizedRecord>;
}

// ==========================================
// UserBuilder
// ==========================================
const USER_SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("externalId", &["external"]),
    FieldSpec::new("firstName", &["first"]).required(),
    FieldSpec::new("lastName", &["last"]),
    FieldSpec::new("phone", &["phone", "tel"]),
    FieldSpec::new("emails", &["email", "mail"]),
    FieldSpec::new("phones", &[]),
    FieldSpec::new("tags", &["tag"]),
    FieldSpec::new("role", &["role"]),
    FieldSpec::new("language", &["language"]),
    FieldSpec::new("organization", &["organization"]),
    FieldSpec::new("groups", &["group"]),
    FieldSpec::new("enabled", &["enabled", "active"]),
];

pub struct UserBuilder;

#[async_trait]
impl EntityBuilder for UserBuilder {
    fn kind(&self) -> EntityKind {
        EntityKind::User
    }

    fn schema(&self) -> &'static [FieldSpec] {
        USER_SCHEMA
    }

    async fn build(
        &self,
        fields: &ResolvedFields,
        ctx: &mut BuildContext<'_>,
    ) -> ImportResult<NormalizedRecord> {
        let cleaner = ctx.cleaner;

        let role = cleaner.coerce_enum(fields.get("role"), &OnParseFailure::UseDefault(Role::Customer))?;
        let language =
            cleaner.coerce_enum(fields.get("language"), &OnParseFailure::UseDefault(Language::Tr))?;
        let enabled = cleaner
            .parse_bool("enabled", fields.get("enabled"), &OnParseFailure::UseDefault(true))?
            .unwrap_or(true);

        let organization_spec = ReferenceSpec::new(
            "organization",
            EntityKind::Organization,
            ctx.config.create_missing_organizations,
        );
        let groups_spec =
            ReferenceSpec::new("groups", EntityKind::Group, ctx.config.create_missing_groups);

        let organization_key = ctx.text(fields, "organization");
        let organization = ctx.reference(organization_spec, organization_key).await?;
        let group_keys = ctx.list(fields, "groups", ListDelimiter::Whitespace);
        let groups = ctx.references(groups_spec, group_keys).await?;

        Ok(NormalizedRecord::User(UserRecord {
            external_id: ctx.text(fields, "externalId"),
            first_name: ctx.text(fields, "firstName"),
            last_name: ctx.text(fields, "lastName"),
            phone: cleaner.normalize_phone(fields.get("phone")),
            emails: ctx.list(fields, "emails", ListDelimiter::Comma),
            phones: cleaner.normalize_phones(fields.get("phones")),
            tags: ctx.list(fields, "tags", ListDelimiter::Whitespace),
            role,
            language,
            organization,
            groups,
            enabled,
        }))
    }
}

// ==========================================
// TicketBuilder
// ==========================================
const TICKET_SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("externalId", &["external"]).required(),
    FieldSpec::new("subject", &["subject"]),
    FieldSpec::new("description", &["description"]),
    FieldSpec::new("status", &["status"]),
    FieldSpec::new("priority", &["priority"]),
    FieldSpec::new("type", &[]),
    FieldSpec::new("channel", &["channel"]),
    FieldSpec::new("form", &["form"]),
    FieldSpec::new("createdAt", &["created"]),
    FieldSpec::new("updatedAt", &["updated"]),
    FieldSpec::new("solvedAt", &["solved"]),
    FieldSpec::new("creator", &["creator"]),
    FieldSpec::new("requester", &["requester"]),
    FieldSpec::new("assignee", &[]),
    FieldSpec::new("assigneeGroup", &["group"]),
    FieldSpec::new("organization", &["organization"]),
    FieldSpec::new("tags", &["tag"]),
];

pub struct TicketBuilder;

#[async_trait]
impl EntityBuilder for TicketBuilder {
    fn kind(&self) -> EntityKind {
        EntityKind::Ticket
    }

    fn schema(&self) -> &'static [FieldSpec] {
        TICKET_SCHEMA
    }

    async fn build(
        &self,
        fields: &ResolvedFields,
        ctx: &mut BuildContext<'_>,
    ) -> ImportResult<NormalizedRecord> {
        let cleaner = ctx.cleaner;

        let status = cleaner.coerce_enum::<TicketStatus>(fields.get("status"), &OnParseFailure::LeaveUnset)?;
        let priority =
            cleaner.coerce_enum::<TicketPriority>(fields.get("priority"), &OnParseFailure::LeaveUnset)?;
        let ticket_type = cleaner.coerce_enum::<TicketType>(fields.get("type"), &OnParseFailure::LeaveUnset)?;
        let channel = cleaner.coerce_enum::<Channel>(fields.get("channel"), &OnParseFailure::LeaveUnset)?;

        let created_at = cleaner.parse_timestamp("createdAt", fields.get("createdAt"), &OnParseFailure::Reject)?;
        let updated_at = cleaner.parse_timestamp("updatedAt", fields.get("updatedAt"), &OnParseFailure::Reject)?;
        let solved_at = cleaner.parse_timestamp("solvedAt", fields.get("solvedAt"), &OnParseFailure::Reject)?;

        let creator_key = ctx.text(fields, "creator");
        let creator = ctx
            .reference(ReferenceSpec::new("creator", EntityKind::User, false), creator_key)
            .await?;
        let requester_key = ctx.text(fields, "requester");
        let requester = ctx
            .reference(ReferenceSpec::new("requester", EntityKind::User, false), requester_key)
            .await?;
        let assignee_key = ctx.text(fields, "assignee");
        let assignee = ctx
            .reference(ReferenceSpec::new("assignee", EntityKind::User, false), assignee_key)
            .await?;

        let group_spec = ReferenceSpec::new(
            "assigneeGroup",
            EntityKind::Group,
            ctx.config.create_missing_groups,
        );
        let group_key = ctx.text(fields, "assigneeGroup");
        let assignee_group = ctx.reference(group_spec, group_key).await?;

        let organization_spec = ReferenceSpec::new(
            "organization",
            EntityKind::Organization,
            ctx.config.create_missing_organizations,
        );
        let organization_key = ctx.text(fields, "organization");
        let organization = ctx.reference(organization_spec, organization_key).await?;

        Ok(NormalizedRecord::Ticket(TicketRecord {
            external_id: ctx.text(fields, "externalId"),
            subject: ctx.text(fields, "subject"),
            description: ctx.text(fields, "description"),
            status,
            priority,
            ticket_type,
            channel,
            form: ctx.text(fields, "form"),
            created_at,
            updated_at,
            solved_at,
            creator,
            requester,
            assignee,
            assignee_group,
            organization,
            tags: ctx.list(fields, "tags", ListDelimiter::Whitespace),
        }))
    }
}

// ==========================================
// OrganizationBuilder
// ==========================================
const ORGANIZATION_SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("externalId", &["external"]).required(),
    FieldSpec::new("name", &["name"]),
    FieldSpec::new("description", &["description"]),
    FieldSpec::new("details", &["detail"]),
    FieldSpec::new("notes", &["note"]),
    FieldSpec::new("group", &["group"]),
    FieldSpec::new("domains", &["domain"]),
    FieldSpec::new("tags", &["tag"]),
];

pub struct OrganizationBuilder;

#[async_trait]
impl EntityBuilder for OrganizationBuilder {
    fn kind(&self) -> EntityKind {
        EntityKind::Organization
    }

    fn schema(&self) -> &'static [FieldSpec] {
        ORGANIZATION_SCHEMA
    }

    async fn build(
        &self,
        fields: &ResolvedFields,
        ctx: &mut BuildContext<'_>,
    ) -> ImportResult<NormalizedRecord> {
        let group_key = ctx.text(fields, "group");
        let group = ctx
            .reference(ReferenceSpec::new("group", EntityKind::Group, false), group_key)
            .await?;

        Ok(NormalizedRecord::Organization(OrganizationRecord {
            external_id: ctx.text(fields, "externalId"),
            name: ctx.text(fields, "name"),
            description: ctx.text(fields, "description"),
            details: ctx.text(fields, "details"),
            notes: ctx.text(fields, "notes"),
            group,
            domains: ctx.list(fields, "domains", ListDelimiter::Comma),
            tags: ctx.list(fields, "tags", ListDelimiter::Whitespace),
        }))
    }
}

// ==========================================
// GroupBuilder
// ==========================================
const GROUP_SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("externalId", &["external"]),
    FieldSpec::new("name", &["name"]).required(),
];

pub struct GroupBuilder;

#[async_trait]
impl EntityBuilder for GroupBuilder {
    fn kind(&self) -> EntityKind {
        EntityKind::Group
    }

    fn schema(&self) -> &'static [FieldSpec] {
        GROUP_SCHEMA
    }

    async fn build(
        &self,
        fields: &ResolvedFields,
        ctx: &mut BuildContext<'_>,
    ) -> ImportResult<NormalizedRecord> {
        let name = ctx.text(fields, "name");
        // 无 externalId 时从运行内序号生成（仅对有名称的行消耗序号）
        let external_id = match ctx.text(fields, "externalId") {
            Some(id) => Some(id),
            None if name.is_some() => Some(ctx.sequence.next_id(GROUP_ID_PREFIX)),
            None => None,
        };

        Ok(NormalizedRecord::Group(GroupRecord { external_id, name }))
    }
}

// ==========================================
// CustomFieldBuilder
// ==========================================
const CUSTOM_FIELD_SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("key", &["key"]).required(),
    FieldSpec::new("type", &["type"]).required(),
    FieldSpec::new("name", &[]).required(),
    FieldSpec::new("description", &[]),
    FieldSpec::new("descriptionForAgents", &[]),
    FieldSpec::new("descriptionForCustomers", &[]),
    FieldSpec::new("titleForAgents", &[]),
    FieldSpec::new("titleForCustomers", &[]),
    FieldSpec::new("permission", &["permission"]),
    FieldSpec::new("required", &["required"]),
    FieldSpec::new("enabled", &["enabled", "active"]),
    FieldSpec::new("options", &["option"]),
    FieldSpec::new("groups", &["group"]),
];

pub struct CustomFieldBuilder;

#[async_trait]
impl EntityBuilder for CustomFieldBuilder {
    fn kind(&self) -> EntityKind {
        EntityKind::CustomField
    }

    fn schema(&self) -> &'static [FieldSpec] {
        CUSTOM_FIELD_SCHEMA
    }

    async fn build(
        &self,
        fields: &ResolvedFields,
        ctx: &mut BuildContext<'_>,
    ) -> ImportResult<NormalizedRecord> {
        let cleaner = ctx.cleaner;

        let field_type =
            cleaner.coerce_enum::<CustomFieldType>(fields.get("type"), &OnParseFailure::LeaveUnset)?;
        let permission = cleaner.coerce_enum(
            fields.get("permission"),
            &OnParseFailure::UseDefault(PermissionLevel::EditableByEndUsers),
        )?;
        let required = cleaner
            .parse_bool("required", fields.get("required"), &OnParseFailure::UseDefault(false))?
            .unwrap_or(false);
        let enabled = cleaner
            .parse_bool("enabled", fields.get("enabled"), &OnParseFailure::UseDefault(false))?
            .unwrap_or(false);

        let group_keys = ctx.list(fields, "groups", ListDelimiter::Whitespace);
        let groups = ctx
            .references(ReferenceSpec::new("groups", EntityKind::Group, false), group_keys)
            .await?;

        Ok(NormalizedRecord::CustomField(CustomFieldRecord {
            key: ctx.text(fields, "key"),
            field_type,
            name: ctx.text(fields, "name"),
            description: ctx.text(fields, "description"),
            description_for_agents: ctx.text(fields, "descriptionForAgents"),
            description_for_customers: ctx.text(fields, "descriptionForCustomers"),
            title_for_agents: ctx.text(fields, "titleForAgents"),
            title_for_customers: ctx.text(fields, "titleForCustomers"),
            permission,
            required,
            enabled,
            options: ctx.list(fields, "options", ListDelimiter::Dollar),
            groups,
        }))
    }
}
