// ==========================================
// 表格导入系统 - 规范化实体记录
// ==========================================
// 职责: 各实体类型的强类型记录 + NormalizedRecord 和类型
// 约定: 引用字段仅保存被引用实体的自然键（如组织 externalId、分组 name）
// ==========================================

use crate::domain::types::{
    Channel, CustomFieldType, Language, PermissionLevel, Role, TicketPriority, TicketStatus,
    TicketType,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// EntityKind - 实体类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    User,
    Ticket,
    Organization,
    Group,
    CustomField,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "USER",
            EntityKind::Ticket => "TICKET",
            EntityKind::Organization => "ORGANIZATION",
            EntityKind::Group => "GROUP",
            EntityKind::CustomField => "CUSTOM_FIELD",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "USER" => Some(EntityKind::User),
            "TICKET" => Some(EntityKind::Ticket),
            "ORGANIZATION" => Some(EntityKind::Organization),
            "GROUP" => Some(EntityKind::Group),
            "CUSTOM_FIELD" => Some(EntityKind::CustomField),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 各实体记录
// ==========================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub external_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub role: Option<Role>,
    pub language: Option<Language>,
    /// 组织 externalId
    pub organization: Option<String>,
    /// 分组名称
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub enabled: bool,
}

impl UserRecord {
    /// 自然键: externalId > 第一个邮箱 > 电话
    pub fn natural_key(&self) -> Option<NaturalKey> {
        if let Some(id) = non_blank(&self.external_id) {
            return Some(NaturalKey::new("externalId", id));
        }
        if let Some(email) = self.emails.iter().find(|e| !e.trim().is_empty()) {
            return Some(NaturalKey::new("email", email));
        }
        non_blank(&self.phone).map(|p| NaturalKey::new("phone", p))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRecord {
    pub external_id: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    #[serde(rename = "type")]
    pub ticket_type: Option<TicketType>,
    pub channel: Option<Channel>,
    pub form: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    pub solved_at: Option<NaiveDateTime>,
    /// 用户自然键
    pub creator: Option<String>,
    pub requester: Option<String>,
    pub assignee: Option<String>,
    /// 分组名称
    pub assignee_group: Option<String>,
    /// 组织 externalId
    pub organization: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRecord {
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub details: Option<String>,
    pub notes: Option<String>,
    /// 分组名称
    pub group: Option<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    pub external_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldRecord {
    pub key: Option<String>,
    #[serde(rename = "type")]
    pub field_type: Option<CustomFieldType>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub description_for_agents: Option<String>,
    pub description_for_customers: Option<String>,
    pub title_for_agents: Option<String>,
    pub title_for_customers: Option<String>,
    pub permission: Option<PermissionLevel>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub options: Vec<String>,
    /// 分组名称
    #[serde(default)]
    pub groups: Vec<String>,
}

// ==========================================
// NaturalKey - 自然键
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    /// 键字段名（用于重复提示）
    pub field: &'static str,
    pub value: String,
}

impl NaturalKey {
    pub fn new(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ==========================================
// NormalizedRecord - 规范化记录（和类型）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NormalizedRecord {
    User(UserRecord),
    Ticket(TicketRecord),
    Organization(OrganizationRecord),
    Group(GroupRecord),
    CustomField(CustomFieldRecord),
}

impl NormalizedRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            NormalizedRecord::User(_) => EntityKind::User,
            NormalizedRecord::Ticket(_) => EntityKind::Ticket,
            NormalizedRecord::Organization(_) => EntityKind::Organization,
            NormalizedRecord::Group(_) => EntityKind::Group,
            NormalizedRecord::CustomField(_) => EntityKind::CustomField,
        }
    }

    /// 自然键（用于批内去重与持久化主键）
    pub fn natural_key(&self) -> Option<NaturalKey> {
        match self {
            NormalizedRecord::User(u) => u.natural_key(),
            NormalizedRecord::Ticket(t) => {
                non_blank(&t.external_id).map(|v| NaturalKey::new("externalId", v))
            }
            NormalizedRecord::Organization(o) => {
                non_blank(&o.external_id).map(|v| NaturalKey::new("externalId", v))
            }
            NormalizedRecord::Group(g) => non_blank(&g.name).map(|v| NaturalKey::new("name", v)),
            NormalizedRecord::CustomField(c) => {
                non_blank(&c.key).map(|v| NaturalKey::new("key", v))
            }
        }
    }

    /// 记录标识（无自然键时为 None）
    pub fn identifier(&self) -> Option<String> {
        self.natural_key().map(|k| k.value)
    }
}
