// ==========================================
// 表格导入系统 - 数据质量校验器实现
// ==========================================
// 职责: 按实体类型校验规范化记录
// 约定: 纯函数；不短路，收集全部违规
// ==========================================

use crate::domain::import::ValidationResult;
use crate::domain::record::{
    CustomFieldRecord, EntityKind, GroupRecord, NormalizedRecord, OrganizationRecord,
    TicketRecord, UserRecord,
};
use crate::domain::types::{CustomFieldType, FieldEnum, PermissionLevel, Role};
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.-]+@([\w-]+\.)+[\w-]{2,4}$").expect("valid regex")
});

static E164_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+\d{10,15}$").expect("valid regex"));

/// 工单主题最小长度
const MIN_SUBJECT_LEN: usize = 3;

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

pub fn is_valid_e164(value: &str) -> bool {
    E164_RE.is_match(value)
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

// ==========================================
// EntityValidator Trait
// ==========================================
pub trait EntityValidator: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// 校验记录（记录类型不符时返回单条错误）
    fn validate(&self, record: &NormalizedRecord) -> ValidationResult {
        let mut result = ValidationResult::new(record.identifier());
        if record.kind() != self.kind() {
            result.add_error(format!(
                "record kind {} does not match {} import",
                record.kind(),
                self.kind()
            ));
            return result;
        }
        self.check(record, &mut result);
        result
    }

    /// 追加该类型的全部违规
    fn check(&self, record: &NormalizedRecord, result: &mut ValidationResult);
}

// ==========================================
// UserValidator
// ==========================================
pub struct UserValidator;

impl UserValidator {
    fn check_user(&self, user: &UserRecord, result: &mut ValidationResult) {
        let has_email = user.emails.iter().any(|e| !e.trim().is_empty());
        if is_blank(&user.external_id) && !has_email && is_blank(&user.phone) {
            result.add_error("identifier required");
        }

        if is_blank(&user.first_name) {
            result.add_error("first name required");
        }

        for email in &user.emails {
            if !is_valid_email(email) {
                result.add_error(format!("invalid email: {}", email));
            }
        }

        if let Some(phone) = user.phone.as_deref() {
            if !is_valid_e164(phone) {
                result.add_error(format!("invalid phone: {}", phone));
            }
        }
        for phone in &user.phones {
            if !is_valid_e164(phone) {
                result.add_error(format!("invalid phone: {}", phone));
            }
        }

        if user.role.is_none() {
            result.add_error(format!("role must be one of {}", Role::expected()));
        }
    }
}

impl EntityValidator for UserValidator {
    fn kind(&self) -> EntityKind {
        EntityKind::User
    }

    fn check(&self, record: &NormalizedRecord, result: &mut ValidationResult) {
        if let NormalizedRecord::User(user) = record {
            self.check_user(user, result);
        }
    }
}

// ==========================================
// TicketValidator
// ==========================================
pub struct TicketValidator;

impl TicketValidator {
    fn check_ticket(&self, ticket: &TicketRecord, result: &mut ValidationResult) {
        if is_blank(&ticket.external_id) {
            result.add_error("externalId required");
        }
        if let Some(subject) = ticket.subject.as_deref() {
            if subject.trim().chars().count() < MIN_SUBJECT_LEN {
                result.add_error(format!(
                    "subject must be at least {} characters",
                    MIN_SUBJECT_LEN
                ));
            }
        }
    }
}

impl EntityValidator for TicketValidator {
    fn kind(&self) -> EntityKind {
        EntityKind::Ticket
    }

    fn check(&self, record: &NormalizedRecord, result: &mut ValidationResult) {
        if let NormalizedRecord::Ticket(ticket) = record {
            self.check_ticket(ticket, result);
        }
    }
}

// ==========================================
// OrganizationValidator
// ==========================================
pub struct OrganizationValidator;

impl OrganizationValidator {
    fn check_organization(&self, org: &OrganizationRecord, result: &mut ValidationResult) {
        if is_blank(&org.external_id) {
            result.add_error("externalId required");
        }
        if org.domains.iter().any(|d| d.trim().is_empty()) {
            result.add_error("domains must not contain empty values");
        }
        if org.tags.iter().any(|t| t.trim().is_empty()) {
            result.add_error("tags must not contain empty values");
        }
    }
}

impl EntityValidator for OrganizationValidator {
    fn kind(&self) -> EntityKind {
        EntityKind::Organization
    }

    fn check(&self, record: &NormalizedRecord, result: &mut ValidationResult) {
        if let NormalizedRecord::Organization(org) = record {
            self.check_organization(org, result);
        }
    }
}

// ==========================================
// GroupValidator
// ==========================================
pub struct GroupValidator;

impl GroupValidator {
    fn check_group(&self, group: &GroupRecord, result: &mut ValidationResult) {
        if is_blank(&group.name) {
            result.add_error("name required");
        }
    }
}

impl EntityValidator for GroupValidator {
    fn kind(&self) -> EntityKind {
        EntityKind::Group
    }

    fn check(&self, record: &NormalizedRecord, result: &mut ValidationResult) {
        if let NormalizedRecord::Group(group) = record {
            self.check_group(group, result);
        }
    }
}

// ==========================================
// CustomFieldValidator
// ==========================================
pub struct CustomFieldValidator;

impl CustomFieldValidator {
    fn check_custom_field(&self, cf: &CustomFieldRecord, result: &mut ValidationResult) {
        if is_blank(&cf.key) {
            result.add_error("key required");
        }
        if cf.field_type.is_none() {
            result.add_error(format!("type must be one of {}", CustomFieldType::expected()));
        }
        if cf.permission.is_none() {
            result.add_error(format!(
                "permission must be one of {}",
                PermissionLevel::expected()
            ));
        }
        if is_blank(&cf.name) {
            result.add_error("name required");
        }
    }
}

impl EntityValidator for CustomFieldValidator {
    fn kind(&self) -> EntityKind {
        EntityKind::CustomField
    }

    fn check(&self, record: &NormalizedRecord, result: &mut ValidationResult) {
        if let NormalizedRecord::CustomField(cf) = record {
            self.check_custom_field(cf, result);
        }
    }
}
