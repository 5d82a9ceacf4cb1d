// ==========================================
// 表格导入系统 - 领域枚举定义
// ==========================================
// 职责: 各实体的固定词表（角色/语言/工单状态/自定义字段类型等）
// 约定: 序列化格式为 SCREAMING_SNAKE_CASE（与存储一致）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// FieldEnum - 可从单元格文本解析的词表
// ==========================================
pub trait FieldEnum: Sized + Copy + 'static {
    /// 对应的规范字段名（用于日志与错误信息）
    const FIELD: &'static str;

    /// 全部合法取值
    fn variants() -> &'static [Self];

    /// 规范文本（大写下划线）
    fn as_str(&self) -> &'static str;

    /// 额外别名（如 "Read-Write"）
    fn aliases() -> &'static [(&'static str, Self)];

    /// 大小写不敏感解析；`-` 与空格视为 `_`
    fn parse_token(raw: &str) -> Option<Self> {
        let token = normalize_token(raw);
        if token.is_empty() {
            return None;
        }

        Self::variants()
            .iter()
            .copied()
            .find(|v| v.as_str() == token)
            .or_else(|| {
                Self::aliases()
                    .iter()
                    .find(|(alias, _)| normalize_token(alias) == token)
                    .map(|(_, v)| *v)
            })
    }

    /// 合法取值列表（用于校验提示）
    fn expected() -> String {
        Self::variants()
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// 规范化词表文本: TRIM + UPPER + (`-`/空格 → `_`)
pub fn normalize_token(raw: &str) -> String {
    raw.trim()
        .to_uppercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

macro_rules! field_enum {
    (
        $(#[$meta:meta])*
        $name:ident : $field:literal {
            $($variant:ident => $token:literal),+ $(,)?
        }
        $(aliases { $($alias:literal => $target:ident),* $(,)? })?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $token)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl FieldEnum for $name {
            const FIELD: &'static str = $field;

            fn variants() -> &'static [Self] {
                Self::ALL
            }

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $token),+
                }
            }

            fn aliases() -> &'static [(&'static str, Self)] {
                &[$($(($alias, $name::$target)),*)?]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// ==========================================
// 用户相关
// ==========================================
field_enum! {
    /// 用户角色（缺省 CUSTOMER）
    Role: "role" {
        Admin => "ADMIN",
        Agent => "AGENT",
        Customer => "CUSTOMER",
    }
}

field_enum! {
    /// 用户语言（缺省 TR）
    Language: "language" {
        Tr => "TR",
        En => "EN",
        De => "DE",
        Fr => "FR",
        Es => "ES",
        Ar => "AR",
        Ru => "RU",
    }
    aliases {
        "TURKISH" => Tr,
        "TURKCE" => Tr,
        "TÜRKÇE" => Tr,
        "ENGLISH" => En,
        "INGILIZCE" => En,
    }
}

// ==========================================
// 工单相关
// ==========================================
field_enum! {
    TicketStatus: "status" {
        New => "NEW",
        Open => "OPEN",
        Pending => "PENDING",
        OnHold => "ON_HOLD",
        Solved => "SOLVED",
        Closed => "CLOSED",
    }
}

field_enum! {
    TicketPriority: "priority" {
        Low => "LOW",
        Normal => "NORMAL",
        High => "HIGH",
        Urgent => "URGENT",
    }
    aliases {
        "MEDIUM" => Normal,
    }
}

field_enum! {
    TicketType: "type" {
        Question => "QUESTION",
        Incident => "INCIDENT",
        Problem => "PROBLEM",
        Task => "TASK",
    }
}

field_enum! {
    Channel: "channel" {
        Email => "EMAIL",
        Phone => "PHONE",
        Web => "WEB",
        Chat => "CHAT",
        Api => "API",
        Social => "SOCIAL",
    }
    aliases {
        "MAIL" => Email,
        "E_MAIL" => Email,
    }
}

// ==========================================
// 自定义字段相关
// ==========================================
field_enum! {
    CustomFieldType: "type" {
        Text => "TEXT",
        Textarea => "TEXTAREA",
        Dropdown => "DROPDOWN",
        Checkbox => "CHECKBOX",
        Number => "NUMBER",
        NumberInteger => "NUMBER_INTEGER",
        NumberDecimal => "NUMBER_DECIMAL",
        Email => "EMAIL",
        Phone => "PHONE",
        Url => "URL",
        Date => "DATE",
        DateTime => "DATE_TIME",
        Html => "HTML",
        Select => "SELECT",
        MultiSelect => "MULTI_SELECT",
        User => "USER",
        MultiUser => "MULTI_USER",
        Tag => "TAG",
    }
}

field_enum! {
    /// 自定义字段权限（缺省 EDITABLE_BY_END_USERS）
    PermissionLevel: "permission" {
        AgentOnly => "AGENT_ONLY",
        CustomerOnly => "CUSTOMER_ONLY",
        Internal => "INTERNAL",
        EditableByEndUsers => "EDITABLE_BY_END_USERS",
        Readonly => "READONLY",
        ReadonlyForEndUsers => "READONLY_FOR_END_USERS",
    }
    aliases {
        "READ_WRITE" => EditableByEndUsers,
        "READ_ONLY" => Readonly,
    }
}
