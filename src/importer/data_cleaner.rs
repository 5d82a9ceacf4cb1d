// ==========================================
// 表格导入系统 - 数据清洗器实现
// ==========================================
// 职责: TRIM / NULL 标准化 / 枚举 / 列表 / 布尔 / 电话 / 时间戳 转换
// 约定: 每次解析都由显式 OnParseFailure 策略决定失败行为
// ==========================================

use crate::config::ImportConfig;
use crate::domain::types::FieldEnum;
use crate::importer::error::{ImportError, ImportResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// 科学计数法（Excel 把长数字读成 5.952159955E9）
static SCIENTIFIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(?:\.(\d+))?[eE]\+?(\d+)$").expect("valid regex"));

/// 整数后缀 .0（Excel 数值单元格）
static TRAILING_ZERO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.0+$").expect("valid regex"));

/// 展开后的最大位数（E.164 上限）
const MAX_EXPANDED_DIGITS: usize = 15;

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
const TIMESTAMP_EXPECTED: &str = "YYYY-MM-DDTHH:MM:SS, YYYY-MM-DD HH:MM:SS, RFC 3339 or YYYY-MM-DD";

const TRUE_TOKENS: &[&str] = &["true", "1", "yes", "y", "evet", "doğru", "dogru"];
const FALSE_TOKENS: &[&str] = &["false", "0", "no", "n", "hayır", "hayir", "yanlış", "yanlis"];

// ==========================================
// OnParseFailure - 解析失败策略
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum OnParseFailure<T> {
    /// 使用默认值（值缺失时同样适用）
    UseDefault(T),
    /// 留空，交由校验器判断
    LeaveUnset,
    /// 拒绝整行
    Reject,
}

/// 列表分隔符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListDelimiter {
    /// 邮箱 / 电话 / 域名
    Comma,
    /// 标签 / 分组
    Whitespace,
    /// 自定义字段选项
    Dollar,
}

// ==========================================
// DataCleaner
// ==========================================
#[derive(Debug, Clone)]
pub struct DataCleaner {
    default_country_code: String,
}

impl DataCleaner {
    pub fn new(default_country_code: impl Into<String>) -> Self {
        Self {
            default_country_code: default_country_code.into(),
        }
    }

    pub fn from_config(config: &ImportConfig) -> Self {
        Self::new(config.default_country_code.clone())
    }

    /// NULL 标准化: TRIM 后空白视为缺失
    pub fn normalize_null(&self, value: Option<&str>) -> Option<String> {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// 枚举转换
    ///
    /// # 参数
    /// - raw: 单元格文本（None 表示未映射/缺失）
    /// - policy: 解析失败策略
    ///
    /// # 返回
    /// - Ok(Some): 解析成功或使用默认值
    /// - Ok(None): 缺失或 LeaveUnset
    /// - Err(CoercionRejected): Reject 策略下解析失败
    pub fn coerce_enum<T: FieldEnum>(
        &self,
        raw: Option<&str>,
        policy: &OnParseFailure<T>,
    ) -> ImportResult<Option<T>> {
        let value = match self.normalize_null(raw) {
            Some(v) => v,
            None => {
                return Ok(match policy {
                    OnParseFailure::UseDefault(default) => Some(*default),
                    _ => None,
                })
            }
        };

        if let Some(parsed) = T::parse_token(&value) {
            return Ok(Some(parsed));
        }

        match policy {
            OnParseFailure::UseDefault(default) => {
                debug!(
                    field = T::FIELD,
                    value = %value,
                    fallback = default.as_str(),
                    "枚举值无法识别，使用默认值"
                );
                Ok(Some(*default))
            }
            OnParseFailure::LeaveUnset => {
                debug!(field = T::FIELD, value = %value, "枚举值无法识别，留空");
                Ok(None)
            }
            OnParseFailure::Reject => Err(ImportError::CoercionRejected {
                field: T::FIELD.to_string(),
                value,
                message: format!("expected one of {}", T::expected()),
            }),
        }
    }

    /// 拆分列表（TRIM，丢弃空元素）
    pub fn split_list(&self, raw: Option<&str>, delimiter: ListDelimiter) -> Vec<String> {
        let raw = match raw {
            Some(r) => r,
            None => return Vec::new(),
        };

        let parts: Vec<&str> = match delimiter {
            ListDelimiter::Comma => raw.split(',').collect(),
            ListDelimiter::Dollar => raw.split('$').collect(),
            ListDelimiter::Whitespace => raw.split_whitespace().collect(),
        };

        parts
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// 布尔转换（含土耳其语 evet/hayır/doğru/yanlış）
    pub fn parse_bool(
        &self,
        field: &str,
        raw: Option<&str>,
        policy: &OnParseFailure<bool>,
    ) -> ImportResult<Option<bool>> {
        let value = match self.normalize_null(raw) {
            Some(v) => v,
            None => {
                return Ok(match policy {
                    OnParseFailure::UseDefault(default) => Some(*default),
                    _ => None,
                })
            }
        };

        let token = value.to_lowercase();
        if TRUE_TOKENS.contains(&token.as_str()) {
            return Ok(Some(true));
        }
        if FALSE_TOKENS.contains(&token.as_str()) {
            return Ok(Some(false));
        }

        match policy {
            OnParseFailure::UseDefault(default) => {
                debug!(field, value = %value, fallback = *default, "布尔值无法识别，使用默认值");
                Ok(Some(*default))
            }
            OnParseFailure::LeaveUnset => Ok(None),
            OnParseFailure::Reject => Err(ImportError::CoercionRejected {
                field: field.to_string(),
                value,
                message: "expected a boolean".to_string(),
            }),
        }
    }

    /// 修复被表格软件改写的数字文本
    ///
    /// - `5.952159955E9` → `5952159955`
    /// - `5952159955.0` → `5952159955`
    pub fn repair_numeric_text(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if let Some(expanded) = expand_scientific(trimmed) {
            return expanded;
        }
        if let Some(caps) = TRAILING_ZERO_RE.captures(trimmed) {
            return caps[1].to_string();
        }
        trimmed.to_string()
    }

    /// 电话规范化
    ///
    /// 步骤: 数字修复 → 去分隔符 → `00` 前缀改 `+` → 10 位裸号补国家码
    /// 对 E.164 输入幂等；结果是否合法由校验器判断
    pub fn normalize_phone(&self, raw: Option<&str>) -> Option<String> {
        let value = self.normalize_null(raw)?;
        let repaired = self.repair_numeric_text(&value);

        let stripped: String = repaired
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
            .collect();

        let normalized = if let Some(rest) = stripped.strip_prefix("00") {
            format!("+{}", rest)
        } else if stripped.len() == 10 && stripped.chars().all(|c| c.is_ascii_digit()) {
            format!("{}{}", self.default_country_code, stripped)
        } else {
            stripped
        };

        if normalized != value {
            debug!(original = %value, normalized = %normalized, "电话已规范化");
        }
        if normalized.is_empty() {
            None
        } else {
            Some(normalized)
        }
    }

    /// 电话列表规范化（逗号分隔）
    pub fn normalize_phones(&self, raw: Option<&str>) -> Vec<String> {
        self.split_list(raw, ListDelimiter::Comma)
            .iter()
            .filter_map(|p| self.normalize_phone(Some(p)))
            .collect()
    }

    /// 时间戳解析
    pub fn parse_timestamp(
        &self,
        field: &str,
        raw: Option<&str>,
        policy: &OnParseFailure<NaiveDateTime>,
    ) -> ImportResult<Option<NaiveDateTime>> {
        let value = match self.normalize_null(raw) {
            Some(v) => v,
            None => {
                return Ok(match policy {
                    OnParseFailure::UseDefault(default) => Some(*default),
                    _ => None,
                })
            }
        };

        if let Some(parsed) = parse_timestamp_text(&value) {
            return Ok(Some(parsed));
        }

        match policy {
            OnParseFailure::UseDefault(default) => Ok(Some(*default)),
            OnParseFailure::LeaveUnset => Ok(None),
            OnParseFailure::Reject => Err(ImportError::CoercionRejected {
                field: field.to_string(),
                value,
                message: format!("expected {}", TIMESTAMP_EXPECTED),
            }),
        }
    }
}

fn expand_scientific(raw: &str) -> Option<String> {
    let caps = SCIENTIFIC_RE.captures(raw)?;
    let int_part = caps.get(1)?.as_str();
    let frac_part = caps.get(2).map_or("", |m| m.as_str());
    let exponent: usize = caps.get(3)?.as_str().parse().ok()?;

    // 超长展开保留原文，由校验器报告
    let width = int_part.len().checked_add(exponent)?;
    if width > MAX_EXPANDED_DIGITS {
        return None;
    }

    let mut digits = format!("{}{}", int_part, frac_part);
    if exponent >= frac_part.len() {
        digits.push_str(&"0".repeat(exponent - frac_part.len()));
        Some(digits)
    } else {
        // 指数不足以消去小数位: 仅当剩余小数全为 0 时视为整数
        let (head, tail) = digits.split_at(int_part.len() + exponent);
        if tail.chars().all(|c| c == '0') {
            Some(head.to_string())
        } else {
            None
        }
    }
}

fn parse_timestamp_text(value: &str) -> Option<NaiveDateTime> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{PermissionLevel, Role, TicketStatus};

    fn cleaner() -> DataCleaner {
        DataCleaner::new("+90")
    }

    #[test]
    fn test_normalize_null() {
        let c = cleaner();
        assert_eq!(c.normalize_null(Some("  a ")), Some("a".to_string()));
        assert_eq!(c.normalize_null(Some("   ")), None);
        assert_eq!(c.normalize_null(None), None);
    }

    #[test]
    fn test_enum_use_default_on_unknown_and_absent() {
        let c = cleaner();
        let policy = OnParseFailure::UseDefault(Role::Customer);

        assert_eq!(c.coerce_enum(Some("agent"), &policy).unwrap(), Some(Role::Agent));
        assert_eq!(c.coerce_enum(Some("boss"), &policy).unwrap(), Some(Role::Customer));
        assert_eq!(c.coerce_enum::<Role>(None, &policy).unwrap(), Some(Role::Customer));
    }

    #[test]
    fn test_enum_permission_default() {
        let c = cleaner();
        let policy = OnParseFailure::UseDefault(PermissionLevel::EditableByEndUsers);

        assert_eq!(
            c.coerce_enum(Some("Read-Write"), &policy).unwrap(),
            Some(PermissionLevel::EditableByEndUsers)
        );
        assert_eq!(
            c.coerce_enum(Some("whatever"), &policy).unwrap(),
            Some(PermissionLevel::EditableByEndUsers)
        );
        assert_eq!(
            c.coerce_enum(Some("READONLY"), &policy).unwrap(),
            Some(PermissionLevel::Readonly)
        );
    }

    #[test]
    fn test_enum_leave_unset_and_reject() {
        let c = cleaner();
        assert_eq!(
            c.coerce_enum::<TicketStatus>(Some("weird"), &OnParseFailure::LeaveUnset)
                .unwrap(),
            None
        );
        let err = c
            .coerce_enum::<TicketStatus>(Some("weird"), &OnParseFailure::Reject)
            .unwrap_err();
        assert!(matches!(err, ImportError::CoercionRejected { .. }));
    }

    #[test]
    fn test_split_list_delimiters() {
        let c = cleaner();
        assert_eq!(
            c.split_list(Some("a@x.com, ,b@x.com"), ListDelimiter::Comma),
            vec!["a@x.com", "b@x.com"]
        );
        assert_eq!(
            c.split_list(Some(" vip   gold\tnew "), ListDelimiter::Whitespace),
            vec!["vip", "gold", "new"]
        );
        assert_eq!(
            c.split_list(Some("Red$ Green $$Blue"), ListDelimiter::Dollar),
            vec!["Red", "Green", "Blue"]
        );
        assert!(c.split_list(None, ListDelimiter::Comma).is_empty());
    }

    #[test]
    fn test_parse_bool_tokens() {
        let c = cleaner();
        let policy = OnParseFailure::UseDefault(false);
        assert_eq!(c.parse_bool("required", Some("Evet"), &policy).unwrap(), Some(true));
        assert_eq!(c.parse_bool("required", Some("DOĞRU"), &policy).unwrap(), Some(true));
        assert_eq!(c.parse_bool("required", Some("HAYIR"), &policy).unwrap(), Some(false));
        assert_eq!(c.parse_bool("required", Some("1"), &policy).unwrap(), Some(true));
        assert_eq!(c.parse_bool("required", Some("maybe"), &policy).unwrap(), Some(false));
        assert_eq!(
            c.parse_bool("enabled", None, &OnParseFailure::UseDefault(true))
                .unwrap(),
            Some(true)
        );
    }

    #[test]
    fn test_repair_numeric_text() {
        let c = cleaner();
        assert_eq!(c.repair_numeric_text("5.952159955E9"), "5952159955");
        assert_eq!(c.repair_numeric_text("5.95E3"), "5950");
        assert_eq!(c.repair_numeric_text("5952159955.0"), "5952159955");
        assert_eq!(c.repair_numeric_text("1.5E0"), "1.5E0");
        assert_eq!(c.repair_numeric_text("abc"), "abc");
    }

    #[test]
    fn test_repair_numeric_text_keeps_oversized_exponent() {
        let c = cleaner();
        assert_eq!(
            c.repair_numeric_text("1E99999999999999999"),
            "1E99999999999999999"
        );
        assert_eq!(
            c.repair_numeric_text("9E999999999999999999999"),
            "9E999999999999999999999"
        );
        // 15 位是上限
        assert_eq!(c.repair_numeric_text("1E14"), "100000000000000");
        assert_eq!(c.repair_numeric_text("1E15"), "1E15");
    }

    #[test]
    fn test_normalize_phone_scientific_to_e164() {
        let c = cleaner();
        assert_eq!(
            c.normalize_phone(Some("5.952159955E9")),
            Some("+905952159955".to_string())
        );
    }

    #[test]
    fn test_normalize_phone_separators_and_prefix() {
        let c = cleaner();
        assert_eq!(
            c.normalize_phone(Some("(595) 215-99 55")),
            Some("+905952159955".to_string())
        );
        assert_eq!(
            c.normalize_phone(Some("0049 30 1234567")),
            Some("+49301234567".to_string())
        );
        assert_eq!(c.normalize_phone(Some("  ")), None);
    }

    #[test]
    fn test_normalize_phone_idempotent() {
        let c = cleaner();
        let once = c.normalize_phone(Some("+905952159955")).unwrap();
        assert_eq!(once, "+905952159955");
        let twice = c.normalize_phone(Some(&once)).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_custom_country_code() {
        let c = DataCleaner::new("+49");
        assert_eq!(
            c.normalize_phone(Some("3012345678")),
            Some("+493012345678".to_string())
        );
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let c = cleaner();
        let policy = OnParseFailure::Reject;
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();

        assert_eq!(
            c.parse_timestamp("createdAt", Some("2024-03-01T10:30:00"), &policy).unwrap(),
            Some(expected)
        );
        assert_eq!(
            c.parse_timestamp("createdAt", Some("2024-03-01 10:30:00"), &policy).unwrap(),
            Some(expected)
        );
        assert_eq!(
            c.parse_timestamp("createdAt", Some("2024-03-01T12:30:00+02:00"), &policy)
                .unwrap(),
            Some(expected)
        );
        assert_eq!(
            c.parse_timestamp("createdAt", Some("2024-03-01"), &policy).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn test_parse_timestamp_reject() {
        let c = cleaner();
        let err = c
            .parse_timestamp("createdAt", Some("01/03/2024"), &OnParseFailure::Reject)
            .unwrap_err();
        assert!(err.row_message().contains("createdAt"));
    }
}
