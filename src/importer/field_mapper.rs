// ==========================================
// 表格导入系统 - 字段映射器实现
// ==========================================
// 职责: (原始行, 映射) → 规范字段取值
// 解析顺序:
//   (a) 显式映射的源列（同一字段多次映射时后者生效）
//   (b) 与规范字段同名的列（先精确，后大小写不敏感）
//   (c) 关键词猜测（可配置关闭），跳过已显式映射/已被占用的列
// ==========================================

use crate::domain::row::{FieldMapping, RawRow};
use std::collections::HashSet;
use tracing::trace;

/// 实体 schema 中的一个规范字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    /// 列名包含任一关键词（小写）即视为候选列
    pub keywords: &'static [&'static str],
    /// 校验器要求该字段有值
    pub required: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str, keywords: &'static [&'static str]) -> Self {
        Self {
            name,
            keywords,
            required: false,
        }
    }

    /// 标记为必填字段
    pub const fn required(self) -> Self {
        Self {
            name: self.name,
            keywords: self.keywords,
            required: true,
        }
    }
}

/// 单个字段的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    pub field: &'static str,
    pub source_column: String,
    pub value: String,
}

/// 一行的全部字段解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFields {
    values: Vec<ResolvedValue>,
}

impl ResolvedFields {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.field == field)
            .map(|v| v.value.as_str())
    }

    pub fn source_column(&self, field: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.field == field)
            .map(|v| v.source_column.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn insert(&mut self, field: &'static str, column: &str, value: &str) {
        self.values.push(ResolvedValue {
            field,
            source_column: column.to_string(),
            value: value.to_string(),
        });
    }
}

// ==========================================
// FieldMapper
// ==========================================
#[derive(Debug, Clone)]
pub struct FieldMapper {
    keyword_fallback: bool,
}

impl FieldMapper {
    pub fn new(keyword_fallback: bool) -> Self {
        Self { keyword_fallback }
    }

    /// 解析一行
    ///
    /// # 参数
    /// - row: 原始行
    /// - schema: 当前实体类型的规范字段
    /// - mapping: 列 → 字段映射（可为空，即“无显式映射”模式）
    ///
    /// # 返回
    /// - ResolvedFields: 未解析的字段不出现（MappingGap 仅记录 trace 日志）
    pub fn resolve(&self, row: &RawRow, schema: &[FieldSpec], mapping: &FieldMapping) -> ResolvedFields {
        let mut resolved = ResolvedFields::default();
        let mut claimed: HashSet<String> = HashSet::new();

        // (a) 显式映射
        for spec in schema {
            if let Some(column) = mapping.column_for(spec.name) {
                match row.get(column) {
                    Some(value) => {
                        resolved.insert(spec.name, column, value);
                        claimed.insert(column.to_string());
                    }
                    None => {
                        trace!(field = spec.name, column, "映射的源列在行中不存在");
                    }
                }
            }
        }

        // (b) 同名列
        for spec in schema {
            if resolved.get(spec.name).is_some() {
                continue;
            }
            let hit = row
                .get(spec.name)
                .map(|v| (spec.name, v))
                .or_else(|| row.get_ignore_case(spec.name));
            if let Some((column, value)) = hit {
                if claimed.contains(column) || mapping.is_mapped_column(column) {
                    continue;
                }
                resolved.insert(spec.name, column, value);
                claimed.insert(column.to_string());
            }
        }

        // (c) 关键词猜测
        if self.keyword_fallback {
            for spec in schema {
                if resolved.get(spec.name).is_some() || spec.keywords.is_empty() {
                    continue;
                }
                let hit = row.iter().find(|(column, _)| {
                    if claimed.contains(*column) || mapping.is_mapped_column(column) {
                        return false;
                    }
                    let label = column.to_lowercase();
                    spec.keywords.iter().any(|k| label.contains(k))
                });
                if let Some((column, value)) = hit {
                    trace!(field = spec.name, column, "按关键词匹配到列");
                    resolved.insert(spec.name, column, value);
                    claimed.insert(column.to_string());
                }
            }
        }

        for spec in schema {
            if resolved.get(spec.name).is_none() {
                trace!(field = spec.name, "字段未解析");
            }
        }

        resolved
    }
}
