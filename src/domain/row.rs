// ==========================================
// 表格导入系统 - 原始行与字段映射
// ==========================================
// 职责: RawRow（有序 列名→单元格）/ FieldMapping（列 → 规范字段）
// 约定: 映射方向固定为 源列 → 规范字段
// ==========================================

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

/// 缺失表头的占位列名（1-based）
pub fn placeholder_column(index: usize) -> String {
    format!("Column{}", index + 1)
}

// ==========================================
// RawRow - 原始行
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由 (列名, 值) 序列构造，保持顺序
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut row = Self::new();
        for (column, value) in pairs {
            row.insert(column, value);
        }
        row
    }

    /// 由表头 + 单元格构造
    ///
    /// # 规则
    /// - 空白表头、缺失表头、重复表头 → 使用位置占位名 `Column{n}`
    /// - 表头多于单元格时，缺失单元格视为空串
    pub fn from_cells(headers: &[String], cells: &[String]) -> Self {
        let width = headers.len().max(cells.len());
        let mut row = Self::new();

        for idx in 0..width {
            let label = headers
                .get(idx)
                .map(|h| h.trim())
                .filter(|h| !h.is_empty() && row.get(h).is_none())
                .map(str::to_string)
                .unwrap_or_else(|| placeholder_column(idx));
            let value = cells.get(idx).map(|c| c.trim()).unwrap_or("");
            row.cells.push((label, value.to_string()));
        }

        row
    }

    /// 写入单元格（同名列覆盖原值，位置不变）
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(c, _)| *c == column) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    /// 大小写不敏感查找，返回 (实际列名, 值)
    pub fn get_ignore_case(&self, column: &str) -> Option<(&str, &str)> {
        self.cells
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(column))
            .map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// 所有单元格均为空白
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.trim().is_empty())
    }
}

impl Serialize for RawRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RawRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RawRowVisitor;

        impl<'de> Visitor<'de> for RawRowVisitor {
            type Value = RawRow;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of column -> cell value")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RawRow, A::Error> {
                let mut row = RawRow::new();
                while let Some((column, value)) =
                    access.next_entry::<String, serde_json::Value>()?
                {
                    row.insert(column, cell_to_string(value));
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RawRowVisitor)
    }
}

/// JSON 单元格 → 文本（数字/布尔转字符串，null 视为空）
fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

// ==========================================
// TabularData - 表格读取结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabularData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TabularData {
    /// 转换为 RawRow 列表（跳过完全空白的行）
    pub fn into_raw_rows(self) -> Vec<RawRow> {
        self.rows
            .iter()
            .map(|cells| RawRow::from_cells(&self.headers, cells))
            .filter(|row| !row.is_blank())
            .collect()
    }

    /// 预览：保留表头与前 limit 个非空白行
    pub fn preview(self, limit: usize) -> TabularData {
        let rows = self
            .rows
            .into_iter()
            .filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
            .take(limit)
            .collect();
        TabularData {
            headers: self.headers,
            rows,
        }
    }
}

// ==========================================
// FieldMapping - 列 → 规范字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
    pub source_column: String,
    pub canonical_field: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping {
    entries: Vec<MappingEntry>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, C, F>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, F)>,
        C: Into<String>,
        F: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(c, f)| MappingEntry {
                    source_column: c.into(),
                    canonical_field: f.into(),
                })
                .collect(),
        }
    }

    pub fn push(&mut self, source_column: impl Into<String>, canonical_field: impl Into<String>) {
        self.entries.push(MappingEntry {
            source_column: source_column.into(),
            canonical_field: canonical_field.into(),
        });
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 字段对应的源列（重复目标时后者生效）
    pub fn column_for(&self, canonical_field: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.canonical_field == canonical_field)
            .map(|e| e.source_column.as_str())
    }

    /// 源列是否已被显式映射
    pub fn is_mapped_column(&self, column: &str) -> bool {
        self.entries.iter().any(|e| e.source_column == column)
    }

    /// 被多个源列映射的规范字段（按首次出现顺序）
    pub fn duplicate_targets(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut duplicates: Vec<String> = Vec::new();
        for entry in &self.entries {
            if !seen.insert(entry.canonical_field.as_str())
                && !duplicates.contains(&entry.canonical_field)
            {
                duplicates.push(entry.canonical_field.clone());
            }
        }
        duplicates
    }
}
