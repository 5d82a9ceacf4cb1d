// ==========================================
// 表格导入系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (scope_id + key → value)
// ==========================================

use crate::config::import_config::ImportConfig;
use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::importer::error::{ImportError, ImportResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::debug;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ImportResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等），并确保 config_kv 表存在。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ImportResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| ImportError::InternalError(format!("锁获取失败: {}", e)))?;
            crate::db::configure_sqlite_connection(&guard)?;
            guard.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS config_kv (
                  scope_id TEXT NOT NULL DEFAULT 'global',
                  key TEXT NOT NULL,
                  value TEXT NOT NULL,
                  updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                  PRIMARY KEY (scope_id, key)
                );
                "#,
            )?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> ImportResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ImportError::InternalError(format!("锁获取失败: {}", e)))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ImportResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> ImportResult<String> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 读取并解析配置值，缺省时返回 default
    fn get_parsed<T: FromStr>(&self, key: &str, default: T) -> ImportResult<T> {
        match self.get_global_config_value(key)? {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<T>().map_err(|_| ImportError::ConfigValueError {
                key: key.to_string(),
                value: raw.clone(),
                message: format!("无法解析为 {}", std::any::type_name::<T>()),
            }),
        }
    }

    /// 读取可选数值（空串或 "none" 视为不限）
    fn get_optional_u64(&self, key: &str) -> ImportResult<Option<u64>> {
        match self.get_global_config_value(key)? {
            None => Ok(None),
            Some(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
                    return Ok(None);
                }
                trimmed
                    .parse::<u64>()
                    .map(Some)
                    .map_err(|_| ImportError::ConfigValueError {
                        key: key.to_string(),
                        value: raw.clone(),
                        message: "无法解析为非负整数".to_string(),
                    })
            }
        }
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn load_import_config(&self) -> ImportResult<ImportConfig> {
        let defaults = ImportConfig::default();

        let country_code = self
            .get_global_config_value(config_keys::DEFAULT_COUNTRY_CODE)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.default_country_code);
        if country_code.len() < 2
            || !country_code.starts_with('+')
            || !country_code[1..].chars().all(|c| c.is_ascii_digit())
        {
            return Err(ImportError::ConfigValueError {
                key: config_keys::DEFAULT_COUNTRY_CODE.to_string(),
                value: country_code,
                message: "国家码须形如 +90".to_string(),
            });
        }

        let config = ImportConfig {
            default_country_code: country_code,
            chunk_size: self.get_parsed(config_keys::CHUNK_SIZE, defaults.chunk_size)?,
            chunk_pause_ms: self.get_parsed(config_keys::CHUNK_PAUSE_MS, defaults.chunk_pause_ms)?,
            job_ttl_secs: self.get_parsed(config_keys::JOB_TTL_SECS, defaults.job_ttl_secs)?,
            keyword_fallback: self
                .get_parsed(config_keys::KEYWORD_FALLBACK, defaults.keyword_fallback)?,
            chunk_timeout_ms: self.get_optional_u64(config_keys::CHUNK_TIMEOUT_MS)?,
            job_deadline_secs: self.get_optional_u64(config_keys::JOB_DEADLINE_SECS)?,
            create_missing_organizations: self.get_parsed(
                config_keys::CREATE_MISSING_ORGANIZATIONS,
                defaults.create_missing_organizations,
            )?,
            create_missing_groups: self
                .get_parsed(config_keys::CREATE_MISSING_GROUPS, defaults.create_missing_groups)?,
        };

        debug!(?config, "导入配置已加载");
        Ok(config)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 电话规范化
    pub const DEFAULT_COUNTRY_CODE: &str = "import.default_country_code";

    // 异步分块
    pub const CHUNK_SIZE: &str = "import.chunk_size";
    pub const CHUNK_PAUSE_MS: &str = "import.chunk_pause_ms";
    pub const CHUNK_TIMEOUT_MS: &str = "import.chunk_timeout_ms";
    pub const JOB_DEADLINE_SECS: &str = "import.job_deadline_secs";
    pub const JOB_TTL_SECS: &str = "import.job_ttl_secs";

    // 映射
    pub const KEYWORD_FALLBACK: &str = "import.keyword_fallback";

    // 引用自动创建
    pub const CREATE_MISSING_ORGANIZATIONS: &str = "import.create_missing_organizations";
    pub const CREATE_MISSING_GROUPS: &str = "import.create_missing_groups";
}
