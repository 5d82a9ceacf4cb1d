// ==========================================
// 表格导入系统 - 实体仓储实现
// ==========================================
// 职责: 实现规范化记录持久化（使用 rusqlite）
// 存储: imported_entity 表，(kind, natural_key) 为主键，记录体以 JSON 存储
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::record::{EntityKind, NormalizedRecord};
use crate::repository::entity_repo::EntityRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use tracing::debug;

// ==========================================
// EntityRepositoryImpl
// ==========================================
pub struct EntityRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl EntityRepositoryImpl {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 复用已有连接（与其它仓储共享同一数据库）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_table()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS imported_entity (
              kind TEXT NOT NULL,
              natural_key TEXT NOT NULL,
              payload TEXT NOT NULL,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              PRIMARY KEY (kind, natural_key)
            );
            "#,
        )?;
        Ok(())
    }
}

#[async_trait]
impl EntityRepository for EntityRepositoryImpl {
    async fn find_by_natural_key(
        &self,
        kind: EntityKind,
        natural_key: &str,
    ) -> RepositoryResult<Option<NormalizedRecord>> {
        let conn = self.get_conn()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM imported_entity WHERE kind = ?1 AND natural_key = ?2",
                params![kind.as_str(), natural_key],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, record: &NormalizedRecord) -> RepositoryResult<String> {
        let key = record.natural_key().ok_or_else(|| {
            RepositoryError::ValidationError(format!("{} 记录缺少自然键", record.kind()))
        })?;
        let payload = serde_json::to_string(record)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO imported_entity (kind, natural_key, payload, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(kind, natural_key) DO UPDATE SET
              payload = excluded.payload,
              updated_at = excluded.updated_at
            "#,
            params![record.kind().as_str(), key.value, payload, now],
        )?;

        debug!(kind = %record.kind(), key = %key.value, "实体已保存");
        Ok(key.value)
    }

    async fn count_by_kind(&self, kind: EntityKind) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM imported_entity WHERE kind = ?1",
            params![kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
