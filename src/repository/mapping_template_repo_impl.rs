// ==========================================
// 表格导入系统 - 映射模板仓储实现
// ==========================================
// 职责: mapping_template 表读写（使用 rusqlite）
// 约束: 部分唯一索引保证 每类型至多一个 有效默认模板
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::import::MappingTemplate;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::mapping_template_repo::MappingTemplateRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex};
use tracing::info;

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, import_type, description, mapping_json, created_by,
           is_default, is_active, created_at, updated_at
    FROM mapping_template
"#;

// ==========================================
// MappingTemplateRepositoryImpl
// ==========================================
pub struct MappingTemplateRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl MappingTemplateRepositoryImpl {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_table_and_indexes()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_table_and_indexes(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS mapping_template (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL,
              import_type TEXT NOT NULL,
              description TEXT,
              mapping_json TEXT NOT NULL,
              created_by TEXT,
              is_default INTEGER NOT NULL DEFAULT 0,
              is_active INTEGER NOT NULL DEFAULT 1,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_mapping_template_type ON mapping_template(import_type);
            CREATE UNIQUE INDEX IF NOT EXISTS uq_mapping_template_default
              ON mapping_template(import_type) WHERE is_default = 1 AND is_active = 1;
            "#,
        )?;
        Ok(())
    }

    fn map_row(row: &Row) -> rusqlite::Result<(MappingTemplate, String)> {
        let created_at: String = row.get(8)?;
        let updated_at: String = row.get(9)?;
        let mapping_json: String = row.get(4)?;
        Ok((
            MappingTemplate {
                id: Some(row.get(0)?),
                name: row.get(1)?,
                import_type: row.get(2)?,
                description: row.get(3)?,
                mapping: Default::default(),
                created_by: row.get(5)?,
                is_default: row.get::<_, i64>(6)? != 0,
                is_active: row.get::<_, i64>(7)? != 0,
                created_at: parse_timestamp(&created_at),
                updated_at: parse_timestamp(&updated_at),
            },
            mapping_json,
        ))
    }

    fn query_templates(
        conn: &Connection,
        where_clause: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> RepositoryResult<Vec<MappingTemplate>> {
        let sql = format!("{} {}", SELECT_COLUMNS, where_clause);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, Self::map_row)?;

        let mut templates = Vec::new();
        for row in rows {
            let (mut template, mapping_json) = row?;
            template.mapping = serde_json::from_str(&mapping_json)?;
            templates.push(template);
        }
        Ok(templates)
    }

    /// 清除同类型其它默认模板
    fn clear_defaults_tx(tx: &Transaction, import_type: &str, keep_id: i64) -> RepositoryResult<()> {
        tx.execute(
            "UPDATE mapping_template SET is_default = 0, updated_at = ?1 WHERE import_type = ?2 AND id <> ?3 AND is_default = 1",
            params![Utc::now().to_rfc3339(), import_type, keep_id],
        )?;
        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl MappingTemplateRepository for MappingTemplateRepositoryImpl {
    async fn save(&self, template: &MappingTemplate) -> RepositoryResult<i64> {
        let mapping_json = serde_json::to_string(&template.mapping)?;
        let now = Utc::now().to_rfc3339();

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        // 先以非默认插入，再按需切换默认，避免触发部分唯一索引
        tx.execute(
            r#"
            INSERT INTO mapping_template (
              name, import_type, description, mapping_json, created_by,
              is_default, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?7)
            "#,
            params![
                template.name,
                template.import_type,
                template.description,
                mapping_json,
                template.created_by,
                template.is_active as i64,
                now,
            ],
        )?;
        let id = tx.last_insert_rowid();

        if template.is_default && template.is_active {
            Self::clear_defaults_tx(&tx, &template.import_type, id)?;
            tx.execute(
                "UPDATE mapping_template SET is_default = 1 WHERE id = ?1",
                params![id],
            )?;
        }

        tx.commit()?;
        info!(template_id = id, import_type = %template.import_type, "映射模板已保存");
        Ok(id)
    }

    async fn update(&self, template: &MappingTemplate) -> RepositoryResult<()> {
        let id = template.id.ok_or_else(|| RepositoryError::NotFound {
            entity: "MappingTemplate".to_string(),
            id: "None".to_string(),
        })?;
        let mapping_json = serde_json::to_string(&template.mapping)?;
        let now = Utc::now().to_rfc3339();
        let make_default = template.is_default && template.is_active;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        if make_default {
            Self::clear_defaults_tx(&tx, &template.import_type, id)?;
        }

        let affected = tx.execute(
            r#"
            UPDATE mapping_template SET
              name = ?1, import_type = ?2, description = ?3, mapping_json = ?4,
              created_by = ?5, is_default = ?6, is_active = ?7, updated_at = ?8
            WHERE id = ?9
            "#,
            params![
                template.name,
                template.import_type,
                template.description,
                mapping_json,
                template.created_by,
                make_default as i64,
                template.is_active as i64,
                now,
                id,
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "MappingTemplate".to_string(),
                id: id.to_string(),
            });
        }

        tx.commit()?;
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<MappingTemplate>> {
        let conn = self.get_conn()?;
        let mut templates = Self::query_templates(&conn, "WHERE id = ?1", &[&id])?;
        Ok(templates.pop())
    }

    async fn list_by_type(&self, import_type: &str) -> RepositoryResult<Vec<MappingTemplate>> {
        let conn = self.get_conn()?;
        Self::query_templates(
            &conn,
            "WHERE import_type = ?1 AND is_active = 1 ORDER BY name ASC, id ASC",
            &[&import_type],
        )
    }

    async fn find_default(&self, import_type: &str) -> RepositoryResult<Option<MappingTemplate>> {
        let conn = self.get_conn()?;
        let mut templates = Self::query_templates(
            &conn,
            "WHERE import_type = ?1 AND is_active = 1 AND is_default = 1",
            &[&import_type],
        )?;
        Ok(templates.pop())
    }

    async fn set_default(&self, id: i64) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let import_type: Option<String> = tx
            .query_row(
                "SELECT import_type FROM mapping_template WHERE id = ?1 AND is_active = 1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let import_type = import_type.ok_or_else(|| RepositoryError::NotFound {
            entity: "MappingTemplate".to_string(),
            id: id.to_string(),
        })?;

        Self::clear_defaults_tx(&tx, &import_type, id)?;
        tx.execute(
            "UPDATE mapping_template SET is_default = 1, updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;

        tx.commit()?;
        info!(template_id = id, import_type = %import_type, "默认映射模板已切换");
        Ok(())
    }

    async fn soft_delete(&self, id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE mapping_template SET is_active = 0, is_default = 0, updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "MappingTemplate".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn search_by_name(&self, term: &str) -> RepositoryResult<Vec<MappingTemplate>> {
        let pattern = format!("%{}%", term.trim().to_lowercase());
        let conn = self.get_conn()?;
        Self::query_templates(
            &conn,
            "WHERE is_active = 1 AND LOWER(name) LIKE ?1 ORDER BY name ASC, id ASC",
            &[&pattern],
        )
    }

    async fn list_active(&self) -> RepositoryResult<Vec<MappingTemplate>> {
        let conn = self.get_conn()?;
        Self::query_templates(
            &conn,
            "WHERE is_active = 1 ORDER BY import_type ASC, name ASC, id ASC",
            &[],
        )
    }
}
