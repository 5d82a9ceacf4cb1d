// ==========================================
// 表格导入系统 - 导入API
// ==========================================
// 职责: 同步批量导入 / 异步任务 / 映射模板管理的统一入口
// 约定: 只有类型级或输入格式错误以 Err 返回；行级错误在 BatchResult 中
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfig, ImportConfigReader};
use crate::db::open_sqlite_connection;
use crate::domain::import::{
    BatchResult, FieldInfo, ImportJob, JobProgress, MappingTemplate, ValidationResult,
};
use crate::domain::record::NormalizedRecord;
use crate::domain::row::{FieldMapping, RawRow, TabularData};
use crate::engine::JobTracker;
use crate::importer::batch_processor::BatchProcessor;
use crate::importer::error::ImportError;
use crate::importer::file_parser::{FileParser, UniversalFileParser};
use crate::importer::registry::ImportRegistry;
use crate::repository::{
    EntityRepository, EntityRepositoryImpl, MappingTemplateRepository,
    MappingTemplateRepositoryImpl,
};
use chrono::Utc;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

/// 文件预览默认行数
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

/// 导入API
pub struct ImportApi {
    registry: Arc<ImportRegistry>,
    templates: Arc<dyn MappingTemplateRepository>,
    processor: BatchProcessor,
    jobs: JobTracker,
    config: ImportConfig,
}

impl ImportApi {
    /// 打开数据库并装配全部组件
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（实体、模板、配置共用一个连接）
    pub async fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        let conn = Arc::new(Mutex::new(conn));

        let config = ConfigManager::from_connection(conn.clone())?
            .load_import_config()
            .await?;
        let entities: Arc<dyn EntityRepository> =
            Arc::new(EntityRepositoryImpl::from_connection(conn.clone())?);
        let templates: Arc<dyn MappingTemplateRepository> =
            Arc::new(MappingTemplateRepositoryImpl::from_connection(conn)?);

        info!(db_path, "导入API已初始化");
        Ok(Self::with_components(
            Arc::new(ImportRegistry::new(entities)),
            templates,
            config,
        ))
    }

    /// 使用外部组件装配（测试或自定义持久化）
    pub fn with_components(
        registry: Arc<ImportRegistry>,
        templates: Arc<dyn MappingTemplateRepository>,
        config: ImportConfig,
    ) -> Self {
        Self {
            processor: BatchProcessor::new(registry.clone(), config.clone()),
            jobs: JobTracker::new(registry.clone(), config.clone()),
            registry,
            templates,
            config,
        }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    // ==========================================
    // 同步批量导入
    // ==========================================

    /// 同步批量导入
    ///
    /// # 返回
    /// - Ok(BatchResult): success_count + error_count == total_records
    /// - Err(UnsupportedImportType): 未处理任何行
    pub async fn run_batch_import(
        &self,
        import_type: &str,
        rows: Vec<RawRow>,
        mapping: &FieldMapping,
    ) -> ApiResult<BatchResult> {
        Ok(self.processor.run(import_type, &rows, mapping).await?)
    }

    /// 使用映射模板导入
    ///
    /// # 参数
    /// - template_id: 指定模板；None 时使用该类型的默认模板（无默认则不做显式映射）
    #[instrument(skip(self, rows), fields(import_type = %import_type, rows = rows.len()))]
    pub async fn run_template_import(
        &self,
        import_type: &str,
        rows: Vec<RawRow>,
        template_id: Option<i64>,
    ) -> ApiResult<BatchResult> {
        let tag = self.canonical_type(import_type)?;

        let mapping = match template_id {
            Some(id) => {
                let template = self.get_template(id).await?;
                if !template.is_active {
                    return Err(ApiError::InvalidInput(format!("映射模板{}已删除", id)));
                }
                if template.import_type != tag {
                    return Err(ApiError::InvalidInput(format!(
                        "映射模板{}属于{}导入，不能用于{}",
                        id, template.import_type, tag
                    )));
                }
                template.mapping
            }
            None => match self.templates.find_default(&tag).await? {
                Some(template) => template.mapping,
                None => {
                    warn!(import_type = %tag, "无默认映射模板，按列名匹配");
                    FieldMapping::new()
                }
            },
        };

        self.run_batch_import(&tag, rows, &mapping).await
    }

    /// 导入表格文件（CSV / XLSX）
    #[instrument(skip(self, mapping), fields(import_type = %import_type, path = %file_path.display()))]
    pub async fn import_file(
        &self,
        import_type: &str,
        file_path: &Path,
        mapping: &FieldMapping,
    ) -> ApiResult<BatchResult> {
        // 类型错误优先于文件错误
        self.canonical_type(import_type)?;

        let data = UniversalFileParser.parse(file_path)?;
        let rows = data.into_raw_rows();
        info!(rows = rows.len(), "文件解析完成");

        self.run_batch_import(import_type, rows, mapping).await
    }

    /// 仅校验（不持久化）
    pub fn validate_only(
        &self,
        import_type: &str,
        record: &NormalizedRecord,
    ) -> ApiResult<ValidationResult> {
        let handler = self.registry.dispatch(import_type)?;
        Ok(handler.validator.validate(record))
    }

    // ==========================================
    // 映射界面辅助
    // ==========================================

    /// 支持的导入类型（规范标签，排序）
    pub fn supported_types(&self) -> Vec<String> {
        self.registry
            .canonical_tags()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// 导入类型的规范字段（schema 顺序）及是否必填
    ///
    /// 用户的标识字段三选一（externalId / emails / phone），均不标记为必填
    pub fn import_fields(&self, import_type: &str) -> ApiResult<Vec<FieldInfo>> {
        let handler = self.registry.dispatch(import_type)?;
        Ok(handler
            .builder
            .schema()
            .iter()
            .map(|spec| FieldInfo {
                name: spec.name.to_string(),
                required: spec.required,
            })
            .collect())
    }

    /// 预览表格文件：表头与前 limit 个非空白行
    #[instrument(skip(self), fields(path = %file_path.display()))]
    pub fn preview_file(&self, file_path: &Path, limit: usize) -> ApiResult<TabularData> {
        let preview = UniversalFileParser.parse(file_path)?.preview(limit);
        debug!(
            columns = preview.headers.len(),
            rows = preview.rows.len(),
            "文件预览完成"
        );
        Ok(preview)
    }

    // ==========================================
    // 异步任务
    // ==========================================

    /// 提交异步导入任务（按列名匹配）
    ///
    /// # 返回
    /// - Ok(job_id): 每次调用生成新的 UUID
    pub async fn start_async_import(
        &self,
        import_type: &str,
        rows: Vec<RawRow>,
    ) -> ApiResult<String> {
        self.start_async_import_with_mapping(import_type, rows, FieldMapping::new())
            .await
    }

    pub async fn start_async_import_with_mapping(
        &self,
        import_type: &str,
        rows: Vec<RawRow>,
        mapping: FieldMapping,
    ) -> ApiResult<String> {
        Ok(self.jobs.start(import_type, rows, mapping).await?)
    }

    pub async fn get_job_progress(&self, job_id: &str) -> ApiResult<JobProgress> {
        self.jobs
            .progress(job_id)
            .await
            .ok_or_else(|| ImportError::JobNotFound(job_id.to_string()).into())
    }

    /// 完整任务（含失败行明细）
    pub async fn get_job(&self, job_id: &str) -> ApiResult<ImportJob> {
        self.jobs
            .job(job_id)
            .await
            .ok_or_else(|| ImportError::JobNotFound(job_id.to_string()).into())
    }

    pub async fn list_jobs(&self) -> Vec<JobProgress> {
        self.jobs.list().await
    }

    /// 请求取消（仅 PROCESSING 状态返回 true）
    pub async fn cancel_job(&self, job_id: &str) -> bool {
        self.jobs.cancel(job_id).await
    }

    // ==========================================
    // 映射模板
    // ==========================================

    /// 新建模板
    ///
    /// # 返回
    /// - Ok(i64): 新模板 ID
    /// - Err(InvalidInput): 名称为空
    /// - Err(UnsupportedImportType): 导入类型未注册
    pub async fn save_template(&self, template: &MappingTemplate) -> ApiResult<i64> {
        let template = self.prepare_template(template)?;
        let id = self.templates.save(&template).await?;
        info!(
            template_id = id,
            import_type = %template.import_type,
            is_default = template.is_default,
            "映射模板已保存"
        );
        Ok(id)
    }

    pub async fn update_template(&self, template: &MappingTemplate) -> ApiResult<()> {
        let mut template = self.prepare_template(template)?;
        template.updated_at = Some(Utc::now());
        self.templates.update(&template).await?;
        Ok(())
    }

    pub async fn get_template(&self, id: i64) -> ApiResult<MappingTemplate> {
        self.templates
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("映射模板(id={})不存在", id)))
    }

    /// 某导入类型的有效模板（按名称排序）
    pub async fn list_templates(&self, import_type: &str) -> ApiResult<Vec<MappingTemplate>> {
        let tag = self.canonical_type(import_type)?;
        Ok(self.templates.list_by_type(&tag).await?)
    }

    pub async fn get_default_template(
        &self,
        import_type: &str,
    ) -> ApiResult<Option<MappingTemplate>> {
        let tag = self.canonical_type(import_type)?;
        Ok(self.templates.find_default(&tag).await?)
    }

    pub async fn set_default_template(&self, id: i64) -> ApiResult<()> {
        self.templates.set_default(id).await?;
        info!(template_id = id, "默认映射模板已切换");
        Ok(())
    }

    /// 软删除模板
    pub async fn delete_template(&self, id: i64) -> ApiResult<()> {
        self.templates.soft_delete(id).await?;
        Ok(())
    }

    pub async fn search_templates(&self, term: &str) -> ApiResult<Vec<MappingTemplate>> {
        Ok(self.templates.search_by_name(term).await?)
    }

    pub async fn list_active_templates(&self) -> ApiResult<Vec<MappingTemplate>> {
        Ok(self.templates.list_active().await?)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn canonical_type(&self, import_type: &str) -> ApiResult<String> {
        Ok(self.registry.dispatch(import_type)?.tag.to_string())
    }

    fn prepare_template(&self, template: &MappingTemplate) -> ApiResult<MappingTemplate> {
        if template.name.trim().is_empty() {
            return Err(ApiError::InvalidInput("映射模板名称不能为空".to_string()));
        }
        let mut template = template.clone();
        template.import_type = self.canonical_type(&template.import_type)?;
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::GroupRecord;

    async fn api() -> ImportApi {
        ImportApi::new(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_validate_only_does_not_persist() {
        let api = api().await;
        let record = NormalizedRecord::Group(GroupRecord {
            external_id: None,
            name: Some("Support".to_string()),
        });

        let result = api.validate_only("group", &record).unwrap();

        assert!(result.is_valid());
        let listed = api.list_jobs().await;
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_type_is_an_error() {
        let api = api().await;

        let result = api
            .run_batch_import("invoice", vec![RawRow::new()], &FieldMapping::new())
            .await;

        assert!(matches!(result, Err(ApiError::UnsupportedImportType(_))));
    }

    #[tokio::test]
    async fn test_template_import_type_is_canonicalized() {
        let api = api().await;
        let template = MappingTemplate::new(
            "Contacts",
            "Contact",
            FieldMapping::from_pairs(vec![("Ad", "firstName")]),
        );

        let id = api.save_template(&template).await.unwrap();

        assert_eq!(api.get_template(id).await.unwrap().import_type, "user");
        assert_eq!(api.list_templates("USER").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_template_name_required() {
        let api = api().await;
        let template = MappingTemplate::new("  ", "user", FieldMapping::new());

        let result = api.save_template(&template).await;

        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_supported_types_are_canonical() {
        let api = api().await;

        assert_eq!(
            api.supported_types(),
            vec!["customfield", "group", "organization", "ticket", "user"]
        );
    }

    #[tokio::test]
    async fn test_import_fields_with_required_flags() {
        let api = api().await;

        let fields = api.import_fields("custom-field").unwrap();
        let required: Vec<&str> = fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(required, vec!["key", "type", "name"]);
        assert_eq!(fields[0].name, "key");

        let group = api.import_fields("group").unwrap();
        assert_eq!(
            group,
            vec![
                FieldInfo {
                    name: "externalId".to_string(),
                    required: false
                },
                FieldInfo {
                    name: "name".to_string(),
                    required: true
                },
            ]
        );

        let user = api.import_fields("contact").unwrap();
        assert!(user.iter().any(|f| f.name == "firstName" && f.required));
        assert!(user.iter().any(|f| f.name == "externalId" && !f.required));

        assert!(matches!(
            api.import_fields("invoice"),
            Err(ApiError::UnsupportedImportType(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_job_progress_is_not_found() {
        let api = api().await;
        let result = api.get_job_progress("nope").await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}
