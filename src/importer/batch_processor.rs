// ==========================================
// 表格导入系统 - 批处理器
// ==========================================
// 流程: 字段映射 → 构建(+引用解析) → 校验 → 批内查重 → 持久化
// 红线: 行级错误只进入 failures，不中断批次
// ==========================================

use crate::config::ImportConfig;
use crate::domain::import::{BatchResult, ImportSequence, RowFailure};
use crate::domain::row::{FieldMapping, RawRow};
use crate::importer::conflict_handler::ConflictHandler;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::entity_builder::BuildContext;
use crate::importer::error::ImportResult;
use crate::importer::field_mapper::FieldMapper;
use crate::importer::reference_resolver::ReferenceResolver;
use crate::importer::registry::{ImportHandler, ImportRegistry};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

// ==========================================
// BatchRun - 单次运行状态
// ==========================================
/// 单次导入运行
///
/// 持有运行期状态（已占用自然键、ID 序列、引用缓存），
/// 可由任务跟踪器按分块驱动。
pub struct BatchRun {
    handler: Arc<ImportHandler>,
    mapping: FieldMapping,
    mapper: FieldMapper,
    cleaner: DataCleaner,
    resolver: ReferenceResolver,
    conflicts: ConflictHandler,
    sequence: ImportSequence,
    config: ImportConfig,
    result: BatchResult,
}

impl BatchRun {
    pub fn new(handler: Arc<ImportHandler>, mapping: FieldMapping, config: &ImportConfig) -> Self {
        let duplicates = mapping.duplicate_targets();
        if !duplicates.is_empty() {
            warn!(
                import_type = handler.tag,
                fields = ?duplicates,
                "映射中存在重复目标字段，以最后一条为准"
            );
        }

        Self {
            mapper: FieldMapper::new(config.keyword_fallback),
            cleaner: DataCleaner::from_config(config),
            resolver: ReferenceResolver::new(handler.persister.clone()),
            conflicts: ConflictHandler::new(),
            sequence: ImportSequence::new(),
            result: BatchResult::new(handler.tag),
            config: config.clone(),
            mapping,
            handler,
        }
    }

    /// 处理一个分块
    ///
    /// # 参数
    /// - rows: 本块行
    /// - offset: 本块首行在整批中的下标（0-based），用于行号
    pub async fn process_chunk(&mut self, rows: &[RawRow], offset: usize) {
        self.process_chunk_until(rows, offset, None).await;
    }

    /// 在截止时间内处理一个分块
    ///
    /// 每行处理后检查墙钟时间；同步阻塞的持久化同样受限。
    ///
    /// # 返回
    /// - true: 本块全部行在截止前处理完
    /// - false: 已超过截止时间，剩余行未处理
    pub async fn process_chunk_until(
        &mut self,
        rows: &[RawRow],
        offset: usize,
        deadline: Option<Instant>,
    ) -> bool {
        for (i, row) in rows.iter().enumerate() {
            self.process_row(row, offset + i + 1).await;
            if deadline.map_or(false, |d| Instant::now() >= d) {
                debug!(processed = i + 1, chunk_rows = rows.len(), "分块超过截止时间");
                return false;
            }
        }
        true
    }

    /// 处理单行（row_number 为 1-based）
    async fn process_row(&mut self, row: &RawRow, row_number: usize) {
        let fields = self
            .mapper
            .resolve(row, self.handler.builder.schema(), &self.mapping);

        let built = {
            let mut ctx = BuildContext {
                cleaner: &self.cleaner,
                resolver: &self.resolver,
                sequence: &mut self.sequence,
                config: &self.config,
            };
            self.handler.builder.build(&fields, &mut ctx).await
        };

        let record = match built {
            Ok(record) => record,
            Err(e) => {
                debug!(row_number, error = %e, "行构建失败");
                self.fail(row, row_number, vec![e.row_message()]);
                return;
            }
        };

        let mut errors = self.handler.validator.validate(&record).into_errors();
        if let Some(duplicate) = self.conflicts.detect_duplicate(&record) {
            errors.push(duplicate);
        }
        if !errors.is_empty() {
            self.fail(row, row_number, errors);
            return;
        }

        match self.handler.persister.save(&record).await {
            Ok(identifier) => {
                self.conflicts.claim(&record);
                self.result.record_success(identifier);
            }
            Err(e) => {
                warn!(row_number, error = %e, "行持久化失败");
                self.fail(row, row_number, vec![format!("persistence failed: {}", e)]);
            }
        }
    }

    fn fail(&mut self, row: &RawRow, row_number: usize, errors: Vec<String>) {
        self.result.record_failure(RowFailure {
            row_number,
            original_row: row.clone(),
            errors,
        });
    }

    /// 当前累计结果
    pub fn result(&self) -> &BatchResult {
        &self.result
    }

    pub fn import_type(&self) -> &'static str {
        self.handler.tag
    }

    pub fn finish(self) -> BatchResult {
        self.result
    }
}

// ==========================================
// BatchProcessor - 同步批量入口
// ==========================================
pub struct BatchProcessor {
    registry: Arc<ImportRegistry>,
    config: ImportConfig,
}

impl BatchProcessor {
    pub fn new(registry: Arc<ImportRegistry>, config: ImportConfig) -> Self {
        Self { registry, config }
    }

    /// 执行一次完整批量导入
    ///
    /// # 返回
    /// - Ok(BatchResult): 每行要么计入成功，要么出现在 failures
    /// - Err(UnsupportedImportType): 未处理任何行
    #[instrument(skip(self, rows, mapping), fields(import_type = %import_type, rows = rows.len()))]
    pub async fn run(
        &self,
        import_type: &str,
        rows: &[RawRow],
        mapping: &FieldMapping,
    ) -> ImportResult<BatchResult> {
        let handler = self.registry.dispatch(import_type)?;
        let mut run = BatchRun::new(handler, mapping.clone(), &self.config);
        run.process_chunk(rows, 0).await;
        let result = run.finish();

        info!(
            import_type = %result.import_type,
            total = result.total_records,
            success = result.success_count,
            errors = result.error_count,
            "批量导入完成"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{EntityRepository, EntityRepositoryImpl};

    fn processor() -> (BatchProcessor, Arc<dyn EntityRepository>) {
        let repo: Arc<dyn EntityRepository> =
            Arc::new(EntityRepositoryImpl::new(":memory:").unwrap());
        let registry = Arc::new(ImportRegistry::new(repo.clone()));
        (BatchProcessor::new(registry, ImportConfig::default()), repo)
    }

    #[tokio::test]
    async fn test_row_numbers_and_count_invariant() {
        let (processor, _repo) = processor();
        let rows = vec![
            RawRow::from_pairs(vec![("name", "Support")]),
            RawRow::from_pairs(vec![("name", "")]),
            RawRow::from_pairs(vec![("name", "Sales")]),
        ];

        let result = processor
            .run("group", &rows, &FieldMapping::new())
            .await
            .unwrap();

        assert_eq!(result.import_type, "group");
        assert_eq!(result.success_count, 2);
        assert_eq!(result.error_count, 1);
        assert_eq!(result.success_count + result.error_count, result.total_records);
        assert_eq!(result.failures[0].row_number, 2);
        assert_eq!(result.failures[0].errors, vec!["name required".to_string()]);
        assert_eq!(result.failures[0].original_row, rows[1]);
    }

    #[tokio::test]
    async fn test_oversized_scientific_phone_fails_only_its_row() {
        let (processor, _repo) = processor();
        let rows = vec![
            RawRow::from_pairs(vec![
                ("externalId", "U1"),
                ("firstName", "Ada"),
                ("phone", "1E99999999999999999"),
            ]),
            RawRow::from_pairs(vec![("externalId", "U2"), ("firstName", "Bob")]),
        ];

        let result = processor
            .run("user", &rows, &FieldMapping::new())
            .await
            .unwrap();

        assert_eq!(result.success_count, 1);
        assert_eq!(result.error_count, 1);
        assert_eq!(result.saved_identifiers, vec!["U2".to_string()]);
        assert_eq!(result.failures[0].row_number, 1);
        assert!(result.failures[0]
            .errors
            .contains(&"invalid phone: 1E99999999999999999".to_string()));
    }

    #[tokio::test]
    async fn test_chunk_stops_after_deadline() {
        let (processor, _repo) = processor();
        let handler = processor.registry.dispatch("group").unwrap();
        let mut run = BatchRun::new(handler, FieldMapping::new(), &ImportConfig::default());
        let rows = vec![
            RawRow::from_pairs(vec![("name", "Support")]),
            RawRow::from_pairs(vec![("name", "Sales")]),
            RawRow::from_pairs(vec![("name", "Billing")]),
        ];

        let completed = run
            .process_chunk_until(&rows, 0, Some(Instant::now()))
            .await;

        assert!(!completed);
        assert_eq!(run.result().total_records, 1);

        let completed = run.process_chunk_until(&rows[1..], 1, None).await;
        assert!(completed);
        assert_eq!(run.result().total_records, 3);
    }

    #[tokio::test]
    async fn test_duplicate_key_in_same_batch() {
        let (processor, repo) = processor();
        let rows = vec![
            RawRow::from_pairs(vec![("externalId", "ORG1"), ("name", "Acme")]),
            RawRow::from_pairs(vec![("externalId", "ORG1"), ("name", "Acme 2")]),
        ];

        let result = processor
            .run("organization", &rows, &FieldMapping::new())
            .await
            .unwrap();

        assert_eq!(result.saved_identifiers, vec!["ORG1".to_string()]);
        assert_eq!(result.error_count, 1);
        assert!(result.failures[0].errors[0].starts_with("duplicate externalId in file"));
        assert_eq!(
            repo.count_by_kind(crate::domain::record::EntityKind::Organization)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_coercion_rejection_is_row_scoped() {
        let (processor, _repo) = processor();
        let rows = vec![
            RawRow::from_pairs(vec![
                ("externalId", "T1"),
                ("subject", "Printer broken"),
                ("createdAt", "yesterday"),
            ]),
            RawRow::from_pairs(vec![("externalId", "T2"), ("subject", "Login issue")]),
        ];

        let result = processor
            .run("ticket", &rows, &FieldMapping::new())
            .await
            .unwrap();

        assert_eq!(result.success_count, 1);
        assert_eq!(result.failures[0].row_number, 1);
        assert!(result.failures[0].errors[0].starts_with("invalid createdAt: 'yesterday'"));
    }

    #[tokio::test]
    async fn test_unknown_type_touches_no_rows() {
        let (processor, _repo) = processor();
        let rows = vec![RawRow::from_pairs(vec![("name", "x")])];

        let result = processor.run("invoice", &rows, &FieldMapping::new()).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_chunked_run_continues_row_numbers() {
        let (processor, _repo) = processor();
        let handler = processor.registry.dispatch("group").unwrap();
        let mut run = BatchRun::new(handler, FieldMapping::new(), &ImportConfig::default());

        run.process_chunk(&[RawRow::from_pairs(vec![("name", "A")])], 0)
            .await;
        run.process_chunk(
            &[
                RawRow::from_pairs(vec![("name", "B")]),
                RawRow::from_pairs(vec![("name", "A")]),
            ],
            1,
        )
        .await;

        let result = run.finish();
        assert_eq!(result.success_count, 2);
        assert_eq!(result.failures[0].row_number, 3);
        assert_eq!(
            result.failures[0].errors,
            vec!["duplicate name in file: A".to_string()]
        );
    }
}
