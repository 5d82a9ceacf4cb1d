// ==========================================
// 表格导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::import_config::ImportConfig;
use crate::importer::error::ImportResult;
use async_trait::async_trait;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 读取完整导入配置
    ///
    /// # 返回
    /// - Ok(ImportConfig): 缺失的键使用默认值
    /// - Err(ConfigValueError): 某个键的值无法解析
    async fn load_import_config(&self) -> ImportResult<ImportConfig>;
}
