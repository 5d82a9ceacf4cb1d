// ==========================================
// 表格导入系统 - 导入配置
// ==========================================
// 职责: 导入管道与异步任务的全部可调参数
// 来源: config_kv 表（缺省时使用 Default）
// ==========================================

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// 10 位裸号码补全的国家码
    pub default_country_code: String,
    /// 异步任务每块行数
    pub chunk_size: usize,
    /// 块间停顿（毫秒）
    pub chunk_pause_ms: u64,
    /// 终态任务保留时长（秒）
    pub job_ttl_secs: u64,
    /// 未映射字段是否按关键词猜测列
    pub keyword_fallback: bool,
    /// 单块超时（毫秒），None 表示不限
    pub chunk_timeout_ms: Option<u64>,
    /// 任务总时限（秒），None 表示不限
    pub job_deadline_secs: Option<u64>,
    /// 用户/工单导入时自动创建缺失组织
    pub create_missing_organizations: bool,
    /// 用户/工单导入时自动创建缺失分组
    pub create_missing_groups: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            default_country_code: "+90".to_string(),
            chunk_size: 100,
            chunk_pause_ms: 10,
            job_ttl_secs: 3600,
            keyword_fallback: true,
            chunk_timeout_ms: None,
            job_deadline_secs: None,
            create_missing_organizations: true,
            create_missing_groups: true,
        }
    }
}

impl ImportConfig {
    /// 块大小（至少为 1）
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }

    pub fn chunk_pause(&self) -> Duration {
        Duration::from_millis(self.chunk_pause_ms)
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    pub fn chunk_timeout(&self) -> Option<Duration> {
        self.chunk_timeout_ms.map(Duration::from_millis)
    }

    pub fn job_deadline(&self) -> Option<Duration> {
        self.job_deadline_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ImportConfig::default();
        assert_eq!(config.default_country_code, "+90");
        assert_eq!(config.chunk_size, 100);
        assert_eq!(config.chunk_pause(), Duration::from_millis(10));
        assert!(config.chunk_timeout().is_none());
    }

    #[test]
    fn test_effective_chunk_size_never_zero() {
        let config = ImportConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert_eq!(config.effective_chunk_size(), 1);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ImportConfig = serde_json::from_str(r#"{"chunk_size": 5}"#).unwrap();
        assert_eq!(config.chunk_size, 5);
        assert_eq!(config.job_ttl_secs, 3600);
    }
}
