// ==========================================
// 表格导入系统 - 冲突处理器实现
// ==========================================
// 职责: 检测同批次内重复自然键（所有实体类型统一规则）
// 约定: 自然键在记录成功落库时才被占用
// ==========================================

use crate::domain::record::{EntityKind, NormalizedRecord};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct ConflictHandler {
    claimed: HashSet<(EntityKind, String)>,
}

impl ConflictHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 检测重复
    ///
    /// # 返回
    /// - Some(message): 自然键已被本批次先前的行占用
    /// - None: 未重复（或记录无自然键）
    pub fn detect_duplicate(&self, record: &NormalizedRecord) -> Option<String> {
        let key = record.natural_key()?;
        if self.claimed.contains(&(record.kind(), key.value.clone())) {
            Some(format!("duplicate {} in file: {}", key.field, key.value))
        } else {
            None
        }
    }

    /// 占用自然键（记录落库后调用）
    pub fn claim(&mut self, record: &NormalizedRecord) {
        if let Some(key) = record.natural_key() {
            self.claimed.insert((record.kind(), key.value));
        }
    }

    pub fn claimed_count(&self) -> usize {
        self.claimed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{OrganizationRecord, UserRecord};

    fn org(external_id: &str) -> NormalizedRecord {
        NormalizedRecord::Organization(OrganizationRecord {
            external_id: Some(external_id.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_detect_duplicates_none() {
        let mut handler = ConflictHandler::new();
        handler.claim(&org("ORG1"));

        assert_eq!(handler.detect_duplicate(&org("ORG2")), None);
    }

    #[test]
    fn test_detect_duplicates_found() {
        let mut handler = ConflictHandler::new();
        handler.claim(&org("ORG1"));

        assert_eq!(
            handler.detect_duplicate(&org("ORG1")),
            Some("duplicate externalId in file: ORG1".to_string())
        );
    }

    #[test]
    fn test_unclaimed_key_is_not_duplicate() {
        let handler = ConflictHandler::new();
        assert_eq!(handler.detect_duplicate(&org("ORG1")), None);
        assert_eq!(handler.claimed_count(), 0);
    }

    #[test]
    fn test_user_email_key_and_kind_scoping() {
        let mut handler = ConflictHandler::new();
        let user = NormalizedRecord::User(UserRecord {
            emails: vec!["ada@x.com".to_string()],
            ..Default::default()
        });
        handler.claim(&user);

        assert_eq!(
            handler.detect_duplicate(&user),
            Some("duplicate email in file: ada@x.com".to_string())
        );
        // 不同类型的同值键互不冲突
        assert_eq!(handler.detect_duplicate(&org("ada@x.com")), None);
    }
}
