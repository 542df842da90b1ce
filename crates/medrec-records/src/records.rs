//! 患者自建记录存储
//!
//! 仅追加的临床文件条目，所有者是唯一作者。
//! 读取权限为：所有者本人，或当前持有激活授权的医生。

use medrec_core::{utils, MedRecError, Principal, RecordEntry, Result};
use medrec_registry::PermissionIndex;
use std::collections::HashMap;
use uuid::Uuid;

/// 记录存储
#[derive(Debug, Default)]
pub struct RecordStore {
    entries: HashMap<Principal, Vec<RecordEntry>>, // 按所有者分组，追加顺序即序号顺序
}

impl RecordStore {
    /// 创建新的记录存储
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// 上传记录条目
    ///
    /// 只有患者本人可以创建自己的记录——服务层在角色检查后
    /// 把经过认证的调用者作为owner传入。序号按所有者单调分配。
    pub fn upload(
        &mut self,
        owner: Principal,
        content_hash: &str,
        record_type: &str,
    ) -> Result<RecordEntry> {
        if !utils::is_valid_content_hash(content_hash) {
            return Err(MedRecError::InvalidInput(format!(
                "内容哈希格式无效: {:?}",
                content_hash
            )));
        }
        if record_type.trim().is_empty() {
            return Err(MedRecError::InvalidInput("记录类型不能为空".to_string()));
        }

        let owned = self.entries.entry(owner.clone()).or_default();
        let entry = RecordEntry {
            id: Uuid::new_v4(),
            owner: owner.clone(),
            content_hash: content_hash.to_string(),
            record_type: record_type.to_string(),
            sequence: owned.len() as u64 + 1,
            created_at: chrono::Utc::now(),
        };
        owned.push(entry.clone());

        tracing::info!(
            "Uploaded record {} (seq {}) for {}",
            entry.id,
            entry.sequence,
            owner
        );
        Ok(entry)
    }

    /// 列出患者的记录
    ///
    /// requester等于患者本人，或在授权索引中持有激活授权时放行。
    /// 结果按序号降序——时间戳可能碰撞，序号才是决定顺序的权威。
    pub fn list(
        &self,
        patient: &Principal,
        requester: &Principal,
        permissions: &PermissionIndex,
    ) -> Result<Vec<RecordEntry>> {
        if requester != patient && !permissions.is_active(patient, requester) {
            tracing::warn!("Denied record access: {} -> records of {}", requester, patient);
            return Err(MedRecError::AccessDenied {
                principal: requester.to_string(),
                resource: format!("records of {}", patient),
            });
        }

        let mut result: Vec<RecordEntry> = self
            .entries
            .get(patient)
            .map(|owned| owned.clone())
            .unwrap_or_default();
        result.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        Ok(result)
    }

    /// 患者的记录条目数
    pub fn count(&self, patient: &Principal) -> usize {
        self.entries.get(patient).map(|owned| owned.len()).unwrap_or(0)
    }
}
