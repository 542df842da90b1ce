//! 审计日志
//!
//! 每个变更调用恰好产生一条审计条目，全局全序。
//! 条目哈希覆盖前一条的哈希，任何篡改都会使后续整条链失效。

use chrono::{DateTime, Utc};
use medrec_core::{AuditAction, AuditEntry, Principal};
use sha2::{Digest, Sha256};

/// 创世前驱哈希
const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// 审计日志
#[derive(Debug)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
    last_hash: String,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    /// 创建新的审计日志
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            last_hash: GENESIS_HASH.to_string(),
        }
    }

    /// 追加审计条目，返回新条目的序号（从1开始）
    ///
    /// 追加本身不会失败——调用方先完成主状态变更的全部校验，
    /// 再在同一事务内调用append，保证两半要么都可见要么都不可见。
    pub fn append(&mut self, actor: Principal, action: AuditAction, target: &str) -> u64 {
        let sequence = self.entries.len() as u64 + 1;
        let timestamp = Utc::now();
        let entry_hash = Self::compute_hash(
            &self.last_hash,
            sequence,
            &actor,
            action,
            target,
            &timestamp,
        );

        let entry = AuditEntry {
            sequence,
            actor: actor.clone(),
            action,
            target: target.to_string(),
            timestamp,
            prev_hash: self.last_hash.clone(),
            entry_hash: entry_hash.clone(),
        };
        self.entries.push(entry);
        self.last_hash = entry_hash;

        tracing::info!("Audit #{}: {} {} {}", sequence, actor, action, target);
        sequence
    }

    /// 按追加顺序返回全部条目
    pub fn query(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// 条目总数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 某主体触发的全部条目（追加顺序）
    pub fn entries_for_actor(&self, actor: &Principal) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|entry| &entry.actor == actor)
            .collect()
    }

    /// 重算整条哈希链并校验
    pub fn verify_chain(&self) -> bool {
        let mut prev_hash = GENESIS_HASH.to_string();
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.sequence != index as u64 + 1 || entry.prev_hash != prev_hash {
                return false;
            }
            let expected = Self::compute_hash(
                &prev_hash,
                entry.sequence,
                &entry.actor,
                entry.action,
                &entry.target,
                &entry.timestamp,
            );
            if entry.entry_hash != expected {
                return false;
            }
            prev_hash = entry.entry_hash.clone();
        }
        true
    }

    fn compute_hash(
        prev_hash: &str,
        sequence: u64,
        actor: &Principal,
        action: AuditAction,
        target: &str,
        timestamp: &DateTime<Utc>,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(prev_hash.as_bytes());
        hasher.update(sequence.to_be_bytes());
        hasher.update(actor.as_str().as_bytes());
        hasher.update(action.as_str().as_bytes());
        hasher.update(target.as_bytes());
        hasher.update(timestamp.to_rfc3339().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_assigns_total_order() {
        let mut log = AuditLog::new();
        let actor = Principal::new("0xpat");

        let first = log.append(actor.clone(), AuditAction::RegisterIdentity, "240804");
        let second = log.append(actor.clone(), AuditAction::UploadRecord, "rec-1");

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(log.len(), 2);

        let entries = log.query();
        assert_eq!(entries[0].action, AuditAction::RegisterIdentity);
        assert_eq!(entries[1].target, "rec-1");
    }

    #[test]
    fn test_hash_chain_links_entries() {
        let mut log = AuditLog::new();
        let actor = Principal::new("0xpat");

        log.append(actor.clone(), AuditAction::RegisterIdentity, "240804");
        log.append(actor.clone(), AuditAction::GrantAccess, "0xdoc");

        let entries = log.query();
        assert_eq!(entries[0].prev_hash, GENESIS_HASH);
        assert_eq!(entries[1].prev_hash, entries[0].entry_hash);
        assert!(log.verify_chain());
    }

    #[test]
    fn test_verify_chain_detects_tampering() {
        let mut log = AuditLog::new();
        let actor = Principal::new("0xpat");

        log.append(actor.clone(), AuditAction::RegisterIdentity, "240804");
        log.append(actor.clone(), AuditAction::GrantAccess, "0xdoc");
        assert!(log.verify_chain());

        // 直接篡改已有条目
        log.entries[0].target = "999999".to_string();
        assert!(!log.verify_chain());
    }

    #[test]
    fn test_entries_for_actor() {
        let mut log = AuditLog::new();
        let patient = Principal::new("0xpat");
        let doctor = Principal::new("0xdoc");

        log.append(patient.clone(), AuditAction::RegisterIdentity, "240804");
        log.append(doctor.clone(), AuditAction::RegisterIdentity, "090702");
        log.append(patient.clone(), AuditAction::GrantAccess, "0xdoc");

        assert_eq!(log.entries_for_actor(&patient).len(), 2);
        assert_eq!(log.entries_for_actor(&doctor).len(), 1);
    }

    #[test]
    fn test_empty_chain_verifies() {
        let log = AuditLog::new();
        assert!(log.is_empty());
        assert!(log.verify_chain());
    }
}
