//! 患者-医生授权索引
//!
//! 以 (patient, doctor) 为键的单一索引取代原设计中的双向对象引用。
//! 每对至多一条逻辑授权记录，只在 Active/Inactive 之间切换，
//! 从不复制、从不删除。

use chrono::Utc;
use medrec_core::{Grant, MedRecError, Principal, Result};
use std::collections::HashMap;

/// 授权索引
///
/// 所有受授权约束的操作都在同一事务内新鲜地查询 [`PermissionIndex::is_active`]，
/// 不允许跨调用缓存检查结果。
#[derive(Debug, Default)]
pub struct PermissionIndex {
    grants: HashMap<(Principal, Principal), Grant>,
    activation_counter: u64, // 全局激活序号，打破granted_at的平局
}

impl PermissionIndex {
    /// 创建新的授权索引
    pub fn new() -> Self {
        Self {
            grants: HashMap::new(),
            activation_counter: 0,
        }
    }

    /// 授予或重新激活授权
    ///
    /// 不存在则创建激活状态的记录；存在但失效则重新激活
    /// （清除revoked_at，刷新granted_at和激活序号）；
    /// 已激活则为无操作。三个分支都算一次成功调用。
    pub fn grant(&mut self, patient: Principal, doctor: Principal) -> Result<Grant> {
        let key = (patient.clone(), doctor.clone());

        let grant = match self.grants.get_mut(&key) {
            Some(grant) if grant.active => grant.clone(),
            Some(grant) => {
                self.activation_counter += 1;
                grant.active = true;
                grant.granted_at = Utc::now();
                grant.revoked_at = None;
                grant.sequence = self.activation_counter;
                tracing::info!("Reactivated grant {} -> {}", patient, doctor);
                grant.clone()
            }
            None => {
                self.activation_counter += 1;
                let grant = Grant {
                    patient: patient.clone(),
                    doctor: doctor.clone(),
                    active: true,
                    granted_at: Utc::now(),
                    revoked_at: None,
                    sequence: self.activation_counter,
                };
                self.grants.insert(key, grant.clone());
                tracing::info!("Created grant {} -> {}", patient, doctor);
                grant
            }
        };

        Ok(grant)
    }

    /// 撤销授权
    ///
    /// 该键对从未有过授权记录时返回NotFound。
    pub fn revoke(&mut self, patient: &Principal, doctor: &Principal) -> Result<Grant> {
        let key = (patient.clone(), doctor.clone());

        match self.grants.get_mut(&key) {
            Some(grant) => {
                grant.active = false;
                grant.revoked_at = Some(Utc::now());
                tracing::info!("Revoked grant {} -> {}", patient, doctor);
                Ok(grant.clone())
            }
            None => Err(MedRecError::NotFound(format!(
                "授权记录 {} -> {}",
                patient, doctor
            ))),
        }
    }

    /// 授权当前是否激活
    pub fn is_active(&self, patient: &Principal, doctor: &Principal) -> bool {
        self.grants
            .get(&(patient.clone(), doctor.clone()))
            .map(|grant| grant.active)
            .unwrap_or(false)
    }

    /// 获取授权记录（含已失效的）
    pub fn get(&self, patient: &Principal, doctor: &Principal) -> Option<&Grant> {
        self.grants.get(&(patient.clone(), doctor.clone()))
    }

    /// 列出患者当前授权的医生（granted_at升序，激活序号决平局）
    pub fn list_grantees(&self, patient: &Principal) -> Vec<Principal> {
        let mut active: Vec<&Grant> = self
            .grants
            .values()
            .filter(|grant| grant.active && &grant.patient == patient)
            .collect();
        active.sort_by(|a, b| {
            a.granted_at
                .cmp(&b.granted_at)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
        active.into_iter().map(|grant| grant.doctor.clone()).collect()
    }

    /// 列出医生当前持有授权的患者（医生侧视图，排序规则同上）
    pub fn list_patients(&self, doctor: &Principal) -> Vec<Principal> {
        let mut active: Vec<&Grant> = self
            .grants
            .values()
            .filter(|grant| grant.active && &grant.doctor == doctor)
            .collect();
        active.sort_by(|a, b| {
            a.granted_at
                .cmp(&b.granted_at)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
        active.into_iter().map(|grant| grant.patient.clone()).collect()
    }

    /// 授权记录总数（含已失效的）
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (Principal, Principal) {
        (Principal::new("0xpat"), Principal::new("0xdoc"))
    }

    #[test]
    fn test_grant_activates() {
        let mut index = PermissionIndex::new();
        let (patient, doctor) = pair();

        assert!(!index.is_active(&patient, &doctor));
        index.grant(patient.clone(), doctor.clone()).unwrap();
        assert!(index.is_active(&patient, &doctor));
    }

    #[test]
    fn test_grant_is_idempotent() {
        let mut index = PermissionIndex::new();
        let (patient, doctor) = pair();

        index.grant(patient.clone(), doctor.clone()).unwrap();
        index.grant(patient.clone(), doctor.clone()).unwrap();

        // 两次grant只留下一条逻辑记录
        assert_eq!(index.len(), 1);
        assert!(index.is_active(&patient, &doctor));
    }

    #[test]
    fn test_revoke() {
        let mut index = PermissionIndex::new();
        let (patient, doctor) = pair();

        index.grant(patient.clone(), doctor.clone()).unwrap();
        let grant = index.revoke(&patient, &doctor).unwrap();

        assert!(!grant.active);
        assert!(grant.revoked_at.is_some());
        assert!(!index.is_active(&patient, &doctor));
        // 撤销后记录仍然存在，不删除
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_revoke_without_grant_fails() {
        let mut index = PermissionIndex::new();
        let (patient, doctor) = pair();

        let err = index.revoke(&patient, &doctor).unwrap_err();
        assert!(matches!(err, MedRecError::NotFound(_)));
    }

    #[test]
    fn test_regrant_reactivates_same_row() {
        let mut index = PermissionIndex::new();
        let (patient, doctor) = pair();

        index.grant(patient.clone(), doctor.clone()).unwrap();
        index.revoke(&patient, &doctor).unwrap();
        let regranted = index.grant(patient.clone(), doctor.clone()).unwrap();

        assert_eq!(index.len(), 1);
        assert!(regranted.active);
        assert!(regranted.revoked_at.is_none());
        assert!(index.is_active(&patient, &doctor));
    }

    #[test]
    fn test_list_grantees_ordering() {
        let mut index = PermissionIndex::new();
        let patient = Principal::new("0xpat");
        let doc_a = Principal::new("0xdoc_a");
        let doc_b = Principal::new("0xdoc_b");
        let doc_c = Principal::new("0xdoc_c");

        index.grant(patient.clone(), doc_b.clone()).unwrap();
        index.grant(patient.clone(), doc_a.clone()).unwrap();
        index.grant(patient.clone(), doc_c.clone()).unwrap();
        index.revoke(&patient, &doc_a).unwrap();

        // 只含激活授权，按授予顺序排列（激活序号决平局）
        assert_eq!(index.list_grantees(&patient), vec![doc_b.clone(), doc_c.clone()]);

        // 重新激活后排到末尾
        index.grant(patient.clone(), doc_a.clone()).unwrap();
        assert_eq!(index.list_grantees(&patient), vec![doc_b, doc_c, doc_a]);
    }

    #[test]
    fn test_list_patients_doctor_side_view() {
        let mut index = PermissionIndex::new();
        let doctor = Principal::new("0xdoc");
        let pat_a = Principal::new("0xpat_a");
        let pat_b = Principal::new("0xpat_b");

        index.grant(pat_a.clone(), doctor.clone()).unwrap();
        index.grant(pat_b.clone(), doctor.clone()).unwrap();
        index.revoke(&pat_a, &doctor).unwrap();

        assert_eq!(index.list_patients(&doctor), vec![pat_b]);
    }
}
