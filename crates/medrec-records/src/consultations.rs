//! 诊疗条目账本
//!
//! 医生为特定患者撰写的诊断/处方条目，仅在持有激活授权时可写。
//! 存储采用arena加索引表（而非条目间的双向引用）：
//! 条目只保存一份，按患者和按作者的视图都是下标索引。

use medrec_core::{ConsultationEntry, MedRecError, Principal, Result};
use medrec_registry::PermissionIndex;
use std::collections::HashMap;

/// 诊疗账本
#[derive(Debug, Default)]
pub struct ConsultationLedger {
    entries: Vec<ConsultationEntry>,
    by_patient: HashMap<Principal, Vec<usize>>,
    by_author: HashMap<Principal, Vec<usize>>,
    pair_counters: HashMap<(Principal, Principal), u64>, // (author, subject) -> 已用序号
}

impl ConsultationLedger {
    /// 创建新的诊疗账本
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            by_patient: HashMap::new(),
            by_author: HashMap::new(),
            pair_counters: HashMap::new(),
        }
    }

    /// 创建诊疗条目
    ///
    /// 写入时（而非更早）检查医生对患者的授权是否激活，
    /// 关闭检查与使用之间的竞态窗口。
    pub fn create_entry(
        &mut self,
        doctor: Principal,
        patient: Principal,
        diagnosis: &str,
        prescription: &str,
        permissions: &PermissionIndex,
    ) -> Result<ConsultationEntry> {
        if !permissions.is_active(&patient, &doctor) {
            tracing::warn!("Denied consultation write: {} for {}", doctor, patient);
            return Err(MedRecError::AccessDenied {
                principal: doctor.to_string(),
                resource: format!("consultations of {}", patient),
            });
        }
        if diagnosis.trim().is_empty() {
            return Err(MedRecError::InvalidInput("诊断内容不能为空".to_string()));
        }
        if prescription.trim().is_empty() {
            return Err(MedRecError::InvalidInput("处方内容不能为空".to_string()));
        }

        let counter = self
            .pair_counters
            .entry((doctor.clone(), patient.clone()))
            .or_insert(0);
        *counter += 1;
        let sequence = *counter;

        let entry = ConsultationEntry {
            id: ConsultationEntry::compose_id(&doctor, &patient, sequence),
            author: doctor.clone(),
            subject: patient.clone(),
            diagnosis: diagnosis.to_string(),
            prescription: prescription.to_string(),
            sequence,
            created_at: chrono::Utc::now(),
        };

        let index = self.entries.len();
        self.entries.push(entry.clone());
        self.by_patient.entry(patient.clone()).or_default().push(index);
        self.by_author.entry(doctor.clone()).or_default().push(index);

        tracing::info!("Created consultation {} by {} for {}", entry.id, doctor, patient);
        Ok(entry)
    }

    /// 列出患者的诊疗条目
    ///
    /// 患者本人看到所有医生写下的完整历史——所有权带来全量
    /// 历史可见性，不受之后撤销授权的影响。其他请求者只能
    /// 看到自己署名的条目（作者身份是对自己条目的永久读取能力，
    /// 从未署名者得到空集）。最新条目在前。
    pub fn list_for_patient(
        &self,
        patient: &Principal,
        requester: &Principal,
    ) -> Vec<ConsultationEntry> {
        let indices = match self.by_patient.get(patient) {
            Some(indices) => indices,
            None => return Vec::new(),
        };

        indices
            .iter()
            .rev()
            .map(|&index| &self.entries[index])
            .filter(|entry| requester == patient || &entry.author == requester)
            .cloned()
            .collect()
    }

    /// 列出医生跨患者撰写的全部条目（最新在前）
    pub fn list_by_doctor(&self, doctor: &Principal) -> Vec<ConsultationEntry> {
        self.by_author
            .get(doctor)
            .map(|indices| {
                indices
                    .iter()
                    .rev()
                    .map(|&index| self.entries[index].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 账本中的条目总数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
