//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MedRecError, Result};
use crate::utils;

/// 主体标识
///
/// 不透明的参与者身份（例如由密钥派生的地址），创建后不可变。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 外部标识符的固定宽度（十进制位数）
pub const EXTERNAL_ID_LEN: usize = 6;

/// 外部标识符
///
/// 面向用户的固定宽度标识符，在所有角色之间全局唯一。
/// 只能通过 [`ExternalId::parse`] 构造，保证格式合法。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    /// 解析并校验外部标识符
    pub fn parse(raw: &str) -> Result<Self> {
        if !utils::is_valid_external_id(raw) {
            return Err(MedRecError::InvalidInput(format!(
                "外部标识符必须为{}位数字: {}",
                EXTERNAL_ID_LEN, raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 主体角色
///
/// 注册时设定，每个主体只有一个角色，之后不可变。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    Patient,    // 患者
    Doctor,     // 医生
    Diagnostic, // 诊断中心
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "PATIENT",
            Role::Doctor => "DOCTOR",
            Role::Diagnostic => "DIAGNOSTIC",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 身份信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub principal: Principal,
    pub external_id: ExternalId,
    pub role: Role,
    pub registered_at: DateTime<Utc>,
}

/// 患者自建的临床文件条目
///
/// 仅追加，所有者是唯一作者。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordEntry {
    pub id: Uuid,
    pub owner: Principal,
    pub content_hash: String, // 外部内容寻址存储返回的不透明哈希
    pub record_type: String,  // 记录类型 (Xray, Lab, Prescription等)
    pub sequence: u64,        // 每个所有者独立的单调序号，从1开始
    pub created_at: DateTime<Utc>,
}

/// 授权关系
///
/// 以 (patient, doctor) 为键，每对至多一条逻辑记录，
/// 只在 Active/Inactive 之间切换，从不复制或删除。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Grant {
    pub patient: Principal,
    pub doctor: Principal,
    pub active: bool,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub sequence: u64, // 全局激活序号，打破granted_at的时间戳平局
}

/// 医生为特定患者撰写的诊疗条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsultationEntry {
    pub id: String, // 复合ID: "<author>:<subject>:<sequence>"，全局唯一
    pub author: Principal,
    pub subject: Principal,
    pub diagnosis: String,
    pub prescription: String,
    pub sequence: u64, // 每个 (author, subject) 对独立的序号
    pub created_at: DateTime<Utc>,
}

impl ConsultationEntry {
    /// 构造复合条目ID
    ///
    /// 合并 `list_for_patient` 与 `list_by_doctor` 结果的调用方
    /// 可以用它做确定性去重。
    pub fn compose_id(author: &Principal, subject: &Principal, sequence: u64) -> String {
        format!("{}:{}:{}", author, subject, sequence)
    }
}

/// 诊断中心出具的检查报告
///
/// 读取能力在创建时固定为 {author, subject_patient, assigned_doctor}，
/// 之后不可更改。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Report {
    pub id: Uuid,
    pub author: Principal,
    pub subject_patient: Principal,
    pub assigned_doctor: Principal,
    pub test_type: String,
    pub content_hash: String,
    pub result_data: String,
    pub sequence: u64, // 全库统一的序号，保证跨中心查询顺序一致
    pub created_at: DateTime<Utc>,
}

impl Report {
    /// 判断主体是否在报告的固定能力集合内
    pub fn grants_access_to(&self, principal: &Principal) -> bool {
        principal == &self.author
            || principal == &self.subject_patient
            || principal == &self.assigned_doctor
    }
}

/// 审计动作类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AuditAction {
    RegisterIdentity,
    GrantAccess,
    RevokeAccess,
    UploadRecord,
    CreateConsultation,
    CreateReport,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::RegisterIdentity => "REGISTER_IDENTITY",
            AuditAction::GrantAccess => "GRANT_ACCESS",
            AuditAction::RevokeAccess => "REVOKE_ACCESS",
            AuditAction::UploadRecord => "UPLOAD_RECORD",
            AuditAction::CreateConsultation => "CREATE_CONSULTATION",
            AuditAction::CreateReport => "CREATE_REPORT",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 审计日志条目
///
/// 仅追加、全序。`prev_hash`/`entry_hash` 构成SHA-256哈希链，
/// 在非账本后端上保留可验证的完整历史。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEntry {
    pub sequence: u64, // 全局序号，从1开始
    pub actor: Principal,
    pub action: AuditAction,
    pub target: String, // 被变更实体的标识
    pub timestamp: DateTime<Utc>,
    pub prev_hash: String,
    pub entry_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_id_parse() {
        assert!(ExternalId::parse("240804").is_ok());
        assert!(ExternalId::parse("090702").is_ok());

        // 长度错误
        assert!(ExternalId::parse("12345").is_err());
        assert!(ExternalId::parse("1234567").is_err());
        // 非数字
        assert!(ExternalId::parse("12a456").is_err());
        assert!(ExternalId::parse("").is_err());
    }

    #[test]
    fn test_consultation_compose_id() {
        let doctor = Principal::new("0xdoc");
        let patient = Principal::new("0xpat");

        let id = ConsultationEntry::compose_id(&doctor, &patient, 3);
        assert_eq!(id, "0xdoc:0xpat:3");

        // 不同序号产生不同ID
        assert_ne!(id, ConsultationEntry::compose_id(&doctor, &patient, 4));
    }

    #[test]
    fn test_report_capability_set() {
        let report = Report {
            id: Uuid::new_v4(),
            author: Principal::new("0xcenter"),
            subject_patient: Principal::new("0xpat"),
            assigned_doctor: Principal::new("0xdoc"),
            test_type: "MRI".to_string(),
            content_hash: "QmX".to_string(),
            result_data: "normal".to_string(),
            sequence: 1,
            created_at: Utc::now(),
        };

        assert!(report.grants_access_to(&Principal::new("0xcenter")));
        assert!(report.grants_access_to(&Principal::new("0xpat")));
        assert!(report.grants_access_to(&Principal::new("0xdoc")));
        assert!(!report.grants_access_to(&Principal::new("0xrandom")));
    }
}
