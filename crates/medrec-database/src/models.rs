//! 数据库模型

use chrono::{DateTime, Utc};
use medrec_core::models::*;
use sqlx::FromRow;
use uuid::Uuid;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 身份表行
#[derive(Debug, FromRow)]
pub struct DbIdentity {
    pub principal: String,
    pub external_id: String,
    pub role: String, // 存储为字符串，转换为Role枚举
    pub registered_at: DateTime<Utc>,
}

impl DbIdentity {
    pub fn into_identity(self) -> Option<Identity> {
        Some(Identity {
            principal: Principal::new(self.principal),
            external_id: ExternalId::parse(&self.external_id).ok()?,
            role: role_from_str(&self.role)?,
            registered_at: self.registered_at,
        })
    }
}

/// 授权表行
#[derive(Debug, FromRow)]
pub struct DbGrant {
    pub patient: String,
    pub doctor: String,
    pub active: bool,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub sequence: i64,
}

impl From<DbGrant> for Grant {
    fn from(row: DbGrant) -> Self {
        Grant {
            patient: Principal::new(row.patient),
            doctor: Principal::new(row.doctor),
            active: row.active,
            granted_at: row.granted_at,
            revoked_at: row.revoked_at,
            sequence: row.sequence as u64,
        }
    }
}

/// 记录表行
#[derive(Debug, FromRow)]
pub struct DbRecordEntry {
    pub id: Uuid,
    pub owner: String,
    pub content_hash: String,
    pub record_type: String,
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
}

impl From<DbRecordEntry> for RecordEntry {
    fn from(row: DbRecordEntry) -> Self {
        RecordEntry {
            id: row.id,
            owner: Principal::new(row.owner),
            content_hash: row.content_hash,
            record_type: row.record_type,
            sequence: row.sequence as u64,
            created_at: row.created_at,
        }
    }
}

/// 诊疗条目表行
#[derive(Debug, FromRow)]
pub struct DbConsultationEntry {
    pub id: String,
    pub author: String,
    pub subject: String,
    pub diagnosis: String,
    pub prescription: String,
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
}

impl From<DbConsultationEntry> for ConsultationEntry {
    fn from(row: DbConsultationEntry) -> Self {
        ConsultationEntry {
            id: row.id,
            author: Principal::new(row.author),
            subject: Principal::new(row.subject),
            diagnosis: row.diagnosis,
            prescription: row.prescription,
            sequence: row.sequence as u64,
            created_at: row.created_at,
        }
    }
}

/// 报告表行
#[derive(Debug, FromRow)]
pub struct DbReport {
    pub id: Uuid,
    pub author: String,
    pub subject_patient: String,
    pub assigned_doctor: String,
    pub test_type: String,
    pub content_hash: String,
    pub result_data: String,
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
}

impl From<DbReport> for Report {
    fn from(row: DbReport) -> Self {
        Report {
            id: row.id,
            author: Principal::new(row.author),
            subject_patient: Principal::new(row.subject_patient),
            assigned_doctor: Principal::new(row.assigned_doctor),
            test_type: row.test_type,
            content_hash: row.content_hash,
            result_data: row.result_data,
            sequence: row.sequence as u64,
            created_at: row.created_at,
        }
    }
}

/// 审计日志表行
#[derive(Debug, FromRow)]
pub struct DbAuditEntry {
    pub sequence: i64,
    pub actor: String,
    pub action: String, // 存储为字符串，转换为AuditAction枚举
    pub target: String,
    pub timestamp: DateTime<Utc>,
    pub prev_hash: String,
    pub entry_hash: String,
}

impl DbAuditEntry {
    pub fn into_entry(self) -> Option<AuditEntry> {
        Some(AuditEntry {
            sequence: self.sequence as u64,
            actor: Principal::new(self.actor),
            action: action_from_str(&self.action)?,
            target: self.target,
            timestamp: self.timestamp,
            prev_hash: self.prev_hash,
            entry_hash: self.entry_hash,
        })
    }
}

pub(crate) fn role_from_str(raw: &str) -> Option<Role> {
    match raw {
        "PATIENT" => Some(Role::Patient),
        "DOCTOR" => Some(Role::Doctor),
        "DIAGNOSTIC" => Some(Role::Diagnostic),
        _ => None,
    }
}

pub(crate) fn action_from_str(raw: &str) -> Option<AuditAction> {
    match raw {
        "REGISTER_IDENTITY" => Some(AuditAction::RegisterIdentity),
        "GRANT_ACCESS" => Some(AuditAction::GrantAccess),
        "REVOKE_ACCESS" => Some(AuditAction::RevokeAccess),
        "UPLOAD_RECORD" => Some(AuditAction::UploadRecord),
        "CREATE_CONSULTATION" => Some(AuditAction::CreateConsultation),
        "CREATE_REPORT" => Some(AuditAction::CreateReport),
        _ => None,
    }
}
