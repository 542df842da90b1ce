//! # MedRec
//!
//! 临床记录访问控制与审计核心的门面crate，重新导出常用类型。

pub use medrec_core::{
    AuditAction, AuditEntry, ConsultationEntry, ExternalId, Grant, Identity, MedRecError,
    Principal, RecordEntry, Report, Result, Role,
};
pub use medrec_service::{init_logging, ClinicalService, ServiceConfig};
