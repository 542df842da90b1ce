//! # MedRec记录模块
//!
//! 三类仅追加的临床数据存储：患者自建记录、医生诊疗条目、
//! 诊断中心检查报告。所有授权检查都委托给注册中心模块，
//! 并在调用时新鲜求值。

pub mod consultations;
pub mod records;
pub mod reports;

pub use consultations::ConsultationLedger;
pub use records::RecordStore;
pub use reports::ReportVault;
