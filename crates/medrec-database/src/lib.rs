//! # MedRec数据库模块
//!
//! 把核心的逻辑持久化布局映射到PostgreSQL：四张仅追加表
//! （records、consultations、reports、audit_log，只有INSERT/SELECT）
//! 加两张按键替换表（identities按主体、grants按(patient, doctor)）。
//! 任何存储引擎只要复现这一逻辑形状即可兼容。

pub mod connection;
pub mod models;
pub mod queries;

pub use connection::{DatabaseConfig, DatabasePool};
pub use models::*;
pub use queries::LedgerQueries;
