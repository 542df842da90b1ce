//! # MedRec审计模块
//!
//! 跨全部组件的仅追加变更日志。不存在任何修改或删除接口；
//! SHA-256哈希链在非账本后端上保留可验证的完整历史。

pub mod log;

pub use log::AuditLog;
