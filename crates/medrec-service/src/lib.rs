//! # MedRec服务模块
//!
//! 把身份注册、授权索引、三类记录存储和审计日志组合为一个
//! 单写者事务边界：每个变更调用都是一次原子的、可串行化的事务，
//! 读取永不阻塞、永不读到撕裂状态。

pub mod config;
pub mod service;

pub use config::{init_logging, LoggingConfig, ServiceConfig};
pub use service::ClinicalService;
