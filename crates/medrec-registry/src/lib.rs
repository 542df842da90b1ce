//! # MedRec注册中心模块
//!
//! 提供身份注册（唯一性的单一权威）与患者-医生授权索引，
//! 是其余所有组件进行角色检查和访问控制的基础。

pub mod identity;
pub mod permissions;

pub use identity::IdentityRegistry;
pub use permissions::PermissionIndex;
