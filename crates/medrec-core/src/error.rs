//! 错误定义模块

use thiserror::Error;

/// MedRec系统统一错误类型
///
/// 每个变体都携带出错的字段，客户端可以直接生成可操作的提示信息，
/// 而不暴露内部行状态。
#[derive(Error, Debug)]
pub enum MedRecError {
    #[error("外部标识符已被占用: {0}")]
    DuplicateExternalId(String),

    #[error("主体已注册: {0}")]
    DuplicateRegistration(String),

    #[error("主体未注册: {0}")]
    Unregistered(String),

    #[error("角色不匹配: {principal} 需要 {expected}, 实际为 {actual}")]
    RoleMismatch {
        principal: String,
        expected: String,
        actual: String,
    },

    #[error("访问被拒绝: {principal} 无权访问 {resource}")]
    AccessDenied {
        principal: String,
        resource: String,
    },

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// MedRec系统统一结果类型
pub type Result<T> = std::result::Result<T, MedRecError>;
