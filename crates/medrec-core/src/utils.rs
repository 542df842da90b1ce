//! 通用校验工具函数

use crate::models::EXTERNAL_ID_LEN;

/// 校验外部标识符格式（固定宽度的十进制数字）
pub fn is_valid_external_id(id: &str) -> bool {
    id.len() == EXTERNAL_ID_LEN && id.chars().all(|c| c.is_ascii_digit())
}

/// 校验内容哈希格式
///
/// 内容哈希由外部内容寻址存储产生，核心只做形式检查，从不解释字节内容。
pub fn is_valid_content_hash(hash: &str) -> bool {
    !hash.is_empty() && hash.len() <= 128 && hash.chars().all(|c| c.is_ascii_graphic())
}
