//! 身份注册中心
//!
//! 身份唯一性的单一权威：外部标识符的占用检查针对一张共享表，
//! 而不是三张各角色独立维护的表，杜绝跨角色重复标识符。

use medrec_core::{ExternalId, Identity, MedRecError, Principal, Result, Role};
use std::collections::HashMap;

/// 身份注册中心
///
/// 各角色的"表"只是注册中心之上的视图（见 [`IdentityRegistry::list_by_role`]）。
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    identities: HashMap<Principal, Identity>,
    external_ids: HashMap<ExternalId, Principal>, // 跨角色共享的唯一性索引
}

impl IdentityRegistry {
    /// 创建新的身份注册中心
    pub fn new() -> Self {
        Self {
            identities: HashMap::new(),
            external_ids: HashMap::new(),
        }
    }

    /// 注册新主体
    ///
    /// 外部标识符若已绑定到任何主体（不限角色）则失败；
    /// 主体重复注册同样失败。角色注册后不可变。
    pub fn register(
        &mut self,
        principal: Principal,
        external_id: ExternalId,
        role: Role,
    ) -> Result<Identity> {
        if self.identities.contains_key(&principal) {
            return Err(MedRecError::DuplicateRegistration(principal.to_string()));
        }
        if self.external_ids.contains_key(&external_id) {
            return Err(MedRecError::DuplicateExternalId(external_id.to_string()));
        }

        let identity = Identity {
            principal: principal.clone(),
            external_id: external_id.clone(),
            role,
            registered_at: chrono::Utc::now(),
        };

        self.external_ids.insert(external_id, principal.clone());
        self.identities.insert(principal.clone(), identity.clone());

        tracing::info!("Registered {} as {} ({})", principal, role, identity.external_id);
        Ok(identity)
    }

    /// 查询主体角色，未注册返回None
    pub fn role_of(&self, principal: &Principal) -> Option<Role> {
        self.identities.get(principal).map(|identity| identity.role)
    }

    /// 要求主体已注册且持有指定角色
    pub fn require_role(&self, principal: &Principal, expected: Role) -> Result<()> {
        match self.role_of(principal) {
            None => Err(MedRecError::Unregistered(principal.to_string())),
            Some(actual) if actual != expected => Err(MedRecError::RoleMismatch {
                principal: principal.to_string(),
                expected: expected.as_str().to_string(),
                actual: actual.as_str().to_string(),
            }),
            Some(_) => Ok(()),
        }
    }

    /// 获取主体的身份信息
    pub fn get(&self, principal: &Principal) -> Option<&Identity> {
        self.identities.get(principal)
    }

    /// 根据外部标识符反查主体
    pub fn find_by_external_id(&self, external_id: &ExternalId) -> Option<&Identity> {
        self.external_ids
            .get(external_id)
            .and_then(|principal| self.identities.get(principal))
    }

    /// 按角色列出身份（注册时间升序）
    pub fn list_by_role(&self, role: Role) -> Vec<&Identity> {
        let mut result: Vec<&Identity> = self
            .identities
            .values()
            .filter(|identity| identity.role == role)
            .collect();
        result.sort_by(|a, b| {
            a.registered_at
                .cmp(&b.registered_at)
                .then_with(|| a.external_id.cmp(&b.external_id))
        });
        result
    }

    /// 已注册主体数量
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}
