//! 临床服务
//!
//! 单写者状态机：全部共享状态放在同一把 `RwLock` 之后。
//! 变更调用持写锁执行——授权检查、主状态变更和审计追加
//! 在同一临界区内完成，要么全部生效要么全部不生效；
//! 读取调用持读锁，可无限并发，始终看到最近一次提交的状态。

use medrec_audit::AuditLog;
use medrec_core::{
    AuditAction, AuditEntry, ConsultationEntry, ExternalId, Grant, Identity, Principal,
    RecordEntry, Report, Result, Role,
};
use medrec_records::{ConsultationLedger, RecordStore, ReportVault};
use medrec_registry::{IdentityRegistry, PermissionIndex};
use tokio::sync::RwLock;
use uuid::Uuid;

/// 全部账本状态
///
/// 授权检查（is_active/role_of/can_access）总是在它所约束的操作
/// 的同一临界区内求值，从不提前到单独的调用里。
#[derive(Debug, Default)]
struct ClinicalState {
    registry: IdentityRegistry,
    permissions: PermissionIndex,
    records: RecordStore,
    consultations: ConsultationLedger,
    reports: ReportVault,
    audit: AuditLog,
}

/// 临床服务
///
/// 对外的命令/查询接口。每个变更调用携带经过认证的调用者主体
/// （由外部钱包/身份协作方提供），成功时恰好产生一条审计条目。
#[derive(Debug, Default)]
pub struct ClinicalService {
    state: RwLock<ClinicalState>,
}

impl ClinicalService {
    /// 创建新的临床服务
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ClinicalState::default()),
        }
    }

    // ========== 身份相关操作 ==========

    /// 注册主体
    ///
    /// 外部标识符在所有角色之间全局唯一；主体不可重复注册。
    pub async fn register(
        &self,
        principal: Principal,
        external_id: &str,
        role: Role,
    ) -> Result<Identity> {
        let external_id = ExternalId::parse(external_id)?;
        let mut state = self.state.write().await;

        let identity = state
            .registry
            .register(principal.clone(), external_id, role)?;
        state.audit.append(
            principal,
            AuditAction::RegisterIdentity,
            identity.external_id.as_str(),
        );
        Ok(identity)
    }

    /// 查询主体角色
    pub async fn role_of(&self, principal: &Principal) -> Option<Role> {
        self.state.read().await.registry.role_of(principal)
    }

    /// 查询主体身份信息
    pub async fn identity(&self, principal: &Principal) -> Option<Identity> {
        self.state.read().await.registry.get(principal).cloned()
    }

    /// 根据外部标识符查询身份
    pub async fn find_identity(&self, external_id: &str) -> Result<Option<Identity>> {
        let external_id = ExternalId::parse(external_id)?;
        Ok(self
            .state
            .read()
            .await
            .registry
            .find_by_external_id(&external_id)
            .cloned())
    }

    // ========== 授权相关操作 ==========

    /// 患者授权医生
    pub async fn grant_access(&self, caller: &Principal, doctor: &Principal) -> Result<Grant> {
        let mut state = self.state.write().await;

        state.registry.require_role(caller, Role::Patient)?;
        state.registry.require_role(doctor, Role::Doctor)?;

        let grant = state.permissions.grant(caller.clone(), doctor.clone())?;
        state
            .audit
            .append(caller.clone(), AuditAction::GrantAccess, doctor.as_str());
        Ok(grant)
    }

    /// 患者撤销医生的授权
    pub async fn revoke_access(&self, caller: &Principal, doctor: &Principal) -> Result<Grant> {
        let mut state = self.state.write().await;

        state.registry.require_role(caller, Role::Patient)?;

        let grant = state.permissions.revoke(caller, doctor)?;
        state
            .audit
            .append(caller.clone(), AuditAction::RevokeAccess, doctor.as_str());
        Ok(grant)
    }

    /// 授权当前是否激活
    pub async fn is_access_active(&self, patient: &Principal, doctor: &Principal) -> bool {
        self.state.read().await.permissions.is_active(patient, doctor)
    }

    /// 患者当前授权的医生列表（授予顺序）
    pub async fn list_grantees(&self, patient: &Principal) -> Vec<Principal> {
        self.state.read().await.permissions.list_grantees(patient)
    }

    /// 医生当前持有授权的患者列表
    pub async fn list_patients(&self, doctor: &Principal) -> Vec<Principal> {
        self.state.read().await.permissions.list_patients(doctor)
    }

    // ========== 患者记录操作 ==========

    /// 患者上传自己的记录
    pub async fn upload_record(
        &self,
        caller: &Principal,
        content_hash: &str,
        record_type: &str,
    ) -> Result<RecordEntry> {
        let mut state = self.state.write().await;

        state.registry.require_role(caller, Role::Patient)?;

        let entry = state
            .records
            .upload(caller.clone(), content_hash, record_type)?;
        state.audit.append(
            caller.clone(),
            AuditAction::UploadRecord,
            &entry.id.to_string(),
        );
        Ok(entry)
    }

    /// 列出患者记录（所有者本人或持激活授权的医生）
    pub async fn list_records(
        &self,
        patient: &Principal,
        requester: &Principal,
    ) -> Result<Vec<RecordEntry>> {
        let state = self.state.read().await;
        state.records.list(patient, requester, &state.permissions)
    }

    // ========== 诊疗条目操作 ==========

    /// 医生为患者创建诊疗条目（要求调用时授权激活）
    pub async fn create_consultation(
        &self,
        caller: &Principal,
        patient: &Principal,
        diagnosis: &str,
        prescription: &str,
    ) -> Result<ConsultationEntry> {
        let mut state = self.state.write().await;

        state.registry.require_role(caller, Role::Doctor)?;
        state.registry.require_role(patient, Role::Patient)?;

        let state = &mut *state;
        let entry = state.consultations.create_entry(
            caller.clone(),
            patient.clone(),
            diagnosis,
            prescription,
            &state.permissions,
        )?;
        state
            .audit
            .append(caller.clone(), AuditAction::CreateConsultation, &entry.id);
        Ok(entry)
    }

    /// 列出患者的诊疗条目（患者见全量历史，其他请求者只见自己署名的）
    pub async fn consultations_for_patient(
        &self,
        patient: &Principal,
        requester: &Principal,
    ) -> Vec<ConsultationEntry> {
        self.state
            .read()
            .await
            .consultations
            .list_for_patient(patient, requester)
    }

    /// 列出医生跨患者撰写的全部条目
    pub async fn consultations_by_doctor(&self, doctor: &Principal) -> Vec<ConsultationEntry> {
        self.state.read().await.consultations.list_by_doctor(doctor)
    }

    // ========== 检查报告操作 ==========

    /// 诊断中心创建检查报告
    ///
    /// 读取能力在创建时固定为 {中心, 患者, 医生}，之后不可更改。
    pub async fn create_report(
        &self,
        caller: &Principal,
        patient: &Principal,
        doctor: &Principal,
        test_type: &str,
        content_hash: &str,
        result_data: &str,
    ) -> Result<Report> {
        let mut state = self.state.write().await;

        state.registry.require_role(caller, Role::Diagnostic)?;
        state.registry.require_role(patient, Role::Patient)?;
        state.registry.require_role(doctor, Role::Doctor)?;

        let state = &mut *state;
        let report = state.reports.create_report(
            caller.clone(),
            patient.clone(),
            doctor.clone(),
            test_type,
            content_hash,
            result_data,
            &state.registry,
        )?;
        state.audit.append(
            caller.clone(),
            AuditAction::CreateReport,
            &report.id.to_string(),
        );
        Ok(report)
    }

    /// 主体是否可以访问指定报告
    pub async fn can_access_report(&self, report_id: &Uuid, principal: &Principal) -> bool {
        self.state.read().await.reports.can_access(report_id, principal)
    }

    /// 获取报告
    pub async fn report(&self, report_id: &Uuid) -> Option<Report> {
        self.state.read().await.reports.get(report_id).cloned()
    }

    /// 列出中心出具的全部报告
    pub async fn reports_by_center(&self, center: &Principal) -> Vec<Report> {
        self.state.read().await.reports.list_by_center(center)
    }

    /// 列出主体可访问的全部报告
    pub async fn reports_for_principal(&self, principal: &Principal) -> Vec<Report> {
        self.state.read().await.reports.list_for_principal(principal)
    }

    // ========== 审计操作 ==========

    /// 审计日志全量查询（追加顺序）
    pub async fn audit_trail(&self) -> Vec<AuditEntry> {
        self.state.read().await.audit.query().to_vec()
    }

    /// 审计条目总数
    pub async fn audit_len(&self) -> usize {
        self.state.read().await.audit.len()
    }

    /// 校验审计哈希链
    pub async fn verify_audit_chain(&self) -> bool {
        self.state.read().await.audit.verify_chain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medrec_core::MedRecError;

    async fn registered_trio(service: &ClinicalService) -> (Principal, Principal, Principal) {
        let patient = Principal::new("0xpat");
        let doctor = Principal::new("0xdoc");
        let center = Principal::new("0xcenter");
        service
            .register(patient.clone(), "240804", Role::Patient)
            .await
            .unwrap();
        service
            .register(doctor.clone(), "090702", Role::Doctor)
            .await
            .unwrap();
        service
            .register(center.clone(), "300001", Role::Diagnostic)
            .await
            .unwrap();
        (patient, doctor, center)
    }

    #[tokio::test]
    async fn test_register_rejects_cross_role_duplicate_id() {
        let service = ClinicalService::new();

        service
            .register(Principal::new("0xpat"), "240804", Role::Patient)
            .await
            .unwrap();
        let err = service
            .register(Principal::new("0xdoc"), "240804", Role::Doctor)
            .await
            .unwrap_err();
        assert!(matches!(err, MedRecError::DuplicateExternalId(_)));
    }

    #[tokio::test]
    async fn test_register_rejects_malformed_external_id() {
        let service = ClinicalService::new();

        let err = service
            .register(Principal::new("0xpat"), "12ab56", Role::Patient)
            .await
            .unwrap_err();
        assert!(matches!(err, MedRecError::InvalidInput(_)));
        // 失败的注册不产生审计条目
        assert_eq!(service.audit_len().await, 0);
    }

    #[tokio::test]
    async fn test_grant_requires_registered_roles() {
        let service = ClinicalService::new();
        let patient = Principal::new("0xpat");
        let doctor = Principal::new("0xdoc");

        // 双方都未注册
        assert!(matches!(
            service.grant_access(&patient, &doctor).await,
            Err(MedRecError::Unregistered(_))
        ));

        service
            .register(patient.clone(), "240804", Role::Patient)
            .await
            .unwrap();
        // 被授权方不是医生
        assert!(matches!(
            service.grant_access(&patient, &patient).await,
            Err(MedRecError::RoleMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_record_round_trip_with_grant() {
        let service = ClinicalService::new();
        let (patient, doctor, _) = registered_trio(&service).await;

        service.upload_record(&patient, "Qm1", "Xray").await.unwrap();

        let owned = service.list_records(&patient, &patient).await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].content_hash, "Qm1");

        // 授权前医生被拒
        assert!(matches!(
            service.list_records(&patient, &doctor).await,
            Err(MedRecError::AccessDenied { .. })
        ));

        service.grant_access(&patient, &doctor).await.unwrap();
        let seen = service.list_records(&patient, &doctor).await.unwrap();
        assert_eq!(seen, owned);
    }

    #[tokio::test]
    async fn test_records_ordered_by_sequence_descending() {
        let service = ClinicalService::new();
        let (patient, _, _) = registered_trio(&service).await;

        for hash in ["Qm1", "Qm2", "Qm3"] {
            service.upload_record(&patient, hash, "Xray").await.unwrap();
        }

        let listed = service.list_records(&patient, &patient).await.unwrap();
        let sequences: Vec<u64> = listed.iter().map(|entry| entry.sequence).collect();
        assert_eq!(sequences, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_report_capability_set() {
        let service = ClinicalService::new();
        let (patient, doctor, center) = registered_trio(&service).await;

        let report = service
            .create_report(&center, &patient, &doctor, "MRI", "QmX", "normal")
            .await
            .unwrap();

        assert!(service.can_access_report(&report.id, &patient).await);
        assert!(service.can_access_report(&report.id, &doctor).await);
        assert!(service.can_access_report(&report.id, &center).await);
        assert!(
            !service
                .can_access_report(&report.id, &Principal::new("0xrandom"))
                .await
        );

        // 报告能力与授权索引无关，撤销也不影响
        assert_eq!(service.reports_for_principal(&doctor).await.len(), 1);
        assert_eq!(service.reports_by_center(&center).await.len(), 1);
    }

    #[tokio::test]
    async fn test_report_requires_diagnostic_author() {
        let service = ClinicalService::new();
        let (patient, doctor, _) = registered_trio(&service).await;

        let err = service
            .create_report(&doctor, &patient, &doctor, "MRI", "QmX", "normal")
            .await
            .unwrap_err();
        assert!(matches!(err, MedRecError::RoleMismatch { .. }));
    }

    #[tokio::test]
    async fn test_audit_completeness() {
        let service = ClinicalService::new();
        let (patient, doctor, center) = registered_trio(&service).await;
        let base = service.audit_len().await;
        assert_eq!(base, 3); // 三次注册各一条

        service.grant_access(&patient, &doctor).await.unwrap();
        assert_eq!(service.audit_len().await, base + 1);

        let entry = service.upload_record(&patient, "Qm1", "Xray").await.unwrap();
        assert_eq!(service.audit_len().await, base + 2);

        let consultation = service
            .create_consultation(&doctor, &patient, "Flu", "Rest")
            .await
            .unwrap();
        assert_eq!(service.audit_len().await, base + 3);

        let report = service
            .create_report(&center, &patient, &doctor, "MRI", "QmX", "normal")
            .await
            .unwrap();
        assert_eq!(service.audit_len().await, base + 4);

        service.revoke_access(&patient, &doctor).await.unwrap();
        assert_eq!(service.audit_len().await, base + 5);

        // target与被变更实体一一对应
        let trail = service.audit_trail().await;
        assert_eq!(trail[base].target, doctor.to_string());
        assert_eq!(trail[base + 1].target, entry.id.to_string());
        assert_eq!(trail[base + 2].target, consultation.id);
        assert_eq!(trail[base + 3].target, report.id.to_string());
        assert_eq!(trail[base + 4].target, doctor.to_string());

        assert!(service.verify_audit_chain().await);
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_no_trace() {
        let service = ClinicalService::new();
        let (patient, doctor, _) = registered_trio(&service).await;
        let base = service.audit_len().await;

        // 无授权的诊疗写入失败：主状态与审计日志都不变
        assert!(service
            .create_consultation(&doctor, &patient, "Flu", "Rest")
            .await
            .is_err());
        assert_eq!(service.audit_len().await, base);
        assert!(service
            .consultations_for_patient(&patient, &patient)
            .await
            .is_empty());

        // 非法内容哈希的上传同理
        assert!(service.upload_record(&patient, "", "Xray").await.is_err());
        assert_eq!(service.audit_len().await, base);
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let service = ClinicalService::new();
        let patient = Principal::new("0xpat");
        let doctor = Principal::new("0xdoc");

        // 患者240804与医生090702注册
        service
            .register(patient.clone(), "240804", Role::Patient)
            .await
            .unwrap();
        service
            .register(doctor.clone(), "090702", Role::Doctor)
            .await
            .unwrap();

        // 患者授权医生，医生写入诊疗条目
        service.grant_access(&patient, &doctor).await.unwrap();
        assert!(service.is_access_active(&patient, &doctor).await);
        service
            .create_consultation(&doctor, &patient, "Flu", "Rest")
            .await
            .unwrap();

        // 患者撤销授权，医生第二次写入被拒
        service.revoke_access(&patient, &doctor).await.unwrap();
        assert!(!service.is_access_active(&patient, &doctor).await);
        let err = service
            .create_consultation(&doctor, &patient, "Cold", "Tea")
            .await
            .unwrap_err();
        assert!(matches!(err, MedRecError::AccessDenied { .. }));

        // 原有条目对患者仍然可见
        let history = service.consultations_for_patient(&patient, &patient).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].diagnosis, "Flu");
        assert_eq!(history[0].prescription, "Rest");

        // 医生也仍能看到自己署名的历史条目
        assert_eq!(service.consultations_by_doctor(&doctor).await.len(), 1);

        assert!(service.verify_audit_chain().await);
    }

    #[tokio::test]
    async fn test_revoke_without_grant_fails() {
        let service = ClinicalService::new();
        let (patient, doctor, _) = registered_trio(&service).await;

        let err = service.revoke_access(&patient, &doctor).await.unwrap_err();
        assert!(matches!(err, MedRecError::NotFound(_)));
        assert_eq!(service.audit_len().await, 3);
    }

    #[tokio::test]
    async fn test_concurrent_reads_do_not_block() {
        let service = std::sync::Arc::new(ClinicalService::new());
        let (patient, _, _) = registered_trio(&service).await;
        service.upload_record(&patient, "Qm1", "Xray").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            let patient = patient.clone();
            handles.push(tokio::spawn(async move {
                service.list_records(&patient, &patient).await.unwrap().len()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 1);
        }
    }
}
