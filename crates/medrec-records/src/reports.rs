//! 检查报告库
//!
//! 诊断中心出具的检查报告。读取能力在创建时固定为
//! {作者中心, 受检患者, 指定医生}，之后不可更改，
//! 不依赖授权索引的后续变化。

use medrec_core::{utils, MedRecError, Principal, Report, Result, Role};
use medrec_registry::IdentityRegistry;
use std::collections::HashMap;
use uuid::Uuid;

/// 报告库
#[derive(Debug, Default)]
pub struct ReportVault {
    reports: Vec<Report>,
    by_id: HashMap<Uuid, usize>,
    by_center: HashMap<Principal, Vec<usize>>,
}

impl ReportVault {
    /// 创建新的报告库
    pub fn new() -> Self {
        Self {
            reports: Vec::new(),
            by_id: HashMap::new(),
            by_center: HashMap::new(),
        }
    }

    /// 创建检查报告
    ///
    /// 作者必须是诊断中心角色，在同一事务内对照注册中心检查。
    /// 序号为全库统一的计数，按中心查询与按主体查询共享同一全序。
    pub fn create_report(
        &mut self,
        center: Principal,
        patient: Principal,
        doctor: Principal,
        test_type: &str,
        content_hash: &str,
        result_data: &str,
        registry: &IdentityRegistry,
    ) -> Result<Report> {
        registry.require_role(&center, Role::Diagnostic)?;

        if test_type.trim().is_empty() {
            return Err(MedRecError::InvalidInput("检查类型不能为空".to_string()));
        }
        if !utils::is_valid_content_hash(content_hash) {
            return Err(MedRecError::InvalidInput(format!(
                "内容哈希格式无效: {:?}",
                content_hash
            )));
        }

        let report = Report {
            id: Uuid::new_v4(),
            author: center.clone(),
            subject_patient: patient,
            assigned_doctor: doctor,
            test_type: test_type.to_string(),
            content_hash: content_hash.to_string(),
            result_data: result_data.to_string(),
            sequence: self.reports.len() as u64 + 1,
            created_at: chrono::Utc::now(),
        };

        let index = self.reports.len();
        self.by_id.insert(report.id, index);
        self.by_center.entry(center.clone()).or_default().push(index);
        self.reports.push(report.clone());

        tracing::info!(
            "Created report {} (seq {}) by {}",
            report.id,
            report.sequence,
            center
        );
        Ok(report)
    }

    /// 主体是否在报告的固定能力集合内（未知ID返回false）
    pub fn can_access(&self, report_id: &Uuid, principal: &Principal) -> bool {
        self.by_id
            .get(report_id)
            .map(|&index| self.reports[index].grants_access_to(principal))
            .unwrap_or(false)
    }

    /// 获取报告
    pub fn get(&self, report_id: &Uuid) -> Option<&Report> {
        self.by_id.get(report_id).map(|&index| &self.reports[index])
    }

    /// 列出中心出具的全部报告（序号降序）
    pub fn list_by_center(&self, center: &Principal) -> Vec<Report> {
        self.by_center
            .get(center)
            .map(|indices| {
                indices
                    .iter()
                    .rev()
                    .map(|&index| self.reports[index].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 列出主体可访问的全部报告（按能力集合过滤，序号降序）
    pub fn list_for_principal(&self, principal: &Principal) -> Vec<Report> {
        self.reports
            .iter()
            .rev()
            .filter(|report| report.grants_access_to(principal))
            .cloned()
            .collect()
    }

    /// 报告总数
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}
