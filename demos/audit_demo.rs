//! 审计日志演示程序
//!
//! 展示仅追加审计日志的全序、按主体过滤和哈希链校验

use medrec_core::{Principal, Role};
use medrec_service::{init_logging, ClinicalService, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::load(None)?;
    init_logging(&config.logging);

    let service = ClinicalService::new();

    println!("📜 MedRec 审计日志演示\n");

    let patient = Principal::new("0x5b38da6a701c568545dcfcb03fcb875f56beddc4");
    let doctor = Principal::new("0x617f2e2fd72fd9d5503197092ac168c91465e7f2");

    service.register(patient.clone(), "240804", Role::Patient).await?;
    service.register(doctor.clone(), "090702", Role::Doctor).await?;

    // 一串变更调用，每次成功恰好追加一条审计条目
    service.grant_access(&patient, &doctor).await?;
    service.upload_record(&patient, "Qm1", "Xray").await?;
    service.upload_record(&patient, "Qm2", "Lab").await?;
    service.create_consultation(&doctor, &patient, "Flu", "Rest").await?;
    service.revoke_access(&patient, &doctor).await?;

    // 失败的调用不留痕迹
    let before = service.audit_len().await;
    let _ = service.create_consultation(&doctor, &patient, "Cold", "Tea").await;
    assert_eq!(service.audit_len().await, before);
    println!("✅ 失败的变更不产生审计条目");

    println!("\n全量日志:");
    for entry in service.audit_trail().await {
        println!(
            "   #{} [{}] {} {} -> {}",
            entry.sequence,
            entry.timestamp.format("%H:%M:%S%.3f"),
            entry.actor,
            entry.action,
            entry.target
        );
    }

    let patient_entries: Vec<_> = service
        .audit_trail()
        .await
        .into_iter()
        .filter(|entry| entry.actor == patient)
        .collect();
    println!("\n患者触发的条目: {}", patient_entries.len());

    println!("🔗 哈希链校验: {}", service.verify_audit_chain().await);

    Ok(())
}
