//! 临床服务演示程序
//!
//! 展示完整的授权生命周期：注册、授权、写入、撤销、历史可见性

use medrec_core::{Principal, Role};
use medrec_service::{init_logging, ClinicalService, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置并初始化日志
    let config = ServiceConfig::load(None)?;
    init_logging(&config.logging);

    let service = ClinicalService::new();

    println!("🏥 MedRec 临床服务演示\n");

    // 1. 注册三类主体
    let patient = Principal::new("0x8ba1f109551bd432803012645ac136ddd64dba72");
    let doctor = Principal::new("0xab8483f64d9c6d1ecf9b849ae677dd3315835cb2");
    let center = Principal::new("0x4b20993bc481177ec7e8f571cecae8a9e22c02db");

    service.register(patient.clone(), "240804", Role::Patient).await?;
    service.register(doctor.clone(), "090702", Role::Doctor).await?;
    service.register(center.clone(), "300001", Role::Diagnostic).await?;
    println!("✅ 患者 240804、医生 090702、诊断中心 300001 注册完成");

    // 2. 患者上传自己的记录
    let record = service.upload_record(&patient, "QmXoypizjW3WknFiJnKL", "Xray").await?;
    println!("✅ 患者上传记录 {} (序号 {})", record.id, record.sequence);

    // 3. 授权前医生无法读取
    match service.list_records(&patient, &doctor).await {
        Err(e) => println!("🚫 授权前医生读取被拒: {}", e),
        Ok(_) => unreachable!(),
    }

    // 4. 患者授权医生
    service.grant_access(&patient, &doctor).await?;
    let visible = service.list_records(&patient, &doctor).await?;
    println!("✅ 授权后医生可见 {} 条记录", visible.len());

    // 5. 医生写入诊疗条目
    let consultation = service
        .create_consultation(&doctor, &patient, "Flu", "Rest")
        .await?;
    println!("✅ 医生写入诊疗条目 {}", consultation.id);

    // 6. 诊断中心出具报告，能力集合创建时固定
    let report = service
        .create_report(&center, &patient, &doctor, "MRI", "QmReportHash", "normal")
        .await?;
    println!(
        "✅ 报告 {}: 患者可读={} 医生可读={} 陌生人可读={}",
        report.id,
        service.can_access_report(&report.id, &patient).await,
        service.can_access_report(&report.id, &doctor).await,
        service
            .can_access_report(&report.id, &Principal::new("0xdead"))
            .await,
    );

    // 7. 患者撤销授权
    service.revoke_access(&patient, &doctor).await?;
    match service.create_consultation(&doctor, &patient, "Cold", "Tea").await {
        Err(e) => println!("🚫 撤销后医生写入被拒: {}", e),
        Ok(_) => unreachable!(),
    }

    // 8. 患者仍看到完整历史
    let history = service.consultations_for_patient(&patient, &patient).await;
    println!("✅ 撤销后患者仍可见 {} 条诊疗历史", history.len());

    // 9. 审计日志记录了每一次变更
    println!("\n📜 审计日志 ({} 条):", service.audit_len().await);
    for entry in service.audit_trail().await {
        println!("   #{} {} {} -> {}", entry.sequence, entry.actor, entry.action, entry.target);
    }
    println!("\n🔗 哈希链校验: {}", service.verify_audit_chain().await);

    Ok(())
}
