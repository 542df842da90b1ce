//! 数据库查询操作
//!
//! 仅追加表只提供INSERT和SELECT；identities与grants是仅有的
//! 两张按键替换表。核心里不存在的操作（UPDATE/DELETE条目）
//! 这里同样不存在。

use crate::connection::DatabasePool;
use crate::models::*;
use medrec_core::{
    AuditEntry, ConsultationEntry, Grant, Identity, MedRecError, Principal, RecordEntry, Report,
    Result,
};
use sqlx::Row;
use uuid::Uuid;

/// 数据库查询操作接口
pub struct LedgerQueries<'a> {
    pool: &'a DatabasePool,
}

impl<'a> LedgerQueries<'a> {
    pub fn new(pool: &'a DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 身份表（按主体替换，外部标识符跨角色唯一）
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS identities (
                principal VARCHAR(128) PRIMARY KEY,
                external_id CHAR(6) UNIQUE NOT NULL,
                role VARCHAR(16) NOT NULL,
                registered_at TIMESTAMP WITH TIME ZONE NOT NULL
            )
        "#).execute(pool).await.map_err(|e| MedRecError::Database(e.to_string()))?;

        // 授权表（按 (patient, doctor) 替换）
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS grants (
                patient VARCHAR(128) NOT NULL,
                doctor VARCHAR(128) NOT NULL,
                active BOOLEAN NOT NULL,
                granted_at TIMESTAMP WITH TIME ZONE NOT NULL,
                revoked_at TIMESTAMP WITH TIME ZONE,
                sequence BIGINT NOT NULL,
                PRIMARY KEY (patient, doctor)
            )
        "#).execute(pool).await.map_err(|e| MedRecError::Database(e.to_string()))?;

        // 记录表（仅追加）
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS records (
                id UUID PRIMARY KEY,
                owner VARCHAR(128) NOT NULL,
                content_hash VARCHAR(128) NOT NULL,
                record_type VARCHAR(64) NOT NULL,
                sequence BIGINT NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL,
                UNIQUE (owner, sequence)
            )
        "#).execute(pool).await.map_err(|e| MedRecError::Database(e.to_string()))?;

        // 诊疗条目表（仅追加，复合ID全局唯一）
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS consultations (
                id VARCHAR(300) PRIMARY KEY,
                author VARCHAR(128) NOT NULL,
                subject VARCHAR(128) NOT NULL,
                diagnosis TEXT NOT NULL,
                prescription TEXT NOT NULL,
                sequence BIGINT NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL,
                UNIQUE (author, subject, sequence)
            )
        "#).execute(pool).await.map_err(|e| MedRecError::Database(e.to_string()))?;

        // 报告表（仅追加，能力集合固化为三列）
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS reports (
                id UUID PRIMARY KEY,
                author VARCHAR(128) NOT NULL,
                subject_patient VARCHAR(128) NOT NULL,
                assigned_doctor VARCHAR(128) NOT NULL,
                test_type VARCHAR(64) NOT NULL,
                content_hash VARCHAR(128) NOT NULL,
                result_data TEXT NOT NULL,
                sequence BIGINT UNIQUE NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL
            )
        "#).execute(pool).await.map_err(|e| MedRecError::Database(e.to_string()))?;

        // 审计日志表（仅追加，全序）
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS audit_log (
                sequence BIGINT PRIMARY KEY,
                actor VARCHAR(128) NOT NULL,
                action VARCHAR(32) NOT NULL,
                target VARCHAR(300) NOT NULL,
                timestamp TIMESTAMP WITH TIME ZONE NOT NULL,
                prev_hash CHAR(64) NOT NULL,
                entry_hash CHAR(64) NOT NULL
            )
        "#).execute(pool).await.map_err(|e| MedRecError::Database(e.to_string()))?;

        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = vec![
            "CREATE INDEX IF NOT EXISTS idx_identities_role ON identities(role)",
            "CREATE INDEX IF NOT EXISTS idx_grants_doctor ON grants(doctor)",
            "CREATE INDEX IF NOT EXISTS idx_records_owner ON records(owner)",
            "CREATE INDEX IF NOT EXISTS idx_consultations_author ON consultations(author)",
            "CREATE INDEX IF NOT EXISTS idx_consultations_subject ON consultations(subject)",
            "CREATE INDEX IF NOT EXISTS idx_reports_author ON reports(author)",
            "CREATE INDEX IF NOT EXISTS idx_reports_subject_patient ON reports(subject_patient)",
            "CREATE INDEX IF NOT EXISTS idx_reports_assigned_doctor ON reports(assigned_doctor)",
            "CREATE INDEX IF NOT EXISTS idx_audit_log_actor ON audit_log(actor)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql)
                .execute(pool)
                .await
                .map_err(|e| MedRecError::Database(e.to_string()))?;
        }

        Ok(())
    }

    // ========== 身份相关操作 ==========

    /// 写入身份
    pub async fn insert_identity(&self, identity: &Identity) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            INSERT INTO identities (principal, external_id, role, registered_at)
            VALUES ($1, $2, $3, $4)
        "#)
        .bind(identity.principal.as_str())
        .bind(identity.external_id.as_str())
        .bind(identity.role.as_str())
        .bind(identity.registered_at)
        .execute(pool)
        .await
        .map_err(|e| MedRecError::Database(e.to_string()))?;

        Ok(())
    }

    /// 按主体查找身份
    pub async fn get_identity(&self, principal: &Principal) -> Result<Option<Identity>> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbIdentity>(
            "SELECT * FROM identities WHERE principal = $1"
        )
        .bind(principal.as_str())
        .fetch_optional(pool)
        .await
        .map_err(|e| MedRecError::Database(e.to_string()))?;

        Ok(row.and_then(DbIdentity::into_identity))
    }

    /// 按外部标识符查找身份
    pub async fn find_identity_by_external_id(&self, external_id: &str) -> Result<Option<Identity>> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbIdentity>(
            "SELECT * FROM identities WHERE external_id = $1"
        )
        .bind(external_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| MedRecError::Database(e.to_string()))?;

        Ok(row.and_then(DbIdentity::into_identity))
    }

    // ========== 授权相关操作 ==========

    /// 写入或替换授权记录（每对至多一行）
    pub async fn upsert_grant(&self, grant: &Grant) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            INSERT INTO grants (patient, doctor, active, granted_at, revoked_at, sequence)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (patient, doctor) DO UPDATE SET
                active = EXCLUDED.active,
                granted_at = EXCLUDED.granted_at,
                revoked_at = EXCLUDED.revoked_at,
                sequence = EXCLUDED.sequence
        "#)
        .bind(grant.patient.as_str())
        .bind(grant.doctor.as_str())
        .bind(grant.active)
        .bind(grant.granted_at)
        .bind(grant.revoked_at)
        .bind(grant.sequence as i64)
        .execute(pool)
        .await
        .map_err(|e| MedRecError::Database(e.to_string()))?;

        Ok(())
    }

    /// 查找授权记录
    pub async fn get_grant(&self, patient: &Principal, doctor: &Principal) -> Result<Option<Grant>> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbGrant>(
            "SELECT * FROM grants WHERE patient = $1 AND doctor = $2"
        )
        .bind(patient.as_str())
        .bind(doctor.as_str())
        .fetch_optional(pool)
        .await
        .map_err(|e| MedRecError::Database(e.to_string()))?;

        Ok(row.map(Grant::from))
    }

    /// 患者的激活授权（授予顺序）
    pub async fn get_active_grants_for_patient(&self, patient: &Principal) -> Result<Vec<Grant>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbGrant>(
            "SELECT * FROM grants WHERE patient = $1 AND active ORDER BY granted_at, sequence"
        )
        .bind(patient.as_str())
        .fetch_all(pool)
        .await
        .map_err(|e| MedRecError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Grant::from).collect())
    }

    // ========== 记录相关操作 ==========

    /// 写入记录条目
    pub async fn insert_record(&self, entry: &RecordEntry) -> Result<Uuid> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            INSERT INTO records (id, owner, content_hash, record_type, sequence, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
        "#)
        .bind(entry.id)
        .bind(entry.owner.as_str())
        .bind(&entry.content_hash)
        .bind(&entry.record_type)
        .bind(entry.sequence as i64)
        .bind(entry.created_at)
        .fetch_one(pool)
        .await
        .map(|row| row.get("id"))
        .map_err(|e| MedRecError::Database(e.to_string()))
    }

    /// 患者的全部记录（序号降序）
    pub async fn get_records_by_owner(&self, owner: &Principal) -> Result<Vec<RecordEntry>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbRecordEntry>(
            "SELECT * FROM records WHERE owner = $1 ORDER BY sequence DESC"
        )
        .bind(owner.as_str())
        .fetch_all(pool)
        .await
        .map_err(|e| MedRecError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(RecordEntry::from).collect())
    }

    // ========== 诊疗条目相关操作 ==========

    /// 写入诊疗条目
    pub async fn insert_consultation(&self, entry: &ConsultationEntry) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            INSERT INTO consultations (id, author, subject, diagnosis, prescription, sequence, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#)
        .bind(&entry.id)
        .bind(entry.author.as_str())
        .bind(entry.subject.as_str())
        .bind(&entry.diagnosis)
        .bind(&entry.prescription)
        .bind(entry.sequence as i64)
        .bind(entry.created_at)
        .execute(pool)
        .await
        .map_err(|e| MedRecError::Database(e.to_string()))?;

        Ok(())
    }

    /// 患者的全部诊疗条目（最新在前）
    pub async fn get_consultations_by_subject(&self, subject: &Principal) -> Result<Vec<ConsultationEntry>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbConsultationEntry>(
            "SELECT * FROM consultations WHERE subject = $1 ORDER BY created_at DESC, sequence DESC"
        )
        .bind(subject.as_str())
        .fetch_all(pool)
        .await
        .map_err(|e| MedRecError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(ConsultationEntry::from).collect())
    }

    /// 医生撰写的全部诊疗条目（最新在前）
    pub async fn get_consultations_by_author(&self, author: &Principal) -> Result<Vec<ConsultationEntry>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbConsultationEntry>(
            "SELECT * FROM consultations WHERE author = $1 ORDER BY created_at DESC, sequence DESC"
        )
        .bind(author.as_str())
        .fetch_all(pool)
        .await
        .map_err(|e| MedRecError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(ConsultationEntry::from).collect())
    }

    // ========== 报告相关操作 ==========

    /// 写入报告
    pub async fn insert_report(&self, report: &Report) -> Result<Uuid> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            INSERT INTO reports (id, author, subject_patient, assigned_doctor, test_type, content_hash, result_data, sequence, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
        "#)
        .bind(report.id)
        .bind(report.author.as_str())
        .bind(report.subject_patient.as_str())
        .bind(report.assigned_doctor.as_str())
        .bind(&report.test_type)
        .bind(&report.content_hash)
        .bind(&report.result_data)
        .bind(report.sequence as i64)
        .bind(report.created_at)
        .fetch_one(pool)
        .await
        .map(|row| row.get("id"))
        .map_err(|e| MedRecError::Database(e.to_string()))
    }

    /// 按ID查找报告
    pub async fn get_report(&self, id: &Uuid) -> Result<Option<Report>> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbReport>(
            "SELECT * FROM reports WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| MedRecError::Database(e.to_string()))?;

        Ok(row.map(Report::from))
    }

    /// 中心出具的全部报告（序号降序）
    pub async fn get_reports_by_author(&self, author: &Principal) -> Result<Vec<Report>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbReport>(
            "SELECT * FROM reports WHERE author = $1 ORDER BY sequence DESC"
        )
        .bind(author.as_str())
        .fetch_all(pool)
        .await
        .map_err(|e| MedRecError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Report::from).collect())
    }

    /// 主体能力集合内的全部报告（序号降序）
    pub async fn get_reports_for_principal(&self, principal: &Principal) -> Result<Vec<Report>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbReport>(r#"
            SELECT * FROM reports
            WHERE author = $1 OR subject_patient = $1 OR assigned_doctor = $1
            ORDER BY sequence DESC
        "#)
        .bind(principal.as_str())
        .fetch_all(pool)
        .await
        .map_err(|e| MedRecError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Report::from).collect())
    }

    // ========== 审计日志相关操作 ==========

    /// 追加审计条目
    pub async fn insert_audit_entry(&self, entry: &AuditEntry) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            INSERT INTO audit_log (sequence, actor, action, target, timestamp, prev_hash, entry_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#)
        .bind(entry.sequence as i64)
        .bind(entry.actor.as_str())
        .bind(entry.action.as_str())
        .bind(&entry.target)
        .bind(entry.timestamp)
        .bind(&entry.prev_hash)
        .bind(&entry.entry_hash)
        .execute(pool)
        .await
        .map_err(|e| MedRecError::Database(e.to_string()))?;

        Ok(())
    }

    /// 审计日志全量查询（追加顺序）
    pub async fn get_audit_entries(&self) -> Result<Vec<AuditEntry>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbAuditEntry>(
            "SELECT * FROM audit_log ORDER BY sequence"
        )
        .fetch_all(pool)
        .await
        .map_err(|e| MedRecError::Database(e.to_string()))?;

        Ok(rows.into_iter().filter_map(DbAuditEntry::into_entry).collect())
    }
}
