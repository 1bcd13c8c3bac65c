use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::call::{CallRecord, RawEvent};
use crate::models::candidate::{
    ActivityEntry, Candidate, MessageEntry, ReferenceCall, Referral, Tasks,
};
use crate::store::{CandidatePatch, CandidateSelector, Store};

/// Explicit column list: the internal `pk` never leaves the store.
const CANDIDATE_COLUMNS: &str = "id, full_name, email, company_name, referral_token, stage, \
    status, tasks, human_check_needed, human_check_reasons, referral, reference_call, \
    active_call_id, activity, messages, created_at, last_activity_at";

const CALL_RECORD_COLUMNS: &str = "call_id, verdict, verdict_source, verdict_raw, summary, \
    transcript, recording_url, success_evaluation, ended_reason, started_at, ended_at, \
    duration_seconds, candidate_name, company_name, created_at, updated_at";

#[derive(Debug, FromRow)]
struct CandidateRow {
    id: Uuid,
    full_name: String,
    email: String,
    company_name: Option<String>,
    referral_token: String,
    stage: String,
    status: String,
    tasks: Json<Tasks>,
    human_check_needed: bool,
    human_check_reasons: Vec<String>,
    referral: Option<Json<Referral>>,
    reference_call: Option<Json<ReferenceCall>>,
    active_call_id: Option<String>,
    activity: Json<Vec<ActivityEntry>>,
    messages: Json<Vec<MessageEntry>>,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

impl TryFrom<CandidateRow> for Candidate {
    type Error = anyhow::Error;

    fn try_from(row: CandidateRow) -> Result<Self> {
        Ok(Candidate {
            id: row.id,
            full_name: row.full_name,
            email: row.email,
            company_name: row.company_name,
            referral_token: row.referral_token,
            stage: row
                .stage
                .parse()
                .with_context(|| format!("candidate {} has a bad stage", row.id))?,
            status: row.status,
            tasks: row.tasks.0,
            human_check_needed: row.human_check_needed,
            human_check_reasons: row.human_check_reasons,
            referral: row.referral.map(|j| j.0),
            reference_call: row.reference_call.map(|j| j.0),
            active_call_id: row.active_call_id,
            activity: row.activity.0,
            messages: row.messages.0,
            created_at: row.created_at,
            last_activity_at: row.last_activity_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CallRecordRow {
    call_id: String,
    verdict: String,
    verdict_source: String,
    verdict_raw: String,
    summary: Option<String>,
    transcript: Option<String>,
    recording_url: Option<String>,
    success_evaluation: Option<Value>,
    ended_reason: Option<String>,
    started_at: Option<String>,
    ended_at: Option<String>,
    duration_seconds: Option<f64>,
    candidate_name: Option<String>,
    company_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CallRecordRow> for CallRecord {
    type Error = anyhow::Error;

    fn try_from(row: CallRecordRow) -> Result<Self> {
        Ok(CallRecord {
            verdict: row
                .verdict
                .parse()
                .with_context(|| format!("call record {} has a bad verdict", row.call_id))?,
            call_id: row.call_id,
            verdict_source: row.verdict_source,
            verdict_raw: row.verdict_raw,
            summary: row.summary,
            transcript: row.transcript,
            recording_url: row.recording_url,
            success_evaluation: row.success_evaluation,
            ended_reason: row.ended_reason,
            started_at: row.started_at,
            ended_at: row.ended_at,
            duration_seconds: row.duration_seconds,
            candidate_name: row.candidate_name,
            company_name: row.company_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL-backed store. Each candidate is one row; nested parts live in
/// JSONB columns so a candidate is still read and written as one document.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        bind: impl Into<BindValue>,
    ) -> Result<Option<Candidate>> {
        let sql = format!("SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE {clause} LIMIT 1");
        let query = sqlx::query_as::<_, CandidateRow>(&sql);
        let row = match bind.into() {
            BindValue::Uuid(v) => query.bind(v).fetch_optional(&self.pool).await?,
            BindValue::Text(v) => query.bind(v).fetch_optional(&self.pool).await?,
        };
        row.map(Candidate::try_from).transpose()
    }

    /// Locks the selected row for the rest of the transaction.
    async fn lock_candidate(
        tx: &mut Transaction<'_, Postgres>,
        selector: &CandidateSelector,
    ) -> Result<Option<Candidate>> {
        let row = match selector {
            CandidateSelector::Id(id) => {
                let sql = format!("SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE id = $1 FOR UPDATE");
                sqlx::query_as::<_, CandidateRow>(&sql)
                    .bind(id)
                    .fetch_optional(&mut **tx)
                    .await?
            }
            CandidateSelector::Token(token) => {
                let sql = format!(
                    "SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE referral_token = $1 FOR UPDATE"
                );
                sqlx::query_as::<_, CandidateRow>(&sql)
                    .bind(token)
                    .fetch_optional(&mut **tx)
                    .await?
            }
            CandidateSelector::ActiveCallId(call_id) => {
                let sql = format!(
                    "SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE active_call_id = $1 \
                     ORDER BY created_at DESC LIMIT 1 FOR UPDATE"
                );
                sqlx::query_as::<_, CandidateRow>(&sql)
                    .bind(call_id)
                    .fetch_optional(&mut **tx)
                    .await?
            }
        };
        row.map(Candidate::try_from).transpose()
    }
}

enum BindValue {
    Uuid(Uuid),
    Text(String),
}

impl From<Uuid> for BindValue {
    fn from(v: Uuid) -> Self {
        BindValue::Uuid(v)
    }
}

impl From<&str> for BindValue {
    fn from(v: &str) -> Self {
        BindValue::Text(v.to_string())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_candidate(&self, c: &Candidate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO candidates
                (id, full_name, email, company_name, referral_token, stage, status, tasks,
                 human_check_needed, human_check_reasons, referral, reference_call,
                 active_call_id, activity, messages, created_at, last_activity_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(c.id)
        .bind(&c.full_name)
        .bind(&c.email)
        .bind(&c.company_name)
        .bind(&c.referral_token)
        .bind(c.stage.as_str())
        .bind(&c.status)
        .bind(Json(&c.tasks))
        .bind(c.human_check_needed)
        .bind(&c.human_check_reasons)
        .bind(c.referral.as_ref().map(Json))
        .bind(c.reference_call.as_ref().map(Json))
        .bind(&c.active_call_id)
        .bind(Json(&c.activity))
        .bind(Json(&c.messages))
        .bind(c.created_at)
        .bind(c.last_activity_at)
        .execute(&self.pool)
        .await?;

        info!("Inserted candidate {}", c.id);
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Candidate>> {
        self.fetch_one_where("referral_token = $1", token).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Candidate>> {
        self.fetch_one_where("id = $1", id).await
    }

    async fn find_by_call_id(&self, call_id: &str) -> Result<Option<Candidate>> {
        self.fetch_one_where("active_call_id = $1", call_id).await
    }

    async fn update_candidate(
        &self,
        selector: &CandidateSelector,
        patch: &CandidatePatch,
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let Some(mut candidate) = Self::lock_candidate(&mut tx, selector).await? else {
            tx.rollback().await?;
            debug!("Candidate update matched nothing: {:?}", selector);
            return Ok(0);
        };

        patch.apply(&mut candidate);

        sqlx::query(
            r#"
            UPDATE candidates SET
                stage = $2, status = $3, tasks = $4,
                human_check_needed = $5, human_check_reasons = $6,
                referral = $7, reference_call = $8, active_call_id = $9,
                activity = $10, messages = $11, last_activity_at = $12
            WHERE id = $1
            "#,
        )
        .bind(candidate.id)
        .bind(candidate.stage.as_str())
        .bind(&candidate.status)
        .bind(Json(&candidate.tasks))
        .bind(candidate.human_check_needed)
        .bind(&candidate.human_check_reasons)
        .bind(candidate.referral.as_ref().map(Json))
        .bind(candidate.reference_call.as_ref().map(Json))
        .bind(&candidate.active_call_id)
        .bind(Json(&candidate.activity))
        .bind(Json(&candidate.messages))
        .bind(candidate.last_activity_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(1)
    }

    async fn list_candidates(&self) -> Result<Vec<Candidate>> {
        let sql = format!("SELECT {CANDIDATE_COLUMNS} FROM candidates ORDER BY created_at DESC");
        sqlx::query_as::<_, CandidateRow>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Candidate::try_from)
            .collect()
    }

    async fn upsert_call_record(&self, r: &CallRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO call_records
                (call_id, verdict, verdict_source, verdict_raw, summary, transcript,
                 recording_url, success_evaluation, ended_reason, started_at, ended_at,
                 duration_seconds, candidate_name, company_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (call_id) DO UPDATE SET
                verdict = EXCLUDED.verdict,
                verdict_source = EXCLUDED.verdict_source,
                verdict_raw = EXCLUDED.verdict_raw,
                summary = EXCLUDED.summary,
                transcript = EXCLUDED.transcript,
                recording_url = EXCLUDED.recording_url,
                success_evaluation = EXCLUDED.success_evaluation,
                ended_reason = EXCLUDED.ended_reason,
                started_at = EXCLUDED.started_at,
                ended_at = EXCLUDED.ended_at,
                duration_seconds = EXCLUDED.duration_seconds,
                candidate_name = EXCLUDED.candidate_name,
                company_name = EXCLUDED.company_name,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&r.call_id)
        .bind(r.verdict.as_str())
        .bind(&r.verdict_source)
        .bind(&r.verdict_raw)
        .bind(&r.summary)
        .bind(&r.transcript)
        .bind(&r.recording_url)
        .bind(&r.success_evaluation)
        .bind(&r.ended_reason)
        .bind(&r.started_at)
        .bind(&r.ended_at)
        .bind(r.duration_seconds)
        .bind(&r.candidate_name)
        .bind(&r.company_name)
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Upserted call record {}", r.call_id);
        Ok(())
    }

    async fn list_call_records(
        &self,
        candidate_name: Option<&str>,
        limit: i64,
    ) -> Result<Vec<CallRecord>> {
        let sql = format!(
            "SELECT {CALL_RECORD_COLUMNS} FROM call_records \
             WHERE ($1::text IS NULL OR candidate_name = $1) \
             ORDER BY updated_at DESC LIMIT $2"
        );
        sqlx::query_as::<_, CallRecordRow>(&sql)
            .bind(candidate_name)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(CallRecord::try_from)
            .collect()
    }

    async fn append_raw_event(&self, e: &RawEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO raw_events (call_id, event_type, received_at, payload) VALUES ($1, $2, $3, $4)",
        )
        .bind(&e.call_id)
        .bind(&e.event_type)
        .bind(e.received_at)
        .bind(&e.payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let _: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
