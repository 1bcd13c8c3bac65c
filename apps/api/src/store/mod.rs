//! Candidate Store: persistence for candidates, call records and the raw
//! webhook event log.
//!
//! `AppState` holds an `Arc<dyn Store>`. Production uses `PgStore`; tests use
//! the in-memory store in `memory.rs`, which is compiled only under `cfg(test)`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::models::call::{CallRecord, RawEvent};
use crate::models::candidate::{
    ActivityEntry, Candidate, MessageEntry, ReferenceCall, Referral, Stage, TaskName, TaskStatus,
};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

/// Picks the single candidate an update applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSelector {
    Id(Uuid),
    Token(String),
    ActiveCallId(String),
}

impl CandidateSelector {
    pub fn matches(&self, candidate: &Candidate) -> bool {
        match self {
            CandidateSelector::Id(id) => candidate.id == *id,
            CandidateSelector::Token(token) => candidate.referral_token == *token,
            CandidateSelector::ActiveCallId(call_id) => {
                candidate.active_call_id.as_deref() == Some(call_id.as_str())
            }
        }
    }
}

/// A set of field writes plus array appends applied to one candidate as a unit.
///
/// Task changes go through `Tasks::advance`, so a patch can never move a task
/// backwards. Applying any patch bumps `last_activity_at` to `at`.
#[derive(Debug, Clone)]
pub struct CandidatePatch {
    pub at: DateTime<Utc>,
    pub stage: Option<Stage>,
    pub status: Option<String>,
    pub tasks: Vec<(TaskName, TaskStatus)>,
    pub human_check: Option<(bool, Vec<String>)>,
    pub referral: Option<Referral>,
    pub reference_call: Option<ReferenceCall>,
    pub active_call_id: Option<String>,
    pub push_activity: Vec<ActivityEntry>,
    pub push_messages: Vec<MessageEntry>,
}

impl CandidatePatch {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            stage: None,
            status: None,
            tasks: Vec::new(),
            human_check: None,
            referral: None,
            reference_call: None,
            active_call_id: None,
            push_activity: Vec::new(),
            push_messages: Vec::new(),
        }
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }

    pub fn task(mut self, name: TaskName, next: TaskStatus) -> Self {
        self.tasks.push((name, next));
        self
    }

    pub fn human_check(mut self, needed: bool, reasons: Vec<String>) -> Self {
        self.human_check = Some((needed, reasons));
        self
    }

    pub fn referral(mut self, referral: Referral) -> Self {
        self.referral = Some(referral);
        self
    }

    pub fn reference_call(mut self, call: ReferenceCall) -> Self {
        self.reference_call = Some(call);
        self
    }

    pub fn active_call_id(mut self, call_id: &str) -> Self {
        self.active_call_id = Some(call_id.to_string());
        self
    }

    pub fn activity(mut self, label: impl Into<String>) -> Self {
        self.push_activity.push(ActivityEntry {
            at: self.at,
            label: label.into(),
        });
        self
    }

    pub fn message(mut self, message: MessageEntry) -> Self {
        self.push_messages.push(message);
        self
    }

    /// Applies the patch in place. Shared by every `Store` implementation so
    /// that patch semantics do not depend on the backend.
    pub fn apply(&self, candidate: &mut Candidate) {
        if let Some(stage) = self.stage {
            candidate.stage = stage;
        }
        if let Some(status) = &self.status {
            candidate.status = status.clone();
        }
        for &(name, next) in &self.tasks {
            if !candidate.tasks.advance(name, next) {
                debug!(
                    "Ignoring backwards task move {:?} {:?} -> {:?} on candidate {}",
                    name,
                    candidate.tasks.get(name),
                    next,
                    candidate.id
                );
            }
        }
        if let Some((needed, reasons)) = &self.human_check {
            candidate.human_check_needed = *needed;
            candidate.human_check_reasons = reasons.clone();
        }
        if let Some(referral) = &self.referral {
            candidate.referral = Some(referral.clone());
        }
        if let Some(call) = &self.reference_call {
            candidate.reference_call = Some(call.clone());
        }
        if let Some(call_id) = &self.active_call_id {
            candidate.active_call_id = Some(call_id.clone());
        }
        candidate.activity.extend(self.push_activity.iter().cloned());
        candidate.messages.extend(self.push_messages.iter().cloned());
        candidate.last_activity_at = self.at;
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_candidate(&self, candidate: &Candidate) -> Result<()>;

    async fn find_by_token(&self, token: &str) -> Result<Option<Candidate>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Candidate>>;

    async fn find_by_call_id(&self, call_id: &str) -> Result<Option<Candidate>>;

    /// Applies `patch` atomically to the selected candidate. Returns the number
    /// of candidates matched (0 or 1); a missing candidate is not an error.
    async fn update_candidate(
        &self,
        selector: &CandidateSelector,
        patch: &CandidatePatch,
    ) -> Result<u64>;

    /// All candidates, newest first.
    async fn list_candidates(&self) -> Result<Vec<Candidate>>;

    /// Inserts or overwrites by call id. `created_at` is kept from the first write.
    async fn upsert_call_record(&self, record: &CallRecord) -> Result<()>;

    /// Most recently updated call records, optionally for one candidate name.
    async fn list_call_records(
        &self,
        candidate_name: Option<&str>,
        limit: i64,
    ) -> Result<Vec<CallRecord>>;

    async fn append_raw_event(&self, event: &RawEvent) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}
