//! In-memory `Store` for tests. Each instance owns its own data; nothing here is
//! global.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::call::{CallRecord, RawEvent};
use crate::models::candidate::Candidate;
use crate::store::{CandidatePatch, CandidateSelector, Store};

#[derive(Default)]
pub struct MemoryStore {
    candidates: Mutex<Vec<Candidate>>,
    calls: Mutex<HashMap<String, CallRecord>>,
    events: Mutex<Vec<RawEvent>>,
}

impl MemoryStore {
    pub fn raw_events(&self) -> Vec<RawEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn call_records(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap().values().cloned().collect()
    }

    pub fn candidates(&self) -> Vec<Candidate> {
        self.candidates.lock().unwrap().clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_candidate(&self, candidate: &Candidate) -> Result<()> {
        self.candidates.lock().unwrap().push(candidate.clone());
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Candidate>> {
        let selector = CandidateSelector::Token(token.to_string());
        Ok(self.candidates().into_iter().find(|c| selector.matches(c)))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Candidate>> {
        Ok(self.candidates().into_iter().find(|c| c.id == id))
    }

    async fn find_by_call_id(&self, call_id: &str) -> Result<Option<Candidate>> {
        let selector = CandidateSelector::ActiveCallId(call_id.to_string());
        Ok(self.candidates().into_iter().find(|c| selector.matches(c)))
    }

    async fn update_candidate(
        &self,
        selector: &CandidateSelector,
        patch: &CandidatePatch,
    ) -> Result<u64> {
        let mut candidates = self.candidates.lock().unwrap();
        match candidates.iter_mut().find(|c| selector.matches(c)) {
            Some(candidate) => {
                patch.apply(candidate);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn list_candidates(&self) -> Result<Vec<Candidate>> {
        let mut all = self.candidates();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn upsert_call_record(&self, record: &CallRecord) -> Result<()> {
        let mut calls = self.calls.lock().unwrap();
        let mut record = record.clone();
        if let Some(existing) = calls.get(&record.call_id) {
            record.created_at = existing.created_at;
        }
        calls.insert(record.call_id.clone(), record);
        Ok(())
    }

    async fn list_call_records(
        &self,
        candidate_name: Option<&str>,
        limit: i64,
    ) -> Result<Vec<CallRecord>> {
        let mut records: Vec<_> = self
            .call_records()
            .into_iter()
            .filter(|r| candidate_name.map_or(true, |n| r.candidate_name.as_deref() == Some(n)))
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }

    async fn append_raw_event(&self, event: &RawEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
