//! Fakes for the external providers, shared by unit and router tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::calls::{CallError, CallInitiator, ReferenceCallRequest};
use crate::config::Config;
use crate::mailer::{MailError, Mailer, OutboundEmail};
use crate::models::call::{CallRecord, RawEvent};
use crate::models::candidate::Candidate;
use crate::sentiment::{parse_output, ClassifierOutcome, SentimentClassifier};
use crate::state::AppState;
use crate::store::memory::MemoryStore;
use crate::store::{CandidatePatch, CandidateSelector, Store};

pub struct FakeMailer {
    configured: bool,
    fail: bool,
    sent: Mutex<Vec<OutboundEmail>>,
}

impl FakeMailer {
    pub fn working() -> Self {
        Self {
            configured: true,
            fail: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::working()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::working()
        }
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    fn ensure_configured(&self) -> Result<(), MailError> {
        if self.configured {
            Ok(())
        } else {
            Err(MailError::NotConfigured("RESEND_API_KEY".into()))
        }
    }

    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        self.ensure_configured()?;
        if self.fail {
            return Err(MailError::Api {
                status: 503,
                message: "mail provider unavailable".into(),
            });
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Hands out `call_1`, `call_2`, ... or fails every call.
pub struct FakeCaller {
    fail: bool,
    requests: Mutex<Vec<ReferenceCallRequest>>,
}

impl FakeCaller {
    pub fn working() -> Self {
        Self {
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::working()
        }
    }

    pub fn requests(&self) -> Vec<ReferenceCallRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallInitiator for FakeCaller {
    async fn start_reference_call(
        &self,
        request: &ReferenceCallRequest,
    ) -> Result<String, CallError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        if self.fail {
            return Err(CallError::Api {
                status: 400,
                message: "invalid phone number".into(),
            });
        }
        Ok(format!("call_{}", requests.len()))
    }
}

/// Replies with fixed model text and counts invocations.
pub struct FakeClassifier {
    reply: String,
    calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SentimentClassifier for FakeClassifier {
    async fn classify(&self, _summary: &str, _transcript: Option<&str>) -> ClassifierOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match parse_output(&self.reply) {
            Some(report) => ClassifierOutcome::Classified(report),
            None => ClassifierOutcome::Invalid {
                raw: self.reply.clone(),
            },
        }
    }
}

/// Delegates to a `MemoryStore` but fails every call record and candidate
/// write, the way a dropped database connection would mid-pipeline.
#[derive(Default)]
pub struct BrokenWritesStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl Store for BrokenWritesStore {
    async fn create_candidate(&self, candidate: &Candidate) -> Result<()> {
        self.inner.create_candidate(candidate).await
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Candidate>> {
        self.inner.find_by_token(token).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Candidate>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_call_id(&self, call_id: &str) -> Result<Option<Candidate>> {
        self.inner.find_by_call_id(call_id).await
    }

    async fn update_candidate(
        &self,
        _selector: &CandidateSelector,
        _patch: &CandidatePatch,
    ) -> Result<u64> {
        Err(anyhow!("connection reset while updating candidate"))
    }

    async fn list_candidates(&self) -> Result<Vec<Candidate>> {
        self.inner.list_candidates().await
    }

    async fn upsert_call_record(&self, _record: &CallRecord) -> Result<()> {
        Err(anyhow!("connection reset while writing call record"))
    }

    async fn list_call_records(
        &self,
        candidate_name: Option<&str>,
        limit: i64,
    ) -> Result<Vec<CallRecord>> {
        self.inner.list_call_records(candidate_name, limit).await
    }

    async fn append_raw_event(&self, event: &RawEvent) -> Result<()> {
        self.inner.append_raw_event(event).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://localhost/refcheck_test".to_string()),
        "PUBLIC_BASE_URL" => Some("https://hr.acme.test".to_string()),
        _ => None,
    })
    .unwrap()
}

/// Handles on every fake so tests can inspect them after driving the router.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<FakeMailer>,
    pub caller: Arc<FakeCaller>,
    pub classifier: Arc<FakeClassifier>,
}

impl TestHarness {
    pub fn new(caller: FakeCaller, classifier: FakeClassifier) -> Self {
        Self {
            store: Arc::new(MemoryStore::default()),
            mailer: Arc::new(FakeMailer::working()),
            caller: Arc::new(caller),
            classifier: Arc::new(classifier),
        }
    }

    pub fn state(&self, config: Config) -> AppState {
        AppState {
            store: self.store.clone(),
            caller: self.caller.clone(),
            classifier: self.classifier.clone(),
            mailer: self.mailer.clone(),
            config,
        }
    }
}
