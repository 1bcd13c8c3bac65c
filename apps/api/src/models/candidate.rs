use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

const REFERRAL_TOKEN_LEN: usize = 28;

/// Coarse workflow phase of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Intake,
    ReferralOutreach,
    BackgroundCheck,
    Decision,
    OnboardingComplete,
    Flagged,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Intake => "INTAKE",
            Stage::ReferralOutreach => "REFERRAL_OUTREACH",
            Stage::BackgroundCheck => "BACKGROUND_CHECK",
            Stage::Decision => "DECISION",
            Stage::OnboardingComplete => "ONBOARDING_COMPLETE",
            Stage::Flagged => "FLAGGED",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INTAKE" => Ok(Stage::Intake),
            "REFERRAL_OUTREACH" => Ok(Stage::ReferralOutreach),
            "BACKGROUND_CHECK" => Ok(Stage::BackgroundCheck),
            "DECISION" => Ok(Stage::Decision),
            "ONBOARDING_COMPLETE" => Ok(Stage::OnboardingComplete),
            "FLAGGED" => Ok(Stage::Flagged),
            other => Err(anyhow::anyhow!("unknown stage '{other}'")),
        }
    }
}

/// Finer-grained status labels. Stored as free-form strings.
pub mod status {
    pub const AWAITING_REFERRALS: &str = "AWAITING_REFERRALS";
    pub const REFERRALS_SUBMITTED: &str = "REFERRALS_SUBMITTED";
    pub const REF_CALL_IN_PROGRESS: &str = "REF_CALL_IN_PROGRESS";
    pub const REF_CALL_PASSED: &str = "REF_CALL_PASSED";
    pub const REF_CALL_FAILED: &str = "REF_CALL_FAILED";
    pub const REF_CALL_NO_ANSWER: &str = "REF_CALL_NO_ANSWER";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    Waiting,
    Done,
    Failed,
}

impl TaskStatus {
    /// NOT_STARTED < WAITING < {DONE, FAILED}. DONE and FAILED share a rank.
    fn rank(self) -> u8 {
        match self {
            TaskStatus::NotStarted => 0,
            TaskStatus::Waiting => 1,
            TaskStatus::Done | TaskStatus::Failed => 2,
        }
    }

    pub fn can_advance_to(self, next: TaskStatus) -> bool {
        next.rank() >= self.rank()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskName {
    IntakeForm,
    // Set by operators outside this service; kept so every task has a slot.
    #[allow(dead_code)]
    EmploymentVerification,
    ReferralContacted,
    ReferralResponses,
    #[allow(dead_code)]
    BackgroundCheck,
}

/// Checklist shown on the candidate page. The key set is fixed; records written
/// before `employmentVerification` existed decode it as `NOT_STARTED`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tasks {
    pub intake_form: TaskStatus,
    pub employment_verification: TaskStatus,
    pub referral_contacted: TaskStatus,
    pub referral_responses: TaskStatus,
    pub background_check: TaskStatus,
}

impl Tasks {
    pub fn get(&self, name: TaskName) -> TaskStatus {
        match name {
            TaskName::IntakeForm => self.intake_form,
            TaskName::EmploymentVerification => self.employment_verification,
            TaskName::ReferralContacted => self.referral_contacted,
            TaskName::ReferralResponses => self.referral_responses,
            TaskName::BackgroundCheck => self.background_check,
        }
    }

    fn slot(&mut self, name: TaskName) -> &mut TaskStatus {
        match name {
            TaskName::IntakeForm => &mut self.intake_form,
            TaskName::EmploymentVerification => &mut self.employment_verification,
            TaskName::ReferralContacted => &mut self.referral_contacted,
            TaskName::ReferralResponses => &mut self.referral_responses,
            TaskName::BackgroundCheck => &mut self.background_check,
        }
    }

    /// Moves a task forward. Returns false (and leaves the task untouched) when
    /// `next` would move it backwards.
    pub fn advance(&mut self, name: TaskName, next: TaskStatus) -> bool {
        let slot = self.slot(name);
        if !slot.can_advance_to(next) {
            return false;
        }
        *slot = next;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        }
    }
}

impl FromStr for Verdict {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(Verdict::Pass),
            "FAIL" => Ok(Verdict::Fail),
            other => Err(anyhow::anyhow!("unknown verdict '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    pub name: String,
    pub phone: String,
    pub email: String,
}

/// Outcome of the reference call, written by the webhook pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceCall {
    pub call_id: String,
    pub summary: Option<String>,
    pub transcript: Option<String>,
    pub recording_url: Option<String>,
    pub verdict: Verdict,
    pub verdict_source: String,
    pub verdict_raw: String,
    /// The provider's own "objective met" metric. Kept for debugging only.
    pub success_evaluation: Option<Value>,
    pub ended_reason: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub at: DateTime<Utc>,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEntry {
    pub at: DateTime<Utc>,
    pub channel: Channel,
    pub subject: String,
    pub status: MessageStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub company_name: Option<String>,
    pub referral_token: String,
    pub stage: Stage,
    pub status: String,
    pub tasks: Tasks,
    pub human_check_needed: bool,
    pub human_check_reasons: Vec<String>,
    pub referral: Option<Referral>,
    pub reference_call: Option<ReferenceCall>,
    /// The call currently tracked for this candidate. A new referral
    /// submission replaces it.
    pub active_call_id: Option<String>,
    pub activity: Vec<ActivityEntry>,
    pub messages: Vec<MessageEntry>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Candidate {
    /// A freshly added candidate, waiting for the referral form.
    pub fn new_intake(
        full_name: String,
        email: String,
        company_name: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Candidate {
            id: Uuid::new_v4(),
            full_name,
            email,
            company_name,
            referral_token: generate_referral_token(),
            stage: Stage::Intake,
            status: status::AWAITING_REFERRALS.to_string(),
            tasks: Tasks {
                intake_form: TaskStatus::Waiting,
                ..Tasks::default()
            },
            human_check_needed: false,
            human_check_reasons: Vec::new(),
            referral: None,
            reference_call: None,
            active_call_id: None,
            activity: vec![ActivityEntry {
                at: now,
                label: "Candidate added; referral request email queued".to_string(),
            }],
            messages: Vec::new(),
            created_at: now,
            last_activity_at: now,
        }
    }
}

/// Opaque alphanumeric token that authorizes the referral form.
pub fn generate_referral_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFERRAL_TOKEN_LEN)
        .map(char::from)
        .collect()
}
