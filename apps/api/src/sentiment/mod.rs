//! Sentiment Classifier: turns a reference call summary into a pass/fail/unclear
//! judgement.
//!
//! `classify` never errors. Missing credentials, transport failures and output
//! outside the allowed vocabulary all come back as `ClassifierOutcome` variants,
//! and every one of them except an explicit `pass` maps to a FAIL verdict.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm_client::prompts::CONSTRAINED_OUTPUT_SYSTEM;
use crate::llm_client::{strip_json_fences, LlmClient};
use crate::models::candidate::Verdict;

pub mod prompts;

use prompts::{SENTIMENT_PROMPT, SENTIMENT_SYSTEM};

const MAX_OUTPUT_TOKENS: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Pass,
    Fail,
    Unclear,
}

impl Sentiment {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass" => Some(Sentiment::Pass),
            "fail" => Some(Sentiment::Fail),
            "unclear" => Some(Sentiment::Unclear),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentReport {
    pub verdict: Sentiment,
    pub confidence: Option<f32>,
    pub red_flags: Vec<String>,
    /// Untouched model output, stored alongside the verdict for debugging.
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierOutcome {
    Classified(SentimentReport),
    /// The model answered outside the allowed vocabulary.
    Invalid { raw: String },
    /// Transport or provider error.
    Failed { reason: String },
    /// No classifier credential configured.
    Unavailable,
}

/// Verdict plus where it came from, as stored on the call record.
#[derive(Debug, Clone, PartialEq)]
pub struct VerdictResult {
    pub verdict: Verdict,
    pub source: String,
    pub raw: String,
}

impl VerdictResult {
    pub fn fail(source: &str) -> Self {
        Self {
            verdict: Verdict::Fail,
            source: source.to_string(),
            raw: String::new(),
        }
    }
}

impl From<ClassifierOutcome> for VerdictResult {
    fn from(outcome: ClassifierOutcome) -> Self {
        let (verdict, source, raw) = match outcome {
            ClassifierOutcome::Classified(report) => match report.verdict {
                Sentiment::Pass => (Verdict::Pass, "classifier", report.raw),
                Sentiment::Fail => (Verdict::Fail, "classifier", report.raw),
                Sentiment::Unclear => (Verdict::Fail, "classifier_unclear", report.raw),
            },
            ClassifierOutcome::Invalid { raw } => (Verdict::Fail, "classifier_invalid", raw),
            ClassifierOutcome::Failed { reason } => (Verdict::Fail, "classifier_error", reason),
            ClassifierOutcome::Unavailable => (Verdict::Fail, "missing_key", String::new()),
        };
        Self {
            verdict,
            source: source.to_string(),
            raw,
        }
    }
}

#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, summary: &str, transcript: Option<&str>) -> ClassifierOutcome;
}

/// Claude-backed classifier. `None` client means no key was configured.
pub struct LlmSentimentClassifier {
    llm: Option<LlmClient>,
}

impl LlmSentimentClassifier {
    pub fn new(llm: Option<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl SentimentClassifier for LlmSentimentClassifier {
    async fn classify(&self, summary: &str, transcript: Option<&str>) -> ClassifierOutcome {
        let Some(llm) = &self.llm else {
            warn!("Sentiment classifier has no API key; defaulting to human review");
            return ClassifierOutcome::Unavailable;
        };

        let prompt = build_prompt(summary, transcript);
        let system = format!("{SENTIMENT_SYSTEM} {CONSTRAINED_OUTPUT_SYSTEM}");

        match llm.complete(&prompt, &system, MAX_OUTPUT_TOKENS).await {
            Ok(text) => match parse_output(&text) {
                Some(report) => {
                    info!("Reference classified as {:?}", report.verdict);
                    ClassifierOutcome::Classified(report)
                }
                None => {
                    warn!("Classifier output outside allowed vocabulary: {text:?}");
                    ClassifierOutcome::Invalid { raw: text }
                }
            },
            Err(e) => {
                warn!("Classifier call failed: {e}");
                ClassifierOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn build_prompt(summary: &str, transcript: Option<&str>) -> String {
    let transcript_block = match transcript {
        Some(t) if !t.trim().is_empty() => format!("\nTRANSCRIPT:\n{t}\n"),
        _ => String::new(),
    };
    SENTIMENT_PROMPT
        .replace("{summary}", summary)
        .replace("{transcript_block}", &transcript_block)
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    verdict: String,
    confidence: Option<f32>,
    #[serde(default, alias = "redFlags")]
    red_flags: Vec<String>,
}

/// Accepts either a bare `pass` / `fail` / `unclear` token or a JSON object
/// whose `verdict` is one of those. Anything else is `None`.
pub fn parse_output(text: &str) -> Option<SentimentReport> {
    let cleaned = strip_json_fences(text);

    if let Some(verdict) = Sentiment::parse(cleaned) {
        return Some(SentimentReport {
            verdict,
            confidence: None,
            red_flags: Vec::new(),
            raw: text.to_string(),
        });
    }

    let parsed: RawClassification = serde_json::from_str(cleaned).ok()?;
    let verdict = Sentiment::parse(&parsed.verdict)?;
    Some(SentimentReport {
        verdict,
        confidence: parsed.confidence.filter(|c| (0.0..=1.0).contains(c)),
        red_flags: parsed.red_flags,
        raw: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_token() {
        let report = parse_output(" Pass\n").unwrap();
        assert_eq!(report.verdict, Sentiment::Pass);
        assert!(report.red_flags.is_empty());
    }

    #[test]
    fn test_parse_json_object() {
        let report = parse_output(
            r#"```json
{"verdict": "FAIL", "confidence": 0.9, "red_flags": ["left on bad terms"]}
```"#,
        )
        .unwrap();
        assert_eq!(report.verdict, Sentiment::Fail);
        assert_eq!(report.confidence, Some(0.9));
        assert_eq!(report.red_flags, vec!["left on bad terms".to_string()]);
    }

    #[test]
    fn test_parse_rejects_loose_answers() {
        assert!(parse_output("pass.").is_none());
        assert!(parse_output("I think this is a pass").is_none());
        assert!(parse_output(r#"{"verdict": "maybe"}"#).is_none());
        assert!(parse_output("").is_none());
    }

    #[test]
    fn test_out_of_range_confidence_is_dropped() {
        let report = parse_output(r#"{"verdict": "pass", "confidence": 7}"#).unwrap();
        assert_eq!(report.confidence, None);
    }

    #[test]
    fn test_only_pass_maps_to_pass() {
        let pass = ClassifierOutcome::Classified(parse_output("pass").unwrap());
        assert_eq!(VerdictResult::from(pass).verdict, Verdict::Pass);

        let unclear = VerdictResult::from(ClassifierOutcome::Classified(
            parse_output("unclear").unwrap(),
        ));
        assert_eq!(unclear.verdict, Verdict::Fail);
        assert_eq!(unclear.source, "classifier_unclear");

        let invalid = VerdictResult::from(ClassifierOutcome::Invalid { raw: "yes".into() });
        assert_eq!(invalid.verdict, Verdict::Fail);
        assert_eq!(invalid.source, "classifier_invalid");
        assert_eq!(invalid.raw, "yes");

        let failed = VerdictResult::from(ClassifierOutcome::Failed {
            reason: "timeout".into(),
        });
        assert_eq!(failed.source, "classifier_error");

        let missing = VerdictResult::from(ClassifierOutcome::Unavailable);
        assert_eq!(missing.verdict, Verdict::Fail);
        assert_eq!(missing.source, "missing_key");
    }

    #[tokio::test]
    async fn test_unconfigured_classifier_is_unavailable() {
        let classifier = LlmSentimentClassifier::new(None);
        let outcome = classifier.classify("great candidate", None).await;
        assert_eq!(outcome, ClassifierOutcome::Unavailable);
    }

    #[test]
    fn test_prompt_includes_transcript_only_when_present() {
        let with = build_prompt("positive", Some("AI: hello\nRef: she was great"));
        assert!(with.contains("TRANSCRIPT:"));
        assert!(with.contains("she was great"));
        let without = build_prompt("positive", Some("   "));
        assert!(!without.contains("TRANSCRIPT:"));
    }
}
