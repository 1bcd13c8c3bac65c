// Reference sentiment prompt templates.

pub const SENTIMENT_SYSTEM: &str = "\
You are evaluating a job reference call for an employer. \
You judge ONLY the reference's feedback about the candidate, never the quality of the call itself.";

pub const SENTIMENT_PROMPT: &str = r#"Decide whether the REFERENCE FEEDBACK about the candidate is positive enough to PASS or negative enough to FAIL.

PASS if the reference clearly recommends the candidate, is positive, and raises no significant concerns.
FAIL if the reference is negative, refuses to recommend, expresses serious concerns, or cannot confirm key claims.
UNCLEAR if the feedback does not support either decision.

SUMMARY:
{summary}
{transcript_block}
OUTPUT (return exactly this JSON object and nothing else):
{"verdict": "pass" | "fail" | "unclear", "confidence": number between 0 and 1, "red_flags": ["string"]}"#;
