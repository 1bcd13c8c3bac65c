// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.

/// System prompt fragment that pins the model to a tiny output vocabulary.
pub const CONSTRAINED_OUTPUT_SYSTEM: &str = "You are a precise classifier. \
    You MUST answer using only the output format you are given. \
    Do NOT use markdown code fences. \
    Do NOT include explanations, punctuation or apologies.";
