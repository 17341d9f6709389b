//! Pipeline configuration.
//!
//! One explicit object constructed at process start and threaded through
//! every engine; engine logic never reads the environment. The CLI (or an
//! embedding process) resolves env/flags once at the boundary.

use crate::pipeline::PromptSet;

/// Character budget for a rendered paper, a 4-characters-per-token heuristic
/// against a ~60k-token prompt budget.
pub const MAX_PAPER_CHARS: usize = 240_000;

/// Citation-correction attempts per LLM call, distinct from any outer
/// orchestration retry.
pub const DEFAULT_CITATION_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model identifier passed through to the completion service.
    pub model: String,
    /// Base URL of the completion service.
    pub completion_url: String,
    /// Active prompt/schema set.
    pub prompt_set: PromptSet,
    /// Bounded attempt budget for invalid model output.
    pub citation_attempts: u32,
    /// Rendered-text truncation budget.
    pub max_paper_chars: usize,
    /// Per-attempt HTTP timeout.
    pub request_timeout_secs: u64,
    /// Opaque reasoning-budget toggle forwarded to the service.
    pub think: bool,
    /// Output token budget for extraction calls.
    pub extraction_max_tokens: u32,
    /// Output token budget for aggregation calls (larger: multi-category
    /// synthesis over many papers).
    pub aggregation_max_tokens: u32,
}

impl PipelineConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            completion_url: "http://localhost:11434".to_string(),
            prompt_set: PromptSet::Acmg,
            citation_attempts: DEFAULT_CITATION_ATTEMPTS,
            max_paper_chars: MAX_PAPER_CHARS,
            request_timeout_secs: 300,
            think: true,
            extraction_max_tokens: 30_000,
            aggregation_max_tokens: 60_000,
        }
    }
}
