//! Structured tip generation behind a narrow trait.
//!
//! The orchestrator only sees [`TipGenerator`]: given an exercise profile and
//! the rendered research context, return one JSON object. Shape validation
//! happens in the caller, so substitutes in tests can hand back malformed
//! objects exactly as a misbehaving service would.
//!
//! [`OpenAiGenerator`] is the production implementation, talking to an
//! OpenAI-compatible Chat Completions endpoint with deterministic decoding.

mod openai;
pub mod prompt;

use async_trait::async_trait;
use serde::Serialize;
use transfit_shared::{Exercise, Result};

pub use openai::{OpenAiGenerator, OpenAiOptions};

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// The exercise attributes shown to the generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExerciseProfile {
    pub name: String,
    pub pattern: Option<String>,
    pub goal: Option<String>,
    pub difficulty: Option<String>,
    pub equipment: Vec<String>,
    pub body_parts: Option<String>,
    pub exercise_type: Option<String>,
    pub target_muscles: Option<String>,
    pub binder_aware: bool,
    pub pelvic_floor_safe: bool,
}

impl From<&Exercise> for ExerciseProfile {
    fn from(ex: &Exercise) -> Self {
        Self {
            name: ex.name.clone(),
            pattern: ex.pattern.clone(),
            goal: ex.goal.clone(),
            difficulty: ex.difficulty.clone(),
            equipment: ex.equipment.clone(),
            body_parts: ex.body_parts.clone(),
            exercise_type: ex.exercise_type.clone(),
            target_muscles: ex.target_muscles.clone(),
            binder_aware: ex.binder_aware,
            pelvic_floor_safe: ex.pelvic_floor_safe,
        }
    }
}

/// One generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TipRequest {
    pub profile: ExerciseProfile,
    /// Rendered research extracts grounding the tips.
    pub research_context: String,
    /// DOIs of the selected research, echoed back by the generator.
    pub source_dois: Vec<String>,
}

// ---------------------------------------------------------------------------
// Generator trait
// ---------------------------------------------------------------------------

/// A structured-content generator.
///
/// Implementations return [`transfit_shared::TransfitError::Generation`] for
/// any failure: transport errors, timeouts, refusals, non-JSON output.
#[async_trait]
pub trait TipGenerator: Send + Sync {
    /// Identifier of the model producing content, recorded on each tip.
    fn model_id(&self) -> &str;

    /// Produce one JSON object for the request.
    async fn generate(&self, request: &TipRequest) -> Result<serde_json::Value>;
}
