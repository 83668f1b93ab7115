//! Core domain types: topic vocabulary, research articles, exercises, tips.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default audience segment for generated tips.
pub const DEFAULT_POPULATION: &str = "general";

/// Default usage scenario for generated tips.
pub const DEFAULT_CONTEXT: &str = "general";

// ---------------------------------------------------------------------------
// TopicTag
// ---------------------------------------------------------------------------

/// One member of the closed topic vocabulary linking exercises to research.
///
/// Variant order is the canonical order used when topic sets are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicTag {
    HrtStrength,
    BoneHealth,
    TopSurgery,
    CardioRisk,
    MentalHealth,
}

impl TopicTag {
    /// Every tag, in canonical order.
    pub const ALL: [TopicTag; 5] = [
        Self::HrtStrength,
        Self::BoneHealth,
        Self::TopSurgery,
        Self::CardioRisk,
        Self::MentalHealth,
    ];

    /// Wire/storage name of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HrtStrength => "hrt_strength",
            Self::BoneHealth => "bone_health",
            Self::TopSurgery => "top_surgery",
            Self::CardioRisk => "cardio_risk",
            Self::MentalHealth => "mental_health",
        }
    }
}

impl std::fmt::Display for TopicTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TopicTag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| format!("unknown topic tag: {s}"))
    }
}

/// An unordered set of topic tags (iterates in canonical order).
pub type TopicSet = BTreeSet<TopicTag>;

/// Render a topic set as a comma-separated list for logs and CLI output.
pub fn format_topics(topics: &TopicSet) -> String {
    topics
        .iter()
        .map(TopicTag::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// ResearchArticle
// ---------------------------------------------------------------------------

/// A research record from the `transfit_research` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchArticle {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Curated key findings; preferred over `summary` when rendering context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub takeaways: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    pub relevant: bool,
    #[serde(default)]
    pub topics: TopicSet,
    pub processed: bool,
}

impl ResearchArticle {
    /// Takeaways, falling back to the summary, falling back to nothing.
    pub fn evidence_text(&self) -> &str {
        self.takeaways
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(self.summary.as_deref())
            .unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Exercise
// ---------------------------------------------------------------------------

/// An exercise from the catalog, optionally joined with staging metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: i64,
    pub slug: String,
    pub name: String,
    /// Movement category (squat, hinge, core, carry, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Training goal (strength, mobility, conditioning, recovery, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub equipment: Vec<String>,
    pub binder_aware: bool,
    pub pelvic_floor_safe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_parts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_muscles: Option<String>,
}

/// A row of the `staging_exercisedb` table, keyed by slug.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagingMeta {
    pub slug: String,
    #[serde(default)]
    pub body_parts: Option<String>,
    #[serde(default)]
    pub exercise_type: Option<String>,
    #[serde(default)]
    pub target_muscles: Option<String>,
}

// ---------------------------------------------------------------------------
// TipSheet / TipRecord
// ---------------------------------------------------------------------------

/// Structured coaching content returned by the generator.
///
/// Every key is required and no others are accepted, so a response with a
/// missing section fails to deserialize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TipSheet {
    pub form_focus: Vec<String>,
    pub hrt_considerations: Vec<String>,
    pub binding_considerations: Vec<String>,
    pub post_op_considerations: Vec<String>,
    pub gender_affirming_modifications: Vec<String>,
    pub general_safety: Vec<String>,
    pub disclaimer: String,
    pub source_dois: Vec<String>,
}

impl TipSheet {
    /// True when the sheet carries no coaching content at all.
    pub fn is_empty(&self) -> bool {
        self.form_focus.is_empty()
            && self.hrt_considerations.is_empty()
            && self.binding_considerations.is_empty()
            && self.post_op_considerations.is_empty()
            && self.gender_affirming_modifications.is_empty()
            && self.general_safety.is_empty()
            && self.disclaimer.trim().is_empty()
    }
}

/// A persisted row of `exercise_trans_tips`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipRecord {
    /// Unique record identifier (UUID v7).
    pub id: String,
    pub exercise_id: i64,
    pub population: String,
    pub context: String,
    pub tips: TipSheet,
    /// DOIs of the research selected for the evidence context.
    pub source_dois: Vec<String>,
    /// Always true on creation; cleared by human reviewers elsewhere.
    pub needs_review: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// SHA-256 of the rendered research context the tips were grounded on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TipRecord {
    /// Build a fresh record awaiting review.
    pub fn new(
        exercise_id: i64,
        population: impl Into<String>,
        context: impl Into<String>,
        tips: TipSheet,
        source_dois: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            exercise_id,
            population: population.into(),
            context: context.into(),
            tips,
            source_dois,
            needs_review: true,
            model_id: None,
            evidence_hash: None,
            created_at: Utc::now(),
        }
    }
}
