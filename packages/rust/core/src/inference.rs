//! Exercise topic inference.
//!
//! A fixed, ordered rule table maps exercise attributes to topics. Every rule
//! is evaluated and the results are unioned; inference is a pure function of
//! the exercise.

use transfit_shared::{Exercise, TopicSet, TopicTag};

/// Lowercased view of the attributes the rules inspect.
struct Signals {
    pattern: String,
    goal: String,
    exercise_type: String,
    body_parts: String,
    binder_aware: bool,
    pelvic_floor_safe: bool,
}

impl Signals {
    fn from_exercise(ex: &Exercise) -> Self {
        let lower = |v: &Option<String>| v.as_deref().unwrap_or("").trim().to_lowercase();
        Self {
            pattern: lower(&ex.pattern),
            goal: lower(&ex.goal),
            exercise_type: lower(&ex.exercise_type),
            body_parts: lower(&ex.body_parts),
            binder_aware: ex.binder_aware,
            pelvic_floor_safe: ex.pelvic_floor_safe,
        }
    }
}

/// One inference rule: a named condition and the topics it contributes.
pub struct Rule {
    pub name: &'static str,
    applies: fn(&Signals) -> bool,
    pub adds: &'static [TopicTag],
}

const LOADED_PATTERNS: &[&str] = &["hinge", "squat", "lunge", "carry", "gait"];
const CARDIO_TYPES: &[&str] = &["cardio", "plyometrics"];
const GENTLE_GOALS: &[&str] = &["mobility", "recovery"];
const CHEST_REGIONS: &[&str] = &["chest", "shoulder", "upper arm"];

/// The inference table, in evaluation order.
pub const RULES: &[Rule] = &[
    Rule {
        name: "loaded_pattern",
        applies: |s| LOADED_PATTERNS.contains(&s.pattern.as_str()),
        adds: &[TopicTag::HrtStrength, TopicTag::BoneHealth],
    },
    Rule {
        name: "core_pattern",
        applies: |s| s.pattern == "core",
        adds: &[TopicTag::HrtStrength, TopicTag::BoneHealth],
    },
    Rule {
        name: "conditioning",
        applies: |s| s.goal == "conditioning" || CARDIO_TYPES.contains(&s.exercise_type.as_str()),
        adds: &[TopicTag::CardioRisk],
    },
    Rule {
        name: "gentle_goal",
        applies: |s| GENTLE_GOALS.contains(&s.goal.as_str()),
        adds: &[TopicTag::BoneHealth, TopicTag::TopSurgery],
    },
    Rule {
        name: "chest_region",
        applies: |s| CHEST_REGIONS.iter().any(|r| s.body_parts.contains(r)),
        adds: &[TopicTag::TopSurgery],
    },
    Rule {
        name: "binder_aware",
        applies: |s| s.binder_aware,
        adds: &[TopicTag::TopSurgery],
    },
    Rule {
        name: "pelvic_floor_load",
        applies: |s| !s.pelvic_floor_safe,
        adds: &[TopicTag::HrtStrength],
    },
];

/// Rules that fire for `ex`, in table order.
pub fn matching_rules(ex: &Exercise) -> Vec<&'static Rule> {
    let signals = Signals::from_exercise(ex);
    RULES.iter().filter(|r| (r.applies)(&signals)).collect()
}

/// Union of topics contributed by every rule that fires for `ex`.
pub fn infer_topics(ex: &Exercise) -> TopicSet {
    matching_rules(ex)
        .into_iter()
        .flat_map(|r| r.adds.iter().copied())
        .collect()
}
