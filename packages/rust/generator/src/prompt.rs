//! Prompt rendering for tip generation.

use crate::TipRequest;

/// System message: the model must answer with a bare JSON object.
pub const SYSTEM_PROMPT: &str = "You return only valid JSON objects.";

/// Placeholder for profile fields the catalog does not know.
const UNKNOWN: &str = "unknown";

/// Render the user prompt for one exercise.
///
/// The response shape is spelled out literally, with the request's DOIs
/// pre-filled in `source_dois` so the model echoes them back.
pub fn render_prompt(request: &TipRequest) -> String {
    let p = &request.profile;
    let dois = serde_json::to_string(&request.source_dois).unwrap_or_else(|_| "[]".into());
    let equipment = if p.equipment.is_empty() {
        "none".to_string()
    } else {
        p.equipment.join(", ")
    };

    format!(
        r#"You are a strength and conditioning coach and exercise physiologist with deep experience training transgender and gender diverse people safely.

EXERCISE PROFILE:
- Name: {name}
- Pattern: {pattern}
- Goal: {goal}
- Difficulty: {difficulty}
- Equipment: {equipment}
- Body parts: {body_parts}
- Exercise type: {exercise_type}
- Target muscles: {target_muscles}
- Binder aware: {binder_aware}
- Pelvic floor safe: {pelvic_floor_safe}

RESEARCH EXTRACTS (peer-reviewed findings on trans health, hormone therapy, surgical recovery, bone health, and exercise):
{context}

TASK:
Write short, practical coaching tips for a general trans audience performing THIS exercise. Stay consistent with the research extracts and with mainstream evidence-based training practice. Cover:
1) Form and technique for this exact movement: setup, joint positions, what a good rep feels like, common faults.
2) Hormone therapy considerations for training (recovery, tendon and joint sensitivity, bone health). Never suggest medication changes.
3) Binding and chest considerations whenever the movement loads the chest, shoulders, or upper body, or when binder aware is true.
4) Gender-affirming modifications: posture, angles, clothing, setup, or variations that reduce dysphoria or feel safer.
5) General safety: breathing, pain versus effort, when to regress, when to seek medical advice.

Respond with ONE JSON object of exactly this shape and nothing else:

{{
  "form_focus": ["...", "..."],
  "hrt_considerations": ["...", "..."],
  "binding_considerations": ["...", "..."],
  "post_op_considerations": ["...", "..."],
  "gender_affirming_modifications": ["...", "..."],
  "general_safety": ["...", "..."],
  "disclaimer": "One or two sentences encouraging users to consult a provider familiar with trans health.",
  "source_dois": {dois}
}}

Rules:
- Each array holds 2-4 short, specific sentences.
- form_focus must name the joints that move in this exercise.
- binding_considerations should address breathing, heat, and volume, and when to shorten sets or lower intensity.
- gender_affirming_modifications may mention training alone or with a trusted partner, clothing and setup choices, and less dysphoric variations.
- No individualized medical advice and no medication or dose changes.
- Do not name specific studies or journals.
- Do not reuse the same phrasing across sections.
- Use an empty array for any section that genuinely does not apply.
- Keep the tone affirming, practical, and strength-based.
- Output raw JSON only."#,
        name = p.name,
        pattern = p.pattern.as_deref().unwrap_or(UNKNOWN),
        goal = p.goal.as_deref().unwrap_or(UNKNOWN),
        difficulty = p.difficulty.as_deref().unwrap_or(UNKNOWN),
        body_parts = p.body_parts.as_deref().unwrap_or(UNKNOWN),
        exercise_type = p.exercise_type.as_deref().unwrap_or(UNKNOWN),
        target_muscles = p.target_muscles.as_deref().unwrap_or(UNKNOWN),
        binder_aware = p.binder_aware,
        pelvic_floor_safe = p.pelvic_floor_safe,
        context = request.research_context,
    )
}
