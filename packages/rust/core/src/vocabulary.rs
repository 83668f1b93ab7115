//! The topic vocabulary and its research trigger keywords.
//!
//! Table order and keyword spelling decide classification outcomes; both are
//! fixed. Keywords are lowercase and matched as plain substrings.

use transfit_shared::{TopicSet, TopicTag};

/// Trigger keywords per topic, in canonical tag order.
pub const TOPIC_KEYWORDS: [(TopicTag, &[&str]); 5] = [
    (
        TopicTag::HrtStrength,
        &[
            "hormone",
            "androgen",
            "testosterone",
            "estradiol",
            "sex steroid",
            "muscle strength",
            "lean mass",
        ],
    ),
    (
        TopicTag::BoneHealth,
        &[
            "bone density",
            "bmd",
            "osteoporosis",
            "fracture",
            "bone mineral",
        ],
    ),
    (
        TopicTag::TopSurgery,
        &[
            "mastectomy",
            "top surgery",
            "chest surgery",
            "breast surgery",
        ],
    ),
    (
        TopicTag::CardioRisk,
        &[
            "cardiovascular",
            "cardio",
            "aerobic",
            "heart disease",
            "hypertension",
        ],
    ),
    (
        TopicTag::MentalHealth,
        &[
            "depression",
            "anxiety",
            "mental health",
            "distress",
            "dysphoria",
        ],
    ),
];

/// Keywords that trigger `tag`.
pub fn keywords_for(tag: TopicTag) -> &'static [&'static str] {
    TOPIC_KEYWORDS
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, kws)| *kws)
        .unwrap_or(&[])
}

/// Every topic with at least one keyword occurring in `text` (case-insensitive).
pub fn match_topics(text: &str) -> TopicSet {
    let haystack = text.to_lowercase();
    TOPIC_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| haystack.contains(k)))
        .map(|(tag, _)| *tag)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_whole_vocabulary_in_order() {
        let tags: Vec<TopicTag> = TOPIC_KEYWORDS.iter().map(|(t, _)| *t).collect();
        assert_eq!(tags, TopicTag::ALL.to_vec());
    }

    #[test]
    fn keywords_are_lowercase() {
        for (_, keywords) in TOPIC_KEYWORDS {
            for k in keywords {
                assert_eq!(*k, k.to_lowercase());
            }
        }
    }

    #[test]
    fn keywords_for_returns_table_row() {
        assert_eq!(keywords_for(TopicTag::TopSurgery).len(), 4);
        assert!(keywords_for(TopicTag::BoneHealth).contains(&"bmd"));
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        let topics = match_topics("Aerobic capacity and BMD after MASTECTOMY");
        let expected: TopicSet = [TopicTag::BoneHealth, TopicTag::TopSurgery, TopicTag::CardioRisk]
            .into_iter()
            .collect();
        assert_eq!(topics, expected);
    }

    #[test]
    fn no_hits_yields_empty_set() {
        assert!(match_topics("Sleep hygiene in adolescents").is_empty());
        assert!(match_topics("").is_empty());
    }
}
