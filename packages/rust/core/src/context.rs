//! Research context assembly for one exercise.
//!
//! Articles are selected in the order given, first match wins, up to a cap.
//! The rendered text and the DOI list are what the generator is grounded on.

use sha2::{Digest, Sha256};
use transfit_shared::{ResearchArticle, TopicSet};

/// Default number of articles folded into one context.
pub const DEFAULT_MAX_ARTICLES: usize = 6;

/// Rendered evidence for one exercise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceContext {
    /// One line per selected article, joined with `\n`.
    pub text: String,
    /// DOIs of selected articles that have one, in selection order.
    pub dois: Vec<String>,
    /// Number of articles selected.
    pub articles: usize,
}

impl EvidenceContext {
    /// True when there is no evidence basis to generate from.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Hex SHA-256 of the rendered text, stored alongside generated tips.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Render one article as a context line.
pub fn render_line(article: &ResearchArticle) -> String {
    let title = article.title.as_deref().unwrap_or("Untitled");
    let year = article
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "n.d.".into());
    let journal = article
        .journal
        .as_deref()
        .filter(|j| !j.trim().is_empty())
        .unwrap_or("n.d.");
    format!("- {title} ({year}, {journal}): {}", article.evidence_text())
}

/// Build the evidence context for an exercise with `topics`.
///
/// Empty when `topics` is empty or no article shares a topic with it. A cap
/// of zero is treated as one.
pub fn build_context(
    articles: &[ResearchArticle],
    topics: &TopicSet,
    max_articles: usize,
) -> EvidenceContext {
    if topics.is_empty() {
        return EvidenceContext::default();
    }

    let selected: Vec<&ResearchArticle> = articles
        .iter()
        .filter(|a| !a.topics.is_disjoint(topics))
        .take(max_articles.max(1))
        .collect();

    if selected.is_empty() {
        return EvidenceContext::default();
    }

    let text = selected
        .iter()
        .map(|a| render_line(a))
        .collect::<Vec<_>>()
        .join("\n");

    let dois = selected
        .iter()
        .filter_map(|a| a.doi.as_deref())
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from)
        .collect();

    EvidenceContext {
        text,
        dois,
        articles: selected.len(),
    }
}
