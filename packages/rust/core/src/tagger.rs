//! Research topic tagging.
//!
//! Relevant articles are classified by keyword hits over their title and
//! takeaways. Storage is only written when an article's topic set actually
//! changes, so repeated runs over unchanged research are write-free.

use tracing::{debug, info, instrument};

use transfit_shared::{ResearchArticle, Result, TopicSet, format_topics};
use transfit_storage::Storage;

use crate::vocabulary::match_topics;

/// Outcome of a tagging pass.
#[derive(Debug, Clone, Default)]
pub struct TagReport {
    /// Every relevant article with its current topics.
    pub articles: Vec<ResearchArticle>,
    /// Articles whose topics were rewritten this pass.
    pub updated: usize,
}

/// Topics for one article, from its lowercased title and takeaways.
pub fn tag_article(article: &ResearchArticle) -> TopicSet {
    let text = format!(
        "{} {}",
        article.title.as_deref().unwrap_or(""),
        article.evidence_text()
    );
    match_topics(&text)
}

/// Apply freshly computed topics in memory. Returns true when they changed.
fn apply_tags(article: &mut ResearchArticle) -> bool {
    let topics = tag_article(article);
    if topics == article.topics {
        return false;
    }
    article.topics = topics;
    article.processed = true;
    true
}

/// Tag every relevant article and persist the ones whose topics changed.
#[instrument(skip_all)]
pub async fn tag_research(storage: &Storage) -> Result<TagReport> {
    let mut articles = storage
        .list_relevant_research()
        .await
        .map_err(|e| e.into_upstream_read())?;

    let mut updated = 0;
    for article in &mut articles {
        if !apply_tags(article) {
            continue;
        }
        storage
            .update_research_topics(article.id, &article.topics)
            .await
            .map_err(|e| e.into_persistence_write())?;
        updated += 1;
        debug!(id = article.id, topics = %format_topics(&article.topics), "research retagged");
    }

    info!(articles = articles.len(), updated, "research tagging complete");
    Ok(TagReport { articles, updated })
}

/// Compute current topics for `articles` without touching storage.
pub fn preview_tags(mut articles: Vec<ResearchArticle>) -> Vec<ResearchArticle> {
    for article in &mut articles {
        apply_tags(article);
    }
    articles
}
