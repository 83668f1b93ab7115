//! Embedded libSQL storage layer.
//!
//! The [`Storage`] struct wraps a libSQL database holding the research
//! literature, the exercise catalog and its staging metadata, and the
//! generated tip records.
//!
//! **Access rules:**
//! - Enrichment runs: read-write via [`Storage::open`]
//! - Reporting/dry runs: [`Storage::open_readonly`], whose write methods
//!   all fail before reaching the database
//!
//! Tip uniqueness per `(exercise_id, population, context)` is enforced by a
//! table constraint, so [`Storage::insert_tip`] never writes a second row for
//! the same tuple even when two runs race past [`Storage::tip_exists`].

mod migrations;

use std::path::Path;

use libsql::{Connection, Database, params};
use transfit_shared::{
    Exercise, ResearchArticle, Result, StagingMeta, TipRecord, TipSheet, TopicSet, TopicTag,
    TransfitError,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// Outcome of an insert-if-absent tip write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipInsert {
    /// A new row was written.
    Inserted,
    /// A row for the same tuple already existed; nothing was written.
    AlreadyPresent,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TransfitError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` without running migrations. The file itself
    /// is opened normally; every write method on the returned handle fails.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        TransfitError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(TransfitError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Research operations
    // -----------------------------------------------------------------------

    /// Insert or replace a research article (used by the ingestion process).
    pub async fn upsert_research(&self, article: &ResearchArticle) -> Result<()> {
        self.check_writable()?;
        let topics = topics_to_json(&article.topics)?;
        self.conn
            .execute(
                "INSERT INTO transfit_research
                   (id, title, takeaways, summary, year, journal, doi, relevant, topics, processed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                   title = excluded.title,
                   takeaways = excluded.takeaways,
                   summary = excluded.summary,
                   year = excluded.year,
                   journal = excluded.journal,
                   doi = excluded.doi,
                   relevant = excluded.relevant,
                   topics = excluded.topics,
                   processed = excluded.processed",
                params![
                    article.id,
                    article.title.as_deref(),
                    article.takeaways.as_deref(),
                    article.summary.as_deref(),
                    article.year.map(i64::from),
                    article.journal.as_deref(),
                    article.doi.as_deref(),
                    i64::from(article.relevant),
                    topics.as_str(),
                    i64::from(article.processed),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// List every research article flagged relevant, ordered by id.
    pub async fn list_relevant_research(&self) -> Result<Vec<ResearchArticle>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, takeaways, summary, year, journal, doi, relevant, topics, processed
                 FROM transfit_research WHERE relevant = 1 ORDER BY id",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_research(&row)?);
        }
        Ok(results)
    }

    /// Get a single research article by id.
    pub async fn get_research(&self, id: i64) -> Result<Option<ResearchArticle>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, takeaways, summary, year, journal, doi, relevant, topics, processed
                 FROM transfit_research WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_research(&row)?)),
            None => Ok(None),
        }
    }

    /// Store a new topic set for an article and mark it processed.
    pub async fn update_research_topics(&self, id: i64, topics: &TopicSet) -> Result<()> {
        self.check_writable()?;
        let topics = topics_to_json(topics)?;
        self.conn
            .execute(
                "UPDATE transfit_research SET topics = ?1, processed = 1 WHERE id = ?2",
                params![topics.as_str(), id],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Exercise operations
    // -----------------------------------------------------------------------

    /// Insert or update an exercise's catalog fields (joined metadata is ignored).
    pub async fn upsert_exercise(&self, exercise: &Exercise) -> Result<()> {
        self.check_writable()?;
        let equipment = serde_json::to_string(&exercise.equipment)
            .map_err(|e| TransfitError::Storage(format!("equipment encode: {e}")))?;
        self.conn
            .execute(
                "INSERT INTO exercises
                   (id, slug, name, pattern, goal, difficulty, equipment, binder_aware, pelvic_floor_safe)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                   slug = excluded.slug,
                   name = excluded.name,
                   pattern = excluded.pattern,
                   goal = excluded.goal,
                   difficulty = excluded.difficulty,
                   equipment = excluded.equipment,
                   binder_aware = excluded.binder_aware,
                   pelvic_floor_safe = excluded.pelvic_floor_safe",
                params![
                    exercise.id,
                    exercise.slug.as_str(),
                    exercise.name.as_str(),
                    exercise.pattern.as_deref(),
                    exercise.goal.as_deref(),
                    exercise.difficulty.as_deref(),
                    equipment.as_str(),
                    i64::from(exercise.binder_aware),
                    i64::from(exercise.pelvic_floor_safe),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// List all exercises ordered by id, without staging metadata.
    pub async fn list_exercises(&self) -> Result<Vec<Exercise>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, slug, name, pattern, goal, difficulty, equipment, binder_aware, pelvic_floor_safe
                 FROM exercises ORDER BY id",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_exercise(&row)?);
        }
        Ok(results)
    }

    /// Insert or update a staging metadata row.
    pub async fn upsert_staging(&self, meta: &StagingMeta) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO staging_exercisedb (slug, body_parts, exercise_type, target_muscles)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(slug) DO UPDATE SET
                   body_parts = excluded.body_parts,
                   exercise_type = excluded.exercise_type,
                   target_muscles = excluded.target_muscles",
                params![
                    meta.slug.as_str(),
                    meta.body_parts.as_deref(),
                    meta.exercise_type.as_deref(),
                    meta.target_muscles.as_deref(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// List all staging metadata rows.
    pub async fn list_staging(&self) -> Result<Vec<StagingMeta>> {
        let mut rows = self
            .conn
            .query(
                "SELECT slug, body_parts, exercise_type, target_muscles
                 FROM staging_exercisedb ORDER BY slug",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(StagingMeta {
                slug: row.get::<String>(0).map_err(db_err)?,
                body_parts: row.get::<String>(1).ok(),
                exercise_type: row.get::<String>(2).ok(),
                target_muscles: row.get::<String>(3).ok(),
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Tip operations
    // -----------------------------------------------------------------------

    /// Whether a tip record exists for the tuple.
    pub async fn tip_exists(&self, exercise_id: i64, population: &str, context: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM exercise_trans_tips
                 WHERE exercise_id = ?1 AND population = ?2 AND context = ?3",
                params![exercise_id, population, context],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)? > 0),
            None => Ok(false),
        }
    }

    /// Insert a tip record unless one already exists for its tuple.
    pub async fn insert_tip(&self, record: &TipRecord) -> Result<TipInsert> {
        self.check_writable()?;
        let tips_json = serde_json::to_string(&record.tips)
            .map_err(|e| TransfitError::Storage(format!("tips encode: {e}")))?;
        let dois_json = serde_json::to_string(&record.source_dois)
            .map_err(|e| TransfitError::Storage(format!("source_dois encode: {e}")))?;

        let written = self
            .conn
            .execute(
                "INSERT INTO exercise_trans_tips
                   (id, exercise_id, population, context, tips_json, source_dois,
                    needs_review, model_id, evidence_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(exercise_id, population, context) DO NOTHING",
                params![
                    record.id.as_str(),
                    record.exercise_id,
                    record.population.as_str(),
                    record.context.as_str(),
                    tips_json.as_str(),
                    dois_json.as_str(),
                    i64::from(record.needs_review),
                    record.model_id.as_deref(),
                    record.evidence_hash.as_deref(),
                    record.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;

        Ok(if written > 0 {
            TipInsert::Inserted
        } else {
            TipInsert::AlreadyPresent
        })
    }

    /// Get the tip record for a tuple, if any.
    pub async fn get_tip(
        &self,
        exercise_id: i64,
        population: &str,
        context: &str,
    ) -> Result<Option<TipRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, exercise_id, population, context, tips_json, source_dois,
                        needs_review, model_id, evidence_hash, created_at
                 FROM exercise_trans_tips
                 WHERE exercise_id = ?1 AND population = ?2 AND context = ?3",
                params![exercise_id, population, context],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_tip(&row)?)),
            None => Ok(None),
        }
    }

    /// Count all stored tip records.
    pub async fn count_tips(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM exercise_trans_tips", params![])
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)? as usize),
            None => Ok(0),
        }
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn db_err(e: libsql::Error) -> TransfitError {
    TransfitError::Storage(e.to_string())
}

/// Encode a topic set as a JSON array in canonical tag order.
fn topics_to_json(topics: &TopicSet) -> Result<String> {
    let names: Vec<&str> = topics.iter().map(TopicTag::as_str).collect();
    serde_json::to_string(&names).map_err(|e| TransfitError::Storage(format!("topics encode: {e}")))
}

/// Decode a stored topic array. Unknown tags are ignored on read; the stored
/// column keeps them until the known topic set changes and is rewritten.
fn topics_from_json(raw: Option<String>) -> TopicSet {
    let Some(raw) = raw else {
        return TopicSet::new();
    };
    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(names) => names.iter().filter_map(|n| n.parse().ok()).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "unreadable topics column, treating as empty");
            TopicSet::new()
        }
    }
}

/// Read a nullable 0/1 column as a bool (NULL reads as false).
fn flag(row: &libsql::Row, idx: i32) -> bool {
    row.get::<i64>(idx).map(|v| v != 0).unwrap_or(false)
}

/// Convert a database row to a [`ResearchArticle`].
fn row_to_research(row: &libsql::Row) -> Result<ResearchArticle> {
    Ok(ResearchArticle {
        id: row.get::<i64>(0).map_err(db_err)?,
        title: row.get::<String>(1).ok(),
        takeaways: row.get::<String>(2).ok(),
        summary: row.get::<String>(3).ok(),
        year: row.get::<i64>(4).ok().map(|y| y as i32),
        journal: row.get::<String>(5).ok(),
        doi: row.get::<String>(6).ok(),
        relevant: flag(row, 7),
        topics: topics_from_json(row.get::<String>(8).ok()),
        processed: flag(row, 9),
    })
}

/// Convert a database row to an [`Exercise`] with no staging metadata.
fn row_to_exercise(row: &libsql::Row) -> Result<Exercise> {
    let equipment: Vec<String> = match row.get::<String>(6).ok() {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| TransfitError::Storage(format!("invalid equipment JSON: {e}")))?,
        None => Vec::new(),
    };

    Ok(Exercise {
        id: row.get::<i64>(0).map_err(db_err)?,
        slug: row.get::<String>(1).map_err(db_err)?,
        name: row.get::<String>(2).map_err(db_err)?,
        pattern: row.get::<String>(3).ok(),
        goal: row.get::<String>(4).ok(),
        difficulty: row.get::<String>(5).ok(),
        equipment,
        binder_aware: flag(row, 7),
        pelvic_floor_safe: flag(row, 8),
        body_parts: None,
        exercise_type: None,
        target_muscles: None,
    })
}

/// Convert a database row to a [`TipRecord`].
fn row_to_tip(row: &libsql::Row) -> Result<TipRecord> {
    let tips_raw: String = row.get(4).map_err(db_err)?;
    let tips: TipSheet = serde_json::from_str(&tips_raw)
        .map_err(|e| TransfitError::Storage(format!("invalid tips JSON: {e}")))?;
    let dois_raw: String = row.get(5).map_err(db_err)?;
    let source_dois: Vec<String> = serde_json::from_str(&dois_raw)
        .map_err(|e| TransfitError::Storage(format!("invalid source_dois JSON: {e}")))?;

    Ok(TipRecord {
        id: row.get::<String>(0).map_err(db_err)?,
        exercise_id: row.get::<i64>(1).map_err(db_err)?,
        population: row.get::<String>(2).map_err(db_err)?,
        context: row.get::<String>(3).map_err(db_err)?,
        tips,
        source_dois,
        needs_review: flag(row, 6),
        model_id: row.get::<String>(7).ok(),
        evidence_hash: row.get::<String>(8).ok(),
        created_at: {
            let s: String = row.get(9).map_err(db_err)?;
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|e| TransfitError::Storage(format!("invalid date: {e}")))?
        },
    })
}
