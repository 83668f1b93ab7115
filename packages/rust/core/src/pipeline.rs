//! Enrichment pipeline: research → tagging → exercises → tips.
//!
//! Each exercise runs through a fixed sequence of checks and ends in exactly
//! one [`ExerciseOutcome`]. Exercises are processed one at a time, in the
//! order supplied, and each is visited at most once per run.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use transfit_generator::{ExerciseProfile, TipGenerator, TipRequest};
use transfit_shared::{
    DEFAULT_CONTEXT, DEFAULT_POPULATION, DefaultsConfig, Exercise, ResearchArticle, Result,
    TipRecord, TipSheet, TopicSet, TransfitError, format_topics,
};
use transfit_storage::{Storage, TipInsert};

use crate::catalog::load_exercises;
use crate::context::{DEFAULT_MAX_ARTICLES, build_context};
use crate::inference::{infer_topics, matching_rules};
use crate::tagger::{preview_tags, tag_research};

/// Configuration for one enrichment run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Population key written on every tip.
    pub population: String,
    /// Context key written on every tip.
    pub context: String,
    /// Stop once this many tips have been persisted. `None` is unbounded.
    pub max_tips: Option<usize>,
    /// Research articles folded into one evidence context.
    pub max_articles: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            population: DEFAULT_POPULATION.into(),
            context: DEFAULT_CONTEXT.into(),
            max_tips: None,
            max_articles: DEFAULT_MAX_ARTICLES,
        }
    }
}

impl From<&DefaultsConfig> for RunConfig {
    fn from(defaults: &DefaultsConfig) -> Self {
        Self {
            population: defaults.population.clone(),
            context: defaults.context.clone(),
            max_tips: defaults.batch_limit(),
            max_articles: defaults.max_articles,
        }
    }
}

/// Terminal state of one exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExerciseOutcome {
    /// A tip already exists for the (exercise, population, context) tuple.
    Duplicate,
    /// No topic could be inferred from the exercise attributes.
    NoTopic,
    /// No tagged research shares a topic with the exercise.
    NoEvidence,
    /// The generator failed or returned an unusable object.
    GenError,
    /// A new tip was written.
    Persisted,
}

impl ExerciseOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "DUPLICATE",
            Self::NoTopic => "NO_TOPIC",
            Self::NoEvidence => "NO_EVIDENCE",
            Self::GenError => "GEN_ERROR",
            Self::Persisted => "PERSISTED",
        }
    }
}

impl fmt::Display for ExerciseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one visited exercise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseReport {
    pub exercise_id: i64,
    pub name: String,
    pub outcome: ExerciseOutcome,
}

/// Counters and per-exercise outcomes for a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Relevant research articles loaded.
    pub research: usize,
    /// Articles whose topics were rewritten.
    pub retagged: usize,
    /// Exercises in the catalog.
    pub exercises: usize,
    pub persisted: usize,
    pub duplicate: usize,
    pub no_topic: usize,
    pub no_evidence: usize,
    pub gen_error: usize,
    /// Visited exercises, in processing order.
    pub reports: Vec<ExerciseReport>,
    pub elapsed: Duration,
}

impl RunSummary {
    fn record(&mut self, report: ExerciseReport) {
        match report.outcome {
            ExerciseOutcome::Duplicate => self.duplicate += 1,
            ExerciseOutcome::NoTopic => self.no_topic += 1,
            ExerciseOutcome::NoEvidence => self.no_evidence += 1,
            ExerciseOutcome::GenError => self.gen_error += 1,
            ExerciseOutcome::Persisted => self.persisted += 1,
        }
        self.reports.push(report);
    }

    /// Exercises visited this run.
    pub fn visited(&self) -> usize {
        self.reports.len()
    }

    /// Visited exercises that did not end in a new tip.
    pub fn skipped(&self) -> usize {
        self.visited() - self.persisted
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each visited exercise.
    fn exercise_done(&self, report: &ExerciseReport, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn exercise_done(&self, _report: &ExerciseReport, _current: usize, _total: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Run the full enrichment pipeline.
///
/// 1. Tag relevant research and persist changed topics
/// 2. Load the exercise catalog with staging metadata
/// 3. Generate and store tips for eligible exercises
#[instrument(skip_all, fields(population = %config.population, context = %config.context))]
pub async fn run_enrichment(
    config: &RunConfig,
    storage: &Storage,
    generator: &dyn TipGenerator,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();
    info!(model = generator.model_id(), max_tips = ?config.max_tips, "starting enrichment run");

    // --- Phase 1: Research tagging ---
    progress.phase("Tagging research");
    let tagged = tag_research(storage).await?;

    // --- Phase 2: Exercise catalog ---
    progress.phase("Loading exercises");
    let exercises = load_exercises(storage).await?;

    // --- Phase 3: Tip generation ---
    progress.phase("Generating tips");
    let mut summary = enrich_exercises(
        config,
        storage,
        generator,
        &tagged.articles,
        &exercises,
        progress,
    )
    .await?;

    summary.research = tagged.articles.len();
    summary.retagged = tagged.updated;
    summary.elapsed = start.elapsed();

    progress.done(&summary);

    info!(
        research = summary.research,
        retagged = summary.retagged,
        exercises = summary.exercises,
        visited = summary.visited(),
        persisted = summary.persisted,
        skipped = summary.skipped(),
        elapsed_ms = summary.elapsed.as_millis(),
        "enrichment run complete"
    );

    Ok(summary)
}

/// Process a snapshot of exercises against a snapshot of tagged research.
///
/// Stops early once `config.max_tips` tips have been persisted. Generation
/// failures are logged and skipped; read and write failures abort the batch.
pub async fn enrich_exercises(
    config: &RunConfig,
    storage: &Storage,
    generator: &dyn TipGenerator,
    articles: &[ResearchArticle],
    exercises: &[Exercise],
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let mut summary = RunSummary {
        exercises: exercises.len(),
        ..Default::default()
    };
    let total = exercises.len();

    for (i, ex) in exercises.iter().enumerate() {
        if config.max_tips.is_some_and(|max| summary.persisted >= max) {
            info!(persisted = summary.persisted, "batch limit reached");
            break;
        }

        let outcome = enrich_exercise(config, storage, generator, articles, ex).await?;
        if matches!(
            outcome,
            ExerciseOutcome::Duplicate | ExerciseOutcome::NoTopic | ExerciseOutcome::NoEvidence
        ) {
            info!(exercise_id = ex.id, exercise = %ex.name, %outcome, "exercise skipped");
        }

        let report = ExerciseReport {
            exercise_id: ex.id,
            name: ex.name.clone(),
            outcome,
        };
        progress.exercise_done(&report, i + 1, total);
        summary.record(report);
    }

    Ok(summary)
}

/// Drive one exercise to its terminal outcome.
async fn enrich_exercise(
    config: &RunConfig,
    storage: &Storage,
    generator: &dyn TipGenerator,
    articles: &[ResearchArticle],
    ex: &Exercise,
) -> Result<ExerciseOutcome> {
    let exists = storage
        .tip_exists(ex.id, &config.population, &config.context)
        .await
        .map_err(|e| e.into_upstream_read())?;
    if exists {
        return Ok(ExerciseOutcome::Duplicate);
    }

    let topics = infer_topics(ex);
    if topics.is_empty() {
        return Ok(ExerciseOutcome::NoTopic);
    }

    let evidence = build_context(articles, &topics, config.max_articles);
    if evidence.is_empty() {
        debug!(exercise = %ex.name, topics = %format_topics(&topics), "no matching research");
        return Ok(ExerciseOutcome::NoEvidence);
    }

    let request = TipRequest {
        profile: ExerciseProfile::from(ex),
        research_context: evidence.text.clone(),
        source_dois: evidence.dois.clone(),
    };

    let raw = match generator.generate(&request).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(exercise_id = ex.id, exercise = %ex.name, error = %e, "tip generation failed, skipping");
            return Ok(ExerciseOutcome::GenError);
        }
    };

    let tips = match parse_tip_sheet(raw) {
        Ok(tips) => tips,
        Err(e) => {
            warn!(exercise_id = ex.id, exercise = %ex.name, error = %e, "unusable generator output, skipping");
            return Ok(ExerciseOutcome::GenError);
        }
    };

    let mut record = TipRecord::new(
        ex.id,
        &config.population,
        &config.context,
        tips,
        evidence.dois.clone(),
    );
    record.model_id = Some(generator.model_id().to_string());
    record.evidence_hash = Some(evidence.fingerprint());

    let written = storage
        .insert_tip(&record)
        .await
        .map_err(|e| e.into_persistence_write())?;

    Ok(match written {
        TipInsert::Inserted => {
            info!(exercise = %ex.name, articles = evidence.articles, "tip persisted");
            ExerciseOutcome::Persisted
        }
        TipInsert::AlreadyPresent => {
            warn!(exercise = %ex.name, "tip appeared since existence check");
            ExerciseOutcome::Duplicate
        }
    })
}

/// Validate a raw generator object into a [`TipSheet`].
pub fn parse_tip_sheet(raw: serde_json::Value) -> Result<TipSheet> {
    let sheet: TipSheet = serde_json::from_value(raw)
        .map_err(|e| TransfitError::Generation(format!("tip sheet shape mismatch: {e}")))?;
    if sheet.is_empty() {
        return Err(TransfitError::Generation("tip sheet is empty".into()));
    }
    Ok(sheet)
}

// ---------------------------------------------------------------------------
// Dry run
// ---------------------------------------------------------------------------

/// What a run would do for one exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStep {
    /// The exercise would end without a generator call.
    Skip(ExerciseOutcome),
    /// The generator would be called.
    Generate,
}

/// Dry-run view of one exercise.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub exercise_id: i64,
    pub name: String,
    pub topics: TopicSet,
    /// Names of the inference rules that fired.
    pub rules: Vec<&'static str>,
    /// Research articles that would ground the tips.
    pub evidence_articles: usize,
    pub dois: Vec<String>,
    pub step: PlanStep,
}

/// Evaluate every exercise up to the generator call, without writing.
///
/// Research topics are computed in memory; stored topics are left as they
/// are. The batch limit is not applied.
#[instrument(skip_all, fields(population = %config.population, context = %config.context))]
pub async fn plan_enrichment(config: &RunConfig, storage: &Storage) -> Result<Vec<PlanEntry>> {
    let research = storage
        .list_relevant_research()
        .await
        .map_err(|e| e.into_upstream_read())?;
    let articles = preview_tags(research);
    let exercises = load_exercises(storage).await?;

    let mut plan = Vec::with_capacity(exercises.len());
    for ex in &exercises {
        let exists = storage
            .tip_exists(ex.id, &config.population, &config.context)
            .await
            .map_err(|e| e.into_upstream_read())?;
        let topics = infer_topics(ex);
        let rules = matching_rules(ex).iter().map(|r| r.name).collect();
        let evidence = build_context(&articles, &topics, config.max_articles);

        let step = if exists {
            PlanStep::Skip(ExerciseOutcome::Duplicate)
        } else if topics.is_empty() {
            PlanStep::Skip(ExerciseOutcome::NoTopic)
        } else if evidence.is_empty() {
            PlanStep::Skip(ExerciseOutcome::NoEvidence)
        } else {
            PlanStep::Generate
        };

        plan.push(PlanEntry {
            exercise_id: ex.id,
            name: ex.name.clone(),
            topics,
            rules,
            evidence_articles: evidence.articles,
            dois: evidence.dois,
            step,
        });
    }

    info!(
        exercises = plan.len(),
        generate = plan.iter().filter(|p| p.step == PlanStep::Generate).count(),
        "plan computed"
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use transfit_shared::TopicTag;
    use uuid::Uuid;

    // -- Scripted generator ------------------------------------------------

    enum Reply {
        Value(Value),
        Fail,
    }

    /// Returns a valid sheet unless a reply is scripted for the exercise name.
    struct ScriptedGenerator {
        replies: HashMap<String, Reply>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new() -> Self {
            Self {
                replies: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with(mut self, name: &str, reply: Reply) -> Self {
            self.replies.insert(name.into(), reply);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TipGenerator for ScriptedGenerator {
        fn model_id(&self) -> &str {
            "scripted-v1"
        }

        async fn generate(&self, request: &TipRequest) -> Result<Value> {
            self.calls.lock().unwrap().push(request.profile.name.clone());
            match self.replies.get(&request.profile.name) {
                Some(Reply::Value(v)) => Ok(v.clone()),
                Some(Reply::Fail) => Err(TransfitError::Generation("timed out".into())),
                None => Ok(valid_sheet(&request.source_dois)),
            }
        }
    }

    fn valid_sheet(dois: &[String]) -> Value {
        json!({
            "form_focus": ["Brace before each rep"],
            "hrt_considerations": ["Progress load gradually"],
            "binding_considerations": [],
            "post_op_considerations": [],
            "gender_affirming_modifications": ["Choose a comfortable stance"],
            "general_safety": ["Stop if you feel sharp pain"],
            "disclaimer": "Not medical advice.",
            "source_dois": dois,
        })
    }

    // -- Fixtures ------------------------------------------------------------

    fn db_path() -> PathBuf {
        std::env::temp_dir().join(format!("transfit_pipeline_{}.db", Uuid::now_v7()))
    }

    async fn seeded_storage(path: &Path) -> Storage {
        let storage = Storage::open(path).await.expect("open test db");

        storage
            .upsert_research(&ResearchArticle {
                id: 1,
                title: Some("Effects of testosterone on muscle strength in trans men".into()),
                takeaways: Some("increased lean mass".into()),
                doi: Some("10.1000/hrt".into()),
                relevant: true,
                ..Default::default()
            })
            .await
            .unwrap();
        storage
            .upsert_research(&ResearchArticle {
                id: 2,
                title: Some("Aerobic training and cardiovascular risk".into()),
                takeaways: Some("lower resting blood pressure".into()),
                year: Some(2021),
                journal: Some("LGBT Health".into()),
                doi: Some("10.1000/cardio".into()),
                relevant: true,
                ..Default::default()
            })
            .await
            .unwrap();

        let exercises = [
            Exercise {
                id: 1,
                slug: "goblet-squat".into(),
                name: "Goblet Squat".into(),
                pattern: Some("squat".into()),
                goal: Some("strength".into()),
                pelvic_floor_safe: true,
                ..Default::default()
            },
            Exercise {
                id: 2,
                slug: "push-up".into(),
                name: "Push-Up".into(),
                pattern: Some("push".into()),
                goal: Some("strength".into()),
                pelvic_floor_safe: true,
                ..Default::default()
            },
            Exercise {
                id: 3,
                slug: "cat-cow".into(),
                name: "Cat-Cow".into(),
                goal: Some("mobility".into()),
                pelvic_floor_safe: true,
                ..Default::default()
            },
            Exercise {
                id: 4,
                slug: "jump-rope".into(),
                name: "Jump Rope".into(),
                goal: Some("conditioning".into()),
                pelvic_floor_safe: true,
                ..Default::default()
            },
        ];
        for ex in &exercises {
            storage.upsert_exercise(ex).await.unwrap();
        }
        storage
    }

    fn outcomes(summary: &RunSummary) -> Vec<ExerciseOutcome> {
        summary.reports.iter().map(|r| r.outcome).collect()
    }

    // -- Runs ----------------------------------------------------------------

    #[tokio::test]
    async fn first_run_persists_eligible_exercises() {
        let storage = seeded_storage(&db_path()).await;
        let generator = ScriptedGenerator::new();

        let summary = run_enrichment(&RunConfig::default(), &storage, &generator, &SilentProgress)
            .await
            .expect("run");

        use ExerciseOutcome::*;
        assert_eq!(outcomes(&summary), vec![Persisted, NoTopic, NoEvidence, Persisted]);
        assert_eq!(summary.research, 2);
        assert_eq!(summary.retagged, 2);
        assert_eq!(summary.exercises, 4);
        assert_eq!(summary.persisted, 2);
        assert_eq!(summary.skipped(), 2);
        assert_eq!(generator.calls(), vec!["Goblet Squat", "Jump Rope"]);
        assert_eq!(storage.count_tips().await.unwrap(), 2);

        let tip = storage
            .get_tip(1, DEFAULT_POPULATION, DEFAULT_CONTEXT)
            .await
            .unwrap()
            .expect("squat tip");
        assert!(tip.needs_review);
        assert_eq!(tip.source_dois, vec!["10.1000/hrt"]);
        assert_eq!(tip.tips.disclaimer, "Not medical advice.");
        assert_eq!(tip.model_id.as_deref(), Some("scripted-v1"));
        assert_eq!(tip.evidence_hash.as_ref().map(String::len), Some(64));
    }

    #[tokio::test]
    async fn rerun_records_duplicates_without_generating() {
        let storage = seeded_storage(&db_path()).await;
        let generator = ScriptedGenerator::new();
        let config = RunConfig::default();

        run_enrichment(&config, &storage, &generator, &SilentProgress)
            .await
            .unwrap();
        let second = run_enrichment(&config, &storage, &generator, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(second.reports[0].outcome, ExerciseOutcome::Duplicate);
        assert_eq!(second.reports[3].outcome, ExerciseOutcome::Duplicate);
        assert_eq!(second.persisted, 0);
        assert_eq!(second.retagged, 0);
        assert_eq!(generator.calls().len(), 2);
    }

    #[tokio::test]
    async fn at_most_one_tip_per_tuple() {
        let storage = seeded_storage(&db_path()).await;
        let generator = ScriptedGenerator::new();
        let config = RunConfig::default();

        for _ in 0..3 {
            run_enrichment(&config, &storage, &generator, &SilentProgress)
                .await
                .unwrap();
        }
        assert_eq!(storage.count_tips().await.unwrap(), 2);

        // A different context is a different tuple.
        let post_op = RunConfig {
            context: "post_op".into(),
            ..RunConfig::default()
        };
        let summary = run_enrichment(&post_op, &storage, &generator, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(summary.persisted, 2);
        assert_eq!(storage.count_tips().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn malformed_sheet_is_gen_error_and_batch_continues() {
        let storage = seeded_storage(&db_path()).await;
        let mut missing_disclaimer = valid_sheet(&[]);
        missing_disclaimer
            .as_object_mut()
            .unwrap()
            .remove("disclaimer");
        let generator =
            ScriptedGenerator::new().with("Goblet Squat", Reply::Value(missing_disclaimer));

        let summary = run_enrichment(&RunConfig::default(), &storage, &generator, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.reports[0].outcome, ExerciseOutcome::GenError);
        assert_eq!(summary.reports[3].outcome, ExerciseOutcome::Persisted);
        assert_eq!(summary.gen_error, 1);
        assert!(
            storage
                .get_tip(1, DEFAULT_POPULATION, DEFAULT_CONTEXT)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn generator_failure_is_not_retried() {
        let storage = seeded_storage(&db_path()).await;
        let generator = ScriptedGenerator::new().with("Goblet Squat", Reply::Fail);

        let summary = run_enrichment(&RunConfig::default(), &storage, &generator, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.reports[0].outcome, ExerciseOutcome::GenError);
        assert_eq!(summary.persisted, 1);
        assert_eq!(generator.calls(), vec!["Goblet Squat", "Jump Rope"]);
    }

    #[tokio::test]
    async fn empty_sheet_is_gen_error() {
        let storage = seeded_storage(&db_path()).await;
        let empty = json!({
            "form_focus": [],
            "hrt_considerations": [],
            "binding_considerations": [],
            "post_op_considerations": [],
            "gender_affirming_modifications": [],
            "general_safety": [],
            "disclaimer": "",
            "source_dois": [],
        });
        let generator = ScriptedGenerator::new().with("Jump Rope", Reply::Value(empty));

        let summary = run_enrichment(&RunConfig::default(), &storage, &generator, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.reports[3].outcome, ExerciseOutcome::GenError);
        assert_eq!(storage.count_tips().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn batch_limit_counts_persisted_tips_only() {
        let storage = seeded_storage(&db_path()).await;
        let generator = ScriptedGenerator::new();
        let config = RunConfig {
            max_tips: Some(1),
            ..RunConfig::default()
        };

        let first = run_enrichment(&config, &storage, &generator, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(outcomes(&first), vec![ExerciseOutcome::Persisted]);

        // Skips do not consume the budget.
        let second = run_enrichment(&config, &storage, &generator, &SilentProgress)
            .await
            .unwrap();
        use ExerciseOutcome::*;
        assert_eq!(outcomes(&second), vec![Duplicate, NoTopic, NoEvidence, Persisted]);
        assert_eq!(storage.count_tips().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn write_failure_aborts_the_batch() {
        let path = db_path();
        let writable = seeded_storage(&path).await;
        let articles = tag_research(&writable).await.unwrap().articles;
        let exercises = load_exercises(&writable).await.unwrap();

        let readonly = Storage::open_readonly(&path).await.unwrap();
        let generator = ScriptedGenerator::new();

        let err = enrich_exercises(
            &RunConfig::default(),
            &readonly,
            &generator,
            &articles,
            &exercises,
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TransfitError::PersistenceWrite(_)));
        assert!(!err.is_recoverable());
        // The batch stopped at the first exercise that reached the write.
        assert_eq!(generator.calls(), vec!["Goblet Squat"]);
    }

    /// Writes a competing tip for exercise 1 while "generating", as a
    /// concurrent run would between the existence check and the insert.
    struct RacingGenerator {
        path: PathBuf,
    }

    #[async_trait]
    impl TipGenerator for RacingGenerator {
        fn model_id(&self) -> &str {
            "racing-v1"
        }

        async fn generate(&self, request: &TipRequest) -> Result<Value> {
            let other = Storage::open(&self.path).await?;
            let record = TipRecord::new(
                1,
                DEFAULT_POPULATION,
                DEFAULT_CONTEXT,
                TipSheet::default(),
                vec![],
            );
            other.insert_tip(&record).await?;
            Ok(valid_sheet(&request.source_dois))
        }
    }

    #[tokio::test]
    async fn concurrent_insert_is_recorded_as_duplicate() {
        let path = db_path();
        let storage = seeded_storage(&path).await;
        let articles = tag_research(&storage).await.unwrap().articles;
        let squat: Vec<Exercise> = load_exercises(&storage)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.id == 1)
            .collect();

        let summary = enrich_exercises(
            &RunConfig::default(),
            &storage,
            &RacingGenerator { path: path.clone() },
            &articles,
            &squat,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(outcomes(&summary), vec![ExerciseOutcome::Duplicate]);
        assert_eq!(summary.persisted, 0);
        assert_eq!(summary.duplicate, 1);
        assert_eq!(storage.count_tips().await.unwrap(), 1);
        // The competing row is the one kept.
        let kept = storage
            .get_tip(1, DEFAULT_POPULATION, DEFAULT_CONTEXT)
            .await
            .unwrap()
            .unwrap();
        assert!(kept.model_id.is_none());
    }

    #[tokio::test]
    async fn catalog_read_failure_aborts_before_generation() {
        let path = db_path();
        let storage = seeded_storage(&path).await;

        let db = libsql::Builder::new_local(&path).build().await.unwrap();
        db.connect()
            .unwrap()
            .execute("DROP TABLE staging_exercisedb", ())
            .await
            .unwrap();

        let generator = ScriptedGenerator::new();
        let err = run_enrichment(&RunConfig::default(), &storage, &generator, &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, TransfitError::UpstreamRead(_)));
        assert!(!err.is_recoverable());
        assert!(generator.calls().is_empty());
        assert_eq!(storage.count_tips().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn exercise_order_is_preserved() {
        let storage = seeded_storage(&db_path()).await;
        let articles = tag_research(&storage).await.unwrap().articles;
        let mut exercises = load_exercises(&storage).await.unwrap();
        exercises.reverse();

        let summary = enrich_exercises(
            &RunConfig::default(),
            &storage,
            &ScriptedGenerator::new(),
            &articles,
            &exercises,
            &SilentProgress,
        )
        .await
        .unwrap();

        let ids: Vec<i64> = summary.reports.iter().map(|r| r.exercise_id).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
    }

    // -- Validation ----------------------------------------------------------

    #[test]
    fn parse_rejects_unknown_keys_and_missing_keys() {
        let mut extra = valid_sheet(&[]);
        extra
            .as_object_mut()
            .unwrap()
            .insert("bonus".into(), json!("x"));
        assert!(parse_tip_sheet(extra).is_err());
        assert!(parse_tip_sheet(json!({})).is_err());
        assert!(parse_tip_sheet(json!("not an object")).is_err());

        let err = parse_tip_sheet(json!({})).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn parse_accepts_complete_sheet() {
        let sheet = parse_tip_sheet(valid_sheet(&["10.1/a".to_string()])).unwrap();
        assert_eq!(sheet.source_dois, vec!["10.1/a"]);
        assert_eq!(sheet.form_focus.len(), 1);
    }

    // -- Dry run -------------------------------------------------------------

    #[tokio::test]
    async fn plan_reports_steps_without_writing() {
        let storage = seeded_storage(&db_path()).await;

        let plan = plan_enrichment(&RunConfig::default(), &storage)
            .await
            .unwrap();

        let steps: Vec<PlanStep> = plan.iter().map(|p| p.step).collect();
        assert_eq!(
            steps,
            vec![
                PlanStep::Generate,
                PlanStep::Skip(ExerciseOutcome::NoTopic),
                PlanStep::Skip(ExerciseOutcome::NoEvidence),
                PlanStep::Generate,
            ]
        );
        assert_eq!(plan[0].rules, vec!["loaded_pattern"]);
        assert_eq!(
            plan[0].topics,
            [TopicTag::HrtStrength, TopicTag::BoneHealth].into_iter().collect()
        );
        assert_eq!(plan[3].dois, vec!["10.1000/cardio"]);

        assert_eq!(storage.count_tips().await.unwrap(), 0);
        assert!(!storage.get_research(1).await.unwrap().unwrap().processed);
    }

    #[test]
    fn run_config_from_defaults() {
        let defaults = DefaultsConfig {
            max_exercises: 0,
            ..DefaultsConfig::default()
        };
        let config = RunConfig::from(&defaults);
        assert_eq!(config.max_tips, None);
        assert_eq!(config.max_articles, defaults.max_articles);
        assert_eq!(config.population, defaults.population);
    }
}
