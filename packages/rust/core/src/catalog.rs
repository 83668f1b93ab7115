//! Exercise catalog loading with staging metadata joined in by slug.

use std::collections::HashMap;

use tracing::debug;
use transfit_shared::{Exercise, Result, StagingMeta};
use transfit_storage::Storage;

/// Left-join staging metadata onto exercises by slug.
///
/// Exercises without a staging row keep absent metadata. Staging rows with a
/// blank slug are ignored.
pub fn join_staging(mut exercises: Vec<Exercise>, staging: Vec<StagingMeta>) -> Vec<Exercise> {
    let by_slug: HashMap<String, StagingMeta> = staging
        .into_iter()
        .filter(|m| !m.slug.trim().is_empty())
        .map(|m| (m.slug.clone(), m))
        .collect();

    for ex in &mut exercises {
        if let Some(meta) = by_slug.get(&ex.slug) {
            ex.body_parts = meta.body_parts.clone();
            ex.exercise_type = meta.exercise_type.clone();
            ex.target_muscles = meta.target_muscles.clone();
        }
    }
    exercises
}

/// Load every exercise, in id order, with staging metadata attached.
pub async fn load_exercises(storage: &Storage) -> Result<Vec<Exercise>> {
    let exercises = storage
        .list_exercises()
        .await
        .map_err(|e| e.into_upstream_read())?;
    let staging = storage
        .list_staging()
        .await
        .map_err(|e| e.into_upstream_read())?;
    debug!(
        exercises = exercises.len(),
        staging = staging.len(),
        "exercise catalog loaded"
    );
    Ok(join_staging(exercises, staging))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn exercise(id: i64, slug: &str) -> Exercise {
        Exercise {
            id,
            slug: slug.into(),
            name: slug.into(),
            ..Default::default()
        }
    }

    #[test]
    fn unmatched_exercises_keep_absent_metadata() {
        let joined = join_staging(
            vec![exercise(1, "goblet-squat"), exercise(2, "plank")],
            vec![StagingMeta {
                slug: "plank".into(),
                body_parts: Some("waist".into()),
                exercise_type: Some("strength".into()),
                target_muscles: Some("abs".into()),
            }],
        );
        assert!(joined[0].body_parts.is_none());
        assert_eq!(joined[1].body_parts.as_deref(), Some("waist"));
        assert_eq!(joined[1].target_muscles.as_deref(), Some("abs"));
    }

    #[test]
    fn join_preserves_order() {
        let joined = join_staging(
            vec![exercise(3, "c"), exercise(1, "a"), exercise(2, "b")],
            Vec::new(),
        );
        let ids: Vec<i64> = joined.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn blank_staging_slug_never_matches() {
        let joined = join_staging(
            vec![exercise(1, "")],
            vec![StagingMeta {
                slug: String::new(),
                body_parts: Some("chest".into()),
                ..Default::default()
            }],
        );
        assert!(joined[0].body_parts.is_none());
    }

    #[tokio::test]
    async fn load_joins_from_storage() {
        let tmp = std::env::temp_dir().join(format!("transfit_catalog_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.unwrap();
        storage.upsert_exercise(&exercise(1, "push-up")).await.unwrap();
        storage
            .upsert_staging(&StagingMeta {
                slug: "push-up".into(),
                body_parts: Some("chest".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let loaded = load_exercises(&storage).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].body_parts.as_deref(), Some("chest"));
    }
}
