//! Integration tests for the full SQL and document pipeline.

// `expect` is idiomatic in test code for failing fast on precondition violations.
#![expect(
    clippy::expect_used,
    reason = "test code uses expect for clear failure messages"
)]

mod test_support;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anime_seed::{
    ConfigurationError, EntityId, PipelineRun, SeedError, SqlRequest, SqlValue, USER_IDS_FILE,
    load_scripts, run_pipeline, verify_scripts,
};
use rstest::{fixture, rstest};
use test_support::{fixture_datasets_dir, unique_temp_dir};

struct PipelineDirs {
    root: PathBuf,
}

impl PipelineDirs {
    fn sql(&self) -> PathBuf {
        self.root.join("seeds")
    }

    fn documents(&self) -> PathBuf {
        self.root.join("document-seeds")
    }

    fn request(&self, seed: u64, user_count: Option<usize>) -> SqlRequest {
        SqlRequest {
            datasets_dir: fixture_datasets_dir(),
            output_dir: self.sql(),
            anime_count: 6,
            user_count,
            seed: Some(seed),
        }
    }

    fn try_run(
        &self,
        seed: u64,
        user_count: Option<usize>,
        user_ids: Option<&[EntityId]>,
    ) -> Result<PipelineRun, SeedError> {
        run_pipeline(&self.request(seed, user_count), &self.documents(), user_ids)
    }

    fn run(&self, seed: u64, user_ids: Option<&[EntityId]>) -> PipelineRun {
        self.try_run(seed, None, user_ids).expect("pipeline run")
    }
}

impl Drop for PipelineDirs {
    fn drop(&mut self) {
        drop(fs::remove_dir_all(&self.root));
    }
}

#[fixture]
fn dirs() -> PipelineDirs {
    PipelineDirs {
        root: unique_temp_dir("pipeline"),
    }
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read json")).expect("parse json")
}

fn column_ids(dir: &Path, table: &str, column: &str) -> BTreeSet<i64> {
    load_scripts(dir)
        .expect("scripts load")
        .iter()
        .flat_map(|script| &script.statements)
        .filter(|statement| statement.table == table)
        .filter_map(|statement| match statement.value(column) {
            Some(SqlValue::Integer(id)) => Some(*id),
            _ => None,
        })
        .collect()
}

#[rstest]
fn pipeline_records_the_seeded_user_ids(dirs: PipelineDirs) {
    let run = dirs.run(11, None);

    let seeded: Vec<EntityId> = run.sql.seed_set.user_ids().into_iter().collect();
    assert_eq!(run.manifest.user_ids, seeded);
    let expected: String = seeded.iter().map(|id| format!("{id}\n")).collect();
    assert_eq!(
        fs::read_to_string(dirs.documents().join(USER_IDS_FILE)).expect("read user ids"),
        expected
    );
}

#[rstest]
fn pipeline_documents_stay_inside_the_seed_set(dirs: PipelineDirs) {
    let run = dirs.run(11, None);
    let anime: BTreeSet<i64> = run
        .sql
        .seed_set
        .anime_ids()
        .into_iter()
        .map(EntityId::get)
        .collect();
    let characters: BTreeSet<i64> = run
        .sql
        .seed_set
        .character_ids()
        .into_iter()
        .map(EntityId::get)
        .collect();

    let ratings = read_json(&dirs.documents().join("ratings.json"));
    for rating in ratings.as_array().expect("ratings array") {
        let anime_id = rating["anime_id"].as_i64().expect("anime id");
        assert!(anime.contains(&anime_id), "rating for unseeded anime {anime_id}");
    }
    let users = read_json(&dirs.documents().join("users.json"));
    for user in users.as_array().expect("users array") {
        for id in user["favorites"]["characters"]
            .as_array()
            .expect("character favourites")
        {
            let character = id.as_i64().expect("character id");
            assert!(
                characters.contains(&character),
                "favourite of unseeded character {character}"
            );
        }
    }
}

#[rstest]
fn explicit_user_ids_narrow_the_seeded_users(dirs: PipelineDirs) {
    let run = dirs.run(11, Some(&[EntityId::new(2)]));

    assert_eq!(run.manifest.user_ids, vec![EntityId::new(2)]);
    assert_eq!(run.manifest.users_count, 1);
}

#[rstest]
fn explicit_user_ids_without_app_user_rows_are_dropped(dirs: PipelineDirs) {
    let everyone: Vec<EntityId> = (1..=5).map(EntityId::new).collect();

    let run = dirs
        .try_run(11, Some(1), Some(&everyone))
        .expect("pipeline run");

    let seeded: Vec<EntityId> = run.sql.seed_set.user_ids().into_iter().collect();
    assert_eq!(seeded.len(), 1);
    assert_eq!(run.manifest.user_ids, seeded);
    assert_eq!(run.manifest.users_count, 1);
    let users = read_json(&dirs.documents().join("users.json"));
    let document_ids: Vec<i64> = users
        .as_array()
        .expect("users array")
        .iter()
        .map(|user| user["id"].as_i64().expect("user id"))
        .collect();
    assert_eq!(
        document_ids,
        seeded.iter().map(|id| id.get()).collect::<Vec<_>>()
    );
}

#[rstest]
fn explicit_user_ids_outside_the_seed_set_fail(dirs: PipelineDirs) {
    let seeded = dirs
        .try_run(11, Some(1), None)
        .expect("pipeline run")
        .sql
        .seed_set
        .user_ids();
    let others: Vec<EntityId> = (1..=5)
        .map(EntityId::new)
        .filter(|id| !seeded.contains(id))
        .collect();

    let result = dirs.try_run(11, Some(1), Some(&others));

    assert_eq!(
        result.map(|run| run.manifest),
        Err(SeedError::Configuration(ConfigurationError::NoKnownUsers {
            requested: 4,
        }))
    );
}

#[rstest]
fn written_scripts_are_referentially_closed(dirs: PipelineDirs) {
    dirs.run(3, None);
    let sql = dirs.sql();

    let anime = column_ids(&sql, "anime", "id");
    let characters = column_ids(&sql, "character", "id");
    let people = column_ids(&sql, "person", "id");
    let users = column_ids(&sql, "app_user", "id");

    assert!(column_ids(&sql, "anime_character", "anime_id").is_subset(&anime));
    assert!(column_ids(&sql, "anime_character", "character_id").is_subset(&characters));
    assert!(column_ids(&sql, "anime_staff", "person_id").is_subset(&people));
    assert!(column_ids(&sql, "user_favorite_anime", "anime_id").is_subset(&anime));
    assert!(column_ids(&sql, "user_favorite_character", "user_id").is_subset(&users));
    assert!(column_ids(&sql, "user_favorite_person", "person_id").is_subset(&people));
}

#[rstest]
fn written_scripts_replay_idempotently(dirs: PipelineDirs) {
    dirs.run(5, None);

    let report = verify_scripts(&dirs.sql()).expect("scripts replay idempotently");

    assert_eq!(report.scripts, 11);
    assert!(report.inserted > 0);
}

#[test]
fn equal_seeds_write_identical_scripts() {
    let first = PipelineDirs {
        root: unique_temp_dir("pipeline-first"),
    };
    let second = PipelineDirs {
        root: unique_temp_dir("pipeline-second"),
    };

    let run = first.run(21, None);
    second.run(21, None);

    for script in &run.sql.scripts {
        assert_eq!(
            fs::read(first.sql().join(script)).expect("read first"),
            fs::read(second.sql().join(script)).expect("read second"),
            "{script} differs between runs"
        );
    }
}
