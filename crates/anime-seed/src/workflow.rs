//! End-to-end generation workflows.
//!
//! Each workflow validates its request, reads its inputs and only then
//! touches the output directory, so configuration and input errors never
//! leave partial artifacts behind.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{info, warn};

use crate::artifacts::OutputDir;
use crate::datasets::{DatasetDir, Datasets};
use crate::distinct::distinct_values;
use crate::documents::{DocumentScope, Manifest, build_documents, resolve_users};
use crate::error::{ConfigurationError, SeedError};
use crate::model::EntityId;
use crate::resolver::SeedSet;
use crate::sampler::{ANIME, SampleRequest, sample_primaries};
use crate::sql::sql_artifacts;
use crate::store::{MemoryStore, load_scripts, replay};

/// Parameters of a SQL seed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlRequest {
    /// Directory holding the CSV datasets.
    pub datasets_dir: PathBuf,
    /// Directory receiving the scripts.
    pub output_dir: PathBuf,
    /// Number of anime to sample.
    pub anime_count: usize,
    /// Number of users to sample; defaults to `anime_count` capped at the
    /// user universe.
    pub user_count: Option<usize>,
    /// Sampling seed; a random one is drawn and logged when absent.
    pub seed: Option<u64>,
}

/// Outcome of a SQL seed run.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlRun {
    /// Seed the run used.
    pub seed: u64,
    /// Resolved seed set.
    pub seed_set: SeedSet,
    /// Script file names in load order.
    pub scripts: Vec<String>,
}

fn random_seed() -> u64 {
    rand::rng().random()
}

/// Samples, resolves and writes the numbered SQL scripts.
///
/// # Errors
///
/// Returns [`SeedError`] for invalid sizes, unreadable inputs, a broken
/// closure, or a failed write.
pub fn generate_sql(request: &SqlRequest) -> Result<SqlRun, SeedError> {
    let seed = request.seed.unwrap_or_else(|| {
        let drawn = random_seed();
        info!(seed = drawn, "no seed supplied; drew a random one");
        drawn
    });
    if request.anime_count == 0 {
        return Err(ConfigurationError::EmptySample { entity: ANIME }.into());
    }

    let datasets = Datasets::load(&DatasetDir::open(&request.datasets_dir)?)?;
    let user_count = request
        .user_count
        .unwrap_or_else(|| request.anime_count.min(datasets.users.len()));
    let sample = sample_primaries(
        &datasets.anime,
        &datasets.users,
        SampleRequest::new(request.anime_count, user_count, seed)?,
    )?;
    let seed_set = SeedSet::resolve(&datasets, &sample);
    seed_set.verify_closure()?;

    let artifacts = sql_artifacts(&seed_set);
    OutputDir::create(&request.output_dir)?.write_sql(&artifacts)?;
    Ok(SqlRun {
        seed,
        seed_set,
        scripts: artifacts.into_iter().map(|artifact| artifact.file_name).collect(),
    })
}

/// Parameters of a document seed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRequest {
    /// Directory holding the CSV datasets.
    pub datasets_dir: PathBuf,
    /// Directory receiving the documents.
    pub output_dir: PathBuf,
    /// Users to cover.
    pub user_ids: Vec<EntityId>,
    /// Reference scope for ratings and favourites.
    pub scope: DocumentScope,
}

/// Builds and writes the user, rating and manifest documents.
///
/// # Errors
///
/// Returns [`SeedError`] if no requested user exists, an input cannot be
/// read, or a document cannot be written.
pub fn generate_documents(request: &DocumentRequest) -> Result<Manifest, SeedError> {
    let dir = DatasetDir::open(&request.datasets_dir)?;
    let users = resolve_users(&dir.load_users()?, &request.user_ids)?;
    let usernames: BTreeSet<String> = users.iter().map(|user| user.username.clone()).collect();
    let ratings = dir.load_ratings(&usernames)?;
    let favorites = dir.load_favorites(Some(&usernames))?;

    let documents = build_documents(&users, &ratings, &favorites, &request.scope);
    Ok(OutputDir::create(&request.output_dir)?.write_documents(&documents)?)
}

/// Outcome of a full pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    /// The SQL stage.
    pub sql: SqlRun,
    /// The document stage.
    pub manifest: Manifest,
}

/// Runs the SQL stage, records the seeded user ids, then writes documents
/// scoped to the seed set.
///
/// Explicit `user_ids` narrow the document stage to those seeded users;
/// ids without an `app_user` row in the seed set are logged and dropped.
///
/// # Errors
///
/// Returns the first [`SeedError`] raised by either stage.
pub fn run_pipeline(
    request: &SqlRequest,
    document_output_dir: &Path,
    user_ids: Option<&[EntityId]>,
) -> Result<PipelineRun, SeedError> {
    let sql = generate_sql(request)?;
    let seeded = sql.seed_set.user_ids();
    let ids = match user_ids {
        Some(requested) => seeded_user_ids(&seeded, requested)?,
        None => seeded.into_iter().collect(),
    };
    if ids.is_empty() {
        return Err(ConfigurationError::EmptyUserIds.into());
    }
    OutputDir::create(document_output_dir)?.write_user_ids(&ids)?;

    let manifest = generate_documents(&DocumentRequest {
        datasets_dir: request.datasets_dir.clone(),
        output_dir: document_output_dir.to_path_buf(),
        user_ids: ids,
        scope: DocumentScope::from_seed_set(&sql.seed_set),
    })?;
    Ok(PipelineRun { sql, manifest })
}

/// Keeps the requested ids that have an `app_user` row in the seed set.
fn seeded_user_ids(
    seeded: &BTreeSet<EntityId>,
    requested: &[EntityId],
) -> Result<Vec<EntityId>, ConfigurationError> {
    if requested.is_empty() {
        return Err(ConfigurationError::EmptyUserIds);
    }
    let wanted: BTreeSet<EntityId> = requested.iter().copied().collect();
    let (kept, dropped): (Vec<EntityId>, Vec<EntityId>) =
        wanted.iter().copied().partition(|id| seeded.contains(id));
    if !dropped.is_empty() {
        let listed: Vec<String> = dropped.iter().map(ToString::to_string).collect();
        warn!(
            dropped = %listed.join(","),
            "user ids without a seeded app_user row were dropped"
        );
    }
    if kept.is_empty() {
        return Err(ConfigurationError::NoKnownUsers {
            requested: wanted.len(),
        });
    }
    Ok(kept)
}

/// Splits a comma-separated column list.
///
/// # Errors
///
/// Returns [`ConfigurationError::NoColumns`] when the list is empty.
pub fn parse_columns(raw: &str) -> Result<Vec<String>, ConfigurationError> {
    let columns: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|column| !column.is_empty())
        .map(str::to_owned)
        .collect();
    if columns.is_empty() {
        return Err(ConfigurationError::NoColumns);
    }
    Ok(columns)
}

/// Writes `<column>_distinct.txt` for each column of `csv_path`.
///
/// Every column is read before anything is written.
///
/// # Errors
///
/// Returns [`SeedError`] if no columns are given, a column is missing, or a
/// file cannot be written.
pub fn extract_distinct(
    csv_path: &Path,
    columns: &[String],
    output_dir: &Path,
) -> Result<Vec<PathBuf>, SeedError> {
    if columns.is_empty() {
        return Err(ConfigurationError::NoColumns.into());
    }
    let extracted = columns
        .iter()
        .map(|column| Ok((column, distinct_values(csv_path, column)?)))
        .collect::<Result<Vec<_>, SeedError>>()?;

    let output = OutputDir::create(output_dir)?;
    let mut written = Vec::with_capacity(extracted.len());
    for (column, values) in extracted {
        let file_name = format!("{column}_distinct.txt");
        let contents: String = values.iter().map(|value| format!("{value}\n")).collect();
        output.write_text(&file_name, &contents)?;
        info!(
            column = %column,
            values = values.len(),
            file = %file_name,
            "distinct values written"
        );
        written.push(output.root().join(file_name));
    }
    Ok(written)
}

/// Result of replaying a script directory twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Scripts replayed.
    pub scripts: usize,
    /// Rows inserted by the first replay.
    pub inserted: usize,
    /// Rows skipped by the first replay.
    pub skipped: usize,
}

/// Replays every script in `dir` twice into a fresh [`MemoryStore`].
///
/// # Errors
///
/// Returns [`SeedError::NotIdempotent`] if the second replay inserts rows,
/// or the first load or replay error met.
pub fn verify_scripts(dir: &Path) -> Result<VerifyReport, SeedError> {
    let scripts = load_scripts(dir)?;
    let mut store = MemoryStore::new();
    let first = replay(&mut store, &scripts)?;
    let second = replay(&mut store, &scripts)?;

    let reinserted: usize = second.iter().map(|report| report.inserted).sum();
    if reinserted > 0 {
        return Err(SeedError::NotIdempotent {
            inserted: reinserted,
        });
    }
    let report = VerifyReport {
        scripts: scripts.len(),
        inserted: first.iter().map(|report| report.inserted).sum(),
        skipped: first.iter().map(|report| report.skipped).sum(),
    };
    if report.skipped > 0 {
        warn!(skipped = report.skipped, "first replay skipped conflicting rows");
    }
    info!(
        scripts = report.scripts,
        inserted = report.inserted,
        skipped = report.skipped,
        "replay verified"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("genres", &["genres"])]
    #[case(" genres , studios ,", &["genres", "studios"])]
    fn parses_column_lists(#[case] raw: &str, #[case] expected: &[&str]) {
        let columns = parse_columns(raw).expect("columns");
        assert_eq!(columns, expected);
    }

    #[test]
    fn rejects_empty_column_lists() {
        assert_eq!(parse_columns(" , "), Err(ConfigurationError::NoColumns));
    }

    #[test]
    fn keeps_only_seeded_user_ids() {
        let seeded: BTreeSet<EntityId> = [1, 4].into_iter().map(EntityId::new).collect();
        let requested: Vec<EntityId> = [4, 2, 1, 4].into_iter().map(EntityId::new).collect();

        let kept = seeded_user_ids(&seeded, &requested).expect("some ids are seeded");

        assert_eq!(kept, vec![EntityId::new(1), EntityId::new(4)]);
    }

    #[test]
    fn rejects_user_ids_outside_the_seed_set() {
        let seeded: BTreeSet<EntityId> = [1].into_iter().map(EntityId::new).collect();

        assert_eq!(
            seeded_user_ids(&seeded, &[EntityId::new(2), EntityId::new(3)]),
            Err(ConfigurationError::NoKnownUsers { requested: 2 })
        );
    }

    #[test]
    fn zero_anime_fails_before_reading_inputs() {
        let request = SqlRequest {
            datasets_dir: PathBuf::from("does/not/exist"),
            output_dir: PathBuf::from("does/not/matter"),
            anime_count: 0,
            user_count: None,
            seed: Some(1),
        };

        assert_eq!(
            generate_sql(&request),
            Err(SeedError::Configuration(ConfigurationError::EmptySample {
                entity: "anime",
            }))
        );
    }
}
