//! Deterministic, referentially closed seed data for an anime catalogue.
//!
//! The crate reads flat CSV datasets describing anime, characters, people
//! and application users, samples a reproducible subset of anime and users
//! from an integer seed, and derives every dependent row so that each
//! reference in the output resolves inside the output.
//!
//! # Overview
//!
//! - [`DatasetDir`] loads the typed CSV tables.
//! - [`sample_primaries`] draws the anime and user samples from one seeded
//!   stream.
//! - [`SeedSet::resolve`] keeps the junction rows of sampled primaries and
//!   pulls in the characters and people they reference.
//! - [`sql_artifacts`] renders numbered `INSERT ... ON CONFLICT DO NOTHING`
//!   scripts; [`build_documents`] renders user and rating documents.
//! - [`MemoryStore`] replays scripts to check they are idempotent.
//!
//! # Example
//!
//! ```
//! use anime_seed::{EntityId, sample_ids};
//!
//! let universe: Vec<EntityId> = (1..=10).map(EntityId::new).collect();
//! let sample = sample_ids(&universe, 3, 42).expect("sample fits");
//!
//! assert_eq!(sample.len(), 3);
//! assert_eq!(sample, sample_ids(&universe, 3, 42).expect("sample fits"));
//! ```

mod artifacts;
mod atomic_io;
pub mod cli;
mod csv_source;
mod datasets;
mod distinct;
mod documents;
mod error;
mod model;
mod resolver;
mod sampler;
mod settings;
mod sql;
mod store;
#[cfg(test)]
#[path = "../tests/test_support.rs"]
mod test_support;
mod workflow;

pub use artifacts::{OutputDir, USER_IDS_FILE};
pub use datasets::{
    ANIME_CHARACTERS_CSV, ANIME_CSV, ANIME_STAFF_CSV, CHARACTERS_CSV, DatasetDir, Datasets,
    FAVS_CSV, PEOPLE_CSV, PROFILES_CSV, RATINGS_CSV,
};
pub use distinct::{distinct_values, split_list_cell};
pub use documents::{
    DocumentScope, DocumentSet, Favorites, MANIFEST_FILE, Manifest, RATINGS_FILE, RatingDocument,
    USERS_FILE, UserDocument, build_documents, parse_user_ids, parse_user_ids_file,
    resolve_users, user_ids_from_app_user_script,
};
pub use error::{ClosureError, ConfigurationError, EmitError, InputError, ScriptError, SeedError};
pub use model::{
    Anime, AnimeCharacter, AnimeGenre, AnimeStaff, AppUser, Character, Entity, EntityId,
    FavoriteKind, FavoriteRecord, Genre, Junction, Named, Person, ProfileStats, RatingRecord,
    UserFavorite,
};
pub use resolver::{
    Endpoint, ReferentialIssue, Resolved, SeedSet, genre_lookup, resolve_junction,
    retain_referenced,
};
pub use sampler::{PrimarySample, SampleRequest, Sampler, sample_ids, sample_primaries};
pub use settings::SeedPathSettings;
pub use sql::{
    InsertStatement, SEED_TABLES, SeedTable, SqlArtifact, SqlRow, SqlValue, parse_script,
    seed_table, sql_artifacts,
};
pub use store::{
    ApplyReport, InsertOutcome, MemoryStore, RelationalStore, SqlScript, load_scripts, replay,
};
pub use workflow::{
    DocumentRequest, PipelineRun, SqlRequest, SqlRun, VerifyReport, extract_distinct,
    generate_documents, generate_sql, parse_columns, run_pipeline, verify_scripts,
};
