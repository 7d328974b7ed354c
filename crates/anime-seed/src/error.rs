//! Error types for the anime-seed crate.
//!
//! Each concern gets its own semantic enum: configuration problems are caught
//! before any artifact is written, input problems describe the offending file,
//! and emission problems name the artifact that could not be produced.
//! [`SeedError`] gathers them for the command-line front end.

use std::path::PathBuf;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::model::EntityId;

/// Errors raised when the requested run cannot be satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// More entities were requested than the universe holds.
    #[error("cannot sample {requested} {entity} from a universe of {available}")]
    SampleTooLarge {
        /// Entity kind being sampled.
        entity: &'static str,
        /// Requested sample size.
        requested: usize,
        /// Number of entities available.
        available: usize,
    },

    /// A sample size of zero was requested.
    #[error("sample size for {entity} must be greater than 0")]
    EmptySample {
        /// Entity kind being sampled.
        entity: &'static str,
    },

    /// A user id list contained a non-numeric entry.
    #[error("invalid user id '{value}': user ids must be comma-separated integers")]
    InvalidUserId {
        /// The entry that failed to parse.
        value: String,
    },

    /// A user id list contained no ids.
    #[error("no user ids provided")]
    EmptyUserIds,

    /// None of the requested user ids exist in the profile universe.
    #[error("none of the {requested} requested user ids exist in the profile dataset")]
    NoKnownUsers {
        /// Number of ids that were requested.
        requested: usize,
    },

    /// The distinct extraction was given no columns.
    #[error("no columns provided")]
    NoColumns,

    /// Layered settings could not be loaded.
    #[error("failed to load settings: {message}")]
    Settings {
        /// Loader message.
        message: String,
    },
}

/// Errors raised while reading input datasets or scripts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// A required input file does not exist.
    #[error("required input file not found: '{path}'")]
    MissingFile {
        /// Path of the missing file.
        path: PathBuf,
    },

    /// An input file could not be opened or read.
    #[error("failed to read '{path}': {message}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Description of the I/O error.
        message: String,
    },

    /// A CSV header lacks a required column.
    #[error("missing column '{column}' in '{path}'")]
    MissingColumn {
        /// Path of the CSV file.
        path: PathBuf,
        /// Name of the absent column.
        column: String,
    },

    /// A CSV record could not be decoded.
    #[error("malformed record in '{path}' at line {line}: {message}")]
    Malformed {
        /// Path of the CSV file.
        path: PathBuf,
        /// One-based line of the record.
        line: u64,
        /// Parser message.
        message: String,
    },

    /// An identifier column holds something other than an integer.
    #[error("invalid {column} '{value}' in '{path}' at line {line}")]
    InvalidId {
        /// Path of the CSV file.
        path: PathBuf,
        /// One-based line of the record.
        line: u64,
        /// Column holding the identifier.
        column: &'static str,
        /// Raw cell contents.
        value: String,
    },
}

/// A reference in an output set that does not resolve inside that set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClosureError {
    /// A junction row points at an entity missing from the emitted table.
    #[error("{table}.{column} references {id}, which is not part of the seed set")]
    DanglingReference {
        /// Junction table holding the reference.
        table: &'static str,
        /// Column holding the reference.
        column: &'static str,
        /// The unresolved identifier.
        id: EntityId,
    },
}

/// Errors raised while writing artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    /// The output directory could not be created or opened.
    #[error("failed to open output directory '{path}': {message}")]
    OutputDir {
        /// Directory path.
        path: PathBuf,
        /// Description of the I/O error.
        message: String,
    },

    /// An artifact could not be written.
    #[error("failed to write artifact '{path}': {message}")]
    Write {
        /// Artifact path relative to the output directory.
        path: Utf8PathBuf,
        /// Description of the I/O error.
        message: String,
    },

    /// A document could not be serialised.
    #[error("failed to serialise '{path}': {message}")]
    Serialize {
        /// Artifact path relative to the output directory.
        path: Utf8PathBuf,
        /// Serialiser message.
        message: String,
    },
}

/// Errors raised while replaying SQL scripts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// A statement does not match the emitted `INSERT` shape.
    #[error("unparseable statement in '{script}' at statement {index}: {message}")]
    Parse {
        /// Script file name.
        script: String,
        /// Zero-based statement index.
        index: usize,
        /// What the parser expected.
        message: String,
    },

    /// The store rejected a statement.
    #[error("store rejected statement for table '{table}': {message}")]
    Rejected {
        /// Target table.
        table: String,
        /// Reason given by the store.
        message: String,
    },
}

/// Umbrella error returned by the command-line workflows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeedError {
    /// Invalid run configuration.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    /// Unusable input.
    #[error("input error: {0}")]
    Input(#[from] InputError),
    /// Broken referential closure.
    #[error("referential error: {0}")]
    Closure(#[from] ClosureError),
    /// Artifact emission failure.
    #[error("emit error: {0}")]
    Emit(#[from] EmitError),
    /// Script replay failure.
    #[error("replay error: {0}")]
    Script(#[from] ScriptError),
    /// Replaying artifacts a second time inserted new rows.
    #[error("artifacts are not idempotent: second replay inserted {inserted} rows")]
    NotIdempotent {
        /// Rows inserted by the second replay.
        inserted: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_too_large_formats_correctly() {
        let err = ConfigurationError::SampleTooLarge {
            entity: "anime",
            requested: 1000,
            available: 200,
        };
        assert_eq!(
            err.to_string(),
            "cannot sample 1000 anime from a universe of 200"
        );
    }

    #[test]
    fn missing_column_formats_correctly() {
        let err = InputError::MissingColumn {
            path: PathBuf::from("datasets/anime.csv"),
            column: "anime_id".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "missing column 'anime_id' in 'datasets/anime.csv'"
        );
    }

    #[test]
    fn dangling_reference_formats_correctly() {
        let err = ClosureError::DanglingReference {
            table: "anime_character",
            column: "character_id",
            id: EntityId::new(9),
        };
        assert_eq!(
            err.to_string(),
            "anime_character.character_id references 9, which is not part of the seed set"
        );
    }

    #[test]
    fn seed_error_wraps_configuration_error() {
        let err = SeedError::from(ConfigurationError::EmptyUserIds);
        assert_eq!(err.to_string(), "configuration error: no user ids provided");
    }

    #[test]
    fn write_error_formats_correctly() {
        let err = EmitError::Write {
            path: Utf8PathBuf::from("010_anime_seed.sql"),
            message: "disk full".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "failed to write artifact '010_anime_seed.sql': disk full"
        );
    }
}
