//! Directory settings loaded via OrthoConfig.
//!
//! Settings come from `ANIME_SEED_*` environment variables or a config file;
//! command-line flags take precedence over both.

use std::ffi::OsString;
use std::path::PathBuf;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::error::ConfigurationError;

const DEFAULT_DATASETS_DIR: &str = "data-import/datasets";
const DEFAULT_SEED_OUTPUT_DIR: &str = "dml/seeds";
const DEFAULT_DOCUMENT_OUTPUT_DIR: &str = "dml/document-seeds";

/// Input and output directories used by the generator.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "ANIME_SEED")]
pub struct SeedPathSettings {
    /// Directory holding the CSV datasets.
    pub datasets_dir: Option<PathBuf>,
    /// Directory receiving the SQL seed scripts.
    pub output_dir: Option<PathBuf>,
    /// Directory receiving the JSON documents.
    pub document_output_dir: Option<PathBuf>,
}

impl SeedPathSettings {
    /// Loads settings from the environment and config files only.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Settings`] if a layer cannot be read.
    pub fn load_layers() -> Result<Self, ConfigurationError> {
        Self::load_from_iter([OsString::from("anime-seed")]).map_err(|err| {
            ConfigurationError::Settings {
                message: err.to_string(),
            }
        })
    }

    /// Returns the dataset directory, falling back to the default.
    #[must_use]
    pub fn datasets_dir(&self) -> PathBuf {
        self.datasets_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASETS_DIR))
    }

    /// Returns the SQL output directory, falling back to the default.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SEED_OUTPUT_DIR))
    }

    /// Returns the document output directory, falling back to the default.
    #[must_use]
    pub fn document_output_dir(&self) -> PathBuf {
        self.document_output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCUMENT_OUTPUT_DIR))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for directory settings.

    use super::*;

    use env_lock::lock_env;
    use rstest::rstest;

    const KEYS: [&str; 3] = [
        "ANIME_SEED_DATASETS_DIR",
        "ANIME_SEED_OUTPUT_DIR",
        "ANIME_SEED_DOCUMENT_OUTPUT_DIR",
    ];

    #[rstest]
    fn defaults_apply_when_unset() {
        let _guard = lock_env(KEYS.map(|key| (key, None::<String>)));

        let settings = SeedPathSettings::load_layers().expect("settings should load");

        assert_eq!(settings.datasets_dir(), PathBuf::from("data-import/datasets"));
        assert_eq!(settings.output_dir(), PathBuf::from("dml/seeds"));
        assert_eq!(
            settings.document_output_dir(),
            PathBuf::from("dml/document-seeds")
        );
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("ANIME_SEED_DATASETS_DIR", Some("/srv/datasets".to_owned())),
            ("ANIME_SEED_OUTPUT_DIR", Some("/srv/seeds".to_owned())),
            ("ANIME_SEED_DOCUMENT_OUTPUT_DIR", None::<String>),
        ]);

        let settings = SeedPathSettings::load_layers().expect("settings should load");

        assert_eq!(settings.datasets_dir(), PathBuf::from("/srv/datasets"));
        assert_eq!(settings.output_dir(), PathBuf::from("/srv/seeds"));
        assert_eq!(
            settings.document_output_dir(),
            PathBuf::from("dml/document-seeds")
        );
    }
}
