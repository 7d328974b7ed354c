//! Writing generated artifacts into an output directory.

use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs::Dir};
use serde::Serialize;
use tracing::info;

use crate::atomic_io::write_atomic;
use crate::documents::{DocumentSet, MANIFEST_FILE, Manifest, RATINGS_FILE, USERS_FILE};
use crate::error::EmitError;
use crate::model::EntityId;
use crate::sql::SqlArtifact;

/// File listing the user ids selected by a pipeline run.
pub const USER_IDS_FILE: &str = "user_ids.txt";

/// An output directory, created on open, that receives artifacts atomically.
#[derive(Debug)]
pub struct OutputDir {
    root: PathBuf,
    dir: Dir,
}

impl OutputDir {
    /// Creates `root` (and its parents) if needed and opens it.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::OutputDir`] if the directory cannot be created
    /// or opened.
    pub fn create(root: &Path) -> Result<Self, EmitError> {
        let to_error = |err: std::io::Error| EmitError::OutputDir {
            path: root.to_path_buf(),
            message: err.to_string(),
        };
        Dir::create_ambient_dir_all(root, ambient_authority()).map_err(to_error)?;
        let dir = Dir::open_ambient_dir(root, ambient_authority()).map_err(to_error)?;
        Ok(Self {
            root: root.to_path_buf(),
            dir,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `contents` to `name` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Write`] if the file cannot be written.
    pub fn write_text(&self, name: &str, contents: &str) -> Result<(), EmitError> {
        write_atomic(&self.dir, Utf8Path::new(name), contents.as_bytes())
    }

    /// Serialises `value` as two-space indented JSON and writes it to `name`.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Serialize`] if serialisation fails, or
    /// [`EmitError::Write`] if the file cannot be written.
    pub fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), EmitError> {
        let mut json = serde_json::to_string_pretty(value).map_err(|err| EmitError::Serialize {
            path: Utf8PathBuf::from(name),
            message: err.to_string(),
        })?;
        json.push('\n');
        self.write_text(name, &json)
    }

    /// Writes every SQL script in order.
    ///
    /// # Errors
    ///
    /// Returns the first [`EmitError`] met; earlier scripts stay written.
    pub fn write_sql(&self, artifacts: &[SqlArtifact]) -> Result<(), EmitError> {
        for artifact in artifacts {
            self.write_text(&artifact.file_name, &artifact.render())?;
            info!(
                file = %artifact.file_name,
                statements = artifact.statements.len(),
                "sql seed written"
            );
        }
        Ok(())
    }

    /// Writes `users.json`, `ratings.json` and `manifest.json`.
    ///
    /// # Errors
    ///
    /// Returns the first [`EmitError`] met.
    pub fn write_documents(&self, documents: &DocumentSet) -> Result<Manifest, EmitError> {
        self.write_json(USERS_FILE, &documents.users)?;
        self.write_json(RATINGS_FILE, &documents.ratings)?;
        let manifest = documents.manifest();
        self.write_json(MANIFEST_FILE, &manifest)?;
        info!(
            dir = %self.root.display(),
            users = manifest.users_count,
            ratings = manifest.ratings_count,
            "document seeds written"
        );
        Ok(manifest)
    }

    /// Writes `user_ids.txt`, one id per line.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Write`] if the file cannot be written.
    pub fn write_user_ids(&self, ids: &[EntityId]) -> Result<(), EmitError> {
        let contents: String = ids.iter().map(|id| format!("{id}\n")).collect();
        self.write_text(USER_IDS_FILE, &contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{DocumentScope, build_documents};
    use crate::model::{AppUser, ProfileStats};
    use crate::test_support::unique_temp_dir;

    #[test]
    fn creates_nested_directories_and_writes_documents() {
        let root = unique_temp_dir("artifacts").join("nested").join("documents");
        let output = OutputDir::create(&root).expect("create output dir");
        let users = vec![AppUser {
            id: EntityId::new(4),
            username: "alice".to_owned(),
            gender: None,
            joined: None,
            stats: ProfileStats::default(),
        }];
        let documents = build_documents(&users, &[], &[], &DocumentScope::unrestricted());

        let manifest = output.write_documents(&documents).expect("write documents");

        assert_eq!(manifest.users_count, 1);
        let text = std::fs::read_to_string(root.join(MANIFEST_FILE)).expect("read manifest");
        assert!(text.starts_with("{\n  \"users_file\": \"users.json\""));
        assert!(root.join(USERS_FILE).is_file());
        assert!(root.join(RATINGS_FILE).is_file());
    }

    #[test]
    fn writes_user_ids_one_per_line() {
        let root = unique_temp_dir("artifacts-ids");
        let output = OutputDir::create(&root).expect("create output dir");

        output
            .write_user_ids(&[EntityId::new(3), EntityId::new(11)])
            .expect("write ids");

        let text = std::fs::read_to_string(root.join(USER_IDS_FILE)).expect("read ids");
        assert_eq!(text, "3\n11\n");
    }
}
