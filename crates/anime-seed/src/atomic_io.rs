//! Atomic artifact writes.
//!
//! Every artifact is first written to a hidden sibling file, flushed to disk
//! and then renamed over its final name, so a reader never sees a partially
//! written seed script or document.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use camino::{Utf8Component, Utf8Path};
use cap_std::fs::{Dir, OpenOptions};

use crate::error::EmitError;

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Writes `contents` to `name` inside `dir` via a staged temp file.
///
/// `name` must be a single path component.
///
/// # Errors
///
/// Returns [`EmitError::Write`] if staging, flushing or renaming fails. The
/// staged file is removed on a best-effort basis.
pub(crate) fn write_atomic(dir: &Dir, name: &Utf8Path, contents: &[u8]) -> Result<(), EmitError> {
    let file_name = single_component(name)?;
    let staged = staging_name(file_name);

    if let Err(err) = stage(dir, &staged, contents).and_then(|()| replace(dir, &staged, file_name))
    {
        if dir.remove_file(&staged).is_err() {
            // Nothing left to clean up.
        }
        return Err(write_error(name, &err));
    }
    if dir.open(".").and_then(|handle| handle.sync_all()).is_err() {
        // Directory sync is best effort.
    }
    Ok(())
}

fn single_component(name: &Utf8Path) -> Result<&str, EmitError> {
    let mut components = name.components();
    match (components.next(), components.next()) {
        (Some(Utf8Component::Normal(file_name)), None) => Ok(file_name),
        _ => Err(EmitError::Write {
            path: name.to_path_buf(),
            message: "artifact name must be a plain file name".to_owned(),
        }),
    }
}

fn staging_name(file_name: &str) -> String {
    let counter = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    format!(".{file_name}.tmp.{}.{nanos}.{counter}", std::process::id())
}

fn stage(dir: &Dir, staged: &str, contents: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    let mut file = dir.open_with(staged, &options)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(windows)]
fn replace(dir: &Dir, staged: &str, target: &str) -> io::Result<()> {
    match dir.remove_file(target) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    dir.rename(staged, dir, target)
}

#[cfg(not(windows))]
fn replace(dir: &Dir, staged: &str, target: &str) -> io::Result<()> {
    dir.rename(staged, dir, target)
}

fn write_error(name: &Utf8Path, err: &io::Error) -> EmitError {
    EmitError::Write {
        path: name.to_path_buf(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use cap_std::ambient_authority;

    use super::*;
    use crate::test_support::unique_temp_dir;

    fn open(path: &std::path::Path) -> Dir {
        std::fs::create_dir_all(path).expect("create temp dir");
        Dir::open_ambient_dir(path, ambient_authority()).expect("open temp dir")
    }

    #[test]
    fn replaces_existing_contents_without_leftovers() {
        let root = unique_temp_dir("atomic-io");
        let dir = open(&root);
        let name = Utf8Path::new("010_anime_seed.sql");

        write_atomic(&dir, name, b"first").expect("first write");
        write_atomic(&dir, name, b"second").expect("second write");

        assert_eq!(dir.read_to_string(name).expect("read"), "second");
        let entries: Vec<String> = dir
            .entries()
            .expect("list")
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        assert_eq!(entries, vec!["010_anime_seed.sql".to_owned()]);
        std::fs::remove_dir_all(root).expect("clean up");
    }

    #[test]
    fn rejects_nested_names() {
        let root = unique_temp_dir("atomic-io-nested");
        let dir = open(&root);

        let result = write_atomic(&dir, Utf8Path::new("nested/users.json"), b"[]");

        assert!(matches!(result, Err(EmitError::Write { .. })));
        std::fs::remove_dir_all(root).expect("clean up");
    }
}
