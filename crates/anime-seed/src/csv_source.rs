//! Capability-scoped CSV reading shared by the dataset loaders.
//!
//! Files are opened through a [`Dir`] handle and decoded with the `csv`
//! crate. Required columns are resolved from the header once; rows are then
//! handed to a visitor as [`Row`] views addressed by column slot.

use std::io;
use std::path::{Path, PathBuf};

use cap_std::ambient_authority;
use cap_std::fs::{Dir, File};
use csv::{ReaderBuilder, StringRecord};

use crate::error::InputError;
use crate::model::EntityId;

/// Opens a directory with ambient authority, mapping failures to input errors.
pub(crate) fn open_input_dir(path: &Path) -> Result<Dir, InputError> {
    Dir::open_ambient_dir(path, ambient_authority()).map_err(|err| io_error(path, &err))
}

/// Splits a file path into an opened parent directory and its file name.
pub(crate) fn open_parent(path: &Path) -> Result<(Dir, String), InputError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| InputError::Io {
            path: path.to_path_buf(),
            message: "input path must name a file".to_owned(),
        })?
        .to_owned();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok((open_input_dir(parent)?, file_name))
}

pub(crate) fn io_error(path: &Path, err: &io::Error) -> InputError {
    if err.kind() == io::ErrorKind::NotFound {
        InputError::MissingFile {
            path: path.to_path_buf(),
        }
    } else {
        InputError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

fn malformed(path: &Path, err: &csv::Error) -> InputError {
    InputError::Malformed {
        path: path.to_path_buf(),
        line: err.position().map_or(0, csv::Position::line),
        message: err.to_string(),
    }
}

/// A decoded CSV record viewed through the requested column slots.
pub(crate) struct Row<'a> {
    path: &'a Path,
    record: &'a StringRecord,
    indices: &'a [usize],
    line: u64,
}

impl Row<'_> {
    /// Returns the trimmed cell for `slot`, or an empty string if absent.
    pub(crate) fn text(&self, slot: usize) -> &str {
        self.indices
            .get(slot)
            .and_then(|&index| self.record.get(index))
            .map_or("", str::trim)
    }

    /// Returns the cell for `slot`, treating empty cells as missing.
    pub(crate) fn optional_text(&self, slot: usize) -> Option<String> {
        let value = self.text(slot);
        (!value.is_empty()).then(|| value.to_owned())
    }

    /// Parses an identifier cell strictly.
    pub(crate) fn id(&self, slot: usize, column: &'static str) -> Result<EntityId, InputError> {
        let raw = self.text(slot);
        raw.parse::<i64>()
            .map(EntityId::new)
            .map_err(|_| InputError::InvalidId {
                path: self.path.to_path_buf(),
                line: self.line,
                column,
                value: raw.to_owned(),
            })
    }

    /// Parses a counter cell leniently; see [`parse_count`].
    pub(crate) fn count(&self, slot: usize) -> i64 {
        parse_count(self.text(slot))
    }

    /// Parses an optional integer cell; anything unparseable is missing.
    pub(crate) fn optional_int(&self, slot: usize) -> Option<i64> {
        self.text(slot).parse().ok()
    }

    /// Parses an optional decimal cell; anything unparseable is missing.
    pub(crate) fn optional_float(&self, slot: usize) -> Option<f64> {
        self.text(slot)
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
    }

    /// One-based line number of the record.
    pub(crate) const fn line(&self) -> u64 {
        self.line
    }
}

/// Streams every record of `file_name` to `visit`.
///
/// `columns` lists the header names the visitor needs; slot `i` of each
/// [`Row`] addresses `columns[i]`.
pub(crate) fn visit_rows<F>(
    dir: &Dir,
    path: &Path,
    file_name: &str,
    columns: &[&str],
    mut visit: F,
) -> Result<(), InputError>
where
    F: FnMut(&Row<'_>) -> Result<(), InputError>,
{
    let file: File = dir.open(file_name).map_err(|err| io_error(path, &err))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);
    let headers = reader
        .headers()
        .map_err(|err| malformed(path, &err))?
        .clone();
    let indices = columns
        .iter()
        .map(|column| {
            headers
                .iter()
                .position(|header| header.trim() == *column)
                .ok_or_else(|| InputError::MissingColumn {
                    path: path.to_path_buf(),
                    column: (*column).to_owned(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    for result in reader.records() {
        let record = result.map_err(|err| malformed(path, &err))?;
        let row = Row {
            path,
            record: &record,
            indices: &indices,
            line: record.position().map_or(0, csv::Position::line),
        };
        visit(&row)?;
    }
    Ok(())
}

/// Collects the non-`None` results of `map` over every record.
pub(crate) fn read_rows<T, F>(
    dir: &Dir,
    root: &Path,
    file_name: &str,
    columns: &[&str],
    mut map: F,
) -> Result<Vec<T>, InputError>
where
    F: FnMut(&Row<'_>) -> Result<Option<T>, InputError>,
{
    let path: PathBuf = root.join(file_name);
    let mut rows = Vec::new();
    visit_rows(dir, &path, file_name, columns, |row| {
        if let Some(item) = map(row)? {
            rows.push(item);
        }
        Ok(())
    })?;
    Ok(rows)
}

/// Parses a counter leniently.
///
/// Empty cells and garbage become `0`, thousands separators are ignored, and
/// decimals are truncated toward zero.
#[must_use]
pub(crate) fn parse_count(raw: &str) -> i64 {
    let stripped: String = raw.chars().filter(|c| *c != ',').collect();
    let cleaned = stripped.trim();
    let whole = match cleaned.split_once('.') {
        Some((whole, fraction)) if fraction.chars().all(|c| c.is_ascii_digit()) => whole,
        Some(_) => return 0,
        None => cleaned,
    };
    match whole {
        "" | "-" | "+" => 0,
        digits => digits.parse().unwrap_or(0),
    }
}

/// Normalises a watch status to lower snake case.
#[must_use]
pub(crate) fn normalize_status(raw: &str) -> String {
    raw.trim().replace(' ', "_").to_lowercase()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("", 0)]
    #[case("  ", 0)]
    #[case("12", 12)]
    #[case("1,234", 1234)]
    #[case("12.7", 12)]
    #[case("-3.5", -3)]
    #[case(".5", 0)]
    #[case("12.x", 0)]
    #[case("n/a", 0)]
    fn parses_counts_leniently(#[case] raw: &str, #[case] expected: i64) {
        assert_eq!(parse_count(raw), expected);
    }

    #[rstest]
    #[case("Plan to Watch", "plan_to_watch")]
    #[case(" Completed ", "completed")]
    #[case("On Hold", "on_hold")]
    #[case("", "")]
    fn normalises_statuses(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_status(raw), expected);
    }
}
