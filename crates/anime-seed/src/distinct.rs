//! Distinct value extraction from CSV columns.
//!
//! Cells shaped like a list (`["Action", "Drama"]` or `['Action', 'Drama']`)
//! contribute each element; any other non-empty cell contributes itself.

use std::collections::BTreeSet;
use std::path::Path;

use serde_json::Value;

use crate::csv_source::{open_parent, visit_rows};
use crate::error::InputError;

/// Returns the sorted distinct values of `column` in the CSV at `path`.
///
/// # Errors
///
/// Returns [`InputError`] if the file is missing, unreadable, malformed, or
/// lacks the column.
pub fn distinct_values(path: &Path, column: &str) -> Result<Vec<String>, InputError> {
    let (dir, file_name) = open_parent(path)?;
    let mut distinct = BTreeSet::new();
    visit_rows(&dir, path, &file_name, &[column], |row| {
        let raw = row.text(0);
        if raw.is_empty() {
            return Ok(());
        }
        match split_list_cell(raw) {
            Some(items) => distinct.extend(items),
            None => {
                distinct.insert(raw.to_owned());
            }
        }
        Ok(())
    })?;
    Ok(distinct.into_iter().collect())
}

/// Splits a list-shaped cell into its trimmed, non-empty elements.
///
/// Returns `None` when the cell does not start with `[` or cannot be read as
/// either a JSON list or a single-quoted list.
///
/// # Examples
///
/// ```
/// use anime_seed::split_list_cell;
///
/// assert_eq!(
///     split_list_cell(r#"["Action", "Drama"]"#),
///     Some(vec!["Action".to_owned(), "Drama".to_owned()])
/// );
/// assert_eq!(
///     split_list_cell("['Slice of Life']"),
///     Some(vec!["Slice of Life".to_owned()])
/// );
/// assert_eq!(split_list_cell("Action"), None);
/// ```
#[must_use]
pub fn split_list_cell(raw: &str) -> Option<Vec<String>> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('[') {
        return None;
    }
    if let Ok(items) = serde_json::from_str::<Vec<Value>>(trimmed) {
        return Some(
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(text) => text.trim().to_owned(),
                    other => other.to_string(),
                })
                .filter(|item| !item.is_empty())
                .collect(),
        );
    }
    parse_quoted_list(trimmed)
}

/// Reads a bracketed, comma-separated list whose elements may be quoted with
/// `'` or `"` and use backslash escapes.
fn parse_quoted_list(trimmed: &str) -> Option<Vec<String>> {
    let inner = trimmed.strip_prefix('[')?.strip_suffix(']')?;
    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            break;
        };
        let item = if first == '\'' || first == '"' {
            chars.next();
            let mut text = String::new();
            loop {
                match chars.next()? {
                    '\\' => text.push(chars.next()?),
                    c if c == first => break,
                    c => text.push(c),
                }
            }
            text
        } else {
            let mut text = String::new();
            while let Some(c) = chars.next_if(|c| *c != ',') {
                text.push(c);
            }
            text
        };
        let cleaned = item.trim();
        if !cleaned.is_empty() {
            items.push(cleaned.to_owned());
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => break,
            Some(',') => {}
            Some(_) => return None,
        }
    }
    Some(items)
}
