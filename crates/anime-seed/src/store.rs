//! Relational store port and script replay.
//!
//! The generator never talks to a database. [`RelationalStore`] is the seam
//! an adapter would implement; [`MemoryStore`] honours the
//! `ON CONFLICT DO NOTHING` contract in memory so emitted scripts can be
//! replayed and checked for idempotency.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use tracing::{debug, info};

use crate::csv_source::{io_error, open_input_dir};
use crate::error::{InputError, ScriptError, SeedError};
use crate::sql::{InsertStatement, SqlValue, parse_script, seed_table};

/// Result of applying one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was stored.
    Inserted,
    /// A row with the same key already existed; nothing changed.
    Skipped,
}

/// Port for stores that accept the emitted `INSERT` statements.
pub trait RelationalStore {
    /// Applies one statement with `ON CONFLICT DO NOTHING` semantics.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Rejected`] when the store cannot accept the
    /// statement.
    fn insert(&mut self, statement: &InsertStatement) -> Result<InsertOutcome, ScriptError>;
}

#[derive(Debug, Default)]
struct MemoryTable {
    keys: HashSet<Vec<String>>,
    rows: Vec<Vec<SqlValue>>,
}

/// In-memory store keyed on each seed table's uniqueness columns.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, MemoryTable>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows stored in `table`.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |stored| stored.rows.len())
    }

    /// Rows stored in `table`, in insertion order.
    #[must_use]
    pub fn rows(&self, table: &str) -> &[Vec<SqlValue>] {
        self.tables
            .get(table)
            .map(|stored| stored.rows.as_slice())
            .unwrap_or_default()
    }
}

impl RelationalStore for MemoryStore {
    fn insert(&mut self, statement: &InsertStatement) -> Result<InsertOutcome, ScriptError> {
        let schema = seed_table(&statement.table).ok_or_else(|| ScriptError::Rejected {
            table: statement.table.clone(),
            message: "unknown table".to_owned(),
        })?;
        let key = schema
            .key
            .iter()
            .map(|column| {
                statement
                    .value(column)
                    .map(ToString::to_string)
                    .ok_or_else(|| ScriptError::Rejected {
                        table: statement.table.clone(),
                        message: format!("missing key column '{column}'"),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let table = self.tables.entry(statement.table.clone()).or_default();
        if !table.keys.insert(key) {
            return Ok(InsertOutcome::Skipped);
        }
        table.rows.push(statement.values.clone());
        Ok(InsertOutcome::Inserted)
    }
}

/// A parsed SQL script.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlScript {
    /// Script file name.
    pub file_name: String,
    /// Statements in file order.
    pub statements: Vec<InsertStatement>,
}

/// Loads every `*.sql` file in `dir`, ordered by file name.
///
/// # Errors
///
/// Returns [`SeedError::Input`] if the directory or a script cannot be read,
/// or [`SeedError::Script`] if a script does not parse.
pub fn load_scripts(dir: &Path) -> Result<Vec<SqlScript>, SeedError> {
    let handle = open_input_dir(dir)?;
    let entries = handle.entries().map_err(|err| io_error(dir, &err))?;
    let mut names = Vec::new();
    for entry in entries {
        let file_name = entry.map_err(|err| io_error(dir, &err))?.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if Path::new(name).extension().is_some_and(|ext| ext == "sql") {
            names.push(name.to_owned());
        }
    }
    names.sort();

    let mut scripts = Vec::with_capacity(names.len());
    for file_name in names {
        let contents = handle
            .read_to_string(&file_name)
            .map_err(|err| io_error(&dir.join(&file_name), &err))?;
        let statements = parse_script(&file_name, &contents)?;
        scripts.push(SqlScript {
            file_name,
            statements,
        });
    }
    if scripts.is_empty() {
        return Err(InputError::MissingFile {
            path: dir.join("*.sql"),
        }
        .into());
    }
    Ok(scripts)
}

/// Rows inserted and skipped while applying one script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Script file name.
    pub script: String,
    /// Statements that stored a row.
    pub inserted: usize,
    /// Statements skipped by the conflict rule.
    pub skipped: usize,
}

/// Applies `scripts` to `store` in order.
///
/// # Errors
///
/// Returns the first [`ScriptError`] raised by the store.
pub fn replay<S: RelationalStore + ?Sized>(
    store: &mut S,
    scripts: &[SqlScript],
) -> Result<Vec<ApplyReport>, ScriptError> {
    let mut reports = Vec::with_capacity(scripts.len());
    for script in scripts {
        let mut report = ApplyReport {
            script: script.file_name.clone(),
            inserted: 0,
            skipped: 0,
        };
        for (index, statement) in script.statements.iter().enumerate() {
            match store.insert(statement)? {
                InsertOutcome::Inserted => report.inserted += 1,
                InsertOutcome::Skipped => {
                    debug!(
                        script = %script.file_name,
                        index,
                        table = %statement.table,
                        "row skipped on conflict"
                    );
                    report.skipped += 1;
                }
            }
        }
        info!(
            script = %report.script,
            inserted = report.inserted,
            skipped = report.skipped,
            "script applied"
        );
        reports.push(report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::model::{EntityId, Named};
    use crate::sql::{CHARACTER, SqlArtifact};

    fn named(id: i64, name: &str) -> Named {
        Named {
            id: EntityId::new(id),
            name: name.to_owned(),
        }
    }

    #[fixture]
    fn script() -> SqlScript {
        let artifact = SqlArtifact::new(
            &CHARACTER,
            &[named(1, "Spike"), named(2, "Faye"), named(1, "Spike again")],
        );
        SqlScript {
            file_name: artifact.file_name,
            statements: artifact.statements,
        }
    }

    #[rstest]
    fn duplicate_keys_are_skipped(script: SqlScript) {
        let mut store = MemoryStore::new();

        let reports = replay(&mut store, &[script]).expect("replay");

        assert_eq!(
            reports,
            vec![ApplyReport {
                script: "011_character_seed.sql".to_owned(),
                inserted: 2,
                skipped: 1,
            }]
        );
        assert_eq!(store.row_count("character"), 2);
    }

    #[rstest]
    fn second_replay_inserts_nothing(script: SqlScript) {
        let mut store = MemoryStore::new();
        let scripts = [script];
        replay(&mut store, &scripts).expect("first replay");

        let second = replay(&mut store, &scripts).expect("second replay");

        assert!(second.iter().all(|report| report.inserted == 0));
    }

    #[test]
    fn rejects_unknown_tables() {
        let statement =
            InsertStatement::parse("INSERT INTO studio (id) VALUES (1) ON CONFLICT DO NOTHING;")
                .expect("parse");

        let result = MemoryStore::new().insert(&statement);

        assert_eq!(
            result,
            Err(ScriptError::Rejected {
                table: "studio".to_owned(),
                message: "unknown table".to_owned(),
            })
        );
    }

    #[test]
    fn rejects_statements_without_key_columns() {
        let statement = InsertStatement::parse(
            "INSERT INTO character (name) VALUES ('Jet') ON CONFLICT DO NOTHING;",
        )
        .expect("parse");

        let result = MemoryStore::new().insert(&statement);

        assert!(matches!(result, Err(ScriptError::Rejected { .. })));
    }
}
