//! Command-line front end for the generator.
//!
//! Arguments are parsed with `clap`; unset directories fall back to the
//! layered [`SeedPathSettings`]. The binary only installs logging and maps
//! the outcome of [`run`] to an exit code, so every command can be driven
//! from tests without spawning a process.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::documents::{
    DocumentScope, Manifest, parse_user_ids, parse_user_ids_file, user_ids_from_app_user_script,
};
use crate::error::SeedError;
use crate::model::EntityId;
use crate::settings::SeedPathSettings;
use crate::sql::APP_USER;
use crate::workflow::{
    DocumentRequest, PipelineRun, SqlRequest, SqlRun, VerifyReport, extract_distinct,
    generate_documents, generate_sql, parse_columns, run_pipeline, verify_scripts,
};

/// `anime-seed` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "anime-seed",
    about = "Generate referentially closed seed data from anime CSV datasets",
    version
)]
pub struct Cli {
    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Sample anime and users and write numbered SQL seed scripts.
    Sql(SqlArgs),
    /// Write user and rating documents for selected users.
    Documents(DocumentArgs),
    /// Write SQL seeds, then documents scoped to the same seed set.
    Pipeline(PipelineArgs),
    /// Extract distinct column values from a CSV file.
    Distinct(DistinctArgs),
    /// Replay SQL seed scripts twice and check nothing is inserted twice.
    Verify(VerifyArgs),
}

/// Sampling flags shared by `sql` and `pipeline`.
#[derive(Debug, Clone, Args)]
pub struct SampleArgs {
    /// Number of anime to sample.
    #[arg(long = "n", value_name = "count")]
    pub n: usize,
    /// Sampling seed; drawn at random and logged when omitted.
    #[arg(long, value_name = "seed")]
    pub seed: Option<u64>,
    /// Number of users to sample (defaults to `--n`, capped at the number of
    /// profiles).
    #[arg(long = "user-count", value_name = "count")]
    pub user_count: Option<usize>,
    /// Directory holding the CSV datasets.
    #[arg(long = "datasets-dir", value_name = "path")]
    pub datasets_dir: Option<PathBuf>,
    /// Directory receiving the SQL scripts.
    #[arg(long = "output-dir", value_name = "path")]
    pub output_dir: Option<PathBuf>,
}

impl SampleArgs {
    fn request(&self, settings: &SeedPathSettings) -> SqlRequest {
        SqlRequest {
            datasets_dir: self
                .datasets_dir
                .clone()
                .unwrap_or_else(|| settings.datasets_dir()),
            output_dir: self
                .output_dir
                .clone()
                .unwrap_or_else(|| settings.output_dir()),
            anime_count: self.n,
            user_count: self.user_count,
            seed: self.seed,
        }
    }
}

/// Flags of the `sql` command.
#[derive(Debug, Clone, Args)]
pub struct SqlArgs {
    /// Sampling flags.
    #[command(flatten)]
    pub sample: SampleArgs,
}

/// Flags of the `documents` command.
#[derive(Debug, Clone, Args)]
pub struct DocumentArgs {
    /// Comma-separated app user ids, e.g. `14,20,33`.
    #[arg(long = "user-ids", value_name = "ids", conflicts_with = "user_ids_file")]
    pub user_ids: Option<String>,
    /// File of app user ids separated by commas or newlines.
    #[arg(long = "user-ids-file", value_name = "path")]
    pub user_ids_file: Option<PathBuf>,
    /// App user seed script read when no ids are given.
    #[arg(long = "app-user-seed", value_name = "path")]
    pub app_user_seed: Option<PathBuf>,
    /// Directory holding the CSV datasets.
    #[arg(long = "datasets-dir", value_name = "path")]
    pub datasets_dir: Option<PathBuf>,
    /// Directory receiving the documents.
    #[arg(long = "output-dir", value_name = "path")]
    pub output_dir: Option<PathBuf>,
}

impl DocumentArgs {
    fn user_ids(&self, settings: &SeedPathSettings) -> Result<Vec<EntityId>, SeedError> {
        if let Some(raw) = &self.user_ids {
            return Ok(parse_user_ids(raw)?);
        }
        if let Some(path) = &self.user_ids_file {
            return parse_user_ids_file(path);
        }
        let script = self
            .app_user_seed
            .clone()
            .unwrap_or_else(|| settings.output_dir().join(APP_USER.file_name()));
        user_ids_from_app_user_script(&script)
    }
}

/// Flags of the `pipeline` command.
#[derive(Debug, Clone, Args)]
pub struct PipelineArgs {
    /// Sampling flags.
    #[command(flatten)]
    pub sample: SampleArgs,
    /// Comma-separated app user ids for the document stage; defaults to the
    /// sampled users.
    #[arg(long = "user-ids", value_name = "ids")]
    pub user_ids: Option<String>,
    /// Directory receiving the documents and `user_ids.txt`.
    #[arg(long = "document-output-dir", value_name = "path")]
    pub document_output_dir: Option<PathBuf>,
}

/// Flags of the `distinct` command.
#[derive(Debug, Clone, Args)]
pub struct DistinctArgs {
    /// CSV file to read.
    #[arg(long = "csv-path", value_name = "path")]
    pub csv_path: PathBuf,
    /// Comma-separated column names.
    #[arg(long, value_name = "a,b")]
    pub columns: String,
    /// Directory receiving `<column>_distinct.txt` files.
    #[arg(long = "output-path", value_name = "dir")]
    pub output_path: PathBuf,
}

/// Flags of the `verify` command.
#[derive(Debug, Clone, Args)]
pub struct VerifyArgs {
    /// Directory holding the SQL scripts; defaults to the seed output
    /// directory.
    #[arg(long = "input-dir", value_name = "path")]
    pub input_dir: Option<PathBuf>,
}

/// What a command produced, rendered as a short summary.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// SQL scripts were written.
    Sql {
        /// Output directory.
        dir: PathBuf,
        /// The run.
        run: SqlRun,
    },
    /// Documents were written.
    Documents {
        /// Output directory.
        dir: PathBuf,
        /// Manifest of the written documents.
        manifest: Manifest,
    },
    /// Both stages ran.
    Pipeline {
        /// SQL output directory.
        sql_dir: PathBuf,
        /// Document output directory.
        document_dir: PathBuf,
        /// The run.
        run: PipelineRun,
    },
    /// Distinct value files were written.
    Distinct {
        /// Written files.
        files: Vec<PathBuf>,
    },
    /// Scripts replayed cleanly.
    Verified {
        /// Replay totals.
        report: VerifyReport,
    },
}

fn write_sql_summary(f: &mut fmt::Formatter<'_>, dir: &Path, run: &SqlRun) -> fmt::Result {
    write!(
        f,
        "wrote {} SQL scripts to {} (seed {}, {} anime, {} users)",
        run.scripts.len(),
        dir.display(),
        run.seed,
        run.seed_set.anime.len(),
        run.seed_set.users.len()
    )
}

fn write_manifest_summary(
    f: &mut fmt::Formatter<'_>,
    dir: &Path,
    manifest: &Manifest,
) -> fmt::Result {
    write!(
        f,
        "wrote {} user and {} rating documents to {}",
        manifest.users_count,
        manifest.ratings_count,
        dir.display()
    )
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sql { dir, run } => write_sql_summary(f, dir, run),
            Self::Documents { dir, manifest } => write_manifest_summary(f, dir, manifest),
            Self::Pipeline {
                sql_dir,
                document_dir,
                run,
            } => {
                write_sql_summary(f, sql_dir, &run.sql)?;
                writeln!(f)?;
                write_manifest_summary(f, document_dir, &run.manifest)
            }
            Self::Distinct { files } => {
                write!(f, "wrote {} distinct value files", files.len())
            }
            Self::Verified { report } => write!(
                f,
                "replayed {} scripts: {} rows inserted, {} skipped, second pass inserted nothing",
                report.scripts, report.inserted, report.skipped
            ),
        }
    }
}

/// Runs a parsed command.
///
/// # Errors
///
/// Returns the [`SeedError`] raised by the command's workflow.
pub fn run(cli: &Cli, settings: &SeedPathSettings) -> Result<Outcome, SeedError> {
    match &cli.command {
        Command::Sql(args) => {
            let request = args.sample.request(settings);
            let run = generate_sql(&request)?;
            Ok(Outcome::Sql {
                dir: request.output_dir,
                run,
            })
        }
        Command::Documents(args) => {
            let request = DocumentRequest {
                datasets_dir: args
                    .datasets_dir
                    .clone()
                    .unwrap_or_else(|| settings.datasets_dir()),
                output_dir: args
                    .output_dir
                    .clone()
                    .unwrap_or_else(|| settings.document_output_dir()),
                user_ids: args.user_ids(settings)?,
                scope: DocumentScope::unrestricted(),
            };
            let manifest = generate_documents(&request)?;
            Ok(Outcome::Documents {
                dir: request.output_dir,
                manifest,
            })
        }
        Command::Pipeline(args) => {
            let request = args.sample.request(settings);
            let user_ids = args.user_ids.as_deref().map(parse_user_ids).transpose()?;
            let document_dir = args
                .document_output_dir
                .clone()
                .unwrap_or_else(|| settings.document_output_dir());
            let run = run_pipeline(&request, &document_dir, user_ids.as_deref())?;
            Ok(Outcome::Pipeline {
                sql_dir: request.output_dir,
                document_dir,
                run,
            })
        }
        Command::Distinct(args) => {
            let columns = parse_columns(&args.columns)?;
            let files = extract_distinct(&args.csv_path, &columns, &args.output_path)?;
            Ok(Outcome::Distinct { files })
        }
        Command::Verify(args) => {
            let dir = args
                .input_dir
                .clone()
                .unwrap_or_else(|| settings.output_dir());
            Ok(Outcome::Verified {
                report: verify_scripts(&dir)?,
            })
        }
    }
}
