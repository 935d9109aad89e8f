use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use services::{AppServices, ProgressService, load_question_bank, views};
use study_core::model::{
    ChapterProgress, ContentKind, ProblemId, ProgressField, ProgressRecord,
};
use tracing_subscriber::EnvFilter;

/// Track quiz progress for a subject from the terminal.
#[derive(Debug, Parser)]
#[command(name = "study", version)]
struct Cli {
    /// `SQLite` database URL or file path.
    #[arg(long, global = true, env = "STUDY_DB_URL", default_value = "sqlite://study.sqlite3")]
    db: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Per-chapter completion for a subject's question bank.
    Status {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        bank: PathBuf,
    },
    /// Completed and starred problems of one chapter.
    Show(ChapterArgs),
    /// Mark a problem done.
    Complete(ProblemArgs),
    /// Mark a problem not done.
    Uncomplete(ProblemArgs),
    /// Star a problem.
    Favourite(ProblemArgs),
    /// Unstar a problem.
    Unfavourite(ProblemArgs),
    /// Starred problems across every chapter of a subject.
    Revision {
        #[arg(long)]
        subject: String,
        /// Resolve starred ids against this question bank.
        #[arg(long)]
        bank: Option<PathBuf>,
    },
    /// Dump every stored record of a subject as JSON.
    Export {
        #[arg(long)]
        subject: String,
    },
}

#[derive(Debug, Args)]
struct ChapterArgs {
    #[arg(long)]
    subject: String,
    #[arg(long)]
    chapter: String,
}

#[derive(Debug, Args)]
struct ProblemArgs {
    #[command(flatten)]
    chapter: ChapterArgs,
    /// Problem id; numeric ids are stored as numbers.
    #[arg(long)]
    problem: String,
}

fn normalize_sqlite_url(raw: &str) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:") {
        return raw.to_string();
    }

    let trimmed = raw.trim();
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_dir(db_url: &str) -> anyhow::Result<()> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("invalid --db value: {db_url}");
    }
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    Ok(())
}

async fn set(
    progress: &ProgressService,
    args: &ProblemArgs,
    field: ProgressField,
    present: bool,
) -> anyhow::Result<()> {
    let ChapterArgs { subject, chapter } = &args.chapter;
    let problem = ProblemId::parse_lenient(&args.problem);
    let updated = progress
        .set_membership(subject, chapter, field, problem, present)
        .await?;
    print_chapter(subject, chapter, &updated);
    Ok(())
}

fn print_chapter(subject: &str, chapter: &str, progress: &ChapterProgress) {
    let join = |ids: &BTreeSet<ProblemId>| {
        ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    };
    println!("{subject} / {chapter}");
    println!("  completed:  [{}]", join(&progress.completed_problems));
    println!("  favourites: [{}]", join(&progress.favourites));
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let db_url = normalize_sqlite_url(&cli.db);
    prepare_sqlite_dir(&db_url)?;
    let services = AppServices::new_sqlite(&db_url)
        .await
        .with_context(|| format!("opening progress store at {db_url}"))?;
    let progress = services.progress();

    match cli.command {
        Command::Status { subject, bank } => {
            let bank = load_question_bank(&subject, &bank)?;
            let records = progress.get_all_for_subject(&subject).await?;
            for chapter in views::subject_completion(&bank, &records) {
                let mark = if chapter.is_complete() { "done" } else { "" };
                println!(
                    "{:<40} {:>4} / {:<4} {:>5.1}% {mark}",
                    chapter.chapter,
                    chapter.completed,
                    chapter.total,
                    chapter.percent()
                );
            }
        }
        Command::Show(args) => {
            let current = progress.get_progress(&args.subject, &args.chapter).await?;
            print_chapter(&args.subject, &args.chapter, &current);
        }
        Command::Complete(args) => set(&progress, &args, ProgressField::Completed, true).await?,
        Command::Uncomplete(args) => set(&progress, &args, ProgressField::Completed, false).await?,
        Command::Favourite(args) => set(&progress, &args, ProgressField::Favourite, true).await?,
        Command::Unfavourite(args) => set(&progress, &args, ProgressField::Favourite, false).await?,
        Command::Revision { subject, bank } => {
            let records = progress.get_all_for_subject(&subject).await?;
            match bank {
                Some(path) => {
                    let bank = load_question_bank(&subject, &path)?;
                    for chapter in views::revision_set(&bank, &records) {
                        println!("{}", chapter.chapter);
                        for question in chapter.questions {
                            let kind = match question.question.as_ref().map(|q| q.kind) {
                                Some(ContentKind::Image) => "image: ",
                                _ => "",
                            };
                            println!("  * [{}] {kind}{}", question.id, question.label());
                        }
                    }
                }
                None => {
                    for (chapter, ids) in views::favourites_by_chapter(&records) {
                        let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
                        println!("{chapter}: {}", ids.join(", "));
                    }
                }
            }
        }
        Command::Export { subject } => {
            let mut records = progress.get_all_for_subject(&subject).await?;
            records.sort_by_key(ProgressRecord::id);
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("error: {err:#}");
        std::process::exit(2);
    }
}
