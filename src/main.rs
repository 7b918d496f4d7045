//! liftlog - Local-first strength training log

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::Mutex;

use liftlog::db::Store;
use liftlog::models::{Exercise, MuscleGroup};
use liftlog::pr;
use liftlog::session::SessionTracker;
use liftlog::sync::http::HttpRemote;
use liftlog::sync::{OfflineRemote, RemoteApi, SyncCoordinator};

#[derive(Parser)]
#[command(name = "liftlog")]
#[command(author, version, about = "Local-first strength training log")]
struct Cli {
    /// Database file
    #[arg(long, default_value = "liftlog.db", env = "LIFTLOG_DB")]
    db: String,

    /// Owner identifier (resolved externally; no auth happens here)
    #[arg(long, default_value = "local", env = "LIFTLOG_OWNER")]
    owner: String,

    /// Remote backend base URL; sync stays offline without it
    #[arg(long, env = "LIFTLOG_REMOTE_URL")]
    remote_url: Option<String>,

    /// Bearer token for the remote backend
    #[arg(long, env = "LIFTLOG_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a workout session (no-op if one is already active)
    Start,

    /// Log a set in the active session
    Log {
        /// Exercise name (created on first use)
        exercise: String,

        /// Weight in kilograms
        weight: f64,

        /// Repetitions
        reps: i32,

        /// Perceived exertion, 1-10
        #[arg(long)]
        rpe: Option<f64>,

        /// Muscle group when the exercise is created on first use
        #[arg(long, default_value = "other")]
        muscle: String,
    },

    /// Remove the most recently logged set
    Undo,

    /// Finish the active session
    Finish {
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Show recent sets for an exercise
    History {
        exercise: String,

        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Show PR sets and estimated 1RM for an exercise
    Prs { exercise: String },

    /// List known exercises
    Exercises,

    /// Estimate a one-rep max from a set
    Onerm {
        weight: f64,
        reps: i32,

        /// Also show the working weight for this rep target
        #[arg(long)]
        target_reps: Option<i32>,
    },

    /// Run a sync pass now
    Sync,
}

fn find_exercise_by_name<'a>(exercises: &'a [Exercise], name: &str) -> Option<&'a Exercise> {
    exercises
        .iter()
        .find(|e| e.name.eq_ignore_ascii_case(name))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let store = Arc::new(Mutex::new(
        Store::open(&cli.db).with_context(|| format!("opening database {}", cli.db))?,
    ));
    let remote: Arc<dyn RemoteApi> = match &cli.remote_url {
        Some(url) => Arc::new(HttpRemote::new(url.clone(), cli.token.clone())),
        None => Arc::new(OfflineRemote),
    };
    let sync = Arc::new(SyncCoordinator::new(Arc::clone(&store), remote));
    let mut tracker =
        SessionTracker::resume(cli.owner.clone(), Arc::clone(&store), Arc::clone(&sync)).await?;

    match cli.command {
        Commands::Start => {
            let session = tracker.start_session().await?;
            println!(
                "Session {} active since {}",
                session.id,
                session.started_at.format("%Y-%m-%d %H:%M")
            );
        }

        Commands::Log {
            exercise,
            weight,
            reps,
            rpe,
            muscle,
        } => {
            let exercises = tracker.exercises().await?;
            let exercise_id = match find_exercise_by_name(&exercises, &exercise) {
                Some(e) => e.id.clone(),
                None => {
                    let Some(group) = MuscleGroup::parse(&muscle) else {
                        bail!("unknown muscle group: {muscle}");
                    };
                    let new = Exercise::new(&cli.owner, &exercise, group);
                    store.lock().await.insert_exercise(&new)?;
                    println!("Created exercise: {}", new.name);
                    new.id
                }
            };

            let entry = tracker.log_set(&exercise_id, weight, reps, rpe).await?;
            let pr_note = if entry.is_pr { "  *** PR ***" } else { "" };
            println!("Logged: {} {}kg x{}{}", exercise, weight, reps, pr_note);
        }

        Commands::Undo => {
            let removed = tracker.undo_last_set().await?;
            println!("Removed: {}kg x{}", removed.weight_kg, removed.reps);
        }

        Commands::Finish { notes } => {
            let session = tracker.finish_session(notes).await?;
            let set_count = store
                .lock()
                .await
                .list_sets_for_session(&session.id)?
                .len();
            println!("Finished session {} ({} sets)", session.id, set_count);
            if let Some(err) = sync.last_error().await {
                println!("Last sync failed: {err}");
            }
        }

        Commands::History { exercise, limit } => {
            let exercises = tracker.exercises().await?;
            let Some(found) = find_exercise_by_name(&exercises, &exercise) else {
                bail!("unknown exercise: {exercise}");
            };
            let sets = store
                .lock()
                .await
                .list_sets_for_exercise(&found.id, Some(limit))?;
            println!("Recent sets for {}:", found.name);
            println!("{:-<50}", "");
            for set in sets {
                println!(
                    "{} | {:6.1}kg x{:3} | {}{}",
                    set.performed_at.format("%Y-%m-%d %H:%M"),
                    set.weight_kg,
                    set.reps,
                    if set.is_synced() { "synced" } else { "local" },
                    if set.is_pr { " | PR" } else { "" },
                );
            }
        }

        Commands::Prs { exercise } => {
            let exercises = tracker.exercises().await?;
            let Some(found) = find_exercise_by_name(&exercises, &exercise) else {
                bail!("unknown exercise: {exercise}");
            };
            let sets = store.lock().await.list_sets_for_exercise(&found.id, None)?;
            println!("PRs for {}:", found.name);
            println!("{:-<50}", "");
            for set in sets.iter().filter(|s| s.is_pr) {
                println!(
                    "{} | {:6.1}kg x{:3} | est. 1RM {:.1}kg",
                    set.performed_at.format("%Y-%m-%d"),
                    set.weight_kg,
                    set.reps,
                    pr::estimate_one_rep_max(set.weight_kg, set.reps),
                );
            }
        }

        Commands::Exercises => {
            for exercise in tracker.exercises().await? {
                println!("{:20} | {}", exercise.name, exercise.muscle_group.as_str());
            }
        }

        Commands::Onerm {
            weight,
            reps,
            target_reps,
        } => {
            let estimate = pr::estimate_one_rep_max(weight, reps);
            println!("Estimated 1RM: {estimate:.1}kg");
            if let Some(target) = target_reps {
                let working = pr::weight_for_target_reps(estimate, target);
                println!("Weight for {target} reps: {working:.1}kg");
            }
        }

        Commands::Sync => {
            if cli.remote_url.is_none() {
                bail!("no remote configured; set LIFTLOG_REMOTE_URL");
            }
            match sync.sync_now(&cli.owner).await {
                Ok(report) if report.dropped => println!("Sync already running"),
                Ok(report) => println!(
                    "Synced: {} sets pushed, {} failed, {} sessions, {} exercises pulled",
                    report.pushed_sets,
                    report.failed_sets,
                    report.pushed_sessions,
                    report.pulled_exercises,
                ),
                Err(e) => bail!("sync failed: {e}"),
            }
        }
    }

    Ok(())
}
