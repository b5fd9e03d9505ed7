//! medscout command line
//!
//! Thin wrapper over the library: every command prints JSON on stdout, logs
//! go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use medscout::config::DEFAULT_CONFIG_FILE;
use medscout::fetch::pick_user_agent;
use medscout::{
    logging, product_details, Aggregator, HttpFetcher, NewRoutine, NotificationStatus, Settings,
    Source, Store,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "medscout")]
#[command(about = "Compare medicine listings and manage dose reminders")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a user
    AddUser {
        username: String,
        name: String,
        age: u32,
    },

    /// Search every retailer for a medicine
    Search {
        query: String,

        /// Record the search in this user's history
        #[arg(short, long)]
        user: Option<String>,

        /// Query retailers concurrently
        #[arg(long)]
        parallel: bool,
    },

    /// Fetch name, price, image and description from a product page
    Details {
        /// PharmEasy, 1mg or Amazon
        source: String,
        url: String,
    },

    /// Search history
    History {
        #[arg(short, long)]
        user: String,

        #[command(subcommand)]
        action: HistoryCommand,
    },

    /// Medicine routines
    Routine {
        #[arg(short, long)]
        user: String,

        #[command(subcommand)]
        action: RoutineCommand,
    },

    /// Dose notifications
    Notifications {
        #[arg(short, long)]
        user: String,

        #[command(subcommand)]
        action: NotificationCommand,
    },
}

#[derive(Subcommand)]
enum HistoryCommand {
    /// Most recent searches first
    Show {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    Clear,
}

#[derive(Subcommand)]
enum RoutineCommand {
    /// Create a routine from a JSON file
    Add { file: PathBuf },
    /// Replace a routine's fields and doses from a JSON file
    Update { id: i64, file: PathBuf },
    Delete { id: i64 },
    List,
    /// Doses of one routine
    Doses { id: i64 },
}

#[derive(Subcommand)]
enum NotificationCommand {
    /// Due notifications, marking them sent
    Pending,
    /// Everything scheduled today
    Today,
    /// Pending notifications later today
    Upcoming {
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },
    /// Taken, remaining and skipped counts for today
    Summary,
    /// Mark a notification taken or skipped
    Respond { id: i64, status: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    logging::init(&settings.logging);

    let store = Store::open(&settings.database.path).with_context(|| {
        format!(
            "failed to open database at {}",
            settings.database.path.display()
        )
    })?;
    let now = Local::now().naive_local();

    match cli.command {
        Commands::AddUser {
            username,
            name,
            age,
        } => {
            let id = store.create_user(&username, &name, age)?;
            print_json(&serde_json::json!({ "id": id, "username": username }))
        }
        Commands::Search {
            query,
            user,
            parallel,
        } => {
            let store = Arc::new(store);
            let user_id = user.map(|u| lookup_user(&store, &u)).transpose()?;
            let fetcher = HttpFetcher::new().context("failed to build HTTP client")?;
            let aggregator = Aggregator::new(&settings.search, Arc::new(fetcher))
                .with_history(store)
                .with_parallel(parallel || settings.search.parallel);
            print_json(&aggregator.search_medicine(&query, user_id))
        }
        Commands::Details { source, url } => {
            let source =
                Source::from_name(&source).ok_or_else(|| anyhow!("unknown source '{source}'"))?;
            let fetcher = HttpFetcher::new().context("failed to build HTTP client")?;
            let details = product_details(
                &fetcher,
                source,
                &url,
                &pick_user_agent(&settings.search.user_agents),
                settings.search.detail_timeout(),
            )
            .with_context(|| format!("failed to load {url}"))?;
            print_json(&details)
        }
        Commands::History { user, action } => {
            let user_id = lookup_user(&store, &user)?;
            match action {
                HistoryCommand::Show { limit } => {
                    print_json(&store.recent_searches(user_id, limit)?)
                }
                HistoryCommand::Clear => {
                    let removed = store.clear_search_history(user_id)?;
                    print_json(&serde_json::json!({ "removed": removed }))
                }
            }
        }
        Commands::Routine { user, action } => {
            let user_id = lookup_user(&store, &user)?;
            routine_command(&store, user_id, action, now)
        }
        Commands::Notifications { user, action } => {
            let user_id = lookup_user(&store, &user)?;
            notification_command(&store, user_id, action, now)
        }
    }
}

fn routine_command(
    store: &Store,
    user_id: i64,
    action: RoutineCommand,
    now: NaiveDateTime,
) -> Result<()> {
    match action {
        RoutineCommand::Add { file } => {
            let routine = read_routine(&file)?;
            let id = store.create_routine(user_id, &routine, now)?;
            print_json(&serde_json::json!({ "id": id }))
        }
        RoutineCommand::Update { id, file } => {
            let routine = read_routine(&file)?;
            store.update_routine(user_id, id, &routine, now)?;
            print_json(&serde_json::json!({ "id": id, "updated": true }))
        }
        RoutineCommand::Delete { id } => {
            store.delete_routine(user_id, id)?;
            print_json(&serde_json::json!({ "id": id, "deleted": true }))
        }
        RoutineCommand::List => print_json(&store.list_routines(user_id, now)?),
        RoutineCommand::Doses { id } => print_json(&store.routine_doses(id)?),
    }
}

fn notification_command(
    store: &Store,
    user_id: i64,
    action: NotificationCommand,
    now: NaiveDateTime,
) -> Result<()> {
    let today = now.date();
    match action {
        NotificationCommand::Pending => print_json(&store.pending_notifications(user_id, now)?),
        NotificationCommand::Today => print_json(&store.today_notifications(user_id, today)?),
        NotificationCommand::Upcoming { limit } => {
            print_json(&store.upcoming_notifications(user_id, now, limit)?)
        }
        NotificationCommand::Summary => print_json(&store.day_summary(user_id, today)?),
        NotificationCommand::Respond { id, status } => {
            let status: NotificationStatus = status.parse()?;
            store.update_notification_status(user_id, id, status, now)?;
            print_json(&serde_json::json!({ "id": id, "status": status }))
        }
    }
}

fn lookup_user(store: &Store, username: &str) -> Result<i64> {
    match store.find_user(username)? {
        Some(id) => Ok(id),
        None => bail!("no user named '{username}'"),
    }
}

fn read_routine(path: &Path) -> Result<NewRoutine> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid routine in {}", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
