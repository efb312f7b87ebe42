use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use turnover_core::Month;

mod app;
mod commands;
mod config;
mod logging;
mod state;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TURNOVER_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(name = "turnover", version = VERSION, about = "Cleaning schedule for short-stay turnovers")]
struct Cli {
    /// State directory (default: $TURNOVER_HOME or ~/.turnover)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Config file management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Create missing cleaning tasks from the current bookings
    Sync,

    /// Cleaning tasks for a month (default: this month)
    List {
        #[arg(long)]
        month: Option<Month>,
    },

    /// Dates a task may be moved to
    LegalDates {
        #[arg(long)]
        task: String,
    },

    /// Move a task to another date
    Relocate {
        #[arg(long)]
        task: String,
        /// Target date, YYYY-MM-DD
        #[arg(long)]
        to: String,
    },

    /// Move a task back to its checkout day
    Revert {
        #[arg(long)]
        task: String,
    },

    /// Assign a cleaner to a task
    Assign {
        #[arg(long)]
        task: String,
        #[arg(long)]
        cleaner: String,
        /// Tell the cleaner about it
        #[arg(long)]
        notify: bool,
    },

    /// Clear a task's cleaner
    Unassign {
        #[arg(long)]
        task: String,
    },

    /// Fair-distribute open tasks of a month across available cleaners
    Distribute {
        #[arg(long)]
        month: Option<Month>,
        /// Send each affected cleaner their monthly schedule
        #[arg(long)]
        notify: bool,
    },

    /// Availability links
    Link {
        #[command(subcommand)]
        command: LinkCommand,
    },

    /// Availability submitted through a link
    Availability {
        #[command(subcommand)]
        command: AvailabilityCommand,
    },

    /// Cleaner roster management
    Cleaner {
        #[command(subcommand)]
        command: CleanerCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default config.toml
    Init,
    /// Print the effective config
    Show,
}

#[derive(Subcommand, Debug)]
enum LinkCommand {
    /// Issue a signed availability link
    Issue {
        #[arg(long)]
        cleaner: String,
        #[arg(long)]
        month: Month,
    },
    /// Check a link token and print what it grants
    Verify { token: String },
}

#[derive(Subcommand, Debug)]
enum AvailabilityCommand {
    /// Record the dates a cleaner submitted through their link
    Submit {
        #[arg(long)]
        token: String,
        /// Comma-separated YYYY-MM-DD dates
        #[arg(long, value_delimiter = ',')]
        dates: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum CleanerCommand {
    /// Add a cleaner to the roster
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// LINE user id for push notices
        #[arg(long)]
        line_user: Option<String>,
    },
    /// Change a cleaner's name, LINE user or active flag
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, conflicts_with = "clear_line_user")]
        line_user: Option<String>,
        /// Stop sending push notices to this cleaner
        #[arg(long)]
        clear_line_user: bool,
        #[arg(long)]
        active: Option<bool>,
    },
    /// Take a cleaner off the roster (kept for history)
    Deactivate {
        #[arg(long)]
        id: String,
    },
    /// Show the roster
    List {
        /// Include inactive cleaners
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let home = cli.home.as_deref();

    let command = match cli.command {
        Command::Config { command } => return run_config(home, command),
        other => other,
    };

    let app = app::App::load(home)?;
    logging::init_logging(&app.cfg.logging.level, &app.cfg.logging.format)?;
    let out = commands::Output { json: cli.json };

    match command {
        Command::Config { command } => run_config(home, command),
        Command::Sync => commands::sync(&app, out).await,
        Command::List { month } => commands::list(&app, out, app.month_or_current(month)).await,
        Command::LegalDates { task } => commands::legal_dates(&app, out, &task).await,
        Command::Relocate { task, to } => commands::relocate(&app, out, &task, &to).await,
        Command::Revert { task } => commands::revert(&app, out, &task).await,
        Command::Assign {
            task,
            cleaner,
            notify,
        } => commands::assign(&app, out, &task, &cleaner, notify).await,
        Command::Unassign { task } => commands::unassign(&app, out, &task).await,
        Command::Distribute { month, notify } => {
            commands::distribute(&app, out, app.month_or_current(month), notify).await
        }
        Command::Link { command } => match command {
            LinkCommand::Issue { cleaner, month } => {
                commands::link_issue(&app, out, &cleaner, month).await
            }
            LinkCommand::Verify { token } => commands::link_verify(&app, out, &token).await,
        },
        Command::Availability { command } => match command {
            AvailabilityCommand::Submit { token, dates } => {
                commands::availability_submit(&app, out, &token, &dates).await
            }
        },
        Command::Cleaner { command } => match command {
            CleanerCommand::Add {
                id,
                name,
                line_user,
            } => commands::cleaner_add(&app, out, &id, &name, line_user.as_deref()).await,
            CleanerCommand::Update {
                id,
                name,
                line_user,
                clear_line_user,
                active,
            } => {
                let line_user_id = if clear_line_user {
                    Some(None)
                } else {
                    line_user.map(Some)
                };
                let edit = turnover_service::CleanerUpdate {
                    name,
                    line_user_id,
                    active,
                };
                commands::cleaner_update(&app, out, &id, &edit).await
            }
            CleanerCommand::Deactivate { id } => commands::cleaner_deactivate(&app, out, &id).await,
            CleanerCommand::List { all } => commands::cleaner_list(&app, out, all).await,
        },
    }
}

/// Config commands run before the subscriber is installed.
fn run_config(home: Option<&Path>, command: ConfigCommand) -> Result<()> {
    let home = state::ensure_turnover_home(home)?;
    match command {
        ConfigCommand::Init => config::init_config(&home),
        ConfigCommand::Show => {
            let cfg = config::load_config(&home)?;
            print!("{}", toml::to_string_pretty(&cfg)?);
            Ok(())
        }
    }
}
