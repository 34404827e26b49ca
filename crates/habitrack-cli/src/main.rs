use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "habitrack", version, about = "Adaptive habit tracker")]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Habit management
    Habit {
        #[command(subcommand)]
        action: commands::habit::HabitAction,
    },
    /// Show today's capsules for a habit
    Capsules(commands::capsules::CapsulesArgs),
    /// Capsule timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Log a completion by hand
    Log(commands::log::LogArgs),
    /// Remove a logged completion
    Uncomplete(commands::log::UncompleteArgs),
    /// Show daily and weekly progress for a habit
    Ledger(commands::ledger::LedgerArgs),
    /// Show whether a habit is locked by its prerequisite
    Locked(commands::ledger::LockedArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    // stdout carries JSON only
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let result = match cli.command {
        Commands::Habit { action } => commands::habit::run(action),
        Commands::Capsules(args) => commands::capsules::run(args),
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Log(args) => commands::log::run_log(args),
        Commands::Uncomplete(args) => commands::log::run_uncomplete(args),
        Commands::Ledger(args) => commands::ledger::run_ledger(args),
        Commands::Locked(args) => commands::ledger::run_locked(args),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
