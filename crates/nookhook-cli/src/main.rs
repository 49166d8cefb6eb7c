use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "nookhook-cli", version, about = "Nook & Hook CLI")]
struct Cli {
    /// User the command acts for
    #[arg(long, global = true, default_value = "default", env = "NOOKHOOK_USER")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer session control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Book registration and reading progress
    Book {
        #[command(subcommand)]
        action: commands::book::BookAction,
    },
    /// Quote submission and review
    Quote {
        #[command(subcommand)]
        action: commands::quote::QuoteAction,
    },
    /// Points, ledger, and badges
    Rewards {
        #[command(subcommand)]
        action: commands::rewards::RewardsAction,
    },
    /// Aggregate user statistics
    Stats,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(&cli.user, action),
        Commands::Book { action } => commands::book::run(&cli.user, action),
        Commands::Quote { action } => commands::quote::run(&cli.user, action),
        Commands::Rewards { action } => commands::rewards::run(&cli.user, action),
        Commands::Stats => commands::stats::run(&cli.user),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
