mod audit;
mod cli;
mod db;
mod error;
mod fleet_import;
mod fmt;
mod ingest;
mod models;
mod normalize;
mod reconciler;
mod search;
mod settings;
mod snapshot;
mod store;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, FilesCommands, FleetCommands, RecordsCommands, UsersCommands};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir, user } => cli::init::run(data_dir, user),
        Commands::Fleet { command } => match command {
            FleetCommands::Import { file } => cli::fleet::import(&file),
            FleetCommands::List => cli::fleet::list(),
        },
        Commands::Ingest {
            document,
            extraction,
        } => cli::ingest::run(&document, &extraction),
        Commands::Records { command } => match command {
            RecordsCommands::List { unverified } => cli::records::list(unverified),
            RecordsCommands::Show { id } => cli::records::show(&id),
            RecordsCommands::Search { query } => cli::records::search(&query),
            RecordsCommands::Delete { ids } => cli::records::delete(&ids),
        },
        Commands::Expenses { search } => cli::statements::expenses(search.as_deref()),
        Commands::Statements => cli::statements::statements(),
        Commands::Files { command } => match command {
            FilesCommands::List => cli::files::list(),
            FilesCommands::Delete { ids } => cli::files::delete(&ids),
        },
        Commands::Reconcile => cli::reconcile::run(),
        Commands::Users { command } => match command {
            UsersCommands::Add {
                username,
                display_name,
                role,
            } => cli::users::add(&username, display_name.as_deref(), &role),
            UsersCommands::List => cli::users::list(),
        },
        Commands::Audit { limit } => cli::audit::run(limit),
        Commands::Status => cli::status::run(),
        Commands::Backup { output } => cli::backup::run(output),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
