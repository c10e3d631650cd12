use anyhow::Context;
use bookshelf_kernel::settings::Settings;
use clap::{Parser, Subcommand};

/// Operate the bookshelf catalogue service
#[derive(Debug, Parser)]
#[command(name = "bookshelf-cli", version, about)]
struct Cli {
    /// Override the configured database URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply migrations, then serve HTTP until Ctrl-C
    Serve {
        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Apply pending migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().with_context(|| "failed to load bookshelf settings")?;
    if let Some(url) = cli.database_url {
        settings.database.url = url;
    }
    bookshelf_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                settings.server.port = port;
            }
            bookshelf_app::bootstrap::serve(&settings).await
        }
        Command::Migrate => {
            let applied = bookshelf_app::bootstrap::migrate(&settings).await?;
            tracing::info!(applied, db = %settings.database.url, "migrations complete");
            println!("applied {applied} migration(s)");
            Ok(())
        }
    }
}
