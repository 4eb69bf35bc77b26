pub mod cli;
pub mod commands;

use clap::Parser;
use cli::{AccountCommands, BookCommands, Cli, Commands, LibraryCommands};
use libris::auth::KeyringSessionStore;
use libris::config::Config;
use libris::http::HttpClient;
use libris::logger::Logger;
use libris::{LibrisApi, Session};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        Logger::error(format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url)?;
    }

    let session = Session::new(Arc::new(KeyringSessionStore::open()?));
    let http = HttpClient::new(&config, session)?
        .on_unauthorized(|| Logger::warn("Your session has expired. Run 'libris login' to sign in again."));

    // Ctrl-C aborts the request in flight.
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });
    let api = LibrisApi::new(http).with_cancellation(cancel);

    match cli.command {
        Commands::Login { username } => commands::login(&api, username).await?,
        Commands::Signup { username, avatar } => commands::signup(&api, username, avatar.as_deref()).await?,
        Commands::Logout => commands::logout(&api)?,
        Commands::Whoami => commands::whoami(&api)?,
        Commands::Dashboard => commands::dashboard(&api).await?,
        Commands::Books(cmd) => match cmd {
            BookCommands::List { name, category, mine } => commands::books_list(&api, name, category, mine).await?,
            BookCommands::Add {
                name,
                category,
                library,
                author,
                cover,
            } => commands::book_add(&api, name, category, library, author, cover.as_deref()).await?,
            BookCommands::Update { id, fields } => commands::book_update(&api, &id, fields).await?,
            BookCommands::Remove { id, yes } => commands::book_remove(&api, &id, yes).await?,
        },
        Commands::Libraries(cmd) => match cmd {
            LibraryCommands::List { name, address, mine } => {
                commands::libraries_list(&api, name, address, mine).await?
            }
            LibraryCommands::Add {
                name,
                address,
                category,
            } => commands::library_add(&api, name, address, category).await?,
            LibraryCommands::Update {
                id,
                name,
                address,
                category,
            } => commands::library_update(&api, &id, name, address, category).await?,
            LibraryCommands::Remove { id, yes } => commands::library_remove(&api, &id, yes).await?,
            LibraryCommands::Books { id } => commands::library_books(&api, &id).await?,
        },
        Commands::Profile => commands::profile(&api).await?,
        Commands::Account(cmd) => match cmd {
            AccountCommands::Update {
                username,
                password,
                avatar,
            } => commands::account_update(&api, username, password, avatar.as_deref()).await?,
            AccountCommands::Delete { yes } => commands::account_delete(&api, yes).await?,
        },
        Commands::Suggest(args) => commands::suggest(&api, args).await?,
        Commands::Summary {
            name,
            category,
            author,
        } => commands::summary(&api, name, category, author).await?,
    }

    Ok(())
}
