use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "libris")]
#[command(about = "Catalog books and libraries from the terminal", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the backend API URL
    #[arg(long, global = true)]
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session token
    Login {
        #[arg(long)]
        username: Option<String>,
    },
    /// Create a new account
    Signup {
        #[arg(long)]
        username: Option<String>,
        /// Profile picture to upload
        #[arg(long)]
        avatar: Option<PathBuf>,
    },
    /// Forget the stored session
    Logout,
    /// Show who the stored session belongs to
    Whoami,
    /// Your books and libraries at a glance
    Dashboard,
    /// Browse and manage books
    #[command(subcommand)]
    Books(BookCommands),
    /// Browse and manage libraries
    #[command(subcommand)]
    Libraries(LibraryCommands),
    /// Show your profile as the backend sees it
    Profile,
    /// Change or delete your account
    #[command(subcommand)]
    Account(AccountCommands),
    /// Ask the assistant for book suggestions
    Suggest(SuggestArgs),
    /// Ask the assistant to summarize a book
    Summary {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value = "")]
        author: String,
    },
}

#[derive(Subcommand)]
pub enum BookCommands {
    /// List books, optionally filtered
    List {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Only books you added
        #[arg(long)]
        mine: bool,
    },
    /// Add a book to a library
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: String,
        /// Library id
        #[arg(long)]
        library: String,
        #[arg(long)]
        author: Option<String>,
        /// Cover image to upload
        #[arg(long)]
        cover: Option<PathBuf>,
    },
    /// Change a book
    Update {
        id: String,
        #[command(flatten)]
        fields: BookFields,
    },
    /// Delete a book
    Remove {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Args)]
pub struct BookFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub library: Option<String>,
    #[arg(long)]
    pub author: Option<String>,
    #[arg(long)]
    pub cover: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum LibraryCommands {
    /// List libraries, optionally filtered
    List {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        address: Option<String>,
        /// Only libraries you created
        #[arg(long)]
        mine: bool,
    },
    /// Create a library owned by you
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Change a library
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Delete a library
    Remove {
        id: String,
        #[arg(long, short)]
        yes: bool,
    },
    /// List the books in a library
    Books { id: String },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Change username, password or avatar
    Update {
        #[arg(long)]
        username: Option<String>,
        /// Prompt for a new password
        #[arg(long)]
        password: bool,
        #[arg(long)]
        avatar: Option<PathBuf>,
    },
    /// Delete your account and log out
    Delete {
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Args)]
pub struct SuggestArgs {
    /// What you would like to read about
    pub topic: String,
    #[arg(long, default_value = "")]
    pub name: String,
    #[arg(long, default_value = "")]
    pub category: String,
    #[arg(long, default_value = "")]
    pub author: String,
    /// Add every suggestion to your library as a book
    #[arg(long)]
    pub save: bool,
}
