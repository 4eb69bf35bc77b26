use crate::cli::{BookFields, SuggestArgs};
use anyhow::{Context, Result};
use comfy_table::Table;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, Password, Text};
use libris::api::{
    BookFilters, BookInput, Credentials, LibraryFilters, LibraryInput, LibrisApi, Signup, SummaryRequest,
    UserUpdate,
};
use libris::chat::{ChatHistory, ChatPrompt};
use libris::http::Attachment;
use libris::logger::Logger;
use libris::model::{self, Book, Creator, CurrentUser, Library};
use std::future::Future;
use std::path::Path;

fn spinner(msg: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg);
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb
}

/// Awaits `fut` behind a spinner, clearing it whichever way it ends.
async fn with_spinner<T, F: Future<Output = T>>(msg: impl Into<String>, fut: F) -> T {
    let pb = spinner(msg.into());
    let out = fut.await;
    pb.finish_and_clear();
    out
}

fn require_user(api: &LibrisApi) -> Result<CurrentUser> {
    api.current_user()
        .context("Not logged in. Run 'libris login' first.")
}

fn require_user_id(user: &CurrentUser) -> Result<&str> {
    user.id
        .as_deref()
        .context("Session carries no user id. Run 'libris login' again.")
}

async fn attachment(path: Option<&Path>) -> Result<Option<Attachment>> {
    match path {
        Some(p) => Ok(Some(
            Attachment::from_path(p)
                .await
                .with_context(|| format!("Could not read {}", p.display()))?,
        )),
        None => Ok(None),
    }
}

fn confirm(question: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    Ok(Confirm::new(question).with_default(false).prompt()?)
}

fn prompt_or(value: Option<String>, label: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Text::new(label).prompt()?.trim().to_string()),
    }
}

fn books_table(books: &[Book]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Id", "Name", "Category", "Author", "Library"]);
    for b in books {
        let library = b
            .library
            .as_ref()
            .map(|l| l.name.clone().unwrap_or_else(|| l.id.clone()))
            .unwrap_or_default();
        table.add_row(vec![
            b.id.as_str(),
            b.name.as_str(),
            b.category.as_str(),
            b.author.as_deref().unwrap_or("-"),
            library.as_str(),
        ]);
    }
    table
}

fn libraries_table(libraries: &[Library]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Id", "Name", "Address", "Category", "Created by"]);
    for l in libraries {
        let creator = l
            .created_by
            .as_ref()
            .and_then(|c| c.username.as_deref())
            .unwrap_or("-");
        table.add_row(vec![
            l.id.as_str(),
            l.name.as_str(),
            l.address.as_str(),
            l.category.as_deref().unwrap_or("-"),
            creator,
        ]);
    }
    table
}

// --- Session ---

pub async fn login(api: &LibrisApi, username: Option<String>) -> Result<()> {
    Logger::banner();
    let username = prompt_or(username, "Username:")?;
    let password = Password::new("Password:")
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;

    let credentials = Credentials { username, password };
    let data = with_spinner("Logging in...", api.login(&credentials)).await?;

    if data.get("token").is_none() {
        Logger::warn("Backend accepted the login but sent no token.");
        return Ok(());
    }
    let name = api
        .current_user()
        .and_then(|u| u.username)
        .unwrap_or(credentials.username);
    Logger::success(format!("Logged in as {}", Logger::highlight(name)));
    Ok(())
}

pub async fn signup(api: &LibrisApi, username: Option<String>, avatar: Option<&Path>) -> Result<()> {
    Logger::banner();
    let username = prompt_or(username, "Choose username:")?;
    let password = Password::new("Choose password:")
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .prompt()?;
    let avatar = attachment(avatar).await?;

    let signup = Signup {
        username: username.clone(),
        password,
        avatar,
    };
    let data = with_spinner("Creating account...", api.signup(signup)).await?;

    Logger::success(format!("Account created for {}", Logger::highlight(&username)));
    if data.get("token").and_then(|t| t.as_str()).is_some() {
        Logger::info("You are now logged in.");
    } else {
        Logger::info("Run 'libris login' to sign in.");
    }
    Ok(())
}

pub fn logout(api: &LibrisApi) -> Result<()> {
    api.logout()?;
    Logger::success("Logged out. Run 'libris login' to sign in again.");
    Ok(())
}

pub fn whoami(api: &LibrisApi) -> Result<()> {
    let user = require_user(api)?;
    Logger::info(format!(
        "{} {}",
        Logger::highlight(user.display_name()),
        Logger::dim(user.id.as_deref().unwrap_or("(no id)"))
    ));
    Ok(())
}

pub async fn dashboard(api: &LibrisApi) -> Result<()> {
    let user = require_user(api)?;
    let dash = with_spinner("Loading dashboard...", api.dashboard(&user)).await?;

    Logger::header(format!("Books added by {}", user.display_name()));
    if dash.books.is_empty() {
        Logger::info("No books yet.");
    } else {
        println!("{}", books_table(&dash.books));
    }

    Logger::header("Your libraries");
    if dash.owned_libraries.is_empty() {
        Logger::info("You have not created a library yet.");
    } else {
        println!("{}", libraries_table(&dash.owned_libraries));
    }
    Logger::info(Logger::dim(format!("{} libraries in the catalog", dash.libraries.len())));
    Ok(())
}

// --- Books ---

pub async fn books_list(api: &LibrisApi, name: Option<String>, category: Option<String>, mine: bool) -> Result<()> {
    let created_by = if mine {
        Some(require_user_id(&require_user(api)?)?.to_string())
    } else {
        None
    };
    let filters = BookFilters {
        name,
        category,
        created_by,
    };
    let data = with_spinner("Fetching books...", api.get_books(&filters)).await?;
    let books = Book::list(&data);
    if books.is_empty() {
        Logger::info("No books found.");
    } else {
        println!("{}", books_table(&books));
    }
    Ok(())
}

pub async fn book_add(
    api: &LibrisApi,
    name: String,
    category: String,
    library: String,
    author: Option<String>,
    cover: Option<&Path>,
) -> Result<()> {
    let input = BookInput {
        name: Some(name),
        category: Some(category),
        library: Some(library),
        author,
        cover: attachment(cover).await?,
    };
    let data = with_spinner("Adding book...", api.create_book(input)).await?;
    let book = Book::from_value(&model::entity(&data, "book"));
    Logger::success(format!(
        "Added {}",
        Logger::highlight(book.map(|b| b.name).unwrap_or_default())
    ));
    Ok(())
}

pub async fn book_update(api: &LibrisApi, id: &str, fields: BookFields) -> Result<()> {
    let input = BookInput {
        name: fields.name,
        category: fields.category,
        library: fields.library,
        author: fields.author,
        cover: attachment(fields.cover.as_deref()).await?,
    };
    with_spinner("Updating book...", api.update_book(id, input)).await?;
    Logger::success(format!("Updated book {}", Logger::highlight(id)));
    Ok(())
}

pub async fn book_remove(api: &LibrisApi, id: &str, yes: bool) -> Result<()> {
    if !confirm("Are you sure you want to remove this book?", yes)? {
        return Ok(());
    }
    with_spinner("Removing book...", api.delete_book(id)).await?;
    Logger::success(format!("Removed book {}", Logger::highlight(id)));
    Ok(())
}

// --- Libraries ---

pub async fn libraries_list(
    api: &LibrisApi,
    name: Option<String>,
    address: Option<String>,
    mine: bool,
) -> Result<()> {
    let filters = LibraryFilters { name, address };
    let data = with_spinner("Fetching libraries...", api.get_libraries(&filters)).await?;
    let mut libraries = Library::list(&data);
    if mine {
        let user = require_user(api)?;
        let owned: Vec<Library> = libris::ownership::owned_by(&libraries, (&user).into())
            .into_iter()
            .cloned()
            .collect();
        libraries = owned;
    }
    if libraries.is_empty() {
        Logger::info("No libraries found.");
    } else {
        println!("{}", libraries_table(&libraries));
    }
    Ok(())
}

pub async fn library_add(api: &LibrisApi, name: String, address: String, category: Option<String>) -> Result<()> {
    let user = require_user(api)?;
    let input = LibraryInput {
        name: Some(name),
        address: Some(address),
        category,
        created_by: Some(Creator {
            id: user.id.clone(),
            username: user.username.clone(),
        }),
    };
    let data = with_spinner("Creating library...", api.create_library(&input)).await?;
    let id = Library::from_value(&model::entity(&data, "library"))
        .map(|l| l.id)
        .unwrap_or_default();
    Logger::success(format!("Created library {}", Logger::highlight(id)));
    Ok(())
}

pub async fn library_update(
    api: &LibrisApi,
    id: &str,
    name: Option<String>,
    address: Option<String>,
    category: Option<String>,
) -> Result<()> {
    let input = LibraryInput {
        name,
        address,
        category,
        created_by: None,
    };
    with_spinner("Updating library...", api.update_library(id, &input)).await?;
    Logger::success(format!("Updated library {}", Logger::highlight(id)));
    Ok(())
}

pub async fn library_remove(api: &LibrisApi, id: &str, yes: bool) -> Result<()> {
    if !confirm("Are you sure you want to delete this library?", yes)? {
        return Ok(());
    }
    with_spinner("Deleting library...", api.delete_library(id)).await?;
    Logger::success(format!("Deleted library {}", Logger::highlight(id)));
    Ok(())
}

pub async fn library_books(api: &LibrisApi, id: &str) -> Result<()> {
    let data = with_spinner("Fetching books...", api.get_library_books(id)).await?;
    let books = Book::list(&data);
    if books.is_empty() {
        Logger::info("This library has no books yet.");
    } else {
        println!("{}", books_table(&books));
    }
    Ok(())
}

// --- Account ---

pub async fn profile(api: &LibrisApi) -> Result<()> {
    let user = require_user(api)?;
    let id = require_user_id(&user)?;
    let data = with_spinner("Fetching profile...", api.get_profile(id)).await?;
    let profile = model::entity(&data, "user");

    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Id".to_string(), model::first_string(&profile, &["_id", "id"]).unwrap_or_default()]);
    table.add_row(vec![
        "Username".to_string(),
        model::first_string(&profile, &["Username", "username"]).unwrap_or_default(),
    ]);
    table.add_row(vec![
        "Avatar".to_string(),
        model::first_string(&profile, &["avatar"]).unwrap_or_else(|| "-".to_string()),
    ]);
    println!("{}", table);
    Ok(())
}

pub async fn account_update(
    api: &LibrisApi,
    username: Option<String>,
    change_password: bool,
    avatar: Option<&Path>,
) -> Result<()> {
    let user = require_user(api)?;
    let id = require_user_id(&user)?;

    let new_password = if change_password {
        let p = Password::new("New password:")
            .with_display_mode(inquire::PasswordDisplayMode::Masked)
            .prompt()?;
        Some(p).filter(|p| !p.trim().is_empty())
    } else {
        None
    };
    let update = UserUpdate {
        new_username: username.filter(|u| Some(u) != user.username.as_ref()),
        new_password,
        avatar: attachment(avatar).await?,
    };
    if update.is_empty() {
        Logger::info("Nothing to change.");
        return Ok(());
    }

    with_spinner("Updating account...", api.update_user(id, &update)).await?;
    Logger::success("Account updated.");
    Ok(())
}

pub async fn account_delete(api: &LibrisApi, yes: bool) -> Result<()> {
    let user = require_user(api)?;
    let id = require_user_id(&user)?;
    if !confirm("Delete your account? This cannot be undone.", yes)? {
        return Ok(());
    }
    with_spinner("Deleting account...", api.delete_user(id)).await?;
    api.logout()?;
    Logger::success("Account deleted.");
    Ok(())
}

// --- Assistant ---

pub async fn suggest(api: &LibrisApi, args: SuggestArgs) -> Result<()> {
    let library_id = match api.current_user() {
        Some(user) => with_spinner("Looking up your libraries...", api.suggestion_library(&user)).await?,
        None => libris::ownership::DEFAULT_LIBRARY.to_string(),
    };
    let prompt = ChatPrompt {
        name: args.name,
        category: args.category,
        topic: args.topic,
        author: args.author,
    };

    let mut history = ChatHistory::new();
    let batch = with_spinner("Asking the assistant...", api.suggest(&prompt, &library_id)).await?;
    history.extend(batch);

    if history.is_empty() {
        Logger::warn("The assistant did not return any usable suggestion.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Name", "Category", "Author"]);
    for (i, s) in history.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            s.name.clone().unwrap_or_else(|| "Result".to_string()),
            s.category.clone().unwrap_or_else(|| "No details provided".to_string()),
            s.author.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{}", table);

    if args.save {
        for s in history.iter() {
            let label = s.name.clone().unwrap_or_default();
            match api.create_book(s.into()).await {
                Ok(_) => Logger::success(format!("Uploaded {}", Logger::highlight(&label))),
                // One failed upload shouldn't stop the others.
                Err(e) => Logger::error(format!("Could not upload {}: {}", label, e)),
            }
        }
    }
    Ok(())
}

pub async fn summary(api: &LibrisApi, name: String, category: String, author: String) -> Result<()> {
    let request = SummaryRequest { name, category, author };
    let text = with_spinner("Summarizing...", api.get_summary(&request)).await?;
    if text.is_empty() {
        Logger::warn("No summary available.");
    } else {
        Logger::header(&request.name);
        println!("{}", text);
    }
    Ok(())
}
