use colored::*;
use console::Term;
use std::fmt::Display;

/// Terminal output helpers. Just a namespace; never instantiated.
/// Teal (38, 166, 154) is the accent, amber (230, 162, 60) marks names and ids.
pub struct Logger;

impl Logger {
    /// Prints the libris wordmark, centered on the terminal.
    pub fn banner() {
        let term = Term::stdout();
        let width = term.size().1 as usize;

        let banner = r#"
   __    _ __         _
  / /   (_) /_  _____(_)____
 / /   / / __ \/ ___/ / ___/
/ /___/ / /_/ / /  / (__  )
\____/_/_.___/_/  /_/____/
"#;

        for line in banner.lines() {
            if line.trim().is_empty() {
                continue;
            }
            println!("{:^width$}", line.truecolor(38, 166, 154).bold(), width = width);
        }
        println!();
    }

    pub fn info<T: Display>(msg: T) {
        println!("{} {}", "•".truecolor(38, 166, 154).bold(), msg);
    }

    pub fn success<T: Display>(msg: T) {
        println!("{} {}", "✔".green().bold(), msg);
    }

    /// Errors go to stderr so piping a listing stays clean.
    pub fn error<T: Display>(msg: T) {
        eprintln!("{} {}", "✖".red().bold(), msg);
    }

    pub fn warn<T: Display>(msg: T) {
        eprintln!("{} {}", "⚠".yellow().bold(), msg);
    }

    /// Section header, preceded by a blank line.
    pub fn header<T: Display>(msg: T) {
        println!("\n{}", msg.to_string().truecolor(38, 166, 154).bold().underline());
    }

    /// Inline accent for user-supplied values.
    pub fn highlight<T: Display>(msg: T) -> String {
        msg.to_string().truecolor(230, 162, 60).bold().to_string()
    }

    pub fn dim<T: Display>(msg: T) -> String {
        msg.to_string().dimmed().to_string()
    }
}
