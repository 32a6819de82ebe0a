//! Terminal status lines for provisioning runs
//!
//! Progress goes to stdout, problems to stderr. Spinners live in
//! `helpers::internal::progress`.
//!
//! ```text
//! ==> Provisioning example-server 1.0.0
//! [2/7] copy default config
//!   -> fetching acme/server-config@main
//!      copied 12 files from acme/server-config@main into cfg
//! warning: continuing past failed task 2
//! ```

use owo_colors::OwoColorize;

const HEADER: &str = "==>";
const DETAIL_INDENT: &str = "     ";

/// Run-level header, e.g. the recipe being provisioned.
pub fn action(message: &str) {
    println!("{} {}", HEADER.blue().bold(), message.bold());
}

/// One task, with its 1-based position in the recipe.
pub fn action_numbered(current: usize, total: usize, message: &str) {
    let width = total.to_string().len();
    let position = format!("[{:>width$}/{}]", current, total, width = width);
    println!("{} {}", position.cyan(), message.bold());
}

/// A step inside a task (branch lookup, archive fetch).
pub fn sub_action(message: &str) {
    println!("  {} {}", "->".cyan(), message);
}

/// What a task did to the target directory.
pub fn detail(message: &str) {
    println!("{}{}", DETAIL_INDENT, message.dimmed());
}

pub fn success(message: &str) {
    println!("{} {}", HEADER.green().bold(), message.green());
}

pub fn info(message: &str) {
    println!("{} {}", "::".cyan(), message);
}

pub fn warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message);
}

pub fn error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message);
}

/// A task that ran but had nothing to do (database disabled, destination kept).
pub fn skip(message: &str) {
    println!("{}{} {}", DETAIL_INDENT, "skip".dimmed().italic(), message.dimmed());
}
