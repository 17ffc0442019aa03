//! Status lines printed around command results.
//!
//! Results go to stdout. Warnings and errors go to stderr, next to the log
//! output, so `--format json` stays parseable.

use shapewise::{ShapeKey, Version};

use super::colors::SemanticStyle;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".success(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".error(), msg);
}

pub fn print_warn(msg: &str) {
    eprintln!("{} {}", "⚠".warning(), msg);
}

/// Prints an indented `key: value` line.
pub fn print_labeled(key: &str, value: &str) {
    println!("  {}: {}", key.muted(), value);
}

pub fn print_shape_hash(key: &ShapeKey) {
    print_labeled("Shape hash", &key.to_string().code());
}

/// Prints the document version a command left behind.
pub fn print_version(version: Version) {
    print_labeled("Version", &version.to_string());
}

/// Prints a follow-up command under a one-line description.
pub fn print_next_step(description: &str, command: &str) {
    println!("{} {}", "→".muted(), description.muted());
    println!("  {}", command.code());
}
