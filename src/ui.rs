use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    eprintln!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    eprintln!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// One-line summary of a walk, e.g. `3 ok, 1 failed`.
///
/// `ok` counts every shown success; resources with no changes are only
/// split out as `unchanged` when printing changes only.
pub fn summary_line(summary: &saltkit::WalkSummary) -> String {
    let mut parts = Vec::new();
    for (count, label) in [
        (summary.succeeded, "ok"),
        (summary.unchanged, "unchanged"),
        (summary.info, "no-op"),
        (summary.raw, "raw"),
        (summary.failed, "failed"),
    ] {
        if count > 0 {
            parts.push(format!("{count} {label}"));
        }
    }
    if parts.is_empty() {
        "nothing reported".to_string()
    } else {
        parts.join(", ")
    }
}
