//! Terminal styling for CLI output

/// ANSI color codes
pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

use colors::*;

fn paint(color: &str, s: &str) -> String {
    format!("{}{}{}", color, s, RESET)
}

pub fn style_bold(s: &str) -> String {
    paint(BOLD, s)
}

pub fn style_dim(s: &str) -> String {
    paint(DIM, s)
}

pub fn style_gray(s: &str) -> String {
    paint(GRAY, s)
}

pub fn print_success(msg: &str) {
    println!("{} {}", paint(GREEN, "✓"), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", paint(RED, "✗"), paint(RED, msg));
}

pub fn print_info(msg: &str) {
    println!("{} {}", paint(BLUE, "ℹ"), msg);
}

pub fn print_step(step: u32, total: u32, msg: &str) {
    println!(
        "{} {} {}",
        paint(CYAN, "→"),
        paint(CYAN, &format!("{}/{}", step, total)),
        msg
    );
}

pub fn print_header(title: &str) {
    let rule = "─".repeat(50usize.saturating_sub(title.chars().count()));
    println!();
    println!("{}{} {} {}{}", BOLD, CYAN, title, rule, RESET);
    println!();
}

pub fn print_section(title: &str) {
    println!();
    println!("  {}", style_bold(title));
    println!("  {}", style_dim(&"─".repeat(40)));
}

pub fn print_key_value(key: &str, value: &str) {
    println!("  {}{}:{} {}", GRAY, key, RESET, value);
}

pub fn print_key_value_colored(key: &str, value: &str, color: &str) {
    println!("  {}{}:{} {}", GRAY, key, RESET, paint(color, value));
}

/// Titled box around plain (unstyled) lines
pub fn print_box(title: &str, content: &[&str]) {
    let width = content
        .iter()
        .map(|s| s.chars().count())
        .chain(std::iter::once(title.chars().count()))
        .max()
        .unwrap_or(0)
        + 4;
    let pad = |s: &str| " ".repeat(width - s.chars().count() - 1);
    let border = |s: &str| paint(GRAY, s);

    println!("  {}", border(&format!("╭{}╮", "─".repeat(width))));
    println!(
        "  {} {}{}{}",
        border("│"),
        style_bold(title),
        pad(title),
        border("│")
    );
    println!("  {}", border(&format!("├{}┤", "─".repeat(width))));
    for line in content {
        println!("  {} {}{}{}", border("│"), line, pad(line), border("│"));
    }
    println!("  {}", border(&format!("╰{}╯", "─".repeat(width))));
}

pub const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn spinner_frame(tick: u64) -> &'static str {
    SPINNER_FRAMES[(tick as usize) % SPINNER_FRAMES.len()]
}
