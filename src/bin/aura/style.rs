//! ANSI styling helpers for command output

const RESET: &str = "\x1b[0m";

fn paint(code: &str, s: &str) -> String {
    format!("{}{}{}", code, s, RESET)
}

pub fn style_cyan(s: &str) -> String {
    paint("\x1b[36m", s)
}

pub fn style_green(s: &str) -> String {
    paint("\x1b[32m", s)
}

pub fn style_red(s: &str) -> String {
    paint("\x1b[31m", s)
}

pub fn style_yellow(s: &str) -> String {
    paint("\x1b[33m", s)
}

pub fn style_dim(s: &str) -> String {
    paint("\x1b[2m", s)
}

pub fn style_bold(s: &str) -> String {
    paint("\x1b[1m", s)
}

pub fn print_success(msg: &str) {
    println!("{} {}", style_green("✓"), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", style_red("✗"), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", style_yellow("⚠"), msg);
}

pub fn print_info(msg: &str) {
    println!("{} {}", style_cyan("ℹ"), msg);
}

/// Section title with an underline rule sized to the visible text.
pub fn print_header(title: &str) {
    println!();
    println!("{}", style_bold(title));
    println!("{}", "─".repeat(title.chars().count()));
}
