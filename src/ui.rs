use std::env;
use std::io::{self, Write};

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const TITLE: &str = "\x1b[1;44;37m";
const RESET: &str = "\x1b[0m";

pub fn error(msg: &str) {
	let _ = writeln!(io::stderr(), "{}[ERROR] {}{}", RED, msg, RESET);
}

pub fn alert(msg: &str) {
	let _ = writeln!(io::stderr(), "{}[ALERT] {}{}", YELLOW, msg, RESET);
}

pub fn title(out: &mut dyn Write, text: &str) -> io::Result<()> {
	writeln!(out, "{} {} {}", TITLE, text, RESET)
}

pub fn section(out: &mut dyn Write, text: &str) -> io::Result<()> {
	writeln!(out, "\n{}{}:{}", CYAN, text, RESET)
}

pub fn prompt() -> String {
	let user = env::var("USER").unwrap_or_else(|_| "unknown".to_string());
	let cwd = env::current_dir()
		.map(|p| p.display().to_string())
		.unwrap_or_else(|_| "?".to_string());
	format!("\x1b[32m┌─[secsh]{} \x1b[1;34m({}){} \x1b[1;37m[{}]\x1b[0;32m\n└─{}$ ",
		RESET, user, RESET, cwd, RESET)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn prompt_names_user_and_ends_with_dollar() {
		let p = prompt();
		assert!(p.contains("[secsh]"));
		assert!(p.ends_with("$ "));
	}

	#[test]
	fn title_is_padded() {
		let mut buf = vec![];
		title(&mut buf, "Jobs").unwrap();
		assert!(String::from_utf8(buf).unwrap().contains(" Jobs "));
	}
}
