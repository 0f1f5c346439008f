use std::ffi::{OsStr, OsString};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectType { Input, Output, Append }

impl RedirectType {
	pub fn token(self) -> &'static str {
		match self {
			RedirectType::Input => "<",
			RedirectType::Output => ">",
			RedirectType::Append => ">>",
		}
	}

	pub fn is_redirect_token(s: &OsStr) -> bool {
		s == "<" || s == ">" || s == ">>"
	}
}

#[derive(Debug, PartialEq, Eq)]
pub struct Redirect {
	pub target: OsString,
	pub typ: RedirectType,
}

/// One command of a pipeline; `args[0]` is the command name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
	pub args: Vec<OsString>,
}

impl Stage {
	pub fn new(args: Vec<OsString>) -> Stage {
		Stage { args }
	}

	pub fn name(&self) -> &OsStr {
		self.args.first().map_or(OsStr::new(""), |s| s.as_os_str())
	}

	pub fn has_redirect_tokens(&self) -> bool {
		self.args.iter().any(|a| RedirectType::is_redirect_token(a))
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pipeline {
	pub commands: Vec<Stage>,
	pub is_background: bool,
	/// Number of `|`-separated segments on the line, empty ones included.
	pub segments: usize,
}

impl Pipeline {
	pub fn is_empty(&self) -> bool {
		self.commands.is_empty()
	}

	/// A line containing an unquoted `|` is a pipeline even if some of its
	/// segments were empty.
	pub fn is_piped(&self) -> bool {
		self.segments > 1
	}
}
