use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;

use crate::types::*;

/// Bytes stripped from every input line before tokenizing.
pub const FORBIDDEN: [u8; 2] = [b';', b'`'];

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Quote { None, Single, Double }

struct Parser<'a> {
	line: &'a [u8],
	i: usize,
}

impl<'a> Parser<'a> {
	fn is_whitespace(c: u8) -> bool {
		matches!(c, b' ' | b'\t' | b'\n' | b'\r')
	}

	fn next(&mut self) -> Option<u8> {
		let c = self.line.get(self.i).copied();
		if c.is_some() {
			self.i += 1;
		}
		c
	}

	fn flush(arg: &mut Vec<u8>, args: &mut Vec<OsString>) {
		if !arg.is_empty() {
			args.push(OsString::from_vec(std::mem::take(arg)));
		}
	}

	// Reads one stage. The bool is true when an unquoted '|' ended it.
	fn parse_stage(&mut self) -> (Vec<OsString>, bool) {
		let mut args: Vec<OsString> = vec![];
		let mut arg: Vec<u8> = vec![];
		let mut quote = Quote::None;

		while let Some(c) = self.next() {
			match (c, quote) {
				(b'\\', _) => {
					if let Some(escaped) = self.next() {
						arg.push(escaped);
					}
				},
				(b'\'', Quote::None) => quote = Quote::Single,
				(b'"', Quote::None) => quote = Quote::Double,
				(b'\'', Quote::Single) | (b'"', Quote::Double) => quote = Quote::None,
				(b'|', Quote::None) => {
					Parser::flush(&mut arg, &mut args);
					return (args, true);
				},
				(c, Quote::None) if Parser::is_whitespace(c) => Parser::flush(&mut arg, &mut args),
				(c, _) => arg.push(c),
			}
		}
		// an unterminated quote simply runs to the end of the line
		Parser::flush(&mut arg, &mut args);
		(args, false)
	}

	fn parse_pipeline(&mut self) -> Pipeline {
		let mut commands: Vec<Stage> = vec![];
		let mut segments = 0;
		loop {
			let (args, more) = self.parse_stage();
			segments += 1;
			if !args.is_empty() {
				commands.push(Stage::new(args));
			}
			if !more {
				break;
			}
		}

		let mut is_background = false;
		if let Some(last) = commands.last_mut() {
			if last.args.last().map_or(false, |a| a == "&") {
				last.args.pop();
				is_background = true;
				if last.args.is_empty() {
					commands.pop();
				}
			}
		}
		Pipeline { commands, is_background, segments }
	}
}

/// Both forbidden bytes are ASCII, so removing them never splits a
/// multibyte sequence. Everything else is kept as is.
pub fn sanitize(line: &[u8]) -> Vec<u8> {
	line.iter().copied().filter(|c| !FORBIDDEN.contains(c)).collect()
}

pub fn parse(line: &[u8]) -> Pipeline {
	let sanitized = sanitize(line);
	let mut parser = Parser { line: &sanitized, i: 0 };
	parser.parse_pipeline()
}
