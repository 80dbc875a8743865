use std::path::PathBuf;

use crate::error::ParseError;
use crate::types::*;

pub const PIPE: &str = "|";
pub const INPUT: &str = "<";
pub const OUTPUT: &str = ">";
pub const BACKGROUND: &str = "&";

type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum RedirectType { Input, Output }

impl RedirectType {
	fn from_token(token: &str) -> Option<RedirectType> {
		match token {
			INPUT => Some(RedirectType::Input),
			OUTPUT => Some(RedirectType::Output),
			_ => None,
		}
	}
}

fn is_operator(token: &str) -> bool {
	match token {
		PIPE | INPUT | OUTPUT => true,
		_ => false,
	}
}

struct Parser<'a> {
	tokens: &'a [String],
	i: usize,
}

impl<'a> Parser<'a> {
	fn peek(&self) -> Option<&'a str> {
		self.tokens.get(self.i).map(|s| s.as_str())
	}

	fn parse_redirect_target(&mut self, operator: &str) -> ParseResult<&'a str> {
		match self.peek() {
			None => Err(ParseError::MissingTarget(operator.to_string())),
			Some(found) if is_operator(found) => Err(ParseError::UnexpectedOperator {
				operator: operator.to_string(),
				found: found.to_string(),
			}),
			Some(target) => {
				self.i += 1;
				Ok(target)
			},
		}
	}

	fn parse_command(&mut self) -> ParseResult<CommandSpec> {
		let mut command = CommandSpec::default();

		while let Some(token) = self.peek() {
			if token == PIPE { break; }
			self.i += 1;
			match RedirectType::from_token(token) {
				Some(typ) => {
					let target = PathBuf::from(self.parse_redirect_target(token)?);
					match typ {
						RedirectType::Input => command.input = Some(target),
						RedirectType::Output => command.output = Some(target),
					}
				},
				None => command.argv.push(token.to_string()),
			}
		}

		if command.argv.is_empty() {
			return Err(ParseError::EmptyStage);
		}
		Ok(command)
	}

	fn parse_pipeline(&mut self, is_background: bool) -> ParseResult<PipelineSpec> {
		let mut commands: Vec<CommandSpec> = vec![];

		loop {
			commands.push(self.parse_command()?);
			match self.peek() {
				Some(PIPE) => { self.i += 1; },
				_ => { break; },
			}
		}
		Ok(PipelineSpec { commands: commands, is_background: is_background })
	}
}

/// Splits `tokens` into pipeline stages. Any malformed stage rejects the
/// whole line.
pub fn parse(tokens: &[String]) -> ParseResult<PipelineSpec> {
	let (tokens, is_background) = match tokens.split_last() {
		Some((last, rest)) if last == BACKGROUND => (rest, true),
		_ => (tokens, false),
	};
	let mut parser = Parser { tokens: tokens, i: 0 };
	parser.parse_pipeline(is_background)
}
