//! Splits a raw input line into words.
//!
//! Whitespace separates words; single quotes, double quotes and backslash
//! escapes keep their contents inside one word. Operators (`|`, `<`, `>`, `&`)
//! are only recognised by the parser when they stand alone as a word.

pub fn tokenize(line: &str) -> Vec<String> {
	let mut tokens = Vec::new();
	let mut current = String::new();
	let mut in_token = false;
	let mut in_single_quote = false;
	let mut in_double_quote = false;
	let mut chars = line.chars();

	while let Some(c) = chars.next() {
		match c {
			'\\' if !in_single_quote => {
				if let Some(next) = chars.next() {
					current.push(next);
				}
				in_token = true;
			},
			'\'' if !in_double_quote => {
				in_single_quote = !in_single_quote;
				in_token = true;
			},
			'"' if !in_single_quote => {
				in_double_quote = !in_double_quote;
				in_token = true;
			},
			c if c.is_whitespace() && !in_single_quote && !in_double_quote => {
				if in_token {
					tokens.push(std::mem::take(&mut current));
					in_token = false;
				}
			},
			c => {
				current.push(c);
				in_token = true;
			},
		}
	}
	if in_token {
		tokens.push(current);
	}
	tokens
}
