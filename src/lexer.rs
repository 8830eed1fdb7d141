//! Turns a raw input line into a flat token stream.

use std::fmt;
use std::io::{self, Write};

use thiserror::Error;

/// Longest line accepted, not counting the trailing newline.
pub const MAX_LINE_SIZE: usize = 1023;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum LexError {
	#[error("Unmatched quote")]
	UnmatchedQuote,
	#[error("Cannot allocate memory")]
	OutOfMemory,
	#[error("Command is too large")]
	LineTooLong,
	#[error("Invalid UTF-8 in command")]
	InvalidUtf8,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenKind { Word, Pipe, RedirectIn, RedirectOut, Background }

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Token {
	pub kind: TokenKind,
	pub value: Option<String>,
}

impl Token {
	pub fn word<S: Into<String>>(s: S) -> Token {
		Token { kind: TokenKind::Word, value: Some(s.into()) }
	}

	pub fn op(kind: TokenKind) -> Token {
		debug_assert!(kind != TokenKind::Word);
		Token { kind: kind, value: None }
	}

	pub fn is_word(&self) -> bool {
		self.kind == TokenKind::Word
	}
}

impl fmt::Display for Token {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self.kind {
			TokenKind::Word => write!(f, "word \"{}\"", self.value.as_deref().unwrap_or("")),
			TokenKind::Pipe => f.write_str("pipe"),
			TokenKind::RedirectIn => f.write_str("redirect-in"),
			TokenKind::RedirectOut => f.write_str("redirect-out"),
			TokenKind::Background => f.write_str("background"),
		}
	}
}

type LexResult<T> = Result<T, LexError>;

struct Lexer<'a> {
	line: &'a str,
	tokens: Vec<Token>,
	word: String,
	in_word: bool,
}

impl<'a> Lexer<'a> {
	fn is_whitespace(c: char) -> bool {
		match c {
			' ' | '\t' | '\n' | '\r' => true,
			_ => false,
		}
	}

	fn operator(c: char) -> Option<TokenKind> {
		match c {
			'|' => Some(TokenKind::Pipe),
			'<' => Some(TokenKind::RedirectIn),
			'>' => Some(TokenKind::RedirectOut),
			'&' => Some(TokenKind::Background),
			_ => None,
		}
	}

	fn push_token(&mut self, token: Token) -> LexResult<()> {
		self.tokens.try_reserve(1).map_err(|_| LexError::OutOfMemory)?;
		self.tokens.push(token);
		Ok(())
	}

	fn push_char(&mut self, c: char) -> LexResult<()> {
		self.word.try_reserve(c.len_utf8()).map_err(|_| LexError::OutOfMemory)?;
		self.word.push(c);
		self.in_word = true;
		Ok(())
	}

	fn finish_word(&mut self) -> LexResult<()> {
		if self.in_word {
			let word = std::mem::take(&mut self.word);
			self.in_word = false;
			self.push_token(Token::word(word))?;
		}
		Ok(())
	}

	fn run(mut self) -> LexResult<Vec<Token>> {
		let mut quote: Option<char> = None;
		let line = self.line;
		for c in line.chars() {
			if let Some(q) = quote {
				if c == q {
					quote = None;
				} else {
					self.push_char(c)?;
				}
				continue;
			}
			if c == '"' || c == '\'' {
				quote = Some(c);
				// "" still makes a word
				self.in_word = true;
			} else if Lexer::is_whitespace(c) {
				self.finish_word()?;
			} else if let Some(kind) = Lexer::operator(c) {
				self.finish_word()?;
				self.push_token(Token::op(kind))?;
			} else {
				self.push_char(c)?;
			}
		}
		if quote.is_some() {
			return Err(LexError::UnmatchedQuote);
		}
		self.finish_word()?;
		Ok(self.tokens)
	}
}

/// Splits `line` into tokens. A trailing newline is accepted and ignored.
pub fn lex(line: &str) -> LexResult<Vec<Token>> {
	let body = line.strip_suffix('\n').unwrap_or(line);
	if body.len() > MAX_LINE_SIZE {
		return Err(LexError::LineTooLong);
	}
	let lexer = Lexer { line: body, tokens: Vec::new(), word: String::new(), in_word: false };
	lexer.run()
}

/// Like [`lex`] for a line read straight from input. Bytes that are not
/// UTF-8 reject the whole line rather than being replaced.
pub fn lex_bytes(line: &[u8]) -> LexResult<Vec<Token>> {
	let line = std::str::from_utf8(line).map_err(|_| LexError::InvalidUtf8)?;
	lex(line)
}

/// Writes one line per token to stderr; used when `DEBUG` is set.
pub fn dump_tokens(tokens: &[Token]) {
	let stderr = io::stderr();
	let mut stderr = stderr.lock();
	for token in tokens {
		let _ = writeln!(stderr, "[ish] Token: {}", token);
	}
	let _ = stderr.flush();
}
