use core::fmt;
use core::iter::Peekable;
use core::str::CharIndices;

use thiserror::Error;

// -----------------------------------------------------------------------------
// ParseError

/// Errors produced while tokenizing or parsing config text.
///
/// Positions are 1-based line and column of the offending character.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("unexpected character `{ch}` at {line}:{column}")]
    UnexpectedCharacter { ch: char, line: u32, column: u32 },

    #[error("unterminated string literal starting at {line}:{column}")]
    UnterminatedString { line: u32, column: u32 },

    #[error("invalid escape sequence `\\{ch}` at {line}:{column}")]
    InvalidEscape { ch: char, line: u32, column: u32 },

    #[error("invalid number `{text}` at {line}:{column}")]
    InvalidNumber { text: String, line: u32, column: u32 },

    #[error("unterminated block comment starting at {line}:{column}")]
    UnterminatedComment { line: u32, column: u32 },

    #[error("expected {expected}, got `{got}` at {line}:{column}")]
    UnexpectedToken {
        expected: &'static str,
        got: String,
        line: u32,
        column: u32,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
}

// -----------------------------------------------------------------------------
// Token

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Identifier(String),
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Symbol(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Identifier(s) => f.write_str(s),
            Token::Str(s) => write!(f, "{s:?}"),
            Token::Int(v) => write!(f, "{v}"),
            Token::Float(v) => write!(f, "{v}"),
            Token::Bool(v) => write!(f, "{v}"),
            Token::Symbol(c) => write!(f, "{c}"),
        }
    }
}

/// A token together with the position it started at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub line: u32,
    pub column: u32,
}

// -----------------------------------------------------------------------------
// Tokenizer

pub(crate) struct Tokenizer<'a> {
    chars: Peekable<CharIndices<'a>>,
    line: u32,
    column: u32,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let (_, ch) = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    /// Skips whitespace and both comment styles. Fails only on an
    /// unterminated block comment.
    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let (line, column) = (self.line, self.column);
                    self.bump();
                    match self.peek() {
                        Some('/') => {
                            while let Some(ch) = self.bump() {
                                if ch == '\n' {
                                    break;
                                }
                            }
                        }
                        Some('*') => {
                            self.bump();
                            let mut prev = '\0';
                            loop {
                                match self.bump() {
                                    Some('/') if prev == '*' => break,
                                    Some(ch) => prev = ch,
                                    None => {
                                        return Err(ParseError::UnterminatedComment {
                                            line,
                                            column,
                                        });
                                    }
                                }
                            }
                        }
                        other => {
                            return Err(ParseError::UnexpectedCharacter {
                                ch: other.unwrap_or('/'),
                                line,
                                column,
                            });
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Returns the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Spanned>, ParseError> {
        self.skip_trivia()?;

        let (line, column) = (self.line, self.column);
        let Some(ch) = self.peek() else {
            return Ok(None);
        };

        let token = match ch {
            '{' | '}' | '[' | ']' | '=' => {
                self.bump();
                Token::Symbol(ch)
            }
            '"' => self.string_literal(line, column)?,
            '-' | '0'..='9' => self.number(line, column)?,
            ch if ch == '_' || ch.is_ascii_alphabetic() => {
                let mut ident = String::new();
                while let Some(ch) = self.peek() {
                    if ch == '_' || ch.is_ascii_alphanumeric() {
                        ident.push(ch);
                        self.bump();
                    } else {
                        break;
                    }
                }
                match ident.as_str() {
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    _ => Token::Identifier(ident),
                }
            }
            ch => return Err(ParseError::UnexpectedCharacter { ch, line, column }),
        };

        Ok(Some(Spanned { token, line, column }))
    }

    fn string_literal(&mut self, line: u32, column: u32) -> Result<Token, ParseError> {
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(Token::Str(out)),
                Some('\\') => {
                    let (eline, ecol) = (self.line, self.column);
                    match self.bump() {
                        Some('"') => out.push('"'),
                        Some('\\') => out.push('\\'),
                        Some('n') => out.push('\n'),
                        Some('t') => out.push('\t'),
                        Some('r') => out.push('\r'),
                        Some('0') => out.push('\0'),
                        Some(ch) => {
                            return Err(ParseError::InvalidEscape {
                                ch,
                                line: eline,
                                column: ecol,
                            });
                        }
                        None => return Err(ParseError::UnterminatedString { line, column }),
                    }
                }
                Some(ch) => out.push(ch),
                None => return Err(ParseError::UnterminatedString { line, column }),
            }
        }
    }

    fn number(&mut self, line: u32, column: u32) -> Result<Token, ParseError> {
        let mut text = String::new();
        let mut is_float = false;
        if self.peek() == Some('-') {
            text.push('-');
            self.bump();
        }
        while let Some(ch) = self.peek() {
            match ch {
                '0'..='9' => {
                    text.push(ch);
                    self.bump();
                }
                '.' | 'e' | 'E' => {
                    is_float = true;
                    text.push(ch);
                    self.bump();
                    // exponent sign
                    if (ch == 'e' || ch == 'E')
                        && matches!(self.peek(), Some('+') | Some('-'))
                    {
                        text.push(self.peek().unwrap_or('+'));
                        self.bump();
                    }
                }
                _ => break,
            }
        }

        let invalid = |text: String| ParseError::InvalidNumber { text, line, column };
        if is_float {
            match text.parse::<f64>() {
                Ok(v) => Ok(Token::Float(v)),
                Err(_) => Err(invalid(text)),
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => Ok(Token::Int(v)),
                Err(_) => Err(invalid(text)),
            }
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &str) -> Vec<Token> {
        let mut tk = Tokenizer::new(input);
        let mut out = Vec::new();
        while let Some(sp) = tk.next_token().unwrap() {
            out.push(sp.token);
        }
        out
    }

    #[test]
    fn scalars_and_symbols() {
        let tokens = collect("a = -42 b = 1.5 c = true");
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("a".into()),
                Token::Symbol('='),
                Token::Int(-42),
                Token::Identifier("b".into()),
                Token::Symbol('='),
                Token::Float(1.5),
                Token::Identifier("c".into()),
                Token::Symbol('='),
                Token::Bool(true),
            ]
        );
    }

    #[test]
    fn string_escapes() {
        let tokens = collect(r#"s = "a\"b\\c\nd""#);
        assert_eq!(tokens[2], Token::Str("a\"b\\c\nd".into()));
    }

    #[test]
    fn comments_are_skipped() {
        let tokens = collect("a = 1 // line\n/* block\nstill */ b = 2");
        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[5], Token::Int(2));
    }

    #[test]
    fn unterminated_block_comment_fails() {
        let mut tk = Tokenizer::new("/* never closed");
        let err = tk.next_token().unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedComment { line: 1, .. }));
    }

    #[test]
    fn positions_track_lines() {
        let mut tk = Tokenizer::new("a = 1\n  b = 2");
        for _ in 0..3 {
            tk.next_token().unwrap();
        }
        let sp = tk.next_token().unwrap().unwrap();
        assert_eq!(sp.token, Token::Identifier("b".into()));
        assert_eq!((sp.line, sp.column), (2, 3));
    }

    #[test]
    fn bad_character_reports_position() {
        let mut tk = Tokenizer::new("a = ?");
        tk.next_token().unwrap();
        tk.next_token().unwrap();
        let err = tk.next_token().unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedCharacter { ch: '?', line: 1, column: 5 }
        );
    }
}
