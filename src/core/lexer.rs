/// Script lexer: splits dialogue script text into classified tokens.

use std::fmt;
use thiserror::Error;

use crate::schema::ids::{is_valid_identifier, TERMINAL};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("cannot classify '{text}' at {position}")]
    Unclassifiable { text: String, position: Position },
    #[error("unterminated text '{text}' starting at {position}")]
    UnterminatedText { text: String, position: Position },
    #[error("unknown escape '{text}' at {position}")]
    BadEscape { text: String, position: Position },
}

impl LexError {
    /// Byte offset of the fault in the source text.
    pub fn offset(&self) -> usize {
        match self {
            Self::Unclassifiable { position, .. }
            | Self::UnterminatedText { position, .. }
            | Self::BadEscape { position, .. } => position.offset,
        }
    }
}

/// Where a token starts in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Byte offset.
    pub offset: usize,
    /// 1-based line.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {} (offset {})", self.line, self.column, self.offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `create`, `update` or `delete`.
    Command,
    /// `scene`, `dialogue` or `action`.
    NodeType,
    /// A reserved name. Currently only the terminal sentinel `end`.
    Name,
    Identifier,
    /// A bare decimal integer.
    Number,
    /// A quoted span, stored without its quotes and with escapes resolved.
    Text,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Command => "command",
            Self::NodeType => "node type",
            Self::Name => "name",
            Self::Identifier => "identifier",
            Self::Number => "number",
            Self::Text => "quoted text",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: Position,
}

impl Token {
    /// True for tokens that can stand where an identifier is expected.
    pub fn is_identifier_like(&self) -> bool {
        matches!(self.kind, TokenKind::Identifier | TokenKind::Number)
    }
}

/// Iterator over the tokens of a script.
///
/// Yields at most one error, after which it is exhausted. [`Lexer::reset`]
/// rewinds it to the start of the input.
pub struct Lexer<'a> {
    input: &'a str,
    offset: usize,
    line: usize,
    column: usize,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            offset: 0,
            line: 1,
            column: 1,
            failed: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.input);
    }

    fn peek(&self) -> Option<char> {
        self.input[self.offset..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn here(&self) -> Position {
        Position {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn at_boundary(&self) -> bool {
        match self.peek() {
            None => true,
            Some(c) => c.is_whitespace() || c == '#',
        }
    }

    fn lex_text(&mut self, start: Position) -> Result<Token, LexError> {
        // Opening quote
        self.bump();
        let mut text = String::new();
        loop {
            let escape_position = self.here();
            match self.bump() {
                None => return Err(self.unterminated(start)),
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some('"') => text.push('"'),
                    Some('\\') => text.push('\\'),
                    Some('n') => text.push('\n'),
                    Some(_) => {
                        return Err(LexError::BadEscape {
                            text: self.input[escape_position.offset..self.offset].to_string(),
                            position: escape_position,
                        })
                    }
                    None => return Err(self.unterminated(start)),
                },
                Some(c) => text.push(c),
            }
        }

        if !self.at_boundary() {
            while !self.at_boundary() {
                self.bump();
            }
            return Err(LexError::Unclassifiable {
                text: self.input[start.offset..self.offset].to_string(),
                position: start,
            });
        }

        Ok(Token {
            kind: TokenKind::Text,
            text,
            position: start,
        })
    }

    /// The rest of the input from an opening quote, cut at the end of its line.
    fn unterminated(&self, start: Position) -> LexError {
        let rest = &self.input[start.offset..];
        let text = rest.lines().next().unwrap_or(rest);
        LexError::UnterminatedText {
            text: text.to_string(),
            position: start,
        }
    }

    fn lex_word(&mut self, start: Position) -> Result<Token, LexError> {
        while !self.at_boundary() {
            self.bump();
        }
        let word = &self.input[start.offset..self.offset];
        let kind = classify(word).ok_or_else(|| LexError::Unclassifiable {
            text: word.to_string(),
            position: start,
        })?;
        Ok(Token {
            kind,
            text: word.to_string(),
            position: start,
        })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.skip_trivia();
        let start = self.here();
        let result = match self.peek()? {
            '"' => self.lex_text(start),
            _ => self.lex_word(start),
        };
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

/// Classify a bare (unquoted) word.
fn classify(word: &str) -> Option<TokenKind> {
    match word {
        "create" | "update" | "delete" => Some(TokenKind::Command),
        "scene" | "dialogue" | "action" => Some(TokenKind::NodeType),
        TERMINAL => Some(TokenKind::Name),
        w if w.chars().all(|c| c.is_ascii_digit()) => Some(TokenKind::Number),
        w if is_valid_identifier(w) => Some(TokenKind::Identifier),
        _ => None,
    }
}

/// Tokenize a whole script, stopping at the first lexical error.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).collect()
}
