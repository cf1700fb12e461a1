use std::fmt::Display;

use tracing::{instrument, trace};
use trie_rs::{Trie, TrieBuilder};

use crate::{compiler::Diagnostics, prelude::Position};

pub struct Lexer {
    source: Vec<char>,
    lexeme_start: usize,
    lexeme_current: usize,
    line: usize,
    column: usize,
    keywords: Trie<u8>,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub enum TokenType {
    Bool,
    Int,
    Void,
    True,
    False,
    Struct,
    Cin,
    Cout,
    If,
    Else,
    While,
    Repeat,
    Return,
    Identifier,
    IntLiteral,
    StringLiteral,
    LeftCurly,
    RightCurly,
    LeftParen,
    RightParen,
    Semicolon,
    Comma,
    Dot,
    Write,
    Read,
    PlusPlus,
    MinusMinus,
    Plus,
    Minus,
    Times,
    Divide,
    Not,
    And,
    Or,
    Equals,
    NotEquals,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    Assign,
    #[default]
    Eof,
}

const KEYWORDS: [(&str, TokenType); 13] = [
    ("bool", TokenType::Bool),
    ("int", TokenType::Int),
    ("void", TokenType::Void),
    ("true", TokenType::True),
    ("false", TokenType::False),
    ("struct", TokenType::Struct),
    ("cin", TokenType::Cin),
    ("cout", TokenType::Cout),
    ("if", TokenType::If),
    ("else", TokenType::Else),
    ("while", TokenType::While),
    ("repeat", TokenType::Repeat),
    ("return", TokenType::Return),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Token {
    pub token_type: TokenType,
    /// Source spelling; string literals keep their quotes and escapes.
    pub lexeme: String,
    /// Only set for integer literals.
    pub value: Option<i32>,
    pub position: Position,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        self.token_type == TokenType::Eof
    }
}

/// `<token>@<line>:<col>`, with integer literals shown by value.
impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.token_type, self.value) {
            (TokenType::Eof, _) => write!(f, "EOF@{}", self.position),
            (_, Some(value)) => write!(f, "{value}@{}", self.position),
            _ => write!(f, "{}@{}", self.lexeme, self.position),
        }
    }
}

/// What went wrong inside a string literal.
#[derive(Default)]
struct StringProblems {
    unterminated: bool,
    bad_escape: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Lexer {
        Lexer {
            source: source.chars().collect(),
            lexeme_start: 0,
            lexeme_current: 0,
            line: 1,
            column: 1,
            keywords: {
                let mut tb = TrieBuilder::new();
                for (k, _) in KEYWORDS.iter() {
                    tb.push(k.as_bytes());
                }
                tb.build()
            },
        }
    }

    /// The next token. Malformed input is reported and skipped, so this only
    /// ever returns real tokens or [`TokenType::Eof`].
    #[instrument(skip_all, level = "trace")]
    pub fn scan_token(&mut self, diagnostics: &mut Diagnostics) -> Token {
        loop {
            self.skip_whitespace();
            self.lexeme_start = self.lexeme_current;
            let start = Position::new(self.line, self.column);

            if self.is_at_end() {
                return self.make_token(TokenType::Eof, start);
            }

            let c = self.advance();
            if c.is_ascii_alphabetic() || c == '_' {
                while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
                    self.advance();
                }
                return self.make_token(self.identifier_type(), start);
            }

            if c.is_ascii_digit() {
                while self.peek().is_ascii_digit() {
                    self.advance();
                }
                let mut token = self.make_token(TokenType::IntLiteral, start);
                let value = token.lexeme.parse::<i32>().unwrap_or_else(|_| {
                    diagnostics.warn(start, "integer literal too large; using max value");
                    i32::MAX
                });
                token.value = Some(value);
                return token;
            }

            let token_type = match c {
                '{' => TokenType::LeftCurly,
                '}' => TokenType::RightCurly,
                '(' => TokenType::LeftParen,
                ')' => TokenType::RightParen,
                ';' => TokenType::Semicolon,
                ',' => TokenType::Comma,
                '.' => TokenType::Dot,
                '*' => TokenType::Times,
                '/' => TokenType::Divide,
                '+' if self.advance_if_match('+') => TokenType::PlusPlus,
                '+' => TokenType::Plus,
                '-' if self.advance_if_match('-') => TokenType::MinusMinus,
                '-' => TokenType::Minus,
                '<' if self.advance_if_match('<') => TokenType::Write,
                '<' if self.advance_if_match('=') => TokenType::LessEq,
                '<' => TokenType::Less,
                '>' if self.advance_if_match('>') => TokenType::Read,
                '>' if self.advance_if_match('=') => TokenType::GreaterEq,
                '>' => TokenType::Greater,
                '!' if self.advance_if_match('=') => TokenType::NotEquals,
                '!' => TokenType::Not,
                '=' if self.advance_if_match('=') => TokenType::Equals,
                '=' => TokenType::Assign,
                '&' if self.advance_if_match('&') => TokenType::And,
                '|' if self.advance_if_match('|') => TokenType::Or,
                '"' => match self.string() {
                    StringProblems {
                        unterminated: false,
                        bad_escape: false,
                    } => TokenType::StringLiteral,
                    StringProblems {
                        unterminated,
                        bad_escape,
                    } => {
                        let message = match (unterminated, bad_escape) {
                            (true, true) => {
                                "unterminated string literal with bad escaped character ignored"
                            }
                            (true, false) => "unterminated string literal ignored",
                            _ => "string literal with bad escaped character ignored",
                        };
                        diagnostics.warn(start, message);
                        continue;
                    }
                },
                other => {
                    diagnostics.fatal(start, format!("illegal character ignored: {other}"));
                    continue;
                }
            };
            return self.make_token(token_type, start);
        }
    }

    /// Consumes the rest of a string literal whose opening quote was already
    /// read. Stops before a newline when the literal is unterminated.
    fn string(&mut self) -> StringProblems {
        let mut problems = StringProblems::default();
        loop {
            match self.peek() {
                '"' => {
                    self.advance();
                    return problems;
                }
                '\n' => {
                    problems.unterminated = true;
                    return problems;
                }
                _ if self.is_at_end() => {
                    problems.unterminated = true;
                    return problems;
                }
                '\\' => {
                    self.advance();
                    match self.peek() {
                        'n' | 't' | '\'' | '"' | '?' | '\\' => {
                            self.advance();
                        }
                        '\n' => {}
                        _ if self.is_at_end() => {}
                        _ => {
                            problems.bad_escape = true;
                            self.advance();
                        }
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn is_at_end(&self) -> bool {
        self.lexeme_current >= self.source.len()
    }

    fn make_token(&self, token_type: TokenType, position: Position) -> Token {
        let token = Token {
            token_type,
            lexeme: self.source[self.lexeme_start..self.lexeme_current]
                .iter()
                .collect(),
            value: None,
            position,
        };
        trace!("{token}");
        token
    }

    fn advance(&mut self) -> char {
        let c = self.peek();
        self.lexeme_current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn advance_if_match(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            return false;
        }
        self.advance();
        true
    }

    fn peek(&self) -> char {
        self.source
            .get(self.lexeme_current)
            .copied()
            .unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.source
            .get(self.lexeme_current + 1)
            .copied()
            .unwrap_or('\0')
    }

    /// Whitespace and comments, which run from `//` or `#` to the end of the
    /// line.
    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                ' ' | '\r' | '\t' | '\n' if !self.is_at_end() => {
                    self.advance();
                }
                '/' if self.peek_next() == '/' => self.skip_line(),
                '#' => self.skip_line(),
                _ => return,
            }
        }
    }

    fn skip_line(&mut self) {
        while self.peek() != '\n' && !self.is_at_end() {
            self.advance();
        }
    }

    fn identifier_type(&self) -> TokenType {
        let lexeme: String = self.source[self.lexeme_start..self.lexeme_current]
            .iter()
            .collect();
        if self.keywords.exact_match(lexeme.as_bytes()) {
            if let Some((_, token_type)) = KEYWORDS.iter().find(|(k, _)| *k == lexeme) {
                return *token_type;
            }
        }
        TokenType::Identifier
    }
}
