// ABOUTME: Regex tokenizer for Lissp with byte-offset position tracking

use std::sync::LazyLock;

use regex::Regex;

/// The token pattern: one alternation, applied greedily from the
/// current position. Ordering matters: comment before whitespace-error,
/// opens/closes before the quote family, strings before bare tokens.
static TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)
         (?P<whitespace>[\n\x20]+)
        |(?P<comment>(?:[\x20]*;.*\n)+)
        |(?P<badspace>\s)  # Other whitespace not allowed.
        |(?P<open>[(])
        |(?P<close>[)])
        |(?P<template>`)
        |(?P<unquote>,@?)
        |(?P<quote>')
        |(?P<inject>[.]\#)
        |(?P<discard>_\#)
        |(?P<gensym>[$]\#)
        |(?P<stararg>[*][*]?=)
        |(?P<kwarg>(?:\\.|[^\\\x20\n"|();\#])*
                   (?:\\.|\w)  # Character before = must be alnum, or escaped.
                   =)
        |(?P<tag>  (?:\\.|[^\\\x20\n"|();\#])*
                   (?:\\.|[^\\\x20\n"|();\#.])
                   \#+)
        |(?P<unicode>
          "  # Open quote.
            (?:[^"\\]  # Any non-magic character.
               |\\(?s:.)  # Backslash only if paired, including with newline.
            )*  # Zero or more times.
          "  # Close quote.
         )
        |(?P<fragment>
          [|]  # open
            (?:[^|\n]  # No newlines or unpaired |.
               |[|][|]  # | only if paired.
            )*
          [|]  # close
         )
        |(?P<continued>
           "  # String not closed.
          |;.*  # Comment may need another line.
         )
        |(?P<badfrag>[|])  # No multiline fragments.
        |(?P<control>:(?:\\.|[^\\\x20\n"|();])*)
        |(?P<bare>    (?:\\.|[^\\\x20\n"|();])+)
        |(?P<error>(?s:.))
        "#,
    )
    .expect("token pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    Comment,
    Badspace,
    Open,
    Close,
    Template,
    Unquote,
    Quote,
    Inject,
    Discard,
    Gensym,
    Stararg,
    Kwarg,
    Tag,
    Unicode,
    Fragment,
    Continued,
    Badfrag,
    Control,
    Bare,
    Error,
}

const GROUPS: &[(&str, TokenKind)] = &[
    ("whitespace", TokenKind::Whitespace),
    ("comment", TokenKind::Comment),
    ("badspace", TokenKind::Badspace),
    ("open", TokenKind::Open),
    ("close", TokenKind::Close),
    ("template", TokenKind::Template),
    ("unquote", TokenKind::Unquote),
    ("quote", TokenKind::Quote),
    ("inject", TokenKind::Inject),
    ("discard", TokenKind::Discard),
    ("gensym", TokenKind::Gensym),
    ("stararg", TokenKind::Stararg),
    ("kwarg", TokenKind::Kwarg),
    ("tag", TokenKind::Tag),
    ("unicode", TokenKind::Unicode),
    ("fragment", TokenKind::Fragment),
    ("continued", TokenKind::Continued),
    ("badfrag", TokenKind::Badfrag),
    ("control", TokenKind::Control),
    ("bare", TokenKind::Bare),
    ("error", TokenKind::Error),
];

/// A lexed token: its kind, its text, and the byte offset of its *end*
/// in the source. Line and column are computed on demand from the
/// offset for diagnostics.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: usize,
}

/// `(filename, lineno, offset, text)` for a syntax error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub filename: String,
    pub lineno: usize,
    pub offset: usize,
    pub text: String,
}

/// The tokenizer for the Lissp language.
///
/// Most of the actual tokenizing is done by the regex. The Lexer adds
/// position tracking to that to help with error messages.
pub struct Lexer {
    pub code: String,
    pub file: String,
    pos: usize,
}

impl Lexer {
    pub fn new(code: &str, file: &str) -> Self {
        Lexer {
            code: code.to_string(),
            file: file.to_string(),
            pos: 0,
        }
    }

    pub fn next_token(&mut self) -> Option<Token> {
        if self.pos >= self.code.len() {
            return None;
        }
        let caps = match TOKENS.captures_at(&self.code, self.pos) {
            Some(caps) => caps,
            None => return Some(self.error_token()),
        };
        let whole = caps.get(0)?;
        if whole.start() != self.pos {
            // The alternation covers every character, so a gap means a
            // stray byte the pattern can't see. Surface it as an error.
            return Some(self.error_token());
        }
        self.pos = whole.end();
        for &(name, kind) in GROUPS {
            if let Some(m) = caps.name(name) {
                return Some(Token {
                    kind,
                    text: m.as_str().to_string(),
                    pos: self.pos,
                });
            }
        }
        Some(self.error_token())
    }

    fn error_token(&mut self) -> Token {
        let start = self.pos;
        let mut end = start + 1;
        while !self.code.is_char_boundary(end) {
            end += 1;
        }
        self.pos = end;
        Token {
            kind: TokenKind::Error,
            text: self.code[start..end].to_string(),
            pos: self.pos,
        }
    }

    /// Compute the filename, lineno, offset, and text for a syntax
    /// error, from a character offset into the code.
    pub fn position(&self, pos: usize) -> Position {
        let good: Vec<&str> = self.code[..pos].split('\n').collect();
        let lineno = good.len();
        let offset = good.last().map_or(0, |s| s.chars().count());
        let text = self
            .code
            .split('\n')
            .nth(lineno - 1)
            .unwrap_or("")
            .to_string();
        Position {
            filename: self.file.clone(),
            lineno,
            offset,
            text,
        }
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}
