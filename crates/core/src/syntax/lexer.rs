//! Tokenizer for descriptor bodies
//!
//! Produces a flat token stream with explicit `Newline`, `Indent` and `Dedent`
//! markers. Newlines inside brackets and after a trailing backslash are
//! joined, blank and comment-only lines never produce tokens.

use crate::error::ScriptError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Assign,
    PlusAssign,
    MinusAssign,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    indent_stack: Vec<usize>,
    bracket_depth: usize,
    at_line_start: bool,
    last_was_string_literal: bool,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            indent_stack: vec![0],
            bracket_depth: 0,
            at_line_start: true,
            last_was_string_literal: false,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(input: &str) -> Result<Vec<Token>, ScriptError> {
        Lexer::new(input).run()
    }

    fn run(mut self) -> Result<Vec<Token>, ScriptError> {
        while self.pos < self.chars.len() {
            if self.at_line_start && self.bracket_depth == 0 {
                if !self.handle_indentation()? {
                    continue;
                }
            }

            let c = self.chars[self.pos];
            match c {
                ' ' | '\t' | '\r' | '\x0c' => self.advance(),
                '#' => self.skip_comment(),
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.advance();
                    self.advance();
                }
                '\n' => {
                    if self.bracket_depth == 0 {
                        self.push(TokenKind::Newline, self.line, self.column);
                        self.at_line_start = true;
                    }
                    self.advance();
                }
                '"' | '\'' => self.lex_string(String::new())?,
                c if c.is_ascii_digit() => self.lex_number()?,
                '.' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.lex_number()?,
                c if c.is_alphabetic() || c == '_' => self.lex_name()?,
                _ => self.lex_punct()?,
            }
        }

        let (line, column) = (self.line, self.column);
        if !matches!(
            self.tokens.last().map(|t| &t.kind),
            None | Some(TokenKind::Newline)
        ) {
            self.push(TokenKind::Newline, line, column);
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, line, column);
        }
        self.push(TokenKind::Eof, line, column);
        Ok(self.tokens)
    }

    /// Measures the indentation of a logical line. Returns `false` when the
    /// line is blank or comment-only and has been skipped entirely.
    fn handle_indentation(&mut self) -> Result<bool, ScriptError> {
        let mut width = 0;
        while let Some(c) = self.peek_at(0) {
            match c {
                ' ' => width += 1,
                '\t' => width = (width / 8 + 1) * 8,
                '\x0c' | '\r' => {}
                _ => break,
            }
            self.advance();
        }

        match self.peek_at(0) {
            None => return Ok(false),
            Some('\n') => {
                self.advance();
                return Ok(false);
            }
            Some('#') => {
                self.skip_comment();
                if self.peek_at(0) == Some('\n') {
                    self.advance();
                }
                return Ok(false);
            }
            _ => {}
        }

        self.at_line_start = false;
        let current = *self.indent_stack.last().unwrap_or(&0);
        if width > current {
            self.indent_stack.push(width);
            self.push(TokenKind::Indent, self.line, 1);
        } else if width < current {
            while self.indent_stack.last().is_some_and(|&w| w > width) {
                self.indent_stack.pop();
                self.push(TokenKind::Dedent, self.line, 1);
            }
            if self.indent_stack.last() != Some(&width) {
                return Err(ScriptError::syntax(
                    self.line,
                    self.column,
                    "unindent does not match any outer indentation level",
                ));
            }
        }
        Ok(true)
    }

    fn lex_name(&mut self) -> Result<(), ScriptError> {
        let (line, column) = (self.line, self.column);
        let mut name = String::new();
        while let Some(c) = self.peek_at(0) {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let is_prefix = name.len() <= 2
            && name
                .chars()
                .all(|c| matches!(c.to_ascii_lowercase(), 'r' | 'u' | 'b' | 'f'));
        if is_prefix && matches!(self.peek_at(0), Some('"') | Some('\'')) {
            return self.lex_string(name);
        }

        self.push(TokenKind::Name(name), line, column);
        Ok(())
    }

    fn lex_string(&mut self, prefix: String) -> Result<(), ScriptError> {
        let (line, column) = (self.line, self.column);
        let raw = prefix.to_ascii_lowercase().contains('r');
        let quote = self.chars[self.pos];
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        let delimiter_len = if triple { 3 } else { 1 };
        for _ in 0..delimiter_len {
            self.advance();
        }

        let mut value = String::new();
        loop {
            let Some(c) = self.peek_at(0) else {
                return Err(ScriptError::syntax(line, column, "unterminated string literal"));
            };

            if c == quote {
                if !triple {
                    self.advance();
                    break;
                }
                if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    for _ in 0..3 {
                        self.advance();
                    }
                    break;
                }
                value.push(c);
                self.advance();
                continue;
            }

            if c == '\n' && !triple {
                return Err(ScriptError::syntax(line, column, "unterminated string literal"));
            }

            if c == '\\' {
                let Some(next) = self.peek_at(1) else {
                    return Err(ScriptError::syntax(line, column, "unterminated string literal"));
                };
                self.advance();
                self.advance();
                if raw {
                    value.push('\\');
                    value.push(next);
                    continue;
                }
                match next {
                    '\n' => {}
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    '\\' => value.push('\\'),
                    '\'' => value.push('\''),
                    '"' => value.push('"'),
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
                continue;
            }

            value.push(c);
            self.advance();
        }

        // Adjacent literals concatenate: "a" "b" == "ab"
        if self.last_was_string_literal {
            if let Some(Token {
                kind: TokenKind::Str(previous),
                ..
            }) = self.tokens.last_mut()
            {
                previous.push_str(&value);
                return Ok(());
            }
        }

        self.push(TokenKind::Str(value), line, column);
        self.last_was_string_literal = true;
        Ok(())
    }

    fn lex_number(&mut self) -> Result<(), ScriptError> {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        while let Some(c) = self.peek_at(0) {
            let exponent_sign = matches!(c, '+' | '-')
                && text.ends_with(['e', 'E'])
                && !text.starts_with("0x")
                && !text.starts_with("0X");
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || exponent_sign {
                if c != '_' {
                    text.push(c);
                }
                self.advance();
            } else {
                break;
            }
        }

        let lower = text.to_ascii_lowercase();
        let radix = match lower.get(..2) {
            Some("0x") => Some(16),
            Some("0o") => Some(8),
            Some("0b") => Some(2),
            _ => None,
        };

        let kind = if let Some(radix) = radix {
            i64::from_str_radix(&lower[2..], radix).map(TokenKind::Int).ok()
        } else if lower.contains(['.', 'e']) {
            lower.parse::<f64>().map(TokenKind::Float).ok()
        } else {
            lower
                .trim_end_matches('l')
                .parse::<i64>()
                .map(TokenKind::Int)
                .ok()
        };

        match kind {
            Some(kind) => {
                self.push(kind, line, column);
                Ok(())
            }
            None => Err(ScriptError::syntax(
                line,
                column,
                format!("invalid number literal '{text}'"),
            )),
        }
    }

    fn lex_punct(&mut self) -> Result<(), ScriptError> {
        let (line, column) = (self.line, self.column);
        let c = self.chars[self.pos];
        let next = self.peek_at(1);

        let (kind, width) = match (c, next) {
            ('*', Some('*')) => (TokenKind::DoubleStar, 2),
            ('/', Some('/')) => (TokenKind::DoubleSlash, 2),
            ('=', Some('=')) => (TokenKind::Eq, 2),
            ('!', Some('=')) => (TokenKind::NotEq, 2),
            ('<', Some('=')) => (TokenKind::LtEq, 2),
            ('>', Some('=')) => (TokenKind::GtEq, 2),
            ('+', Some('=')) => (TokenKind::PlusAssign, 2),
            ('-', Some('=')) => (TokenKind::MinusAssign, 2),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            ('{', _) => (TokenKind::LBrace, 1),
            ('}', _) => (TokenKind::RBrace, 1),
            (',', _) => (TokenKind::Comma, 1),
            (':', _) => (TokenKind::Colon, 1),
            (';', _) => (TokenKind::Semicolon, 1),
            ('.', _) => (TokenKind::Dot, 1),
            ('=', _) => (TokenKind::Assign, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', _) => (TokenKind::Gt, 1),
            _ => {
                return Err(ScriptError::syntax(
                    line,
                    column,
                    format!("unexpected character '{c}'"),
                ));
            }
        };

        match kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                self.bracket_depth += 1
            }
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1)
            }
            _ => {}
        }

        for _ in 0..width {
            self.advance();
        }
        self.push(kind, line, column);
        Ok(())
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek_at(0) {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn push(&mut self, kind: TokenKind, line: usize, column: usize) {
        self.last_was_string_literal = false;
        self.tokens.push(Token { kind, line, column });
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.chars.get(self.pos) {
            if *c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_call() {
        let tokens = kinds(r#"java_library(name = 'foo')"#);
        assert_eq!(
            tokens,
            vec![
                TokenKind::Name("java_library".to_string()),
                TokenKind::LParen,
                TokenKind::Name("name".to_string()),
                TokenKind::Assign,
                TokenKind::Str("foo".to_string()),
                TokenKind::RParen,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_newlines_inside_brackets_are_joined() {
        let tokens = kinds("deps = [\n  ':a',\n\n  ':b',  # trailing\n]\n");
        let newlines = tokens.iter().filter(|k| **k == TokenKind::Newline).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn test_indent_and_dedent() {
        let tokens = kinds("if x:\n    y = 1\n\n    # note\nz = 2\n");
        assert!(tokens.contains(&TokenKind::Indent));
        let indent = tokens.iter().position(|k| *k == TokenKind::Indent).unwrap();
        let dedent = tokens.iter().position(|k| *k == TokenKind::Dedent).unwrap();
        assert!(indent < dedent);
        assert_eq!(tokens[dedent + 1], TokenKind::Name("z".to_string()));
    }

    #[test]
    fn test_bad_dedent_is_an_error() {
        let err = Lexer::tokenize("if x:\n    y = 1\n  z = 2\n").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { line: 3, .. }));
    }

    #[test]
    fn test_string_forms() {
        let tokens = kinds("a = r'\\d+' \"x\" '''multi\nline'''\n");
        assert_eq!(tokens[2], TokenKind::Str("\\d+xmulti\nline".to_string()));
    }

    #[test]
    fn test_escapes() {
        let tokens = kinds(r#"a = 'it\'s\n'"#);
        assert_eq!(tokens[2], TokenKind::Str("it's\n".to_string()));
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds("a = [0x1f, 1_000, 2.5, 3e2]");
        assert!(tokens.contains(&TokenKind::Int(31)));
        assert!(tokens.contains(&TokenKind::Int(1000)));
        assert!(tokens.contains(&TokenKind::Float(2.5)));
        assert!(tokens.contains(&TokenKind::Float(300.0)));
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::tokenize("a = 'oops\n").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { line: 1, column: 5, .. }));
    }

    #[test]
    fn test_backslash_continuation() {
        let tokens = kinds("a = 1 + \\\n    2\n");
        assert_eq!(
            tokens.iter().filter(|k| **k == TokenKind::Newline).count(),
            1
        );
        assert!(!tokens.contains(&TokenKind::Indent));
    }
}
