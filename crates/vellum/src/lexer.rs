//! Template tokenizer
//!
//! Splits source into raw text and `{{ … }}` action regions, dropping
//! `{* … *}` comments entirely. Tokens carry their source position.

use crate::ast::{Number, Pos};
use crate::error::ParseError;

/// A lexed token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// Raw text outside delimiters
    Text(String),
    /// `{{`
    LeftDelim,
    /// `}}`
    RightDelim,

    Ident(String),
    Number(Number),
    Str(String),

    Pipe,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Colon,
    Semicolon,
    Question,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    /// `=`
    Assign,
    /// `:=`
    Declare,

    If,
    Else,
    End,
    Range,
    Block,
    Yield,
    Content,
    Extends,
    Import,
    Include,
    Return,
    True,
    False,
    Nil,

    Eof,
}

impl TokenKind {
    /// Human-readable token name for parse errors.
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Text(_) => "text".to_string(),
            TokenKind::LeftDelim => "'{{'".to_string(),
            TokenKind::RightDelim => "'}}'".to_string(),
            TokenKind::Ident(name) => format!("identifier {:?}", name),
            TokenKind::Number(_) => "number".to_string(),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Eof => "end of template".to_string(),
            other => format!("{:?}", other).to_lowercase(),
        }
    }
}

struct Lexer<'s> {
    path: &'s str,
    chars: Vec<char>,
    idx: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
}

/// Tokenize a template source.
pub(crate) fn lex(path: &str, src: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer {
        path,
        chars: src.chars().collect(),
        idx: 0,
        line: 1,
        column: 1,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl<'s> Lexer<'s> {
    fn error(&self, pos: Pos, message: impl Into<String>) -> ParseError {
        ParseError {
            path: self.path.to_string(),
            line: pos.line,
            column: pos.column,
            message: message.into(),
        }
    }

    fn pos(&self) -> Pos {
        Pos {
            line: self.line,
            column: self.column,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.idx + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.idx).copied()?;
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn emit(&mut self, kind: TokenKind, pos: Pos) {
        self.tokens.push(Token { kind, pos });
    }

    fn run(&mut self) -> Result<(), ParseError> {
        loop {
            if !self.lex_text()? {
                break;
            }
            // positioned at "{{"
            let pos = self.pos();
            self.advance();
            self.advance();
            self.emit(TokenKind::LeftDelim, pos);
            self.lex_action()?;
        }
        let pos = self.pos();
        self.emit(TokenKind::Eof, pos);
        Ok(())
    }

    /// Consume raw text and comments up to the next `{{`. Returns false
    /// at end of input.
    fn lex_text(&mut self) -> Result<bool, ParseError> {
        let mut text = String::new();
        let mut pos = self.pos();
        let mut text_started = false;
        loop {
            match (self.peek(), self.peek2()) {
                (Some('{'), Some('{')) => {
                    if !text.is_empty() {
                        self.emit(TokenKind::Text(text), pos);
                    }
                    return Ok(true);
                }
                (Some('{'), Some('*')) => {
                    let start = self.pos();
                    self.advance();
                    self.advance();
                    loop {
                        match (self.peek(), self.peek2()) {
                            (Some('*'), Some('}')) => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            (Some(_), _) => {
                                self.advance();
                            }
                            (None, _) => {
                                return Err(self.error(start, "unterminated comment"));
                            }
                        }
                    }
                    // text resumes after the comment
                    if !text_started {
                        pos = self.pos();
                    }
                }
                (Some(_), _) => {
                    if !text_started {
                        text_started = true;
                    }
                    if let Some(c) = self.advance() {
                        text.push(c);
                    }
                }
                (None, _) => {
                    if !text.is_empty() {
                        self.emit(TokenKind::Text(text), pos);
                    }
                    return Ok(false);
                }
            }
        }
    }

    /// Tokenize the inside of an action up to and including `}}`.
    fn lex_action(&mut self) -> Result<(), ParseError> {
        loop {
            while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                self.advance();
            }
            let pos = self.pos();
            let c = match self.peek() {
                Some(c) => c,
                None => return Err(self.error(pos, "unterminated action: missing '}}'")),
            };

            if c == '}' && self.peek2() == Some('}') {
                self.advance();
                self.advance();
                self.emit(TokenKind::RightDelim, pos);
                return Ok(());
            }

            if c.is_ascii_alphabetic() || c == '_' {
                self.lex_ident(pos);
                continue;
            }
            if c.is_ascii_digit() {
                self.lex_number(pos)?;
                continue;
            }
            if c == '"' {
                self.lex_string(pos)?;
                continue;
            }

            self.advance();
            let kind = match c {
                '|' if self.peek() == Some('|') => {
                    self.advance();
                    TokenKind::Or
                }
                '|' => TokenKind::Pipe,
                '&' if self.peek() == Some('&') => {
                    self.advance();
                    TokenKind::And
                }
                ',' => TokenKind::Comma,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '[' => TokenKind::LBracket,
                ']' => TokenKind::RBracket,
                '.' => TokenKind::Dot,
                ';' => TokenKind::Semicolon,
                '?' => TokenKind::Question,
                '+' => TokenKind::Add,
                '-' => TokenKind::Sub,
                '*' => TokenKind::Mul,
                '/' => TokenKind::Div,
                '%' => TokenKind::Mod,
                ':' if self.peek() == Some('=') => {
                    self.advance();
                    TokenKind::Declare
                }
                ':' => TokenKind::Colon,
                '=' if self.peek() == Some('=') => {
                    self.advance();
                    TokenKind::Eq
                }
                '=' => TokenKind::Assign,
                '!' if self.peek() == Some('=') => {
                    self.advance();
                    TokenKind::Ne
                }
                '!' => TokenKind::Not,
                '<' if self.peek() == Some('=') => {
                    self.advance();
                    TokenKind::Le
                }
                '<' => TokenKind::Lt,
                '>' if self.peek() == Some('=') => {
                    self.advance();
                    TokenKind::Ge
                }
                '>' => TokenKind::Gt,
                other => {
                    return Err(
                        self.error(pos, format!("unexpected character {:?} in action", other))
                    )
                }
            };
            self.emit(kind, pos);
        }
    }

    fn lex_ident(&mut self, pos: Pos) {
        let mut name = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            if let Some(c) = self.advance() {
                name.push(c);
            }
        }
        let kind = match name.as_str() {
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "end" => TokenKind::End,
            "range" => TokenKind::Range,
            "block" => TokenKind::Block,
            "yield" => TokenKind::Yield,
            "content" => TokenKind::Content,
            "extends" => TokenKind::Extends,
            "import" => TokenKind::Import,
            "include" => TokenKind::Include,
            "return" => TokenKind::Return,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "nil" => TokenKind::Nil,
            _ => TokenKind::Ident(name),
        };
        self.emit(kind, pos);
    }

    fn lex_number(&mut self, pos: Pos) -> Result<(), ParseError> {
        let mut text = String::new();
        let mut is_float = false;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            if let Some(c) = self.advance() {
                text.push(c);
            }
        }
        if self.peek() == Some('.') && matches!(self.peek2(), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            if let Some(c) = self.advance() {
                text.push(c);
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                if let Some(c) = self.advance() {
                    text.push(c);
                }
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let exp_follows = match self.peek2() {
                Some(c) if c.is_ascii_digit() => true,
                Some('+') | Some('-') => true,
                _ => false,
            };
            if exp_follows {
                is_float = true;
                if let Some(c) = self.advance() {
                    text.push(c);
                }
                if matches!(self.peek(), Some('+') | Some('-')) {
                    if let Some(c) = self.advance() {
                        text.push(c);
                    }
                }
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    if let Some(c) = self.advance() {
                        text.push(c);
                    }
                }
            }
        }

        let number = if is_float {
            text.parse::<f64>()
                .map(Number::Float)
                .map_err(|_| self.error(pos, format!("bad float literal {:?}", text)))?
        } else if let Ok(n) = text.parse::<i64>() {
            Number::Int(n)
        } else if let Ok(n) = text.parse::<u64>() {
            Number::Uint(n)
        } else {
            return Err(self.error(pos, format!("number literal {:?} out of range", text)));
        };
        self.emit(TokenKind::Number(number), pos);
        Ok(())
    }

    fn lex_string(&mut self, pos: Pos) -> Result<(), ParseError> {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\\') => {
                    let escaped = self
                        .advance()
                        .ok_or_else(|| self.error(pos, "unterminated string literal"))?;
                    match escaped {
                        'n' => text.push('\n'),
                        'r' => text.push('\r'),
                        't' => text.push('\t'),
                        '\\' => text.push('\\'),
                        '"' => text.push('"'),
                        '\'' => text.push('\''),
                        '0' => text.push('\0'),
                        other => {
                            return Err(self.error(
                                pos,
                                format!("unknown escape sequence '\\{}' in string", other),
                            ))
                        }
                    }
                }
                Some(c) => text.push(c),
                None => return Err(self.error(pos, "unterminated string literal")),
            }
        }
        self.emit(TokenKind::Str(text), pos);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex("/test", src)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn plain_text() {
        assert_eq!(
            kinds("hello"),
            vec![TokenKind::Text("hello".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn comments_vanish() {
        assert_eq!(
            kinds("hello {*Buddy*} World"),
            vec![TokenKind::Text("hello  World".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn action_with_arithmetic() {
        assert_eq!(
            kinds("{{ 2+1 }}"),
            vec![
                TokenKind::LeftDelim,
                TokenKind::Number(Number::Int(2)),
                TokenKind::Add,
                TokenKind::Number(Number::Int(1)),
                TokenKind::RightDelim,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn number_classification() {
        assert_eq!(kinds("{{1.5}}")[1], TokenKind::Number(Number::Float(1.5)));
        assert_eq!(kinds("{{1e3}}")[1], TokenKind::Number(Number::Float(1e3)));
        assert_eq!(kinds("{{7}}")[1], TokenKind::Number(Number::Int(7)));
        assert_eq!(
            kinds("{{18446744073709551615}}")[1],
            TokenKind::Number(Number::Uint(u64::MAX))
        );
    }

    #[test]
    fn two_char_operators() {
        assert_eq!(
            kinds("{{ a := b == c != d <= e >= f && g || !h }}"),
            vec![
                TokenKind::LeftDelim,
                TokenKind::Ident("a".to_string()),
                TokenKind::Declare,
                TokenKind::Ident("b".to_string()),
                TokenKind::Eq,
                TokenKind::Ident("c".to_string()),
                TokenKind::Ne,
                TokenKind::Ident("d".to_string()),
                TokenKind::Le,
                TokenKind::Ident("e".to_string()),
                TokenKind::Ge,
                TokenKind::Ident("f".to_string()),
                TokenKind::And,
                TokenKind::Ident("g".to_string()),
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::Ident("h".to_string()),
                TokenKind::RightDelim,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#"{{"a\nb\"c"}}"#)[1],
            TokenKind::Str("a\nb\"c".to_string())
        );
    }

    #[test]
    fn keywords_are_recognized() {
        assert_eq!(
            kinds("{{if true}}{{else}}{{end}}"),
            vec![
                TokenKind::LeftDelim,
                TokenKind::If,
                TokenKind::True,
                TokenKind::RightDelim,
                TokenKind::LeftDelim,
                TokenKind::Else,
                TokenKind::RightDelim,
                TokenKind::LeftDelim,
                TokenKind::End,
                TokenKind::RightDelim,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn positions_track_lines() {
        let tokens = lex("/test", "ab\n{{ x }}").unwrap();
        let delim = &tokens[1];
        assert_eq!(delim.kind, TokenKind::LeftDelim);
        assert_eq!(delim.pos, Pos { line: 2, column: 1 });
        let ident = &tokens[2];
        assert_eq!(ident.pos, Pos { line: 2, column: 4 });
    }

    #[test]
    fn unterminated_action_fails() {
        assert!(lex("/test", "{{ x ").is_err());
        assert!(lex("/test", "{* x ").is_err());
        assert!(lex("/test", r#"{{ "x }}"#).is_err());
    }

    #[test]
    fn field_access_tokens() {
        assert_eq!(
            kinds("{{ .a.b[0] }}"),
            vec![
                TokenKind::LeftDelim,
                TokenKind::Dot,
                TokenKind::Ident("a".to_string()),
                TokenKind::Dot,
                TokenKind::Ident("b".to_string()),
                TokenKind::LBracket,
                TokenKind::Number(Number::Int(0)),
                TokenKind::RBracket,
                TokenKind::RightDelim,
                TokenKind::Eof
            ]
        );
    }
}
