//! Scanner for template source. Alternates between text mode and action
//! mode; inside an action, whitespace is a significant token because it
//! separates operands (field accesses attach only when adjacent).

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TokenKind {
    Text(String),
    Comment,
    LeftDelim,
    RightDelim,
    Space,
    Ident(String),
    Keyword(Keyword),
    Dot,
    Nil,
    Bool(bool),
    /// A single `.ident` segment.
    Field(String),
    /// Name after `$`; empty for the bare root variable.
    Variable(String),
    Number(String),
    Str(String),
    Pipe,
    LParen,
    RParen,
    /// `:=`
    Declare,
    /// `=`
    Assign,
    Comma,
    Eof,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Keyword {
    If,
    Else,
    End,
    Range,
    With,
    Template,
    Define,
    Block,
    Break,
    Continue,
}

#[derive(Clone, Debug)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

#[derive(Clone, Debug)]
pub(crate) struct LexError {
    pub pos: usize,
    pub message: String,
}

pub(crate) fn lex(src: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer {
        src,
        pos: 0,
        tokens: Vec::new(),
    };
    lexer.run()?;
    lexer.tokens.push(Token {
        kind: TokenKind::Eof,
        pos: src.len(),
    });
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl<'a> Lexer<'a> {
    fn emit(&mut self, kind: TokenKind, pos: usize) {
        self.tokens.push(Token { kind, pos });
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, pos: usize, message: impl Into<String>) -> LexError {
        LexError {
            pos,
            message: message.into(),
        }
    }

    fn run(&mut self) -> Result<(), LexError> {
        loop {
            match self.rest().find("{{") {
                None => {
                    if self.pos < self.src.len() {
                        let text = self.src[self.pos..].to_string();
                        self.emit(TokenKind::Text(text), self.pos);
                    }
                    return Ok(());
                }
                Some(rel) => {
                    if rel > 0 {
                        let text = self.src[self.pos..self.pos + rel].to_string();
                        self.emit(TokenKind::Text(text), self.pos);
                    }
                    let delim_pos = self.pos + rel;
                    self.pos = delim_pos + 2;
                    // `{{- ` trims preceding text; irrelevant here, consume it.
                    if self.rest().starts_with('-')
                        && self.src[self.pos + 1..]
                            .chars()
                            .next()
                            .map_or(false, char::is_whitespace)
                    {
                        self.pos += 1;
                    }
                    if self.rest().trim_start().starts_with("/*") {
                        self.lex_comment(delim_pos)?;
                    } else {
                        self.emit(TokenKind::LeftDelim, delim_pos);
                        self.lex_action(delim_pos)?;
                    }
                }
            }
        }
    }

    fn lex_comment(&mut self, delim_pos: usize) -> Result<(), LexError> {
        while self.peek().map_or(false, char::is_whitespace) {
            self.bump();
        }
        self.pos += 2; // "/*"
        match self.rest().find("*/") {
            Some(rel) => self.pos += rel + 2,
            None => return Err(self.error(delim_pos, "unclosed comment")),
        }
        while self.peek().map_or(false, char::is_whitespace) {
            self.bump();
        }
        if self.rest().starts_with("-}}") {
            self.pos += 3;
        } else if self.rest().starts_with("}}") {
            self.pos += 2;
        } else {
            return Err(self.error(delim_pos, "comment ends before closing delimiter"));
        }
        self.emit(TokenKind::Comment, delim_pos);
        Ok(())
    }

    fn lex_action(&mut self, delim_pos: usize) -> Result<(), LexError> {
        loop {
            let start = self.pos;
            let c = match self.peek() {
                Some(c) => c,
                None => return Err(self.error(delim_pos, "unclosed action")),
            };
            match c {
                '}' if self.rest().starts_with("}}") => {
                    self.pos += 2;
                    self.emit(TokenKind::RightDelim, start);
                    return Ok(());
                }
                '-' if self.rest().starts_with("-}}") => {
                    self.pos += 3;
                    self.emit(TokenKind::RightDelim, start);
                    return Ok(());
                }
                c if c.is_whitespace() => {
                    while self.peek().map_or(false, char::is_whitespace) {
                        self.bump();
                    }
                    self.emit(TokenKind::Space, start);
                }
                '|' => {
                    self.bump();
                    self.emit(TokenKind::Pipe, start);
                }
                '(' => {
                    self.bump();
                    self.emit(TokenKind::LParen, start);
                }
                ')' => {
                    self.bump();
                    self.emit(TokenKind::RParen, start);
                }
                ',' => {
                    self.bump();
                    self.emit(TokenKind::Comma, start);
                }
                ':' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        self.emit(TokenKind::Declare, start);
                    } else {
                        return Err(self.error(start, "expected := in declaration"));
                    }
                }
                '=' => {
                    self.bump();
                    self.emit(TokenKind::Assign, start);
                }
                '"' => self.lex_quoted_string(start)?,
                '`' => self.lex_raw_string(start)?,
                '.' => self.lex_dot(start)?,
                '$' => {
                    self.bump();
                    let name = self.take_while(is_ident_char);
                    self.emit(TokenKind::Variable(name), start);
                }
                c if c.is_ascii_digit() || c == '+' || c == '-' => self.lex_number(start),
                c if is_ident_start(c) => self.lex_ident(start),
                other => {
                    return Err(self.error(
                        start,
                        format!("unexpected character {:?} in action", other),
                    ))
                }
            }
        }
    }

    fn take_while(&mut self, pred: fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().map_or(false, pred) {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn lex_dot(&mut self, start: usize) -> Result<(), LexError> {
        self.bump();
        match self.peek() {
            Some(c) if is_ident_start(c) => {
                let name = self.take_while(is_ident_char);
                self.emit(TokenKind::Field(name), start);
            }
            Some(c) if c.is_ascii_digit() => {
                // A float like `.5`.
                let rest = self.take_while(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');
                self.emit(TokenKind::Number(format!(".{}", rest)), start);
            }
            _ => self.emit(TokenKind::Dot, start),
        }
        Ok(())
    }

    fn lex_number(&mut self, start: usize) {
        if matches!(self.peek(), Some('+') | Some('-')) {
            self.bump();
        }
        self.take_while(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');
        let text = self.src[start..self.pos].to_string();
        self.emit(TokenKind::Number(text), start);
    }

    fn lex_ident(&mut self, start: usize) {
        let word = self.take_while(is_ident_char);
        let kind = match word.as_str() {
            "if" => TokenKind::Keyword(Keyword::If),
            "else" => TokenKind::Keyword(Keyword::Else),
            "end" => TokenKind::Keyword(Keyword::End),
            "range" => TokenKind::Keyword(Keyword::Range),
            "with" => TokenKind::Keyword(Keyword::With),
            "template" => TokenKind::Keyword(Keyword::Template),
            "define" => TokenKind::Keyword(Keyword::Define),
            "block" => TokenKind::Keyword(Keyword::Block),
            "break" => TokenKind::Keyword(Keyword::Break),
            "continue" => TokenKind::Keyword(Keyword::Continue),
            "nil" => TokenKind::Nil,
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            _ => TokenKind::Ident(word),
        };
        self.emit(kind, start);
    }

    fn lex_quoted_string(&mut self, start: usize) -> Result<(), LexError> {
        self.bump(); // opening quote
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error(start, "unterminated quoted string")),
                Some('"') => break,
                Some('\\') => match self.bump() {
                    None => return Err(self.error(start, "unterminated quoted string")),
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some(other) => text.push(other),
                },
                Some(c) => text.push(c),
            }
        }
        self.emit(TokenKind::Str(text), start);
        Ok(())
    }

    fn lex_raw_string(&mut self, start: usize) -> Result<(), LexError> {
        self.bump(); // opening backquote
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error(start, "unterminated raw string")),
                Some('`') => break,
                Some(c) => text.push(c),
            }
        }
        self.emit(TokenKind::Str(text), start);
        Ok(())
    }
}

#[cfg(test)]
mod lexer_tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_text_and_simple_action() {
        assert_eq!(
            kinds("a{{ .Values.x }}b"),
            vec![
                TokenKind::Text("a".to_string()),
                TokenKind::LeftDelim,
                TokenKind::Space,
                TokenKind::Field("Values".to_string()),
                TokenKind::Field("x".to_string()),
                TokenKind::Space,
                TokenKind::RightDelim,
                TokenKind::Text("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn space_separates_adjacent_fields() {
        assert_eq!(
            kinds("{{.a .b}}"),
            vec![
                TokenKind::LeftDelim,
                TokenKind::Field("a".to_string()),
                TokenKind::Space,
                TokenKind::Field("b".to_string()),
                TokenKind::RightDelim,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_variables_and_declarations() {
        assert_eq!(
            kinds("{{$k, $v := .Values.m}}"),
            vec![
                TokenKind::LeftDelim,
                TokenKind::Variable("k".to_string()),
                TokenKind::Comma,
                TokenKind::Space,
                TokenKind::Variable("v".to_string()),
                TokenKind::Space,
                TokenKind::Declare,
                TokenKind::Space,
                TokenKind::Field("Values".to_string()),
                TokenKind::Field("m".to_string()),
                TokenKind::RightDelim,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn bare_dollar_is_the_root_variable() {
        assert_eq!(
            kinds("{{$.Values.a}}"),
            vec![
                TokenKind::LeftDelim,
                TokenKind::Variable(String::new()),
                TokenKind::Field("Values".to_string()),
                TokenKind::Field("a".to_string()),
                TokenKind::RightDelim,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn trim_markers_are_consumed() {
        assert_eq!(
            kinds("{{- .x -}}"),
            vec![
                TokenKind::LeftDelim,
                TokenKind::Space,
                TokenKind::Field("x".to_string()),
                TokenKind::Space,
                TokenKind::RightDelim,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_collapse_to_one_token() {
        assert_eq!(
            kinds("a{{/* note */}}b"),
            vec![
                TokenKind::Text("a".to_string()),
                TokenKind::Comment,
                TokenKind::Text("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn strings_unescape() {
        assert_eq!(
            kinds(r#"{{"a\nb"}}"#),
            vec![
                TokenKind::LeftDelim,
                TokenKind::Str("a\nb".to_string()),
                TokenKind::RightDelim,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_and_literals() {
        assert_eq!(
            kinds("{{if true}}{{end}}"),
            vec![
                TokenKind::LeftDelim,
                TokenKind::Keyword(Keyword::If),
                TokenKind::Space,
                TokenKind::Bool(true),
                TokenKind::RightDelim,
                TokenKind::LeftDelim,
                TokenKind::Keyword(Keyword::End),
                TokenKind::RightDelim,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers_including_negative() {
        assert_eq!(
            kinds("{{add -1 2.5}}"),
            vec![
                TokenKind::LeftDelim,
                TokenKind::Ident("add".to_string()),
                TokenKind::Space,
                TokenKind::Number("-1".to_string()),
                TokenKind::Space,
                TokenKind::Number("2.5".to_string()),
                TokenKind::RightDelim,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unclosed_action_is_an_error() {
        assert!(lex("{{ .x ").is_err());
        assert!(lex(r#"{{ "open }}"#).is_err());
    }

    #[test]
    fn token_positions_are_byte_offsets() {
        let tokens = lex("ab{{ .x }}").unwrap();
        assert_eq!(tokens[0].pos, 0); // text
        assert_eq!(tokens[1].pos, 2); // left delim
        assert_eq!(tokens[3].pos, 5); // field
    }
}
