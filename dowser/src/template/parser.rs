//! Recursive-descent parser producing one tree per file plus one per
//! `define` block.

use super::ast::{Arg, Command, Node, Pipe, Tree};
use super::lexer::{lex, Keyword, Token, TokenKind};
use super::ParseError;

use std::rc::Rc;

/// Parses one template file. The first returned tree is the file's own
/// body; the rest are the bodies of its `define` blocks, in source order.
pub fn parse_file(file: &str, source: &str) -> Result<Vec<Tree>, ParseError> {
    let tokens =
        lex(source).map_err(|e| ParseError::at(file, source, e.pos, e.message))?;
    let shared = Rc::new(source.to_string());
    let mut parser = FileParser {
        file,
        source: shared.clone(),
        tokens,
        pos: 0,
        defines: Vec::new(),
    };
    let (root, terminator) = parser.parse_list()?;
    match terminator {
        Terminator::Eof => {}
        Terminator::End => return Err(parser.error_here("unexpected {{end}}")),
        Terminator::Else { .. } => return Err(parser.error_here("unexpected {{else}}")),
    }
    let mut trees = vec![Tree {
        define_name: None,
        file: file.to_string(),
        source: shared,
        root,
    }];
    trees.append(&mut parser.defines);
    Ok(trees)
}

enum Terminator {
    Eof,
    End,
    Else { if_pipe: Option<Pipe> },
}

struct FileParser<'a> {
    file: &'a str,
    source: Rc<String>,
    tokens: Vec<Token>,
    pos: usize,
    defines: Vec<Tree>,
}

impl<'a> FileParser<'a> {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_pos(&self) -> usize {
        self.tokens[self.pos].pos
    }

    fn next(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), TokenKind::Space) {
            self.pos += 1;
        }
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> ParseError {
        ParseError::at(self.file, &self.source, offset, message.into())
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        self.error_at(self.peek_pos(), message)
    }

    fn expect_right_delim(&mut self) -> Result<(), ParseError> {
        self.skip_spaces();
        match self.peek() {
            TokenKind::RightDelim => {
                self.next();
                Ok(())
            }
            _ => Err(self.error_here("expected }}")),
        }
    }

    fn expect_string(&mut self, what: &str) -> Result<String, ParseError> {
        self.skip_spaces();
        match self.peek().clone() {
            TokenKind::Str(text) => {
                self.next();
                Ok(text)
            }
            _ => Err(self.error_here(format!("expected quoted {}", what))),
        }
    }

    fn parse_list(&mut self) -> Result<(Vec<Node>, Terminator), ParseError> {
        let mut nodes = Vec::new();
        loop {
            let pos = self.peek_pos();
            match self.peek().clone() {
                TokenKind::Eof => return Ok((nodes, Terminator::Eof)),
                TokenKind::Text(text) => {
                    self.next();
                    nodes.push(Node::Text { pos, text });
                }
                TokenKind::Comment => {
                    self.next();
                    nodes.push(Node::Comment { pos });
                }
                TokenKind::LeftDelim => {
                    self.next();
                    self.skip_spaces();
                    if let Some(terminator) = self.parse_block_item(pos, &mut nodes)? {
                        return Ok((nodes, terminator));
                    }
                }
                _ => return Err(self.error_here("unexpected token outside an action")),
            }
        }
    }

    /// Parses one `{{ ... }}` construct after its left delimiter. Returns a
    /// terminator when the construct closes the enclosing list.
    fn parse_block_item(
        &mut self,
        delim_pos: usize,
        nodes: &mut Vec<Node>,
    ) -> Result<Option<Terminator>, ParseError> {
        match self.peek().clone() {
            TokenKind::Keyword(Keyword::End) => {
                self.next();
                self.expect_right_delim()?;
                Ok(Some(Terminator::End))
            }
            TokenKind::Keyword(Keyword::Else) => {
                self.next();
                self.skip_spaces();
                if matches!(self.peek(), TokenKind::Keyword(Keyword::If)) {
                    self.next();
                    let pipe = self.parse_pipe()?;
                    self.expect_right_delim()?;
                    Ok(Some(Terminator::Else { if_pipe: Some(pipe) }))
                } else {
                    self.expect_right_delim()?;
                    Ok(Some(Terminator::Else { if_pipe: None }))
                }
            }
            TokenKind::Keyword(Keyword::If) => {
                self.next();
                let pipe = self.parse_pipe()?;
                self.expect_right_delim()?;
                let (list, else_list) = self.parse_control_body()?;
                nodes.push(Node::If {
                    pos: delim_pos,
                    pipe,
                    list,
                    else_list,
                });
                Ok(None)
            }
            TokenKind::Keyword(Keyword::Range) => {
                self.next();
                let pipe = self.parse_pipe()?;
                self.expect_right_delim()?;
                let (list, else_list) = self.parse_control_body()?;
                nodes.push(Node::Range {
                    pos: delim_pos,
                    pipe,
                    list,
                    else_list,
                });
                Ok(None)
            }
            TokenKind::Keyword(Keyword::With) => {
                self.next();
                let pipe = self.parse_pipe()?;
                self.expect_right_delim()?;
                let (list, else_list) = self.parse_control_body()?;
                nodes.push(Node::With {
                    pos: delim_pos,
                    pipe,
                    list,
                    else_list,
                });
                Ok(None)
            }
            TokenKind::Keyword(Keyword::Template) => {
                self.next();
                let name = self.expect_string("template name")?;
                self.skip_spaces();
                let pipe = if matches!(self.peek(), TokenKind::RightDelim) {
                    None
                } else {
                    Some(self.parse_pipe()?)
                };
                self.expect_right_delim()?;
                nodes.push(Node::Template {
                    pos: delim_pos,
                    name,
                    pipe,
                });
                Ok(None)
            }
            TokenKind::Keyword(Keyword::Define) => {
                self.next();
                let name = self.expect_string("template name")?;
                self.expect_right_delim()?;
                let (body, terminator) = self.parse_list()?;
                if !matches!(terminator, Terminator::End) {
                    return Err(self.error_at(delim_pos, "unclosed define block"));
                }
                self.register_define(delim_pos, name, body)?;
                Ok(None)
            }
            TokenKind::Keyword(Keyword::Block) => {
                self.next();
                let name = self.expect_string("template name")?;
                self.skip_spaces();
                let pipe = if matches!(self.peek(), TokenKind::RightDelim) {
                    None
                } else {
                    Some(self.parse_pipe()?)
                };
                self.expect_right_delim()?;
                let (body, terminator) = self.parse_list()?;
                if !matches!(terminator, Terminator::End) {
                    return Err(self.error_at(delim_pos, "unclosed block"));
                }
                self.register_define(delim_pos, name.clone(), body)?;
                nodes.push(Node::Template {
                    pos: delim_pos,
                    name,
                    pipe,
                });
                Ok(None)
            }
            TokenKind::Keyword(Keyword::Break) | TokenKind::Keyword(Keyword::Continue) => {
                self.next();
                self.expect_right_delim()?;
                Ok(None)
            }
            _ => {
                let pipe = self.parse_pipe()?;
                self.expect_right_delim()?;
                nodes.push(Node::Action {
                    pos: delim_pos,
                    pipe,
                });
                Ok(None)
            }
        }
    }

    fn register_define(
        &mut self,
        pos: usize,
        name: String,
        body: Vec<Node>,
    ) -> Result<(), ParseError> {
        if self.defines.iter().any(|t| t.define_name.as_deref() == Some(name.as_str())) {
            return Err(self.error_at(pos, format!("multiple definition of template {:?}", name)));
        }
        self.defines.push(Tree {
            define_name: Some(name),
            file: self.file.to_string(),
            source: self.source.clone(),
            root: body,
        });
        Ok(())
    }

    fn parse_control_body(&mut self) -> Result<(Vec<Node>, Vec<Node>), ParseError> {
        let (list, terminator) = self.parse_list()?;
        match terminator {
            Terminator::End => Ok((list, Vec::new())),
            Terminator::Else { if_pipe: None } => {
                let (else_list, terminator) = self.parse_list()?;
                match terminator {
                    Terminator::End => Ok((list, else_list)),
                    _ => Err(self.error_here("expected {{end}}")),
                }
            }
            Terminator::Else {
                if_pipe: Some(pipe),
            } => {
                let pos = pipe.pos;
                let (inner_list, inner_else) = self.parse_control_body()?;
                let else_list = vec![Node::If {
                    pos,
                    pipe,
                    list: inner_list,
                    else_list: inner_else,
                }];
                Ok((list, else_list))
            }
            Terminator::Eof => Err(self.error_here("unexpected EOF in block")),
        }
    }

    fn parse_pipe(&mut self) -> Result<Pipe, ParseError> {
        self.skip_spaces();
        let pipe_pos = self.peek_pos();
        let decls = self.parse_declarations();
        let mut cmds = Vec::new();
        loop {
            self.skip_spaces();
            cmds.push(self.parse_command()?);
            self.skip_spaces();
            if matches!(self.peek(), TokenKind::Pipe) {
                self.next();
            } else {
                break;
            }
        }
        Ok(Pipe {
            pos: pipe_pos,
            decls,
            cmds,
        })
    }

    /// `$v :=`, `$k, $v :=`, or `$v =`; rolls back when the lookahead does
    /// not commit to a declaration.
    fn parse_declarations(&mut self) -> Vec<String> {
        let save = self.pos;
        let mut names = Vec::new();
        loop {
            match self.peek().clone() {
                TokenKind::Variable(name) => {
                    self.next();
                    names.push(name);
                    self.skip_spaces();
                    if matches!(self.peek(), TokenKind::Comma) {
                        self.next();
                        self.skip_spaces();
                        continue;
                    }
                    if matches!(self.peek(), TokenKind::Declare | TokenKind::Assign) {
                        self.next();
                        return names;
                    }
                    break;
                }
                _ => break,
            }
        }
        self.pos = save;
        Vec::new()
    }

    fn parse_command(&mut self) -> Result<Command, ParseError> {
        self.skip_spaces();
        let cmd_pos = self.peek_pos();
        let mut args = Vec::new();
        loop {
            match self.peek() {
                TokenKind::RightDelim
                | TokenKind::Pipe
                | TokenKind::RParen
                | TokenKind::Eof => break,
                TokenKind::Space => {
                    self.next();
                }
                _ => args.push(self.parse_operand()?),
            }
        }
        if args.is_empty() {
            return Err(self.error_at(cmd_pos, "missing value for command"));
        }
        Ok(Command {
            pos: cmd_pos,
            args,
        })
    }

    /// Collects immediately following `.field` tokens; any whitespace would
    /// have produced a `Space` token and stopped the chain.
    fn take_field_chain(&mut self) -> Vec<String> {
        let mut fields = Vec::new();
        while let TokenKind::Field(name) = self.peek().clone() {
            self.next();
            fields.push(name);
        }
        fields
    }

    fn parse_operand(&mut self) -> Result<Arg, ParseError> {
        let token = self.next();
        let pos = token.pos;
        let base = match token.kind {
            TokenKind::Dot => Arg::Dot { pos },
            TokenKind::Nil => Arg::Nil { pos },
            TokenKind::Bool(value) => Arg::Bool { pos, value },
            TokenKind::Number(text) => Arg::Number { pos, text },
            TokenKind::Str(text) => Arg::Str { pos, text },
            TokenKind::Ident(name) => Arg::Ident { pos, name },
            TokenKind::Field(first) => {
                let mut idents = vec![first];
                idents.extend(self.take_field_chain());
                return Ok(Arg::Field { pos, idents });
            }
            TokenKind::Variable(name) => {
                let fields = self.take_field_chain();
                return Ok(Arg::Variable { pos, name, fields });
            }
            TokenKind::LParen => {
                let pipe = self.parse_pipe()?;
                self.skip_spaces();
                if !matches!(self.peek(), TokenKind::RParen) {
                    return Err(self.error_here("unclosed left paren"));
                }
                self.next();
                Arg::SubPipe { pos, pipe }
            }
            TokenKind::Keyword(_) => {
                return Err(self.error_at(pos, "unexpected keyword in operand"))
            }
            other => {
                return Err(self.error_at(pos, format!("unexpected token in operand: {:?}", other)))
            }
        };
        let fields = self.take_field_chain();
        if fields.is_empty() {
            Ok(base)
        } else {
            Ok(Arg::Chain {
                pos,
                base: Box::new(base),
                fields,
            })
        }
    }
}

#[cfg(test)]
mod parser_tests {
    use super::*;

    fn parse(src: &str) -> Vec<Tree> {
        parse_file("templates/test.yaml", src).unwrap()
    }

    fn single_action_pipe(src: &str) -> Pipe {
        let trees = parse(src);
        assert_eq!(trees.len(), 1);
        match &trees[0].root[0] {
            Node::Action { pipe, .. } => pipe.clone(),
            other => panic!("expected action, got {:?}", other),
        }
    }

    #[test]
    fn parses_field_access() {
        let pipe = single_action_pipe("{{ .Values.image.tag }}");
        assert_eq!(pipe.cmds.len(), 1);
        match &pipe.cmds[0].args[0] {
            Arg::Field { idents, .. } => {
                assert_eq!(idents, &["Values", "image", "tag"]);
            }
            other => panic!("expected field, got {:?}", other),
        }
    }

    #[test]
    fn parses_function_call_with_args() {
        let pipe = single_action_pipe(r#"{{ index .Values.image "repository" }}"#);
        let args = &pipe.cmds[0].args;
        assert_eq!(args.len(), 3);
        assert!(matches!(&args[0], Arg::Ident { name, .. } if name == "index"));
        assert!(matches!(&args[1], Arg::Field { .. }));
        assert!(matches!(&args[2], Arg::Str { text, .. } if text == "repository"));
    }

    #[test]
    fn parses_pipelines_into_multiple_commands() {
        let pipe = single_action_pipe("{{ .Values.a | quote | upper }}");
        assert_eq!(pipe.cmds.len(), 3);
        assert!(matches!(
            &pipe.cmds[1].args[0],
            Arg::Ident { name, .. } if name == "quote"
        ));
    }

    #[test]
    fn parses_declarations() {
        let trees = parse("{{ range $k, $v := .Values.ports }}{{ end }}");
        match &trees[0].root[0] {
            Node::Range { pipe, .. } => {
                assert_eq!(pipe.decls, vec!["k".to_string(), "v".to_string()]);
                assert_eq!(pipe.cmds.len(), 1);
            }
            other => panic!("expected range, got {:?}", other),
        }
    }

    #[test]
    fn variable_without_declaration_is_an_operand() {
        let pipe = single_action_pipe("{{ $v.name }}");
        match &pipe.cmds[0].args[0] {
            Arg::Variable { name, fields, .. } => {
                assert_eq!(name, "v");
                assert_eq!(fields, &["name"]);
            }
            other => panic!("expected variable, got {:?}", other),
        }
        assert!(pipe.decls.is_empty());
    }

    #[test]
    fn parses_parenthesized_pipeline_with_chain() {
        let pipe = single_action_pipe("{{ (.Values.a).b }}");
        match &pipe.cmds[0].args[0] {
            Arg::Chain { base, fields, .. } => {
                assert!(matches!(**base, Arg::SubPipe { .. }));
                assert_eq!(fields, &["b"]);
            }
            other => panic!("expected chain, got {:?}", other),
        }
    }

    #[test]
    fn adjacent_fields_merge_but_spaced_fields_do_not() {
        let pipe = single_action_pipe("{{ eq .a .b }}");
        assert_eq!(pipe.cmds[0].args.len(), 3);
    }

    #[test]
    fn parses_if_else_chain() {
        let trees = parse("{{ if .Values.a }}x{{ else if .Values.b }}y{{ else }}z{{ end }}");
        match &trees[0].root[0] {
            Node::If { else_list, .. } => match &else_list[0] {
                Node::If {
                    else_list: inner_else,
                    ..
                } => {
                    assert_eq!(inner_else.len(), 1);
                }
                other => panic!("expected nested if, got {:?}", other),
            },
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn define_becomes_a_separate_tree() {
        let trees = parse(r#"{{ define "x" }}{{ .Values.a }}{{ end }}body"#);
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0].define_name, None);
        assert_eq!(trees[1].define_name.as_deref(), Some("x"));
        assert_eq!(trees[1].name(), "x");
        // The define body does not appear in the file tree.
        assert!(matches!(&trees[0].root[0], Node::Text { text, .. } if text == "body"));
    }

    #[test]
    fn block_registers_a_define_and_a_template_action() {
        let trees = parse(r#"{{ block "b" .Values.ctx }}inner{{ end }}"#);
        assert_eq!(trees.len(), 2);
        assert!(matches!(
            &trees[0].root[0],
            Node::Template { name, pipe: Some(_), .. } if name == "b"
        ));
    }

    #[test]
    fn template_action_without_pipe() {
        let trees = parse(r#"{{ template "x" }}"#);
        assert!(matches!(
            &trees[0].root[0],
            Node::Template { pipe: None, .. }
        ));
    }

    #[test]
    fn duplicate_define_in_one_file_is_an_error() {
        let err = parse_file(
            "t.yaml",
            r#"{{ define "x" }}{{ end }}{{ define "x" }}{{ end }}"#,
        )
        .unwrap_err();
        assert!(err.message.contains("multiple definition"));
    }

    #[test]
    fn errors_carry_line_and_column() {
        let err = parse_file("t.yaml", "line one\n{{ if }}").unwrap_err();
        assert_eq!(err.file, "t.yaml");
        assert_eq!(err.line, 2);
        assert!(err.column > 1);
    }

    #[test]
    fn unclosed_block_is_an_error() {
        assert!(parse_file("t.yaml", "{{ if .x }}unclosed").is_err());
        assert!(parse_file("t.yaml", "{{ end }}").is_err());
    }

    #[test]
    fn break_and_continue_parse_to_nothing() {
        let trees = parse("{{ range .Values.xs }}{{ break }}{{ end }}");
        match &trees[0].root[0] {
            Node::Range { list, .. } => assert!(list.is_empty()),
            other => panic!("expected range, got {:?}", other),
        }
    }
}
