//! Test stand-in for the external parser collaborator: a small
//! recursive-descent parser producing canonical trees for the test grammar.
#![allow(dead_code)]

use std::sync::Arc;

use arbor_syntax::{
    GreenBuilder, GreenNode, GreenTrivia, ParseFn, ParseOptions, SyntaxElement, SyntaxKind,
    SyntaxNode, SyntaxToken, SyntaxTree, TriviaItem, TriviaKind,
};
use text_size::TextSize;

pub fn parse_fn() -> ParseFn {
    Arc::new(|text, _options, _reparse| parse_module(text))
}

pub fn parse_source(text: &str) -> SyntaxTree {
    parse_with(text, ParseOptions::default())
}

pub fn parse_with(text: &str, options: ParseOptions) -> SyntaxTree {
    SyntaxTree::parse(text, options, "test.arb".into(), parse_fn())
}

/// Byte offset of the first occurrence of `needle` in `text`.
pub fn offset_of(text: &str, needle: &str) -> TextSize {
    TextSize::new(text.find(needle).expect("needle present in text") as u32)
}

/// First node of the given kind in preorder.
pub fn find_node(root: &SyntaxNode, kind: SyntaxKind) -> SyntaxNode {
    use arbor_syntax::WalkEvent;

    root.preorder()
        .find_map(|event| match event {
            WalkEvent::Enter(node) if node.kind() == kind => Some(node),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no {kind:?} node in tree"))
}

/// First token with the given kind and text, in source order.
pub fn find_token(root: &SyntaxNode, kind: SyntaxKind, text: &str) -> SyntaxToken {
    fn walk(node: &SyntaxNode, kind: SyntaxKind, text: &str) -> Option<SyntaxToken> {
        for element in node.children_with_tokens() {
            match element {
                SyntaxElement::Token(token) if token.kind() == kind && token.text() == text => {
                    return Some(token);
                }
                SyntaxElement::Token(_) => {}
                SyntaxElement::Node(child) => {
                    if let Some(token) = walk(&child, kind, text) {
                        return Some(token);
                    }
                }
            }
        }
        None
    }
    walk(root, kind, text).unwrap_or_else(|| panic!("no {kind:?} token {text:?} in tree"))
}

type RawToken = (Vec<TriviaItem>, SyntaxKind, String);

pub fn parse_module(text: &str) -> GreenNode {
    let tokens = lex(text);
    let mut parser = Parser { tokens, pos: 0, builder: GreenBuilder::new() };
    parser.module();
    parser.builder.finish()
}

fn lex(text: &str) -> Vec<RawToken> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    let mut trivia: Vec<TriviaItem> = Vec::new();
    let mut out: Vec<RawToken> = Vec::new();
    let mut at_line_start = true;

    while pos < bytes.len() {
        let c = bytes[pos] as char;
        match c {
            ' ' | '\t' => {
                let start = pos;
                while pos < bytes.len() && matches!(bytes[pos], b' ' | b'\t') {
                    pos += 1;
                }
                trivia.push(TriviaItem::new(TriviaKind::Whitespace, &text[start..pos]));
            }
            '\n' => {
                trivia.push(TriviaItem::new(TriviaKind::Newline, "\n"));
                pos += 1;
                at_line_start = true;
            }
            '/' if bytes.get(pos + 1) == Some(&b'/') => {
                let start = pos;
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
                trivia.push(TriviaItem::new(TriviaKind::LineComment, &text[start..pos]));
                at_line_start = false;
            }
            '#' if at_line_start => {
                let start = pos;
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
                if pos < bytes.len() {
                    pos += 1; // the newline belongs to the directive line
                }
                trivia.push(TriviaItem::directive(parse_directive(&text[start..pos])));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = pos;
                while pos < bytes.len()
                    && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_')
                {
                    pos += 1;
                }
                let word = &text[start..pos];
                let kind = match word {
                    "fn" => SyntaxKind::FN_KW,
                    "let" => SyntaxKind::LET_KW,
                    "true" => SyntaxKind::TRUE_KW,
                    "false" => SyntaxKind::FALSE_KW,
                    _ => SyntaxKind::NAME,
                };
                out.push((std::mem::take(&mut trivia), kind, word.to_owned()));
                at_line_start = false;
            }
            _ if c.is_ascii_digit() => {
                let start = pos;
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
                out.push((std::mem::take(&mut trivia), SyntaxKind::NUMBER, text[start..pos].to_owned()));
                at_line_start = false;
            }
            _ => {
                let kind = match c {
                    '(' => SyntaxKind::LEFT_PAREN,
                    ')' => SyntaxKind::RIGHT_PAREN,
                    '{' => SyntaxKind::LEFT_BRACE,
                    '}' => SyntaxKind::RIGHT_BRACE,
                    ',' => SyntaxKind::COMMA,
                    ':' => SyntaxKind::COLON,
                    ';' => SyntaxKind::SEMICOLON,
                    '=' => SyntaxKind::EQ,
                    '#' => SyntaxKind::HASH,
                    '+' | '-' | '*' | '<' | '>' => SyntaxKind::OPERATOR,
                    _ => SyntaxKind::UNKNOWN,
                };
                out.push((std::mem::take(&mut trivia), kind, c.to_string()));
                pos += c.len_utf8();
                at_line_start = false;
            }
        }
    }
    out.push((trivia, SyntaxKind::EOF, String::new()));
    out
}

/// Parses one `#...` line (trailing newline included) into directive syntax.
fn parse_directive(line: &str) -> GreenNode {
    let bytes = line.as_bytes();
    let mut pos = 0;
    let mut pending: Vec<TriviaItem> = Vec::new();
    let mut tokens: Vec<RawToken> = Vec::new();
    let mut first_word = true;
    let mut directive_kind = None;

    while pos < bytes.len() {
        let c = bytes[pos] as char;
        match c {
            ' ' | '\t' => {
                let start = pos;
                while pos < bytes.len() && matches!(bytes[pos], b' ' | b'\t') {
                    pos += 1;
                }
                pending.push(TriviaItem::new(TriviaKind::Whitespace, &line[start..pos]));
            }
            '\n' => {
                pending.push(TriviaItem::new(TriviaKind::Newline, "\n"));
                pos += 1;
            }
            '#' => {
                tokens.push((std::mem::take(&mut pending), SyntaxKind::HASH, "#".to_owned()));
                pos += 1;
            }
            ',' => {
                tokens.push((std::mem::take(&mut pending), SyntaxKind::COMMA, ",".to_owned()));
                pos += 1;
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = pos;
                while pos < bytes.len()
                    && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_')
                {
                    pos += 1;
                }
                let word = &line[start..pos];
                let kind = if first_word {
                    first_word = false;
                    let (keyword, node) = match word {
                        "if" => (SyntaxKind::IF_KW, SyntaxKind::IF_DIRECTIVE),
                        "elif" => (SyntaxKind::ELIF_KW, SyntaxKind::ELIF_DIRECTIVE),
                        "else" => (SyntaxKind::ELSE_KW, SyntaxKind::ELSE_DIRECTIVE),
                        "endif" => (SyntaxKind::ENDIF_KW, SyntaxKind::ENDIF_DIRECTIVE),
                        "define" => (SyntaxKind::DEFINE_KW, SyntaxKind::DEFINE_DIRECTIVE),
                        "undef" => (SyntaxKind::UNDEF_KW, SyntaxKind::UNDEF_DIRECTIVE),
                        "pragma" => (SyntaxKind::PRAGMA_KW, SyntaxKind::PRAGMA_DIRECTIVE),
                        _ => panic!("unsupported directive {word:?}"),
                    };
                    directive_kind = Some(node);
                    keyword
                } else {
                    match word {
                        "warning" => SyntaxKind::WARNING_KW,
                        "disable" => SyntaxKind::DISABLE_KW,
                        "restore" => SyntaxKind::RESTORE_KW,
                        _ => SyntaxKind::NAME,
                    }
                };
                tokens.push((std::mem::take(&mut pending), kind, word.to_owned()));
            }
            _ if c.is_ascii_digit() => {
                let start = pos;
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
                tokens.push((std::mem::take(&mut pending), SyntaxKind::NUMBER, line[start..pos].to_owned()));
            }
            _ => {
                tokens.push((std::mem::take(&mut pending), SyntaxKind::UNKNOWN, c.to_string()));
                pos += c.len_utf8();
            }
        }
    }

    let mut builder = GreenBuilder::new();
    builder.start_node(directive_kind.expect("directive line names a directive"));
    let last = tokens.len() - 1;
    for (index, (leading, kind, text)) in tokens.into_iter().enumerate() {
        let trailing = if index == last {
            GreenTrivia::new(std::mem::take(&mut pending))
        } else {
            GreenTrivia::empty()
        };
        builder.token(GreenTrivia::new(leading), kind, &text, trailing);
    }
    builder.finish_node();
    builder.finish()
}

struct Parser {
    tokens: Vec<RawToken>,
    pos: usize,
    builder: GreenBuilder,
}

impl Parser {
    fn peek(&self) -> SyntaxKind {
        self.tokens[self.pos].1
    }

    fn peek_nth(&self, n: usize) -> SyntaxKind {
        self.tokens.get(self.pos + n).map_or(SyntaxKind::EOF, |token| token.1)
    }

    fn bump(&mut self) {
        let (leading, kind, text) = self.tokens[self.pos].clone();
        self.builder.token(GreenTrivia::new(leading), kind, &text, GreenTrivia::empty());
        self.pos += 1;
    }

    #[track_caller]
    fn expect(&mut self, kind: SyntaxKind) {
        assert_eq!(self.peek(), kind, "unexpected token at {}", self.pos);
        self.bump();
    }

    fn module(&mut self) {
        self.builder.start_node(SyntaxKind::MODULE);
        self.builder.start_list();
        while self.peek() != SyntaxKind::EOF {
            self.item();
        }
        self.builder.finish_list();
        self.bump(); // EOF carries the trailing trivia of the file
        self.builder.finish_node();
    }

    fn item(&mut self) {
        match self.peek() {
            SyntaxKind::FN_KW => self.fn_def(),
            SyntaxKind::LET_KW => self.let_stmt(),
            SyntaxKind::NAME | SyntaxKind::NUMBER | SyntaxKind::TRUE_KW | SyntaxKind::FALSE_KW => {
                self.expr_stmt();
            }
            _ => {
                self.builder.start_node(SyntaxKind::ERROR);
                self.bump();
                self.builder.finish_node();
            }
        }
    }

    fn fn_def(&mut self) {
        self.builder.start_node(SyntaxKind::FN_DEF);
        self.expect(SyntaxKind::FN_KW);
        self.expect(SyntaxKind::NAME);
        self.expect(SyntaxKind::LEFT_PAREN);
        self.builder.start_list();
        while !matches!(self.peek(), SyntaxKind::RIGHT_PAREN | SyntaxKind::EOF) {
            self.builder.start_node(SyntaxKind::PARAM);
            self.expect(SyntaxKind::NAME);
            self.builder.finish_node();
            if self.peek() == SyntaxKind::COMMA {
                self.bump();
            }
        }
        self.builder.finish_list();
        self.expect(SyntaxKind::RIGHT_PAREN);
        self.block();
        self.builder.finish_node();
    }

    fn block(&mut self) {
        self.builder.start_node(SyntaxKind::BLOCK);
        self.expect(SyntaxKind::LEFT_BRACE);
        self.builder.start_list();
        while !matches!(self.peek(), SyntaxKind::RIGHT_BRACE | SyntaxKind::EOF) {
            self.item();
        }
        self.builder.finish_list();
        self.expect(SyntaxKind::RIGHT_BRACE);
        self.builder.finish_node();
    }

    fn let_stmt(&mut self) {
        self.builder.start_node(SyntaxKind::LET_STMT);
        self.expect(SyntaxKind::LET_KW);
        self.expect(SyntaxKind::NAME);
        if self.peek() == SyntaxKind::EQ {
            self.builder.start_node(SyntaxKind::INITIALIZER);
            self.bump();
            self.expr();
            self.builder.finish_node();
        } else {
            self.builder.absent();
        }
        self.expect(SyntaxKind::SEMICOLON);
        self.builder.finish_node();
    }

    fn expr_stmt(&mut self) {
        self.builder.start_node(SyntaxKind::EXPR_STMT);
        self.expr();
        self.expect(SyntaxKind::SEMICOLON);
        self.builder.finish_node();
    }

    fn expr(&mut self) {
        match self.peek() {
            SyntaxKind::NUMBER | SyntaxKind::TRUE_KW | SyntaxKind::FALSE_KW | SyntaxKind::STRING => {
                self.builder.start_node(SyntaxKind::LITERAL);
                self.bump();
                self.builder.finish_node();
            }
            SyntaxKind::NAME if self.peek_nth(1) == SyntaxKind::LEFT_PAREN => self.call(),
            SyntaxKind::NAME => {
                self.builder.start_node(SyntaxKind::NAME_EXPR);
                self.bump();
                self.builder.finish_node();
            }
            _ => {
                self.builder.start_node(SyntaxKind::ERROR);
                self.bump();
                self.builder.finish_node();
            }
        }
    }

    fn call(&mut self) {
        self.builder.start_node(SyntaxKind::CALL_EXPR);
        self.builder.start_node(SyntaxKind::NAME_EXPR);
        self.expect(SyntaxKind::NAME);
        self.builder.finish_node();
        self.expect(SyntaxKind::LEFT_PAREN);
        self.builder.start_list();
        while !matches!(self.peek(), SyntaxKind::RIGHT_PAREN | SyntaxKind::EOF) {
            self.expr();
            if self.peek() == SyntaxKind::COMMA {
                self.bump();
            }
        }
        self.builder.finish_list();
        self.expect(SyntaxKind::RIGHT_PAREN);
        self.builder.finish_node();
    }
}
