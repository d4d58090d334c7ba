//! Recursive-descent builder for the intermediate statement tree.
//!
//! Grammar:
//!
//! ```text
//! Statement := (Option | Group | Positional)*
//! Option    := Identifier ('=')? ValueTail?
//! ValueTail := Identifier (Identifier)*
//! Group     := Identifier '[' Statement ']'
//! ```
//!
//! The builder never decides between single and multi-valued flags: it only
//! attaches every following value identifier to the flag node. Syntax errors
//! are collected with their positions and the builder always recovers.

use crate::token::{Token, TokenKind, TokenStream};

/// A piece of source text with the byte position it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub text: String,
    pub position: usize,
}

impl Spanned {
    fn from_token(token: &Token) -> Self {
        Self {
            text: token.image.clone(),
            position: token.position,
        }
    }
}

/// A flag identifier with the value identifiers that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagNode {
    pub name: Spanned,
    pub values: Vec<Spanned>,
    /// Whether the first value was attached with `=`.
    pub attached: bool,
}

/// `name [ body ]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupNode {
    pub name: Spanned,
    /// Position of `[`.
    pub open: usize,
    /// Position of `]`, or of End when the group was never closed.
    pub close: usize,
    pub closed: bool,
    pub body: Statement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Flag(FlagNode),
    Group(GroupNode),
    Positional(Spanned),
}

impl Node {
    pub fn position(&self) -> usize {
        match self {
            Node::Flag(flag) => flag.name.position,
            Node::Group(group) => group.name.position,
            Node::Positional(value) => value.position,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statement {
    pub nodes: Vec<Node>,
}

impl Statement {
    /// Visits every group node, outermost first.
    pub fn for_each_group<'a>(&'a self, visit: &mut impl FnMut(&'a GroupNode)) {
        for node in &self.nodes {
            if let Node::Group(group) = node {
                visit(group);
                group.body.for_each_group(visit);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub position: usize,
}

/// Returns `true` when `image` is a flag head: after its longest matching
/// prefix the rest is non-empty and does not start like a number.
pub fn is_flag_head(image: &str, prefixes: &[String]) -> bool {
    prefixes
        .iter()
        .filter_map(|prefix| image.strip_prefix(prefix.as_str()))
        .min_by_key(|rest| rest.len())
        .and_then(|rest| rest.chars().next())
        .is_some_and(|first| !first.is_ascii_digit() && first != '.')
}

pub struct SyntaxTreeBuilder<'a> {
    stream: TokenStream,
    prefixes: &'a [String],
    errors: Vec<SyntaxError>,
}

impl<'a> SyntaxTreeBuilder<'a> {
    pub fn new(stream: TokenStream, prefixes: &'a [String]) -> Self {
        Self {
            stream,
            prefixes,
            errors: Vec::new(),
        }
    }

    /// Builds the whole statement tree. Never fails; syntax problems are
    /// returned alongside the tree.
    pub fn build(mut self) -> (Statement, Vec<SyntaxError>) {
        let statement = self.statement(None);
        (statement, self.errors)
    }

    fn error(&mut self, message: impl Into<String>, position: usize) {
        self.errors.push(SyntaxError {
            message: message.into(),
            position,
        });
    }

    /// Parses nodes until End, or until `]` when inside a group. The closing
    /// bracket itself is left for the caller.
    fn statement(&mut self, group: Option<&str>) -> Statement {
        let mut nodes = Vec::new();

        loop {
            let token = self.stream.peek().clone();
            match token.kind {
                TokenKind::End => {
                    if let Some(name) = group {
                        self.error(
                            format!("Missing closing ']' for group '{name}'"),
                            token.position,
                        );
                    }
                    break;
                }
                TokenKind::RBracket => {
                    if group.is_some() {
                        break;
                    }
                    self.error("Unmatched ']'", token.position);
                    self.stream.advance();
                }
                TokenKind::LBracket => {
                    self.error("Unexpected '[' without a group name", token.position);
                    self.skip_bracketed();
                }
                TokenKind::Equals => {
                    self.error("Unexpected '='", token.position);
                    self.stream.advance();
                }
                TokenKind::Identifier => {
                    if is_flag_head(&token.image, self.prefixes) {
                        nodes.push(self.option_or_group());
                    } else {
                        self.stream.advance();
                        nodes.push(Node::Positional(Spanned::from_token(&token)));
                    }
                }
            }
        }

        Statement { nodes }
    }

    fn option_or_group(&mut self) -> Node {
        let name = Spanned::from_token(&self.stream.advance());
        let mut values = Vec::new();
        let mut attached = false;

        if self.stream.peek_kind() == TokenKind::Equals {
            let equals = self.stream.advance();
            match self.stream.peek_kind() {
                TokenKind::LBracket => {
                    self.error("Unexpected '=' before group body", equals.position);
                }
                TokenKind::Identifier => {
                    attached = true;
                    values.push(Spanned::from_token(&self.stream.advance()));
                }
                _ => {}
            }
        }

        if !attached && self.stream.peek_kind() == TokenKind::LBracket {
            return Node::Group(self.group(name));
        }

        while self.stream.peek_kind() == TokenKind::Identifier
            && !is_flag_head(&self.stream.peek().image, self.prefixes)
        {
            values.push(Spanned::from_token(&self.stream.advance()));
        }

        Node::Flag(FlagNode {
            name,
            values,
            attached,
        })
    }

    fn group(&mut self, name: Spanned) -> GroupNode {
        let open = self.stream.advance().position;
        let body = self.statement(Some(&name.text));

        let (close, closed) = if self.stream.peek_kind() == TokenKind::RBracket {
            (self.stream.advance().position, true)
        } else {
            (self.stream.peek().position, false)
        };

        GroupNode {
            name,
            open,
            close,
            closed,
            body,
        }
    }

    /// Recovery for a stray `[`: skip to its balancing `]` or End.
    fn skip_bracketed(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.stream.peek_kind() {
                TokenKind::End => return,
                TokenKind::LBracket => depth += 1,
                TokenKind::RBracket => {
                    depth -= 1;
                    if depth == 0 {
                        self.stream.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.stream.advance();
        }
    }
}

/// Tokens → statement tree in one call.
pub fn build_statement(stream: TokenStream, prefixes: &[String]) -> (Statement, Vec<SyntaxError>) {
    SyntaxTreeBuilder::new(stream, prefixes).build()
}
