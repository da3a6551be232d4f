//! alchc-par - Parser (Syntactic Analyzer)
//!
//! Two-pass recursive-descent parser producing the binary syntax tree.
//!
//! **Pass 1** sweeps the token stream for `func` / `proc` declarations and
//! collects `(kind, arity)` signatures, so calls may reference functions
//! declared later in the file. **Pass 2** builds the tree, interning
//! identifiers into the tree's pool, resolving variables through a
//! scope stack, and validating calls against the signature table.
//!
//! The parser does not fail structurally: on an unexpected token it emits
//! a diagnostic, synchronises to the next `;` or closing `}`, and
//! continues. The whole program is wrapped in a top-level
//! `VisStart(None, list)` node.
//!
//! Precedence, tightest first:
//!
//! ```text
//! primary > unary +- > * / > + - > < <= > >= > == != > && > || > = (right)
//! ```

mod expr;
mod scope;
mod signatures;
mod stmt;


pub use signatures::{collect_signatures, DeclKind, FuncSig, FuncTable};

use alchc_ast::{Node, Tree};
use alchc_lex::{Token, TokenKind};
use alchc_util::{DiagCode, DiagSink, IdentPool, OpCode, Span, Stage};
use scope::ScopeStack;

/// Parse a token stream into `tree`, populating `func_table` and appending
/// any diagnostics to `sink`.
///
/// Runs both passes. Pass 2 uses the collected signatures even when pass 1
/// produced diagnostics.
pub fn parse(
    tree: &mut Tree,
    source: &str,
    tokens: &[Token],
    func_table: &mut FuncTable,
    sink: &mut DiagSink,
) {
    collect_signatures(source, tokens, &mut tree.pool, func_table, sink);

    let root = {
        let mut parser = Parser::new(source, tokens, &mut tree.pool, func_table, sink);
        parser.parse_program()
    };
    tree.set_root(Some(root));
}

/// Which kind of body the parser is currently inside
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FnCtx {
    TopLevel,
    Func,
    Proc,
}

/// Pass 2 state
pub(crate) struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
    pub(crate) pool: &'a mut IdentPool,
    pub(crate) func_table: &'a FuncTable,
    sink: &'a mut DiagSink,
    pub(crate) scopes: ScopeStack,
    pub(crate) while_depth: u32,
    pub(crate) fn_ctx: FnCtx,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(
        source: &'a str,
        tokens: &'a [Token],
        pool: &'a mut IdentPool,
        func_table: &'a FuncTable,
        sink: &'a mut DiagSink,
    ) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            pool,
            func_table,
            sink,
            scopes: ScopeStack::new(),
            while_depth: 0,
            fn_ctx: FnCtx::TopLevel,
        }
    }

    /// Top level accepts a mixture of declarations and statements.
    pub(crate) fn parse_program(&mut self) -> Box<Node> {
        self.scopes.enter_scope();
        let mut items = Vec::new();
        while !self.at_eof() {
            let before = self.pos;
            if let Some(item) = self.parse_toplevel() {
                items.push(item);
            }
            if self.pos == before {
                // Progress guarantee against stray tokens like a lone '}'.
                self.advance();
            }
        }
        self.scopes.leave_scope();
        Node::func(OpCode::VisStart, None, build_list(items, OpCode::Lcat))
    }

    fn parse_toplevel(&mut self) -> Option<Box<Node>> {
        let token = self.current();
        match token.kind {
            TokenKind::Keyword(OpCode::FuncDecl | OpCode::ProcDecl) => self.parse_declaration(),
            TokenKind::Keyword(
                OpCode::Return | OpCode::Finish | OpCode::Break | OpCode::Continue,
            ) => {
                let text = token.lexeme(self.source);
                self.error(
                    DiagCode::ToplevelStmt,
                    token.span,
                    format!("'{text}' is not allowed at top level"),
                );
                self.parse_stmt()
            }
            _ => self.parse_stmt(),
        }
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    /// The token at the cursor; a synthetic `Eof` past the end.
    #[inline]
    pub(crate) fn current(&self) -> Token {
        self.tokens.get(self.pos).copied().unwrap_or(Token {
            kind: TokenKind::Eof,
            span: Span::DUMMY,
        })
    }

    /// Lookahead without consuming.
    #[inline]
    pub(crate) fn peek(&self, offset: usize) -> Token {
        self.tokens.get(self.pos + offset).copied().unwrap_or(Token {
            kind: TokenKind::Eof,
            span: Span::DUMMY,
        })
    }

    #[inline]
    pub(crate) fn at_eof(&self) -> bool {
        self.current().is_eof()
    }

    /// Move past the current token; parks on the terminal `Eof`.
    #[inline]
    pub(crate) fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    /// Describe the current token for an expected-but-got message.
    pub(crate) fn describe_current(&self) -> String {
        let token = self.current();
        if token.is_eof() {
            "end of input".to_string()
        } else {
            format!("'{}'", token.lexeme(self.source))
        }
    }

    pub(crate) fn error(&mut self, code: DiagCode, span: Span, message: impl Into<String>) {
        self.sink.error(Stage::Parser, code, span, message);
    }

    /// Consume a required `;`; a missing one is a diagnostic, not a stop.
    pub(crate) fn eat_semicolon_required(&mut self) {
        if self.current().is_keyword(OpCode::Lcat) {
            self.advance();
        } else {
            let span = self.current().span;
            let found = self.describe_current();
            self.error(
                DiagCode::ParseMissingSemicolon,
                span,
                format!("expected ';', found {found}"),
            );
        }
    }

    /// Block-like statements take an optional trailing `;`.
    pub(crate) fn eat_semicolon_optional(&mut self) {
        if self.current().is_keyword(OpCode::Lcat) {
            self.advance();
        }
    }

    /// Recovery: skip to just past the next `;`, or stop at a closing `}`
    /// for the enclosing block parser to consume.
    pub(crate) fn sync(&mut self) {
        while !self.at_eof() {
            match self.current().kind {
                TokenKind::Keyword(OpCode::Lcat) => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace => return,
                _ => self.advance(),
            }
        }
    }
}

/// Fold items into a right-leaning spine: `[a, b, c]` becomes
/// `op(a, op(b, c))`, a single item stays itself, an empty list is `None`.
pub(crate) fn build_list(items: Vec<Box<Node>>, op: OpCode) -> Option<Box<Node>> {
    let mut list: Option<Box<Node>> = None;
    for item in items.into_iter().rev() {
        list = Some(match list {
            None => item,
            Some(rest) => Node::func(op, Some(item), Some(rest)),
        });
    }
    list
}
