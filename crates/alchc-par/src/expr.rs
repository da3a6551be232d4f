//! Expression parsing - precedence climbing and call validation.

use crate::{build_list, DeclKind, Parser};
use alchc_ast::Node;
use alchc_lex::{Token, TokenKind};
use alchc_util::{DiagCode, Ident, OpCode, Span};

impl<'a> Parser<'a> {
    /// Parse at assignment precedence (the loosest level).
    pub(crate) fn parse_expr(&mut self) -> Option<Box<Node>> {
        self.parse_assign()
    }

    /// `IDENT '=' expr` with one-token lookahead; right-associative.
    ///
    /// The target is defined at the current scope if it was not already.
    /// A non-identifier left-hand side is a diagnostic but still produces
    /// an `Assign` node so downstream passes see a consistent shape.
    fn parse_assign(&mut self) -> Option<Box<Node>> {
        if self.current().kind == TokenKind::Ident && self.peek(1).is_keyword(OpCode::Assign) {
            let token = self.current();
            let name = self.pool.get_or_add(token.lexeme(self.source));
            self.advance(); // ident
            self.advance(); // '='
            let rhs = self.parse_assign()?;
            if !self.scopes.is_defined(name) {
                self.scopes.define(name);
            }
            return Some(Node::func(
                OpCode::Assign,
                Some(Node::ident(name)),
                Some(rhs),
            ));
        }

        let lhs = self.parse_or()?;
        if self.current().is_keyword(OpCode::Assign) {
            let span = self.current().span;
            self.error(
                DiagCode::ParseExpected,
                span,
                "assignment target must be a variable",
            );
            self.advance();
            let rhs = self.parse_assign()?;
            return Some(Node::func(OpCode::Assign, Some(lhs), Some(rhs)));
        }
        Some(lhs)
    }

    fn parse_or(&mut self) -> Option<Box<Node>> {
        let mut lhs = self.parse_and()?;
        while self.current().is_keyword(OpCode::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Node::func(OpCode::Or, Some(lhs), Some(rhs));
        }
        Some(lhs)
    }

    fn parse_and(&mut self) -> Option<Box<Node>> {
        let mut lhs = self.parse_equality()?;
        while self.current().is_keyword(OpCode::And) {
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Node::func(OpCode::And, Some(lhs), Some(rhs));
        }
        Some(lhs)
    }

    fn parse_equality(&mut self) -> Option<Box<Node>> {
        let mut lhs = self.parse_relational()?;
        while let TokenKind::Keyword(op @ (OpCode::Eq | OpCode::Neq)) = self.current().kind {
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = Node::func(op, Some(lhs), Some(rhs));
        }
        Some(lhs)
    }

    fn parse_relational(&mut self) -> Option<Box<Node>> {
        let mut lhs = self.parse_additive()?;
        while let TokenKind::Keyword(op @ (OpCode::Lt | OpCode::Le | OpCode::Gt | OpCode::Ge)) =
            self.current().kind
        {
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Node::func(op, Some(lhs), Some(rhs));
        }
        Some(lhs)
    }

    fn parse_additive(&mut self) -> Option<Box<Node>> {
        let mut lhs = self.parse_multiplicative()?;
        while let TokenKind::Keyword(op @ (OpCode::Plus | OpCode::Minus)) = self.current().kind {
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Node::func(op, Some(lhs), Some(rhs));
        }
        Some(lhs)
    }

    fn parse_multiplicative(&mut self) -> Option<Box<Node>> {
        let mut lhs = self.parse_unary()?;
        while let TokenKind::Keyword(op @ (OpCode::Mul | OpCode::Div)) = self.current().kind {
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Node::func(op, Some(lhs), Some(rhs));
        }
        Some(lhs)
    }

    /// Unary `+` is absorbed; unary `-` keeps its operand in `right`.
    fn parse_unary(&mut self) -> Option<Box<Node>> {
        match self.current().kind {
            TokenKind::Keyword(OpCode::Minus) => {
                self.advance();
                let operand = self.parse_unary()?;
                Some(Node::func(OpCode::Minus, None, Some(operand)))
            }
            TokenKind::Keyword(OpCode::Plus) => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Option<Box<Node>> {
        let token = self.current();
        match token.kind {
            TokenKind::Number(value) => {
                self.advance();
                Some(Node::constant(value))
            }

            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                if self.current().kind == TokenKind::RParen {
                    self.advance();
                } else {
                    let span = self.current().span;
                    let found = self.describe_current();
                    self.error(
                        DiagCode::ParseExpected,
                        span,
                        format!("expected ')', found {found}"),
                    );
                }
                Some(inner)
            }

            TokenKind::Ident => {
                let name = self.pool.get_or_add(token.lexeme(self.source));
                self.advance();
                if self.current().kind == TokenKind::LParen {
                    return self.parse_call_tail(name, token.span, true);
                }
                if !self.scopes.is_defined(name) {
                    let text = token.lexeme(self.source);
                    self.error(
                        DiagCode::UndefVariable,
                        token.span,
                        format!("undefined variable '{text}'"),
                    );
                }
                Some(Node::ident(name))
            }

            TokenKind::Keyword(OpCode::Call) => {
                self.advance();
                let name_token = self.current();
                if name_token.kind != TokenKind::Ident {
                    let found = self.describe_current();
                    self.error(
                        DiagCode::ParseExpected,
                        name_token.span,
                        format!("expected function name after 'call', found {found}"),
                    );
                    return None;
                }
                let name = self.pool.get_or_add(name_token.lexeme(self.source));
                self.advance();
                self.parse_call_tail(name, name_token.span, true)
            }

            // Keyword-flagged builtins are callable in argument form.
            TokenKind::Keyword(op) if op.is_builtin() => self.parse_builtin(op, token),

            _ => {
                let found = self.describe_current();
                self.error(
                    DiagCode::ParseExpected,
                    token.span,
                    format!("expected expression, found {found}"),
                );
                None
            }
        }
    }

    /// Keyword-flagged builtins in call form: `input()`, `print(x)`,
    /// `pow(a, b)`, `log(a, b)`.
    ///
    /// The cursor is on the builtin keyword; `token` is that keyword's
    /// token. Unary operands keep the canonical shape (operand in
    /// `right`, `left` absent); `pow`/`log` are ordinary binary nodes.
    fn parse_builtin(&mut self, op: OpCode, token: Token) -> Option<Box<Node>> {
        self.advance();
        match op {
            // `input()` reads a value; the parentheses may be empty or
            // absent.
            OpCode::Input => {
                if self.current().kind == TokenKind::LParen {
                    self.advance();
                    if self.current().kind == TokenKind::RParen {
                        self.advance();
                    } else {
                        let span = self.current().span;
                        self.error(
                            DiagCode::ParseExpected,
                            span,
                            "expected ')' after 'input('",
                        );
                    }
                }
                Some(Node::func(OpCode::Input, None, None))
            }

            // `print(x)` passes its operand through; a bare operand binds
            // like a unary operator.
            OpCode::Print => {
                let value = if self.current().kind == TokenKind::LParen {
                    self.advance();
                    let value = self.parse_expr()?;
                    if self.current().kind == TokenKind::RParen {
                        self.advance();
                    } else {
                        let span = self.current().span;
                        self.error(
                            DiagCode::ParseExpected,
                            span,
                            "expected ')' after 'print('",
                        );
                    }
                    value
                } else {
                    self.parse_unary()?
                };
                Some(Node::func(OpCode::Print, None, Some(value)))
            }

            // Built-in binary functions: `pow(a, b)` / `log(a, b)`.
            OpCode::Pow | OpCode::Log => {
                let text = token.lexeme(self.source).to_string();
                if self.current().kind != TokenKind::LParen {
                    let span = self.current().span;
                    self.error(
                        DiagCode::ParseExpected,
                        span,
                        format!("expected '(' after '{text}'"),
                    );
                    return None;
                }
                self.advance();
                let first = self.parse_expr()?;
                if self.current().is_keyword(OpCode::EnumSep) {
                    self.advance();
                } else {
                    let span = self.current().span;
                    self.error(
                        DiagCode::ParseExpected,
                        span,
                        format!("'{text}' takes two arguments"),
                    );
                }
                let second = self.parse_expr()?;
                if self.current().kind == TokenKind::RParen {
                    self.advance();
                } else {
                    let span = self.current().span;
                    self.error(
                        DiagCode::ParseExpected,
                        span,
                        format!("expected ')' after '{text}' arguments"),
                    );
                }
                Some(Node::func(op, Some(first), Some(second)))
            }

            _ => {
                let found = self.describe_current();
                self.error(
                    DiagCode::ParseExpected,
                    token.span,
                    format!("expected expression, found {found}"),
                );
                None
            }
        }
    }

    /// Parse `( args )` after a callee name and validate the call.
    ///
    /// `value_position` distinguishes a call used for its value (operand,
    /// argument, right-hand side) from a direct call statement; only the
    /// former rejects `proc` callees.
    pub(crate) fn parse_call_tail(
        &mut self,
        name: Ident,
        name_span: Span,
        value_position: bool,
    ) -> Option<Box<Node>> {
        if self.current().kind != TokenKind::LParen {
            let span = self.current().span;
            self.error(
                DiagCode::ParseExpected,
                span,
                "expected '(' after function name",
            );
            return None;
        }
        self.advance();

        let mut args = Vec::new();
        if self.current().kind != TokenKind::RParen {
            loop {
                let arg = self.parse_expr()?;
                args.push(arg);
                if self.current().is_keyword(OpCode::EnumSep) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if self.current().kind == TokenKind::RParen {
            self.advance();
        } else {
            let span = self.current().span;
            let found = self.describe_current();
            self.error(
                DiagCode::ParseExpected,
                span,
                format!("expected ')' after arguments, found {found}"),
            );
        }

        let name_text = self.pool[name].to_string();
        let argc = args.len();
        match self.func_table.get(&name).copied() {
            None => {
                self.error(
                    DiagCode::UndefFunction,
                    name_span,
                    format!("call to undefined function '{name_text}'"),
                );
            }
            Some(sig) => {
                if sig.arity != argc {
                    self.error(
                        DiagCode::ArgcMismatch,
                        name_span,
                        format!(
                            "'{name_text}' expects {} argument(s), got {argc}",
                            sig.arity
                        ),
                    );
                }
                if value_position && sig.kind == DeclKind::Proc {
                    self.error(
                        DiagCode::VoidInExpr,
                        name_span,
                        format!("'{name_text}' is a proc and produces no value"),
                    );
                }
            }
        }

        let info = Node::func(
            OpCode::FuncInfo,
            build_list(args, OpCode::EnumSep),
            Some(Node::ident(name)),
        );
        Some(Node::func(OpCode::Call, Some(info), None))
    }
}
