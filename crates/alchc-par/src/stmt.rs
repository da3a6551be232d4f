//! Statement parsing - blocks, control flow, declarations.

use crate::{build_list, FnCtx, Parser};
use alchc_ast::Node;
use alchc_lex::TokenKind;
use alchc_util::{DiagCode, OpCode};

impl<'a> Parser<'a> {
    /// Parse one statement; `None` means nothing to add to the list
    /// (a bare `;`, a rejected construct, or an error already synced past).
    pub(crate) fn parse_stmt(&mut self) -> Option<Box<Node>> {
        let token = self.current();
        match token.kind {
            TokenKind::Keyword(OpCode::If) => self.parse_if_stmt(),
            TokenKind::Keyword(OpCode::While) => self.parse_while_stmt(),
            TokenKind::Keyword(OpCode::Break) => self.parse_loop_jump(OpCode::Break, "break"),
            TokenKind::Keyword(OpCode::Continue) => {
                self.parse_loop_jump(OpCode::Continue, "continue")
            }
            TokenKind::Keyword(OpCode::Return) => self.parse_return_stmt(),
            TokenKind::Keyword(OpCode::Finish) => self.parse_finish_stmt(),
            TokenKind::Keyword(OpCode::Print) => self.parse_print_stmt(),
            TokenKind::Keyword(OpCode::VisStart) => {
                let block = self.parse_block();
                self.eat_semicolon_optional();
                Some(block)
            }
            // A bare ';' is a no-op.
            TokenKind::Keyword(OpCode::Lcat) => {
                self.advance();
                None
            }
            TokenKind::Keyword(OpCode::FuncDecl | OpCode::ProcDecl) => {
                self.error(
                    DiagCode::NestedDecl,
                    token.span,
                    "function declarations cannot nest",
                );
                let _ = self.parse_declaration();
                None
            }
            _ => self.parse_expr_stmt(),
        }
    }

    /// Block `{ stmt_list }` - a `VisStart(None, list)` node.
    ///
    /// The caller guarantees the cursor is on `{`. Opens a scope, which
    /// also drains pending parameters when this block is a function body.
    pub(crate) fn parse_block(&mut self) -> Box<Node> {
        self.advance(); // '{'
        self.scopes.enter_scope();

        let mut stmts = Vec::new();
        while !self.at_eof() && self.current().kind != TokenKind::RBrace {
            let before = self.pos;
            if let Some(stmt) = self.parse_stmt() {
                stmts.push(stmt);
            }
            if self.pos == before {
                self.advance();
            }
        }

        if self.current().kind == TokenKind::RBrace {
            self.advance();
        } else {
            let span = self.current().span;
            self.error(DiagCode::ParseExpected, span, "expected '}' to close block");
        }

        self.scopes.leave_scope();
        Node::func(OpCode::VisStart, None, build_list(stmts, OpCode::Lcat))
    }

    /// `if ( cond ) block` / `if cond block`
    ///
    /// The test is normalised to `Eq(cond, 1.0)`.
    fn parse_if_stmt(&mut self) -> Option<Box<Node>> {
        self.advance(); // 'if'
        let Some(cond) = self.parse_expr() else {
            self.sync();
            return None;
        };
        let test = Node::func(OpCode::Eq, Some(cond), Some(Node::constant(1.0)));
        let body = self.parse_required_block("'if' condition");
        self.eat_semicolon_optional();
        Some(Node::func(OpCode::If, Some(test), body))
    }

    /// `while ( cond ) block` / `while cond block`
    fn parse_while_stmt(&mut self) -> Option<Box<Node>> {
        self.advance(); // 'while'
        let Some(cond) = self.parse_expr() else {
            self.sync();
            return None;
        };
        self.while_depth += 1;
        let body = self.parse_required_block("'while' condition");
        self.while_depth -= 1;
        self.eat_semicolon_optional();
        Some(Node::func(OpCode::While, Some(cond), body))
    }

    fn parse_required_block(&mut self, after: &str) -> Option<Box<Node>> {
        if self.current().is_keyword(OpCode::VisStart) {
            Some(self.parse_block())
        } else {
            let span = self.current().span;
            let found = self.describe_current();
            self.error(
                DiagCode::ParseExpected,
                span,
                format!("expected '{{' after {after}, found {found}"),
            );
            None
        }
    }

    /// `break;` / `continue;` - only legal inside a `while` body.
    fn parse_loop_jump(&mut self, op: OpCode, text: &str) -> Option<Box<Node>> {
        let span = self.current().span;
        self.advance();
        if self.while_depth == 0 {
            self.error(
                DiagCode::BreakOutsideLoop,
                span,
                format!("'{text}' outside of a loop"),
            );
        }
        self.eat_semicolon_required();
        Some(Node::func(op, None, None))
    }

    /// `return expr;` - only legal inside a `func`, and the expression is
    /// mandatory.
    fn parse_return_stmt(&mut self) -> Option<Box<Node>> {
        let span = self.current().span;
        self.advance();
        if self.fn_ctx == FnCtx::Proc {
            self.error(
                DiagCode::ReturnInProc,
                span,
                "'return' is not allowed in a proc; use 'finish'",
            );
        }

        let value = match self.current().kind {
            TokenKind::Keyword(OpCode::Lcat) | TokenKind::RBrace | TokenKind::Eof => {
                let at = self.current().span;
                self.error(
                    DiagCode::ParseExpected,
                    at,
                    "expected expression after 'return'",
                );
                None
            }
            _ => {
                let value = self.parse_expr();
                if value.is_none() {
                    self.sync();
                }
                value
            }
        };
        self.eat_semicolon_required();
        Some(Node::func(OpCode::Return, None, value))
    }

    /// `finish;` - only legal inside a `proc`.
    fn parse_finish_stmt(&mut self) -> Option<Box<Node>> {
        let span = self.current().span;
        self.advance();
        if self.fn_ctx == FnCtx::Func {
            self.error(
                DiagCode::FinishInFunc,
                span,
                "'finish' is not allowed in a func; use 'return'",
            );
        }
        self.eat_semicolon_required();
        Some(Node::func(OpCode::Finish, None, None))
    }

    /// `print (expr);` - parentheses optional.
    fn parse_print_stmt(&mut self) -> Option<Box<Node>> {
        self.advance(); // 'print'
        let Some(value) = self.parse_expr() else {
            self.sync();
            return None;
        };
        self.eat_semicolon_required();
        Some(Node::func(OpCode::Print, None, Some(value)))
    }

    /// Expression statement: assignment, direct call, `call`, or a plain
    /// expression, terminated by `;`.
    fn parse_expr_stmt(&mut self) -> Option<Box<Node>> {
        // Direct call statement `name(args);` - statement position, so a
        // proc callee is fine here.
        if self.current().kind == TokenKind::Ident && self.peek(1).kind == TokenKind::LParen {
            let token = self.current();
            let name = self.pool.get_or_add(token.lexeme(self.source));
            self.advance();
            let Some(call) = self.parse_call_tail(name, token.span, false) else {
                self.sync();
                return None;
            };
            self.eat_semicolon_required();
            return Some(call);
        }

        // `call name(args);` statement form.
        if self.current().is_keyword(OpCode::Call) {
            self.advance();
            let name_token = self.current();
            if name_token.kind != TokenKind::Ident {
                let found = self.describe_current();
                self.error(
                    DiagCode::ParseExpected,
                    name_token.span,
                    format!("expected function name after 'call', found {found}"),
                );
                self.sync();
                return None;
            }
            let name = self.pool.get_or_add(name_token.lexeme(self.source));
            self.advance();
            let Some(call) = self.parse_call_tail(name, name_token.span, false) else {
                self.sync();
                return None;
            };
            self.eat_semicolon_required();
            return Some(call);
        }

        match self.parse_expr() {
            Some(expr) => {
                self.eat_semicolon_required();
                Some(expr)
            }
            None => {
                self.sync();
                None
            }
        }
    }

    /// `func name(params) { body }` / `proc name(params) { body }`
    ///
    /// Signatures were already harvested in pass 1; this builds the tree
    /// node and scopes the parameters into the body.
    pub(crate) fn parse_declaration(&mut self) -> Option<Box<Node>> {
        let decl_op = match self.current().kind {
            TokenKind::Keyword(op @ (OpCode::FuncDecl | OpCode::ProcDecl)) => op,
            _ => return None,
        };
        self.advance();

        let name_token = self.current();
        if name_token.kind != TokenKind::Ident {
            let found = self.describe_current();
            self.error(
                DiagCode::ParseExpected,
                name_token.span,
                format!("expected function name, found {found}"),
            );
            self.sync();
            return None;
        }
        let name = self.pool.get_or_add(name_token.lexeme(self.source));
        self.advance();

        // Parameters go to the pending buffer and enter scope with the body.
        let mut params = Vec::new();
        if self.current().kind == TokenKind::LParen {
            self.advance();
            while self.current().kind == TokenKind::Ident {
                let param_token = self.current();
                let param = self.pool.get_or_add(param_token.lexeme(self.source));
                self.scopes.push_pending_param(param);
                params.push(Node::ident(param));
                self.advance();
                if self.current().is_keyword(OpCode::EnumSep) {
                    self.advance();
                } else {
                    break;
                }
            }
            if self.current().kind == TokenKind::RParen {
                self.advance();
            } else {
                let span = self.current().span;
                self.error(
                    DiagCode::ParseExpected,
                    span,
                    "expected ')' to close parameter list",
                );
            }
        } else {
            let span = self.current().span;
            self.error(
                DiagCode::ParseExpected,
                span,
                "expected '(' after function name",
            );
        }

        let saved_ctx = self.fn_ctx;
        let saved_while = self.while_depth;
        self.fn_ctx = if decl_op == OpCode::FuncDecl {
            FnCtx::Func
        } else {
            FnCtx::Proc
        };
        self.while_depth = 0;

        let body = if self.current().is_keyword(OpCode::VisStart) {
            Some(self.parse_block())
        } else {
            self.scopes.clear_pending_params();
            let span = self.current().span;
            self.error(
                DiagCode::ParseExpected,
                span,
                "expected '{' to start function body",
            );
            None
        };

        self.fn_ctx = saved_ctx;
        self.while_depth = saved_while;
        self.eat_semicolon_optional();

        let info = Node::func(
            OpCode::FuncInfo,
            build_list(params, OpCode::EnumSep),
            Some(Node::ident(name)),
        );
        Some(Node::func(decl_op, Some(info), body))
    }
}
