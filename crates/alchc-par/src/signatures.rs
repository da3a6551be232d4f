//! Pass 1 - function signature harvest.
//!
//! Before building any tree, the parser sweeps the whole token stream for
//! `func` / `proc` declarations and records `(kind, arity)` per name. This
//! lets pass 2 validate calls to functions declared further down the file.
//!
//! Pass 1 is deliberately tolerant: it records redefinitions and unclosed
//! braces as diagnostics and keeps scanning; pass 2 uses whatever
//! signatures were collected even when pass 1 complained.

use alchc_lex::{Token, TokenKind};
use alchc_util::{DiagCode, DiagSink, Ident, IdentPool, OpCode, Stage};
use indexmap::IndexMap;

/// What a name was declared as
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclKind {
    /// `func` - returns a value
    Func,
    /// `proc` - returns nothing; called for effect
    Proc,
}

/// One collected signature
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FuncSig {
    pub kind: DeclKind,
    pub arity: usize,
}

/// The function signature table.
///
/// Insertion order is preserved: the backend's entry point falls back to
/// the first declared function when no `main` exists.
pub type FuncTable = IndexMap<Ident, FuncSig>;

/// Scan the token stream and populate `table`.
pub fn collect_signatures(
    source: &str,
    tokens: &[Token],
    pool: &mut IdentPool,
    table: &mut FuncTable,
    sink: &mut DiagSink,
) {
    let mut pos = 0;
    while pos < tokens.len() {
        let kind = match tokens[pos].kind {
            TokenKind::Keyword(OpCode::FuncDecl) => DeclKind::Func,
            TokenKind::Keyword(OpCode::ProcDecl) => DeclKind::Proc,
            _ => {
                pos += 1;
                continue;
            }
        };
        pos += 1;
        pos = harvest_declaration(source, tokens, pos, kind, pool, table, sink);
    }
}

/// Process one declaration starting just after its `func`/`proc` keyword;
/// returns the position to resume scanning from.
fn harvest_declaration(
    source: &str,
    tokens: &[Token],
    mut pos: usize,
    kind: DeclKind,
    pool: &mut IdentPool,
    table: &mut FuncTable,
    sink: &mut DiagSink,
) -> usize {
    match tokens.get(pos) {
        Some(token) if token.kind == TokenKind::Ident => {
            let name = pool.get_or_add(token.lexeme(source));
            let name_span = token.span;
            pos += 1;

            let (arity, next) = count_parameters(tokens, pos);
            pos = next;

            if table.contains_key(&name) {
                sink.error(
                    Stage::Parser,
                    DiagCode::RedefFunction,
                    name_span,
                    format!("redefinition of '{}'", &source[name_span.start..name_span.end]),
                );
            } else {
                table.insert(name, FuncSig { kind, arity });
            }
        }
        Some(token) => {
            sink.error(
                Stage::Parser,
                DiagCode::ParseExpected,
                token.span,
                "expected function name after declaration keyword",
            );
        }
        None => return pos,
    }

    // Skip the body by brace balancing.
    if let Some(token) = tokens.get(pos) {
        if token.is_keyword(OpCode::VisStart) {
            let open_span = token.span;
            pos += 1;
            let mut depth = 1usize;
            while depth > 0 {
                match tokens.get(pos).map(|t| t.kind) {
                    Some(TokenKind::Keyword(OpCode::VisStart)) => depth += 1,
                    Some(TokenKind::RBrace) => depth -= 1,
                    Some(TokenKind::Eof) | None => {
                        sink.error(
                            Stage::Parser,
                            DiagCode::ParseUnclosedBrace,
                            open_span,
                            "unclosed '{' in function body",
                        );
                        return pos;
                    }
                    _ => {}
                }
                pos += 1;
            }
        }
    }

    // Optional terminating ';'
    if let Some(token) = tokens.get(pos) {
        if token.is_keyword(OpCode::Lcat) {
            pos += 1;
        }
    }
    pos
}

/// Count parameters in `( identifier (, identifier)* )`; tolerant of junk.
fn count_parameters(tokens: &[Token], mut pos: usize) -> (usize, usize) {
    let mut arity = 0;
    match tokens.get(pos).map(|t| t.kind) {
        Some(TokenKind::LParen) => pos += 1,
        _ => return (0, pos),
    }
    loop {
        match tokens.get(pos).map(|t| t.kind) {
            Some(TokenKind::Ident) => {
                arity += 1;
                pos += 1;
            }
            Some(TokenKind::Keyword(OpCode::EnumSep)) => pos += 1,
            Some(TokenKind::RParen) => {
                pos += 1;
                break;
            }
            // Anything else inside the parens is pass 2's problem.
            _ => break,
        }
    }
    (arity, pos)
}
