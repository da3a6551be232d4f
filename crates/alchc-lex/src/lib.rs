//! alchc-lex - Lexer (Lexical Analyzer)
//!
//! Transforms Alchemist source bytes into a token stream. The tokenizer is
//! driven by the keyword table in `alchc-util`: longest match wins, ties go
//! to the longer surface pattern, and word-like patterns require
//! non-identifier neighbours. The human-language connectives `and` / `or`
//! are silently elided.
//!
//! Errors never abort the scan; they accumulate in the caller's
//! [`DiagSink`](alchc_util::DiagSink) and the stream still ends with `Eof`.

pub mod cursor;
pub mod lexer;
pub mod token;

pub use lexer::{tokenize, LexConfig, Lexer};
pub use token::{Token, TokenKind};
