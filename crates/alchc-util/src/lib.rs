//! alchc-util - Core Utilities and Foundation Types
//!
//! Foundation crate for the Alchemist compiler: the types every phase
//! shares and nothing phase-specific.
//!
//! - [`Span`] - source locations (byte offsets + line/column)
//! - [`Ident`] / [`IdentPool`] - append-only identifier interning
//! - [`OpCode`] and the keyword tables - the language's operator surface
//! - [`DiagSink`] - accumulating diagnostics with caret rendering
//!
//! The pipeline is single-threaded: passes run to completion one after
//! another and communicate only through the syntax tree, the function
//! signature table, and the diagnostic sink. Nothing in this crate locks.

pub mod diagnostic;
pub mod interner;
pub mod keywords;
pub mod span;

pub use diagnostic::{render_diagnostic, DiagCode, DiagSink, Diagnostic, Stage};
pub use interner::{Ident, IdentPool};
pub use keywords::{
    is_ident_byte, is_ident_start_byte, KeywordInfo, OpCode, ALL_OPCODES, IGNORED_WORDS, KEYWORDS,
};
pub use span::Span;

// Re-export commonly used hash types
pub use rustc_hash::FxHashMap;
pub use rustc_hash::FxHashSet;
