//! alchc-ast - Syntax Tree
//!
//! The binary abstract syntax tree shared by the parser, midend, and
//! backend, together with the identifier pool it owns and the textual
//! (de)serializer the pipeline uses to hand trees between stages.
//!
//! # Tree shape
//!
//! Nodes are a discriminated union over `{Constant, Ident, Function}`;
//! opcodes on `Function` nodes are the second discriminator. Sequences are
//! right-leaning spines:
//!
//! ```text
//! x = 1; return x;        LCAT
//!                        /    \
//!                   ASSIGN    RETURN
//!                   /    \         \
//!                 "x"    1         "x"
//! ```

pub mod node;
pub mod text;
pub mod tree;

pub use node::{count_nodes, Node, NodeValue};
pub use text::{format_constant, parse_tree, serialize_tree, TreeTextError};
pub use tree::Tree;
