//! AST text format - serializer and reader.
//!
//! Each node serialises as a parenthesised value with its children:
//!
//! - `(VALUE)` - leaf
//! - `(VALUE CHILD)` - unary form; the sole child is the *right* child
//! - `(VALUE LEFT, RIGHT)` - two children, an absent side written `()`
//!
//! Function values print their AST name (`ADD`, `VIS_START`, ...),
//! identifiers print quoted, constants print with `%.17g` semantics so a
//! diagnostic-free tree survives serialize -> parse -> serialize
//! byte-for-byte. The reader accepts the same grammar plus insignificant
//! whitespace; empty input and `()` give the empty tree.

use crate::node::{Node, NodeValue};
use crate::tree::Tree;
use alchc_util::OpCode;
use std::fmt::Write as _;
use thiserror::Error;

/// Error type for reading the AST text format
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeTextError {
    /// Input ended inside a node
    #[error("unexpected end of input")]
    UnexpectedEnd,

    /// Something other than `(` where a node must start
    #[error("expected '(' at byte {0}")]
    ExpectedOpenParen(usize),

    /// A node without its closing `)`
    #[error("expected ')' at byte {0}")]
    ExpectedCloseParen(usize),

    /// A value that is no AST name, number, or quoted identifier
    #[error("unknown value '{text}' at byte {at}")]
    UnknownValue { at: usize, text: String },

    /// An unterminated quoted identifier
    #[error("unterminated identifier at byte {0}")]
    UnterminatedIdent(usize),

    /// Bytes left over after the root node
    #[error("trailing input at byte {0}")]
    TrailingInput(usize),
}

/// Serialize a tree to its text form
pub fn serialize_tree(tree: &Tree) -> String {
    let mut out = String::new();
    match tree.root.as_deref() {
        Some(root) => write_node(&mut out, root, tree),
        None => out.push_str("()"),
    }
    out
}

fn write_node(out: &mut String, node: &Node, tree: &Tree) {
    out.push('(');
    match node.value {
        NodeValue::Constant(v) => out.push_str(&format_constant(v)),
        NodeValue::Ident(id) => {
            let name = tree.pool.get(id).unwrap_or("");
            let _ = write!(out, "\"{}\"", name);
        }
        NodeValue::Function(op) => out.push_str(op.tree_name()),
    }
    match (node.left.as_deref(), node.right.as_deref()) {
        (None, None) => {}
        (None, Some(right)) => {
            out.push(' ');
            write_node(out, right, tree);
        }
        (Some(left), None) => {
            out.push(' ');
            write_node(out, left, tree);
            out.push_str(", ()");
        }
        (Some(left), Some(right)) => {
            out.push(' ');
            write_node(out, left, tree);
            out.push_str(", ");
            write_node(out, right, tree);
        }
    }
    out.push(')');
}

/// Format a constant with `%.17g` semantics.
///
/// 17 significant digits round-trip every f64; trailing zeros and a bare
/// decimal point are trimmed, and the scientific form only appears for
/// exponents outside `[-4, 17)`.
pub fn format_constant(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    let sci = format!("{:.16e}", x);
    let Some(e_pos) = sci.find('e') else {
        return sci;
    };
    let exp: i32 = sci[e_pos + 1..].parse().unwrap_or(0);

    if exp < -4 || exp >= 17 {
        let mantissa = trim_fraction(&sci[..e_pos]);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        let decimals = (16 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, x))
    }
}

fn trim_fraction(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

/// Parse a tree from its text form
pub fn parse_tree(text: &str) -> Result<Tree, TreeTextError> {
    let mut tree = Tree::new();
    let mut reader = Reader {
        bytes: text.as_bytes(),
        pos: 0,
    };

    reader.skip_ws();
    if reader.at_end() {
        return Ok(tree);
    }

    let root = reader.parse_node(&mut tree)?;
    reader.skip_ws();
    if !reader.at_end() {
        return Err(TreeTextError::TrailingInput(reader.pos));
    }

    tree.set_root(root);
    Ok(tree)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), TreeTextError> {
        match self.peek() {
            Some(b) if b == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(_) if byte == b'(' => Err(TreeTextError::ExpectedOpenParen(self.pos)),
            Some(_) => Err(TreeTextError::ExpectedCloseParen(self.pos)),
            None => Err(TreeTextError::UnexpectedEnd),
        }
    }

    /// Parse one node; `()` is the absent child.
    fn parse_node(&mut self, tree: &mut Tree) -> Result<Option<Box<Node>>, TreeTextError> {
        self.skip_ws();
        self.expect(b'(')?;
        self.skip_ws();

        if self.peek() == Some(b')') {
            self.pos += 1;
            return Ok(None);
        }

        let value = self.parse_value(tree)?;
        self.skip_ws();

        let (left, right) = if self.peek() == Some(b')') {
            (None, None)
        } else {
            let first = self.parse_node(tree)?;
            self.skip_ws();
            if self.peek() == Some(b',') {
                self.pos += 1;
                let second = self.parse_node(tree)?;
                self.skip_ws();
                (first, second)
            } else {
                (None, first)
            }
        };

        self.expect(b')')?;
        Ok(Some(Box::new(Node { value, left, right })))
    }

    fn parse_value(&mut self, tree: &mut Tree) -> Result<NodeValue, TreeTextError> {
        if self.peek() == Some(b'"') {
            let start = self.pos;
            self.pos += 1;
            let name_start = self.pos;
            while let Some(b) = self.peek() {
                if b == b'"' {
                    let name = std::str::from_utf8(&self.bytes[name_start..self.pos])
                        .map_err(|_| TreeTextError::UnterminatedIdent(start))?;
                    let id = tree.pool.get_or_add(name);
                    self.pos += 1;
                    return Ok(NodeValue::Ident(id));
                }
                self.pos += 1;
            }
            return Err(TreeTextError::UnterminatedIdent(start));
        }

        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() || b == b'(' || b == b')' || b == b',' {
                break;
            }
            self.pos += 1;
        }
        if start == self.pos {
            return Err(TreeTextError::UnknownValue {
                at: start,
                text: String::new(),
            });
        }

        let text = std::str::from_utf8(&self.bytes[start..self.pos]).map_err(|_| {
            TreeTextError::UnknownValue {
                at: start,
                text: String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned(),
            }
        })?;

        if let Some(op) = OpCode::from_tree_name(text) {
            return Ok(NodeValue::Function(op));
        }
        if let Ok(number) = text.parse::<f64>() {
            return Ok(NodeValue::Constant(number));
        }
        Err(TreeTextError::UnknownValue {
            at: start,
            text: text.to_string(),
        })
    }
}

impl Tree {
    /// Serialize to the text format
    pub fn to_text(&self) -> String {
        serialize_tree(self)
    }

    /// Parse from the text format
    pub fn from_text(text: &str) -> Result<Tree, TreeTextError> {
        parse_tree(text)
    }
}
