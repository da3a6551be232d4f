//! Keyword table - opcodes and their surface syntax.
//!
//! Every operator, keyword, and AST pseudo-node of the Alchemist language
//! is identified by a small [`OpCode`] tag. The static [`KEYWORDS`] table
//! binds each opcode that has concrete syntax to its surface pattern; the
//! [`IGNORED_WORDS`] table lists surfaces the lexer elides without emitting
//! a token (the human-language connectives `and` / `or`).
//!
//! Surface patterns may contain runs of horizontal whitespace; such a run
//! matches any non-empty run of space/tab/CR (never LF) in the input.
//! Patterns whose outermost non-blank bytes are identifier characters are
//! *word-like* and only match when bounded by non-identifier neighbours.

use std::fmt;

/// Opcode - tag identifying a language operator, keyword, or AST pseudo-node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    // ------------------------------------------------------------------
    // Comparisons
    // ------------------------------------------------------------------
    /// `==`
    Eq,
    /// `!=`
    Neq,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `>`
    Gt,

    // ------------------------------------------------------------------
    // Logical connectives
    // ------------------------------------------------------------------
    /// `&&`
    And,
    /// `||`
    Or,

    // ------------------------------------------------------------------
    // Arithmetic
    // ------------------------------------------------------------------
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Mul,
    /// `/`
    Div,

    // ------------------------------------------------------------------
    // Built-in binary functions
    // ------------------------------------------------------------------
    /// `pow`
    Pow,
    /// `log`
    Log,

    /// `=` assignment (right-associative, lowest precedence)
    Assign,

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------
    /// `{` scope / block opener
    VisStart,
    /// `;` statement separator, spine of statement lists
    Lcat,
    /// `,` list separator, spine of argument lists
    EnumSep,

    // ------------------------------------------------------------------
    // Control flow
    // ------------------------------------------------------------------
    If,
    While,
    Break,
    Continue,
    /// `finish` - return from a `proc`
    Finish,
    Return,

    // ------------------------------------------------------------------
    // Declarations and calls
    // ------------------------------------------------------------------
    FuncDecl,
    ProcDecl,
    /// `call` explicit call keyword
    Call,

    // ------------------------------------------------------------------
    // Built-in unary functions
    // ------------------------------------------------------------------
    Print,
    Input,

    /// AST-only node wrapping a callee name and its parameter/argument list
    FuncInfo,
}

impl OpCode {
    /// The name this opcode uses in the AST text format
    pub fn tree_name(self) -> &'static str {
        match self {
            OpCode::Eq => "EQ",
            OpCode::Neq => "NEQ",
            OpCode::Le => "LE",
            OpCode::Ge => "GE",
            OpCode::Lt => "LT",
            OpCode::Gt => "GT",
            OpCode::And => "AND",
            OpCode::Or => "OR",
            OpCode::Plus => "ADD",
            OpCode::Minus => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Pow => "POW",
            OpCode::Log => "LOG",
            OpCode::Assign => "ASSIGN",
            OpCode::VisStart => "VIS_START",
            OpCode::Lcat => "LCAT",
            OpCode::EnumSep => "ENUM_SEP",
            OpCode::If => "IF",
            OpCode::While => "WHILE",
            OpCode::Break => "BREAK",
            OpCode::Continue => "CONTINUE",
            OpCode::Finish => "FINISH",
            OpCode::Return => "RETURN",
            OpCode::FuncDecl => "FUNC_DECL",
            OpCode::ProcDecl => "PROC_DECL",
            OpCode::Call => "CALL",
            OpCode::Print => "PRINT",
            OpCode::Input => "INPUT",
            OpCode::FuncInfo => "FUNC_INFO",
        }
    }

    /// Inverse of [`tree_name`](Self::tree_name)
    pub fn from_tree_name(name: &str) -> Option<Self> {
        ALL_OPCODES
            .iter()
            .copied()
            .find(|op| op.tree_name() == name)
    }

    /// Returns true for the comparison opcodes
    #[inline]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            OpCode::Eq | OpCode::Neq | OpCode::Le | OpCode::Ge | OpCode::Lt | OpCode::Gt
        )
    }

    /// Returns true for `+ - * /`
    #[inline]
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            OpCode::Plus | OpCode::Minus | OpCode::Mul | OpCode::Div
        )
    }

    /// Returns true for the keyword-flagged builtins (`print`, `input`,
    /// `pow`, `log`)
    #[inline]
    pub fn is_builtin(self) -> bool {
        matches!(
            self,
            OpCode::Print | OpCode::Input | OpCode::Pow | OpCode::Log
        )
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tree_name())
    }
}

/// Every opcode, for table-driven lookups
pub const ALL_OPCODES: &[OpCode] = &[
    OpCode::Eq,
    OpCode::Neq,
    OpCode::Le,
    OpCode::Ge,
    OpCode::Lt,
    OpCode::Gt,
    OpCode::And,
    OpCode::Or,
    OpCode::Plus,
    OpCode::Minus,
    OpCode::Mul,
    OpCode::Div,
    OpCode::Pow,
    OpCode::Log,
    OpCode::Assign,
    OpCode::VisStart,
    OpCode::Lcat,
    OpCode::EnumSep,
    OpCode::If,
    OpCode::While,
    OpCode::Break,
    OpCode::Continue,
    OpCode::Finish,
    OpCode::Return,
    OpCode::FuncDecl,
    OpCode::ProcDecl,
    OpCode::Call,
    OpCode::Print,
    OpCode::Input,
    OpCode::FuncInfo,
];

/// One row of the keyword / ignored-word tables
#[derive(Clone, Copy, Debug)]
pub struct KeywordInfo {
    /// Opcode produced when the surface matches
    pub op: OpCode,
    /// Surface pattern; horizontal-whitespace runs match any non-empty run
    /// of space/tab/CR
    pub surface: &'static str,
    /// Keyword-flagged builtin callable in argument form
    pub is_builtin: bool,
}

impl KeywordInfo {
    const fn new(op: OpCode, surface: &'static str) -> Self {
        Self {
            op,
            surface,
            is_builtin: false,
        }
    }

    const fn builtin(op: OpCode, surface: &'static str) -> Self {
        Self {
            op,
            surface,
            is_builtin: true,
        }
    }

    /// Word-like patterns require non-identifier neighbours in the source.
    ///
    /// A pattern is word-like when its first and last non-blank bytes are
    /// identifier characters (letter, digit, or underscore).
    pub fn is_word_like(&self) -> bool {
        let bytes = self.surface.as_bytes();
        let first = bytes.iter().find(|b| !is_blank(**b));
        let last = bytes.iter().rev().find(|b| !is_blank(**b));
        match (first, last) {
            (Some(&f), Some(&l)) => is_ident_byte(f) && is_ident_byte(l),
            _ => false,
        }
    }
}

#[inline]
fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t' || b == b'\r'
}

/// Identifier-continue byte: letter, digit, or underscore
#[inline]
pub fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Identifier-start byte: letter or underscore
#[inline]
pub fn is_ident_start_byte(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

/// The canonical keyword table
///
/// Matching is longest-match over the whole table; ties are broken by
/// longer surface pattern.
pub const KEYWORDS: &[KeywordInfo] = &[
    KeywordInfo::new(OpCode::Eq, "=="),
    KeywordInfo::new(OpCode::Neq, "!="),
    KeywordInfo::new(OpCode::Le, "<="),
    KeywordInfo::new(OpCode::Ge, ">="),
    KeywordInfo::new(OpCode::Lt, "<"),
    KeywordInfo::new(OpCode::Gt, ">"),
    KeywordInfo::new(OpCode::And, "&&"),
    KeywordInfo::new(OpCode::Or, "||"),
    KeywordInfo::new(OpCode::Plus, "+"),
    KeywordInfo::new(OpCode::Minus, "-"),
    KeywordInfo::new(OpCode::Mul, "*"),
    KeywordInfo::new(OpCode::Div, "/"),
    KeywordInfo::builtin(OpCode::Pow, "pow"),
    KeywordInfo::builtin(OpCode::Log, "log"),
    KeywordInfo::new(OpCode::Assign, "="),
    KeywordInfo::new(OpCode::VisStart, "{"),
    KeywordInfo::new(OpCode::Lcat, ";"),
    KeywordInfo::new(OpCode::EnumSep, ","),
    KeywordInfo::new(OpCode::If, "if"),
    KeywordInfo::new(OpCode::While, "while"),
    KeywordInfo::new(OpCode::Break, "break"),
    KeywordInfo::new(OpCode::Continue, "continue"),
    KeywordInfo::new(OpCode::Finish, "finish"),
    KeywordInfo::new(OpCode::Return, "return"),
    KeywordInfo::new(OpCode::FuncDecl, "func"),
    KeywordInfo::new(OpCode::ProcDecl, "proc"),
    KeywordInfo::new(OpCode::Call, "call"),
    KeywordInfo::builtin(OpCode::Print, "print"),
    KeywordInfo::builtin(OpCode::Input, "input"),
];

/// Surfaces the lexer silently elides
///
/// `and` / `or` exist only as human-language connectives; matching them
/// produces no token at all.
pub const IGNORED_WORDS: &[KeywordInfo] = &[
    KeywordInfo::new(OpCode::And, "and"),
    KeywordInfo::new(OpCode::Or, "or"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_name_roundtrip() {
        for &op in ALL_OPCODES {
            assert_eq!(OpCode::from_tree_name(op.tree_name()), Some(op));
        }
    }

    #[test]
    fn test_from_tree_name_unknown() {
        assert_eq!(OpCode::from_tree_name("BOGUS"), None);
        assert_eq!(OpCode::from_tree_name(""), None);
    }

    #[test]
    fn test_arithmetic_tree_names() {
        assert_eq!(OpCode::Plus.tree_name(), "ADD");
        assert_eq!(OpCode::Minus.tree_name(), "SUB");
        assert_eq!(OpCode::Mul.tree_name(), "MUL");
        assert_eq!(OpCode::Div.tree_name(), "DIV");
    }

    #[test]
    fn test_word_like_classification() {
        let func = KEYWORDS.iter().find(|k| k.surface == "func").unwrap();
        assert!(func.is_word_like());

        let eq = KEYWORDS.iter().find(|k| k.surface == "==").unwrap();
        assert!(!eq.is_word_like());

        let brace = KEYWORDS.iter().find(|k| k.surface == "{").unwrap();
        assert!(!brace.is_word_like());
    }

    #[test]
    fn test_builtin_flags() {
        for k in KEYWORDS {
            assert_eq!(k.is_builtin, k.op.is_builtin(), "surface {:?}", k.surface);
        }
    }

    #[test]
    fn test_func_info_has_no_surface() {
        assert!(KEYWORDS.iter().all(|k| k.op != OpCode::FuncInfo));
    }

    #[test]
    fn test_ignored_words() {
        let surfaces: Vec<_> = IGNORED_WORDS.iter().map(|k| k.surface).collect();
        assert_eq!(surfaces, vec!["and", "or"]);
        assert!(IGNORED_WORDS.iter().all(|k| k.is_word_like()));
    }
}
