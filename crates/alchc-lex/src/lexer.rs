//! Main lexer implementation for the Alchemist language.
//!
//! The tokenizer is keyword-table driven: operators and keywords live in
//! the [`KEYWORDS`](alchc_util::KEYWORDS) table and matching is
//! longest-match with ties broken by longer surface pattern. At each
//! non-trivia position the dispatch order is:
//!
//! 1. longest match against the ignored-word table (matches are elided)
//! 2. `(` / `)` / `}` delimiters
//! 3. numeric literal (leading digit, or `.` followed by a digit)
//! 4. longest match against the keyword table
//! 5. identifier
//! 6. `unknown symbol` diagnostic, advance one byte
//!
//! Lexical errors never abort: they become diagnostics and scanning
//! continues. The token stream always ends with exactly one `Eof`.

use alchc_util::{
    is_ident_byte, is_ident_start_byte, DiagCode, DiagSink, KeywordInfo, Span, Stage,
    IGNORED_WORDS, KEYWORDS,
};

use crate::cursor::Cursor;
use crate::token::{Token, TokenKind};

/// Lexer configuration: the keyword and ignored-word tables
///
/// The default configuration is the canonical language table; tests swap
/// in reduced tables to exercise the matcher in isolation.
pub struct LexConfig {
    pub keywords: &'static [KeywordInfo],
    pub ignored_words: &'static [KeywordInfo],
}

impl Default for LexConfig {
    fn default() -> Self {
        Self {
            keywords: KEYWORDS,
            ignored_words: IGNORED_WORDS,
        }
    }
}

/// Tokenize a whole source buffer.
///
/// Consumes the full byte slice and always emits a terminal `Eof` token.
/// Lexical errors become diagnostics in `sink`.
///
/// # Example
///
/// ```
/// use alchc_lex::{tokenize, LexConfig, TokenKind};
/// use alchc_util::DiagSink;
///
/// let mut sink = DiagSink::new();
/// let tokens = tokenize("x = 1;", &LexConfig::default(), &mut sink);
///
/// assert!(sink.is_empty());
/// assert_eq!(tokens.len(), 5); // ident, =, number, ;, eof
/// assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
/// ```
pub fn tokenize(source: &str, config: &LexConfig, sink: &mut DiagSink) -> Vec<Token> {
    let mut lexer = Lexer::new(source, config);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token(sink);
        let is_eof = token.is_eof();
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    tokens
}

/// The tokenizer state: a cursor plus the start of the token in flight
pub struct Lexer<'a> {
    source: &'a str,
    cursor: Cursor<'a>,
    config: &'a LexConfig,
    token_start: usize,
    token_line: u32,
    token_column: u32,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer over the given source.
    pub fn new(source: &'a str, config: &'a LexConfig) -> Self {
        Self {
            source,
            cursor: Cursor::new(source),
            config,
            token_start: 0,
            token_line: 1,
            token_column: 1,
        }
    }

    /// Returns the next token, pushing any lexical errors into `sink`.
    pub fn next_token(&mut self, sink: &mut DiagSink) -> Token {
        loop {
            self.skip_trivia(sink);

            self.token_start = self.cursor.position();
            self.token_line = self.cursor.line();
            self.token_column = self.cursor.column();

            if self.cursor.is_at_end() {
                return self.make(TokenKind::Eof);
            }

            // Ignored words produce no token at all.
            if let Some((len, _)) = self.match_table(self.config.ignored_words) {
                self.cursor.advance_by(len);
                continue;
            }

            match self.cursor.current() {
                b'(' => {
                    self.cursor.advance();
                    return self.make(TokenKind::LParen);
                }
                b')' => {
                    self.cursor.advance();
                    return self.make(TokenKind::RParen);
                }
                b'}' => {
                    self.cursor.advance();
                    return self.make(TokenKind::RBrace);
                }
                _ => {}
            }

            let b = self.cursor.current();
            if b.is_ascii_digit() || (b == b'.' && self.cursor.peek(1).is_ascii_digit()) {
                let kind = self.lex_number(sink);
                return self.make(kind);
            }

            if let Some((len, kw)) = self.match_table(self.config.keywords) {
                let op = kw.op;
                self.cursor.advance_by(len);
                return self.make(TokenKind::Keyword(op));
            }

            if is_ident_start_byte(b) {
                while is_ident_byte(self.cursor.current()) {
                    self.cursor.advance();
                }
                return self.make(TokenKind::Ident);
            }

            sink.error(
                Stage::Lexer,
                DiagCode::LexUnknownSymbol,
                Span::point(self.token_start, self.token_line, self.token_column),
                format!("unknown symbol {}", describe_byte(b)),
            );
            self.cursor.advance();
        }
    }

    fn make(&self, kind: TokenKind) -> Token {
        Token {
            kind,
            span: Span::new(
                self.token_start,
                self.cursor.position(),
                self.token_line,
                self.token_column,
            ),
        }
    }

    /// Skips whitespace, line comments, and block comments until no more
    /// trivia is consumed.
    fn skip_trivia(&mut self, sink: &mut DiagSink) {
        loop {
            let before = self.cursor.position();

            while is_space_byte(self.cursor.current()) {
                self.cursor.advance();
            }

            if self.cursor.current() == b'/' && self.cursor.peek(1) == b'/' {
                while !self.cursor.is_at_end() && self.cursor.current() != b'\n' {
                    self.cursor.advance();
                }
                if !self.cursor.is_at_end() {
                    self.cursor.advance(); // the LF
                }
            }

            if self.cursor.current() == b'/' && self.cursor.peek(1) == b'*' {
                let start = self.cursor.position();
                let line = self.cursor.line();
                let column = self.cursor.column();
                self.cursor.advance_by(2);
                loop {
                    if self.cursor.is_at_end() {
                        sink.error(
                            Stage::Lexer,
                            DiagCode::LexUnterminatedComment,
                            Span::new(start, start + 2, line, column),
                            "unterminated block comment",
                        );
                        break;
                    }
                    if self.cursor.current() == b'*' && self.cursor.peek(1) == b'/' {
                        self.cursor.advance_by(2);
                        break;
                    }
                    self.cursor.advance();
                }
            }

            if self.cursor.position() == before {
                break;
            }
        }
    }

    /// Longest match of the current position against a keyword table.
    ///
    /// Ties are broken by longer surface pattern length.
    fn match_table(&self, table: &'a [KeywordInfo]) -> Option<(usize, &'a KeywordInfo)> {
        let bytes = self.source.as_bytes();
        let start = self.cursor.position();
        let mut best: Option<(usize, &KeywordInfo)> = None;
        for kw in table {
            if let Some(len) = match_surface(bytes, start, kw) {
                let better = match best {
                    None => true,
                    Some((best_len, best_kw)) => {
                        len > best_len
                            || (len == best_len && kw.surface.len() > best_kw.surface.len())
                    }
                };
                if better {
                    best = Some((len, kw));
                }
            }
        }
        best
    }

    /// Lexes a numeric literal: `digits ('.' digits?)? ([eE] [+-]? digits)?`.
    ///
    /// The exponent is only consumed when it has trailing digits; otherwise
    /// the scanner backs up to just before the `e`/`E`, so `1e` lexes as
    /// the number `1` followed by the identifier `e`.
    fn lex_number(&mut self, sink: &mut DiagSink) -> TokenKind {
        while self.cursor.current().is_ascii_digit() {
            self.cursor.advance();
        }

        if self.cursor.current() == b'.' {
            self.cursor.advance();
            while self.cursor.current().is_ascii_digit() {
                self.cursor.advance();
            }
        }

        if matches!(self.cursor.current(), b'e' | b'E') {
            let mark = self.cursor.mark();
            self.cursor.advance();
            if matches!(self.cursor.current(), b'+' | b'-') {
                self.cursor.advance();
            }
            if self.cursor.current().is_ascii_digit() {
                while self.cursor.current().is_ascii_digit() {
                    self.cursor.advance();
                }
            } else {
                self.cursor.reset(mark);
            }
        }

        let text = &self.source[self.token_start..self.cursor.position()];
        match text.parse::<f64>() {
            Ok(value) => TokenKind::Number(value),
            Err(_) => {
                sink.error(
                    Stage::Lexer,
                    DiagCode::LexBadNumber,
                    Span::new(
                        self.token_start,
                        self.cursor.position(),
                        self.token_line,
                        self.token_column,
                    ),
                    format!("malformed number '{text}'"),
                );
                TokenKind::Number(0.0)
            }
        }
    }
}

/// Match one surface pattern at `start`, returning the consumed length.
///
/// Horizontal-whitespace runs in the pattern match any non-empty run of
/// space/tab/CR (never LF) in the input. Word-like patterns require
/// non-identifier neighbours on both sides.
fn match_surface(bytes: &[u8], start: usize, kw: &KeywordInfo) -> Option<usize> {
    let pat = kw.surface.as_bytes();
    let mut src = start;
    let mut p = 0;

    while p < pat.len() {
        if is_hblank(pat[p]) {
            while p < pat.len() && is_hblank(pat[p]) {
                p += 1;
            }
            let run_start = src;
            while src < bytes.len() && is_hblank(bytes[src]) {
                src += 1;
            }
            if src == run_start {
                return None;
            }
        } else {
            if src >= bytes.len() || bytes[src] != pat[p] {
                return None;
            }
            src += 1;
            p += 1;
        }
    }

    if kw.is_word_like() {
        if start > 0 && is_ident_byte(bytes[start - 1]) {
            return None;
        }
        if src < bytes.len() && is_ident_byte(bytes[src]) {
            return None;
        }
    }

    Some(src - start)
}

/// Unicode-unaware isspace: space, tab, LF, VT, FF, CR
#[inline]
fn is_space_byte(b: u8) -> bool {
    b == 0x0b || b.is_ascii_whitespace()
}

#[inline]
fn is_hblank(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r')
}

fn describe_byte(b: u8) -> String {
    if b.is_ascii_graphic() {
        format!("'{}'", b as char)
    } else {
        format!("0x{b:02x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alchc_util::OpCode;

    fn lex(source: &str) -> (Vec<Token>, DiagSink) {
        let mut sink = DiagSink::new();
        let tokens = tokenize(source, &LexConfig::default(), &mut sink);
        (tokens, sink)
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_empty_input() {
        let (tokens, sink) = lex("");
        assert_eq!(kinds(&tokens), vec![TokenKind::Eof]);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_expression_statement() {
        let (tokens, sink) = lex("1+2;");
        assert!(sink.is_empty());
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Keyword(OpCode::Plus),
                TokenKind::Number(2.0),
                TokenKind::Keyword(OpCode::Lcat),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_number_forms() {
        let (tokens, sink) = lex(".5 5. 1e+3 2.5e-3");
        assert!(sink.is_empty());
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Number(0.5),
                TokenKind::Number(5.0),
                TokenKind::Number(1000.0),
                TokenKind::Number(0.0025),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_exponent_backup() {
        // `1e` backs up: Number 1 followed by Ident e.
        let (tokens, sink) = lex("1e");
        assert!(sink.is_empty());
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Number(1.0), TokenKind::Ident, TokenKind::Eof]
        );
        assert_eq!(tokens[1].lexeme("1e"), "e");
    }

    #[test]
    fn test_exponent_backup_with_sign() {
        let (tokens, _) = lex("1e+");
        assert_eq!(tokens[0].kind, TokenKind::Number(1.0));
        // `e` is an identifier, `+` a keyword
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!(tokens[2].kind, TokenKind::Keyword(OpCode::Plus));
    }

    #[test]
    fn test_ignored_words_elided() {
        let (tokens, sink) = lex("1 and 2 or 3");
        assert!(sink.is_empty());
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Number(2.0),
                TokenKind::Number(3.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_logical_operators_kept() {
        let (tokens, sink) = lex("a && b || c");
        assert!(sink.is_empty());
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Ident,
                TokenKind::Keyword(OpCode::And),
                TokenKind::Ident,
                TokenKind::Keyword(OpCode::Or),
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_longest_match_relational() {
        let (tokens, _) = lex("a <= b < c");
        assert_eq!(tokens[1].kind, TokenKind::Keyword(OpCode::Le));
        assert_eq!(tokens[3].kind, TokenKind::Keyword(OpCode::Lt));
    }

    #[test]
    fn test_assign_vs_eq() {
        let (tokens, _) = lex("a == b = c");
        assert_eq!(tokens[1].kind, TokenKind::Keyword(OpCode::Eq));
        assert_eq!(tokens[3].kind, TokenKind::Keyword(OpCode::Assign));
    }

    #[test]
    fn test_word_like_boundary() {
        // `funcx` must not match the `func` keyword.
        let (tokens, _) = lex("funcx func");
        assert_eq!(tokens[0].kind, TokenKind::Ident);
        assert_eq!(tokens[0].lexeme("funcx func"), "funcx");
        assert_eq!(tokens[1].kind, TokenKind::Keyword(OpCode::FuncDecl));
    }

    #[test]
    fn test_word_like_boundary_ignored_words() {
        // `android` must not trigger the `and` elision.
        let (tokens, _) = lex("android");
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn test_braces() {
        let (tokens, _) = lex("{ }");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Keyword(OpCode::VisStart),
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_line_comment() {
        let (tokens, sink) = lex("// comment\n42");
        assert!(sink.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Number(42.0));
        assert_eq!(tokens[0].span.line, 2);
        assert_eq!(tokens[0].span.column, 1);
    }

    #[test]
    fn test_block_comment() {
        let (tokens, sink) = lex("1 /* skip\nme */ 2");
        assert!(sink.is_empty());
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Number(1.0), TokenKind::Number(2.0), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_block_comment() {
        let (tokens, sink) = lex("/* unterminated");
        assert_eq!(kinds(&tokens), vec![TokenKind::Eof]);
        assert_eq!(sink.len(), 1);
        let diag = &sink.diagnostics()[0];
        assert_eq!(diag.code, DiagCode::LexUnterminatedComment);
        assert_eq!(diag.span.start, 0);
        assert_eq!(diag.span.len(), 2);
        assert_eq!(diag.span.line, 1);
        assert_eq!(diag.span.column, 1);
    }

    #[test]
    fn test_unknown_symbol() {
        let (tokens, sink) = lex("@");
        assert_eq!(kinds(&tokens), vec![TokenKind::Eof]);
        assert_eq!(sink.len(), 1);
        let diag = &sink.diagnostics()[0];
        assert_eq!(diag.code, DiagCode::LexUnknownSymbol);
        assert_eq!(diag.span.len(), 1);
    }

    #[test]
    fn test_unknown_symbols_do_not_stop_scanning() {
        let (tokens, sink) = lex("@ 1 @ 2");
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Number(1.0), TokenKind::Number(2.0), TokenKind::Eof]
        );
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_positions() {
        let (tokens, _) = lex("a = 1;\n\tb = 2;");
        // a
        assert_eq!((tokens[0].span.line, tokens[0].span.column), (1, 1));
        // b: after a tab, which advances the column by exactly one
        let b = tokens.iter().find(|t| t.lexeme("a = 1;\n\tb = 2;") == "b").unwrap();
        assert_eq!((b.span.line, b.span.column), (2, 2));
    }

    #[test]
    fn test_declaration_header() {
        let src = "func main(a, b)";
        let (tokens, sink) = lex(src);
        assert!(sink.is_empty());
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Keyword(OpCode::FuncDecl),
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::Ident,
                TokenKind::Keyword(OpCode::EnumSep),
                TokenKind::Ident,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[1].lexeme(src), "main");
    }

    #[test]
    fn test_tokens_partition_source() {
        let src = "func f(x) { x = x + 1; /* c */ return x; }";
        let (tokens, sink) = lex(src);
        assert!(sink.is_empty());
        let mut prev_end = 0;
        for token in &tokens {
            assert!(token.span.start >= prev_end, "overlapping spans");
            assert_eq!(token.lexeme(src), &src[token.span.start..token.span.end]);
            prev_end = token.span.end;
        }
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Token spans are ordered, non-overlapping, and in bounds, and the
        /// stream ends with exactly one Eof, for arbitrary printable input.
        #[test]
        fn tokens_partition_arbitrary_input(src in "[ -~\n\t]{0,200}") {
            let mut sink = DiagSink::new();
            let tokens = tokenize(&src, &LexConfig::default(), &mut sink);

            prop_assert!(!tokens.is_empty());
            prop_assert!(tokens.last().unwrap().is_eof());
            prop_assert_eq!(tokens.iter().filter(|t| t.is_eof()).count(), 1);

            let mut prev_end = 0;
            for token in &tokens {
                prop_assert!(token.span.start >= prev_end);
                prop_assert!(token.span.end <= src.len());
                prev_end = token.span.end;
            }
        }

        /// Line/column arithmetic: line is 1 + LFs before the offset and
        /// column counts code units since the last LF.
        #[test]
        fn line_column_arithmetic(src in "[ -~\n\t]{0,200}") {
            let mut sink = DiagSink::new();
            let tokens = tokenize(&src, &LexConfig::default(), &mut sink);

            for token in &tokens {
                let before = &src.as_bytes()[..token.span.start];
                let line = 1 + before.iter().filter(|&&b| b == b'\n').count() as u32;
                let last_lf = before.iter().rposition(|&b| b == b'\n');
                let column = match last_lf {
                    Some(i) => token.span.start - i,
                    None => token.span.start + 1,
                } as u32;
                prop_assert_eq!(token.span.line, line);
                prop_assert_eq!(token.span.column, column);
            }
        }
    }
}
