//! Source preprocessing (spec.md §4.6 "Source preprocessing", §9 "Open
//! questions: `//`-to-`--` conversion"): a language-agnostic text scanner
//! that tracks string/comment state and rewrites cart source before it
//! reaches the interpreter, the way the teacher's own text-munging passes
//! (e.g. `cartridge::text`'s section scanner) track quote/line state
//! rather than invoking a full lexer.
//!
//! Rewrites, only in code positions (never inside strings or comments):
//! - `!=` -> `~=` (the reference interpreter's inequality operator).
//! - A leading `?` at statement position -> `print`.
//! - `@addr` -> `peek(addr)`, `%addr` -> `peek2(addr)` (only when `%` is
//!   not acting as an infix modulo operator), `$addr` -> `peek4(addr)`.

/// Transforms cart source the way the reference console's loader does
/// before handing it to the interpreter.
pub struct Preprocessor;

impl Preprocessor {
    /// Runs every rewrite pass over `source` and returns the transformed
    /// text. Passes run in a single left-to-right scan so each rewritten
    /// span is itself treated as ordinary code for subsequent passes.
    pub fn process(source: &str) -> String {
        let mut scanner = Scanner::new(source);
        scanner.run()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    /// Single/double-quoted string; the char is the closing quote.
    StringLit(char),
    LineComment,
    /// Long bracket comment/string, `--[[ ... ]]` or `[[ ... ]]`.
    LongBracket,
}

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
    mode: Mode,
    out: String,
    /// True at the start of a logical statement: after `\n`, `;`, `then`,
    /// `do`, `else`, or the very start of the source. Used to decide
    /// whether a leading `?` means `print`.
    at_statement_start: bool,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        Scanner {
            bytes: source.as_bytes(),
            pos: 0,
            mode: Mode::Code,
            out: String::with_capacity(source.len()),
            at_statement_start: true,
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn starts_with(&self, needle: &str) -> bool {
        self.bytes[self.pos..].starts_with(needle.as_bytes())
    }

    fn run(mut self) -> String {
        while self.pos < self.bytes.len() {
            match self.mode {
                Mode::Code => self.step_code(),
                Mode::StringLit(quote) => self.step_string(quote),
                Mode::LineComment => self.step_line_comment(),
                Mode::LongBracket => self.step_long_bracket(),
            }
        }
        self.out
    }

    fn step_string(&mut self, quote: char) {
        let c = self.bytes[self.pos] as char;
        if c == '\\' {
            self.out.push(c);
            self.pos += 1;
            if let Some(next) = self.peek(0) {
                self.out.push(next as char);
                self.pos += 1;
            }
            return;
        }
        if c == quote {
            self.mode = Mode::Code;
        }
        self.out.push(c);
        self.pos += 1;
    }

    fn step_line_comment(&mut self) {
        let c = self.bytes[self.pos] as char;
        self.out.push(c);
        self.pos += 1;
        if c == '\n' {
            self.mode = Mode::Code;
            self.at_statement_start = true;
        }
    }

    fn step_long_bracket(&mut self) {
        if self.starts_with("]]") {
            self.out.push_str("]]");
            self.pos += 2;
            self.mode = Mode::Code;
            return;
        }
        self.out.push(self.bytes[self.pos] as char);
        self.pos += 1;
    }

    fn step_code(&mut self) {
        let c = self.bytes[self.pos] as char;

        if c == '"' || c == '\'' {
            self.out.push(c);
            self.pos += 1;
            self.mode = Mode::StringLit(c);
            self.at_statement_start = false;
            return;
        }

        if self.starts_with("--[[") {
            self.out.push_str("--[[");
            self.pos += 4;
            self.mode = Mode::LongBracket;
            return;
        }
        if self.starts_with("--") {
            self.out.push_str("--");
            self.pos += 2;
            self.mode = Mode::LineComment;
            return;
        }
        if self.starts_with("[[") {
            self.out.push_str("[[");
            self.pos += 2;
            self.mode = Mode::LongBracket;
            self.at_statement_start = false;
            return;
        }

        // `!=` -> `~=`.
        if c == '!' && self.peek(1) == Some(b'=') {
            self.out.push_str("~=");
            self.pos += 2;
            self.at_statement_start = false;
            return;
        }

        // A leading `?` at statement position -> `print`.
        if c == '?' && self.at_statement_start {
            self.out.push_str("print");
            self.pos += 1;
            self.at_statement_start = false;
            return;
        }

        // `@addr`/`%addr`/`$addr` -> `peek`/`peek2`/`peek4`, but only when
        // immediately followed by an address operand (identifier, hex, or
        // decimal token); `%` as infix modulo is otherwise left alone.
        if let Some(peek_fn) = sigil_peek_fn(c) {
            if let Some(operand_len) = address_operand_len(&self.bytes[self.pos + 1..]) {
                if c != '%' || !self.percent_is_sigil() {
                    let operand = std::str::from_utf8(&self.bytes[self.pos + 1..self.pos + 1 + operand_len])
                        .unwrap_or("");
                    self.out.push_str(peek_fn);
                    self.out.push('(');
                    self.out.push_str(operand);
                    self.out.push(')');
                    self.pos += 1 + operand_len;
                    self.at_statement_start = false;
                    return;
                }
            }
        }

        self.out.push(c);
        self.pos += 1;
        self.at_statement_start = match c {
            '\n' | ';' => true,
            _ => {
                if !c.is_whitespace() {
                    self.update_statement_start_for_keyword();
                }
                self.at_statement_start && c.is_whitespace()
            }
        };
    }

    /// `%` is only a sigil when it is NOT acting as an infix modulo: that
    /// is, when the previous non-whitespace emitted character is not an
    /// operand-ending token (identifier char, digit, `)`, `]`, `"`, `'`).
    fn percent_is_sigil(&self) -> bool {
        match self.out.trim_end().chars().last() {
            None => true,
            Some(prev) => !(prev.is_ascii_alphanumeric() || prev == '_' || prev == ')' || prev == ']'),
        }
    }

    /// Re-evaluates `at_statement_start` after emitting a keyword that
    /// opens a new statement block (`then`, `do`, `else`). Cheap lookback
    /// over the tail of `out` avoids a separate token buffer.
    fn update_statement_start_for_keyword(&mut self) {
        for kw in ["then", "do", "else"] {
            if self.out.ends_with(kw) {
                let before = self.out.len() - kw.len();
                let boundary_ok = before == 0
                    || !self.out.as_bytes()[before - 1].is_ascii_alphanumeric();
                if boundary_ok {
                    self.at_statement_start = true;
                    return;
                }
            }
        }
    }
}

fn sigil_peek_fn(c: char) -> Option<&'static str> {
    match c {
        '@' => Some("peek"),
        '%' => Some("peek2"),
        '$' => Some("peek4"),
        _ => None,
    }
}

/// Length, in bytes, of the "address operand" token immediately following
/// a sigil: an identifier, a `0x...` hex literal, or a decimal number.
/// Returns `None` if nothing address-shaped follows (leaves the sigil
/// untouched, e.g. trailing `%` at end of file).
fn address_operand_len(rest: &[u8]) -> Option<usize> {
    if rest.is_empty() {
        return None;
    }
    if rest.starts_with(b"0x") || rest.starts_with(b"0X") {
        let mut len = 2;
        while rest.get(len).map_or(false, |b| b.is_ascii_hexdigit()) {
            len += 1;
        }
        return if len > 2 { Some(len) } else { None };
    }
    if rest[0].is_ascii_digit() {
        let mut len = 0;
        while rest.get(len).map_or(false, |b| b.is_ascii_digit()) {
            len += 1;
        }
        return Some(len);
    }
    if rest[0].is_ascii_alphabetic() || rest[0] == b'_' {
        let mut len = 0;
        while rest.get(len).map_or(false, |&b| b.is_ascii_alphanumeric() || b == b'_') {
            len += 1;
        }
        return Some(len);
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rewrites_not_equal() {
        assert_eq!(Preprocessor::process("if a!=b then end"), "if a~=b then end");
    }

    #[test]
    fn leading_question_mark_becomes_print() {
        assert_eq!(Preprocessor::process("?\"hi\""), "print\"hi\"");
    }

    #[test]
    fn question_mark_mid_expression_is_untouched() {
        let src = "x=a?b";
        assert_eq!(Preprocessor::process(src), src);
    }

    #[test]
    fn at_sigil_becomes_peek_call() {
        assert_eq!(Preprocessor::process("x=@0x6000"), "x=peek(0x6000)");
    }

    #[test]
    fn dollar_sigil_becomes_peek4_call() {
        assert_eq!(Preprocessor::process("x=$addr"), "x=peek4(addr)");
    }

    #[test]
    fn percent_sigil_becomes_peek2_at_statement_position() {
        assert_eq!(Preprocessor::process("x=%16"), "x=peek2(16)");
    }

    #[test]
    fn percent_after_operand_is_left_as_modulo() {
        assert_eq!(Preprocessor::process("x=10%3"), "x=10%3");
    }

    #[test]
    fn sigils_ignored_inside_strings() {
        let src = "print(\"a!=b ?x @1\")";
        assert_eq!(Preprocessor::process(src), src);
    }

    #[test]
    fn sigils_ignored_inside_line_comments() {
        let src = "-- a!=b ?x\nx=1";
        assert_eq!(Preprocessor::process(src), src);
    }

    #[test]
    fn sigils_ignored_inside_long_comments() {
        let src = "--[[ a!=b ]]\nx=1";
        assert_eq!(Preprocessor::process(src), src);
    }

    #[test]
    fn question_mark_after_then_is_statement_start() {
        assert_eq!(Preprocessor::process("if x then ?1 end"), "if x then print1 end");
    }
}
