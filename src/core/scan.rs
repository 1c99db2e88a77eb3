//! Rewindable byte-span tokenizer.
//!
//! The evaluator walks tokens directly, so the scanner doubles as the
//! program representation: loop bodies and function bodies are kept as
//! saved scan states and re-scanned on every execution. A save is a plain
//! `Clone` (the source buffer is shared behind an `Rc`), restore is an
//! assignment, and `slice` narrows a clone to the span between two states.

use std::rc::Rc;

use crate::core::number::{self, Num};

const FLAG_EOF: u8 = 0x01;
const FLAG_INVALID: u8 = 0x02;

const INVALID_CHAR: u8 = 255;

// Token flag bits, layered over the base punctuation byte.
const F_EQ: u16 = 1 << 8;
const F_DOUBLE: u16 = 1 << 9;
const F_TRIPLE: u16 = 1 << 10;
const F_STRICT: u16 = 1 << 11;

/// A token type: small named integers for keywords and literals, the raw
/// byte for single-char punctuation, and flag bits composing the
/// multi-char operators (`+=` is `'+' | EQ`, `===` is `'=' | DOUBLE |
/// STRICT`, `>>>=` is `'>' | DOUBLE | TRIPLE | EQ`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tok(pub(crate) u16);

impl Tok {
    pub const NONE: Tok = Tok(0);
    pub const ID: Tok = Tok(1);
    pub const NUM: Tok = Tok(2);
    pub const EOF: Tok = Tok(3);
    pub const IF: Tok = Tok(4);
    pub const WHILE: Tok = Tok(5);
    pub const ELSE: Tok = Tok(6);
    pub const FUNCTION: Tok = Tok(7);
    pub const RETURN: Tok = Tok(8);
    pub const CONTINUE: Tok = Tok(9);
    pub const BREAK: Tok = Tok(10);
    pub const VAR: Tok = Tok(11);
    pub const STRING: Tok = Tok(12);
    pub const THIS: Tok = Tok(13);
    pub const PROTOTYPE: Tok = Tok(14);
    pub const NEW: Tok = Tok(15);
    pub const FOR: Tok = Tok(16);
    pub const TRUE: Tok = Tok(17);
    pub const FALSE: Tok = Tok(18);
    pub const NULL: Tok = Tok(19);
    pub const UNDEFINED: Tok = Tok(20);
    pub const THROW: Tok = Tok(21);
    pub const TRY: Tok = Tok(22);
    pub const CATCH: Tok = Tok(23);
    pub const CONSTANT: Tok = Tok(24);
    pub const SWITCH: Tok = Tok(25);
    pub const CASE: Tok = Tok(26);
    pub const DEFAULT: Tok = Tok(27);
    pub const ARGUMENTS: Tok = Tok(28);
    pub const IN: Tok = Tok(29);
    pub const DO: Tok = Tok(30);

    pub const DOT: Tok = Tok(b'.' as u16);
    pub const COMMA: Tok = Tok(b',' as u16);
    pub const COLON: Tok = Tok(b':' as u16);
    pub const OPEN_MEMBER: Tok = Tok(b'[' as u16);
    pub const CLOSE_MEMBER: Tok = Tok(b']' as u16);
    pub const QUESTION: Tok = Tok(b'?' as u16);
    pub const END_STATEMENT: Tok = Tok(b';' as u16);
    pub const OPEN_SCOPE: Tok = Tok(b'{' as u16);
    pub const CLOSE_SCOPE: Tok = Tok(b'}' as u16);
    pub const OPEN_PAREN: Tok = Tok(b'(' as u16);
    pub const CLOSE_PAREN: Tok = Tok(b')' as u16);

    pub const ASSIGN: Tok = Tok(b'=' as u16);
    pub const IS_EQ: Tok = Tok(b'=' as u16 | F_DOUBLE);
    pub const IS_EQ_STRICT: Tok = Tok(b'=' as u16 | F_DOUBLE | F_STRICT);
    pub const NOT: Tok = Tok(b'!' as u16);
    pub const NOT_EQ: Tok = Tok(b'!' as u16 | F_EQ);
    pub const NOT_EQ_STRICT: Tok = Tok(b'!' as u16 | F_EQ | F_STRICT);
    pub const TILDE: Tok = Tok(b'~' as u16);
    pub const PLUS: Tok = Tok(b'+' as u16);
    pub const PLUS_PLUS: Tok = Tok(b'+' as u16 | F_DOUBLE);
    pub const MINUS: Tok = Tok(b'-' as u16);
    pub const MINUS_MINUS: Tok = Tok(b'-' as u16 | F_DOUBLE);
    pub const MULT: Tok = Tok(b'*' as u16);
    pub const DIV: Tok = Tok(b'/' as u16);
    pub const MOD: Tok = Tok(b'%' as u16);
    pub const AND: Tok = Tok(b'&' as u16);
    pub const LOG_AND: Tok = Tok(b'&' as u16 | F_DOUBLE);
    pub const OR: Tok = Tok(b'|' as u16);
    pub const LOG_OR: Tok = Tok(b'|' as u16 | F_DOUBLE);
    pub const XOR: Tok = Tok(b'^' as u16);
    pub const GT: Tok = Tok(b'>' as u16);
    pub const GE: Tok = Tok(b'>' as u16 | F_EQ);
    pub const LT: Tok = Tok(b'<' as u16);
    pub const LE: Tok = Tok(b'<' as u16 | F_EQ);
    pub const SHR: Tok = Tok(b'>' as u16 | F_DOUBLE);
    pub const SHRZ: Tok = Tok(b'>' as u16 | F_DOUBLE | F_TRIPLE);
    pub const SHL: Tok = Tok(b'<' as u16 | F_DOUBLE);

    /// The compound-assignment family (`+=`, `>>=`, ...) is the operator
    /// token with the EQ bit set.
    pub fn has_eq_flag(self) -> bool {
        self.0 & F_EQ != 0
    }

    /// Strip the EQ bit: maps `+=` to `+`, `>>>=` to `>>>`.
    pub fn without_eq(self) -> Tok {
        Tok(self.0 & !F_EQ)
    }

    /// Strip the STRICT bit: the strict equality forms share the loose
    /// forms' per-class dispatch once class identity has been checked.
    pub(crate) fn without_strict(self) -> Tok {
        Tok(self.0 & !F_STRICT)
    }
}

impl std::fmt::Debug for Tok {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tok({})", self)
    }
}

impl std::fmt::Display for Tok {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Tok::NUM => write!(f, "number"),
            Tok::ID => write!(f, "identifier"),
            Tok::STRING => write!(f, "string"),
            Tok::EOF => write!(f, "end of input"),
            t if t.0 >= b' ' as u16 => {
                write!(f, "'{}'", (t.0 & 0xff) as u8 as char)?;
                if t.0 & F_DOUBLE != 0 {
                    write!(f, "(double)")?;
                }
                Ok(())
            }
            t => write!(f, "token#{}", t.0),
        }
    }
}

fn keyword_tok(id: &str) -> Tok {
    match id {
        "if" => Tok::IF,
        "in" => Tok::IN,
        "do" => Tok::DO,
        "for" => Tok::FOR,
        "var" => Tok::VAR,
        "new" => Tok::NEW,
        "try" => Tok::TRY,
        "else" => Tok::ELSE,
        "this" => Tok::THIS,
        "true" => Tok::TRUE,
        "null" => Tok::NULL,
        "case" => Tok::CASE,
        "while" => Tok::WHILE,
        "break" => Tok::BREAK,
        "false" => Tok::FALSE,
        "throw" => Tok::THROW,
        "catch" => Tok::CATCH,
        "switch" => Tok::SWITCH,
        "return" => Tok::RETURN,
        "default" => Tok::DEFAULT,
        "function" => Tok::FUNCTION,
        "continue" => Tok::CONTINUE,
        "prototype" => Tok::PROTOTYPE,
        "undefined" => Tok::UNDEFINED,
        "arguments" => Tok::ARGUMENTS,
        _ => Tok::ID,
    }
}

/// Script text, shared between every scan state derived from it.
#[derive(Clone)]
pub struct Source {
    bytes: Rc<[u8]>,
}

impl Source {
    pub fn new(bytes: Vec<u8>) -> Self {
        Source { bytes: bytes.into() }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<&str> for Source {
    fn from(s: &str) -> Self {
        Source::new(s.as_bytes().to_vec())
    }
}

/// Maps identifier text to an integer constant, consulted before keyword
/// classification. Lets an embedder expose register names, pin numbers and
/// the like without heap-resident globals.
pub type ConstantsResolver = Rc<dyn Fn(&str) -> Option<i32>>;

#[derive(Clone)]
enum ScanValue {
    None,
    /// `None` payload means the literal was malformed; the failure is only
    /// reported if the token is actually consumed as a number.
    Num(Option<Num>),
    Ident { start: usize, len: usize },
    Str { start: usize, len: usize, escaped: bool },
    Constant(i32),
}

#[derive(Clone)]
pub struct Scanner {
    code: Source,
    tok: Tok,
    value: ScanValue,
    /// Position of the most recently consumed character.
    lpc: usize,
    /// Position of the lookahead character.
    pc: usize,
    /// Start of the line being reported in diagnostics.
    trace_point: usize,
    last_token_start: usize,
    /// Remaining characters, counting a virtual trailing EOF.
    size: usize,
    look: u8,
    flags: u8,
    constants: Option<ConstantsResolver>,
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_number_letter(c: u8) -> bool {
    c.is_ascii_hexdigit()
        || matches!(c, b'.' | b'e' | b'x' | b'X' | b'b' | b'B' | b'o' | b'O')
}

fn is_ident_first(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$'
}

fn is_ident_rest(c: u8) -> bool {
    is_ident_first(c) || is_digit(c)
}

fn is_newline(c: u8) -> bool {
    c == b'\n' || c == b'\r'
}

fn is_whitespace(c: u8) -> bool {
    c == b' ' || c == b'\t' || is_newline(c)
}

// Single-char tokens that map to themselves.
fn is_control_char(c: u8) -> bool {
    matches!(
        c,
        b'{' | b'}' | b'(' | b')' | b';' | b',' | b'?' | b':' | b'.' | b'[' | b']'
    )
}

fn is_string_delim(c: u8) -> bool {
    c == b'\'' || c == b'"'
}

impl Scanner {
    pub fn new(code: Source, constants: Option<ConstantsResolver>) -> Self {
        let size = code.len() + 1;
        let mut scan = Scanner {
            code,
            tok: Tok::NONE,
            value: ScanValue::None,
            lpc: 0,
            pc: 0,
            trace_point: 0,
            last_token_start: 0,
            size,
            look: INVALID_CHAR,
            flags: 0,
            constants,
        };
        scan.get_char();
        scan.skip_white();
        scan.next_token();
        scan
    }

    pub fn tok(&self) -> Tok {
        self.tok
    }

    fn at(&self, i: usize) -> u8 {
        self.code.bytes.get(i).copied().unwrap_or(INVALID_CHAR)
    }

    fn is_eof(&self) -> bool {
        self.flags & FLAG_EOF != 0
    }

    fn get_char(&mut self) {
        if self.size > 0 {
            self.lpc = self.pc;
            if self.size > 1 {
                self.look = self.at(self.pc);
            }
            self.pc += 1;
            self.size -= 1;
        }
        if self.size == 0 {
            self.look = INVALID_CHAR;
            self.flags |= FLAG_EOF;
        }
    }

    fn skip_white(&mut self) {
        loop {
            while is_whitespace(self.look) && !self.is_eof() {
                self.get_char();
            }
            if self.look != b'/' {
                break;
            }
            match self.at(self.pc) {
                b'/' => {
                    self.get_char();
                    self.get_char();
                    while !is_newline(self.look) && !self.is_eof() {
                        self.get_char();
                    }
                }
                b'*' => {
                    self.get_char();
                    self.get_char();
                    while !(self.look == b'*' && self.at(self.pc) == b'/') && !self.is_eof() {
                        self.get_char();
                    }
                    self.get_char();
                    self.get_char();
                }
                _ => break,
            }
        }
    }

    fn extract_string(&mut self) -> ScanValue {
        let delim = self.look;
        let mut escaped = false;

        self.get_char();
        let start = self.lpc;
        while self.look != delim && !self.is_eof() {
            if is_newline(self.look) {
                log::error!("newlines are not allowed in string literals");
                break;
            }
            if self.look == b'\\' {
                escaped = true;
                self.get_char();
            }
            self.get_char();
        }
        let len = self.lpc - start;
        self.get_char();
        self.skip_white();
        ScanValue::Str { start, len, escaped }
    }

    fn extract_identifier(&mut self) -> (usize, usize) {
        let start = self.lpc;
        while is_ident_rest(self.look) {
            self.get_char();
        }
        let span = (start, self.lpc - start);
        self.skip_white();
        span
    }

    fn extract_num(&mut self) -> ScanValue {
        let start = self.lpc;
        while is_number_letter(self.look) {
            self.get_char();
        }
        let text = self.span_text(start, self.lpc - start);
        self.skip_white();

        let num = number::parse_num(&text);
        if num.is_none() {
            self.flags |= FLAG_INVALID;
        }
        ScanValue::Num(num)
    }

    fn span_text(&self, start: usize, len: usize) -> String {
        String::from_utf8_lossy(&self.code.bytes[start..start + len]).into_owned()
    }

    pub fn next_token(&mut self) {
        self.tok = Tok::NONE;
        self.flags &= !FLAG_INVALID;
        self.last_token_start = self.lpc;

        if is_control_char(self.look) {
            self.tok = Tok(self.look as u16);
            self.get_char();
            self.skip_white();
            return;
        }
        if is_digit(self.look) {
            self.tok = Tok::NUM;
            self.value = self.extract_num();
            return;
        }

        let next = if self.size > 1 { self.at(self.pc) } else { 0 };
        let next2 = if self.size > 2 { self.at(self.pc + 1) } else { 0 };
        let next3 = if self.size > 3 { self.at(self.pc + 2) } else { 0 };

        if matches!(
            self.look,
            b'+' | b'-' | b'&' | b'|' | b'>' | b'<' | b'=' | b'*' | b'/' | b'%' | b'~' | b'!'
                | b'^'
        ) {
            let mut tok = self.look as u16;
            if matches!(self.look, b'+' | b'-' | b'&' | b'|' | b'>' | b'<' | b'=')
                && next == self.look
            {
                tok |= F_DOUBLE;
            }
            if next == b'=' && self.look != b'=' {
                tok |= F_EQ;
            }
            if (Tok(tok) == Tok::IS_EQ || Tok(tok) == Tok::NOT_EQ) && next2 == b'=' {
                tok |= F_STRICT;
            }
            if Tok(tok) == Tok::SHR && next2 == b'>' {
                tok |= F_TRIPLE;
            }
            if (Tok(tok) == Tok::SHR || Tok(tok) == Tok::SHL) && next2 == b'=' {
                tok |= F_EQ;
            }
            if Tok(tok) == Tok::SHRZ && next3 == b'=' {
                tok |= F_EQ;
            }

            self.get_char();
            if tok & (F_DOUBLE | F_EQ) != 0 {
                self.get_char();
            }
            if tok & (F_STRICT | F_TRIPLE) != 0 || tok & (F_DOUBLE | F_EQ) == (F_DOUBLE | F_EQ) {
                self.get_char();
            }
            if tok & (F_TRIPLE | F_DOUBLE | F_EQ) == (F_TRIPLE | F_DOUBLE | F_EQ) {
                self.get_char();
            }

            self.tok = Tok(tok);
            self.skip_white();
            return;
        }

        if is_string_delim(self.look) {
            self.tok = Tok::STRING;
            self.value = self.extract_string();
            return;
        }
        if is_ident_first(self.look) {
            let (start, len) = self.extract_identifier();
            let id = self.span_text(start, len);
            if let Some(c) = self.constants.as_ref().and_then(|cb| cb(&id)) {
                self.tok = Tok::CONSTANT;
                self.value = ScanValue::Constant(c);
                return;
            }
            self.tok = keyword_tok(&id);
            if self.tok == Tok::ID {
                self.value = ScanValue::Ident { start, len };
            }
            return;
        }
        if self.is_eof() {
            self.tok = Tok::EOF;
            return;
        }
        // Unknown character, just skip it.
        self.get_char();
    }

    /// Render the current line with a caret under the token being reported.
    pub fn trace(&self) -> String {
        let mut line = String::new();
        let mut p = self.trace_point;
        while p < self.lpc + self.size {
            let c = self.at(p);
            if is_newline(c) || c == INVALID_CHAR {
                break;
            }
            line.push(c as char);
            p += 1;
        }
        line.push('\n');
        for _ in self.trace_point..self.last_token_start {
            line.push(' ');
        }
        line.push('^');
        line
    }

    /// Move the diagnostic anchor to the start of the current token,
    /// typically at statement boundaries.
    pub fn set_trace_point(&mut self) {
        self.trace_point = self.last_token_start;
    }

    fn failure(&self, expected: Tok) {
        log::error!("expected {}, found {}\n{}", expected, self.tok, self.trace());
    }

    /// Consume `tok` if it is current. On mismatch, reports and returns
    /// false without consuming; the caller decides how to surface it.
    /// A missing `;` at end of input is forgiven (the only semicolon
    /// insertion there is).
    #[must_use]
    pub fn try_match(&mut self, tok: Tok) -> bool {
        if tok == Tok::END_STATEMENT && self.tok == Tok::EOF {
            return true;
        }
        if self.tok != tok {
            self.failure(tok);
            return false;
        }
        self.next_token();
        true
    }

    /// Like [`try_match`](Self::try_match) but aborts on mismatch. Used
    /// where the grammar has already committed and there is no recovery.
    pub fn force_match(&mut self, tok: Tok) {
        if !self.try_match(tok) {
            panic!("unexpected token: expected {}, found {}", tok, self.tok);
        }
    }

    pub fn get_identifier(&mut self) -> Option<Rc<str>> {
        if self.tok != Tok::ID {
            self.failure(Tok::ID);
            return None;
        }
        let ScanValue::Ident { start, len } = self.value else {
            unreachable!("identifier token without a span");
        };
        let id: Rc<str> = self.span_text(start, len).into();
        self.next_token();
        Some(id)
    }

    pub fn get_string(&mut self) -> Option<Rc<str>> {
        if self.tok != Tok::STRING {
            self.failure(Tok::STRING);
            return None;
        }
        let ScanValue::Str { start, len, escaped } = self.value else {
            unreachable!("string token without a span");
        };
        let raw = self.span_text(start, len);
        let s: Rc<str> = if escaped { unescape(&raw).into() } else { raw.into() };
        self.next_token();
        Some(s)
    }

    pub fn get_num(&mut self) -> Option<Num> {
        let ret = match self.value {
            ScanValue::Num(n) if self.tok == Tok::NUM && self.flags & FLAG_INVALID == 0 => n,
            _ => {
                self.failure(Tok::NUM);
                None
            }
        };
        self.next_token();
        ret
    }

    pub fn get_constant(&mut self) -> i32 {
        let ScanValue::Constant(c) = self.value else {
            unreachable!("constant token without a value");
        };
        self.next_token();
        c
    }

    /// Snapshot of the current scan position, used as loop/function body
    /// storage. Re-scanning starts from the snapshot's current token.
    pub fn save(&self) -> Scanner {
        self.clone()
    }

    pub fn restore(&mut self, saved: &Scanner) {
        *self = saved.clone();
    }

    /// Narrow `start` to the span ending where `end`'s current token
    /// begins, so a re-scan cannot run past the body it captured. The
    /// token buffered at `end` is excluded: it is the first one past
    /// the span.
    pub fn slice(start: &Scanner, end: &Scanner) -> Scanner {
        let mut ret = start.clone();
        ret.size = end.last_token_start - start.lpc;
        ret
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some(other) => out.push(other),
            None => break,
        }
    }
    out
}
