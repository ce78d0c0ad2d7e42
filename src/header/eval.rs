//! Best-effort evaluation of object-like macro bodies.
//!
//! Covers what the engine uses for its public constants: integer and string
//! literals, references to other macros, casts to a C type, and the usual
//! unary and binary integer operators. Integers carry their C type (LP64
//! widths) through the usual arithmetic conversions, so unsigned arithmetic
//! wraps and signed overflow yields `None`. Anything not understood (for
//! example references to `<limits.h>`) yields `None` as well.

use super::HeaderIndex;
use crate::export::CType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Maximum macro reference depth
const MAX_DEPTH: usize = 32;

/// Value of an object-like macro
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MacroValue {
    /// Integer constant that fits in `i64`
    Integer(i64),
    /// Unsigned constant above `i64::MAX`
    Unsigned(u64),
    /// String literal (adjacent literals concatenated)
    String(String),
}

impl MacroValue {
    /// Integer value, normalized to the narrowest variant
    pub fn from_int(value: i128) -> Option<Self> {
        if let Ok(v) = i64::try_from(value) {
            Some(MacroValue::Integer(v))
        } else {
            u64::try_from(value).ok().map(MacroValue::Unsigned)
        }
    }

    /// Integer value, if this is an integer
    pub fn as_int(&self) -> Option<i128> {
        match self {
            MacroValue::Integer(v) => Some(i128::from(*v)),
            MacroValue::Unsigned(v) => Some(i128::from(*v)),
            MacroValue::String(_) => None,
        }
    }

    /// Convert to the C type `c_type`, as an initializer of that type would
    ///
    /// Integers are reduced modulo the type's width; strings, pointers and
    /// unknown types are left alone.
    pub fn convert_to(self, c_type: &str) -> Self {
        let Some(value) = self.as_int() else {
            return self;
        };
        let converted = match target_of(c_type) {
            Some(CastTarget::Int(ty)) => ty.wrap(value),
            Some(CastTarget::Bool) => i128::from(value != 0),
            _ => return self,
        };
        MacroValue::from_int(converted).unwrap_or(self)
    }
}

impl std::fmt::Display for MacroValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MacroValue::Integer(v) => write!(f, "{}", v),
            MacroValue::Unsigned(v) => write!(f, "{}", v),
            MacroValue::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// Evaluate the object-like macro `name`
pub fn evaluate(index: &HeaderIndex, name: &str) -> Option<MacroValue> {
    let mut visiting = HashSet::new();
    resolve(index, name, &mut visiting, 0)?.into_macro_value()
}

/// Evaluate `name` and convert the result to `c_type`
pub fn evaluate_as(index: &HeaderIndex, name: &str, c_type: &str) -> Option<MacroValue> {
    evaluate(index, name).map(|v| v.convert_to(c_type))
}

/// An integer type under LP64
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IntType {
    bits: u32,
    unsigned: bool,
}

impl IntType {
    const INT: IntType = IntType::new(32, false);
    const UINT: IntType = IntType::new(32, true);
    const LONG: IntType = IntType::new(64, false);
    const ULONG: IntType = IntType::new(64, true);

    const fn new(bits: u32, unsigned: bool) -> Self {
        Self { bits, unsigned }
    }

    fn min(self) -> i128 {
        if self.unsigned {
            0
        } else {
            -(1i128 << (self.bits - 1))
        }
    }

    fn max(self) -> i128 {
        if self.unsigned {
            (1i128 << self.bits) - 1
        } else {
            (1i128 << (self.bits - 1)) - 1
        }
    }

    fn fits(self, value: i128) -> bool {
        (self.min()..=self.max()).contains(&value)
    }

    /// Reduce modulo 2^bits into the type's range
    fn wrap(self, value: i128) -> i128 {
        let modulus = 1i128 << self.bits;
        let reduced = value.rem_euclid(modulus);
        if !self.unsigned && reduced > self.max() {
            reduced - modulus
        } else {
            reduced
        }
    }

    /// Integer promotion
    fn promote(self) -> Self {
        if self.bits < 32 {
            IntType::INT
        } else {
            self
        }
    }
}

fn named_int_type(base: &str) -> Option<IntType> {
    let (bits, unsigned) = match base {
        "char" | "signed char" | "duk_int8_t" => (8, false),
        "unsigned char" | "duk_uint8_t" | "duk_uchar_t" => (8, true),
        "short" | "short int" | "signed short" | "signed short int" | "duk_int16_t" => (16, false),
        "unsigned short" | "unsigned short int" | "duk_uint16_t" => (16, true),
        "int" | "signed" | "signed int" | "duk_int_t" | "duk_idx_t" | "duk_errcode_t"
        | "duk_ret_t" | "duk_small_int_t" | "duk_int32_t" | "duk_codepoint_t" => (32, false),
        "unsigned" | "unsigned int" | "duk_uint_t" | "duk_bool_t" | "duk_small_uint_t"
        | "duk_uint32_t" | "duk_uarridx_t" | "duk_ucodepoint_t" => (32, true),
        "long" | "long int" | "signed long" | "signed long int" | "long long"
        | "long long int" | "signed long long" | "duk_int64_t" => (64, false),
        "unsigned long" | "unsigned long int" | "unsigned long long"
        | "unsigned long long int" | "duk_size_t" | "duk_uint64_t" => (64, true),
        _ => return None,
    };
    Some(IntType::new(bits, unsigned))
}

/// What a cast or an initializer converts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CastTarget {
    Int(IntType),
    Bool,
    Pointer,
    Float,
    Void,
    /// An engine typedef of unknown width; the value passes through
    Opaque,
}

fn target_of(c_type: &str) -> Option<CastTarget> {
    let ty = CType::parse(c_type).ok()?;
    if ty.is_pointer() {
        return Some(CastTarget::Pointer);
    }
    let base = ty.base_name();
    Some(match base.as_str() {
        "_Bool" => CastTarget::Bool,
        "void" => CastTarget::Void,
        "float" | "double" | "long double" | "duk_double_t" | "duk_float_t" => CastTarget::Float,
        other => match named_int_type(other) {
            Some(int) => CastTarget::Int(int),
            None if is_engine_typedef(other) => CastTarget::Opaque,
            None => return None,
        },
    })
}

const TYPE_KEYWORDS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "_Bool",
];

const QUALIFIERS: &[&str] = &["const", "volatile"];

fn is_engine_typedef(word: &str) -> bool {
    word.starts_with("duk_") && word.ends_with("_t")
}

fn is_type_word(word: &str) -> bool {
    TYPE_KEYWORDS.contains(&word) || is_engine_typedef(word)
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i128, IntType),
    Str(String),
}

impl Value {
    fn int(&self) -> Option<(i128, IntType)> {
        match self {
            Value::Int(v, ty) => Some((*v, *ty)),
            Value::Str(_) => None,
        }
    }

    fn into_macro_value(self) -> Option<MacroValue> {
        match self {
            Value::Int(v, _) => MacroValue::from_int(v),
            Value::Str(s) => Some(MacroValue::String(s)),
        }
    }

    fn cast(self, target: CastTarget) -> Option<Value> {
        match (self, target) {
            (Value::Str(s), CastTarget::Pointer | CastTarget::Opaque) => Some(Value::Str(s)),
            (Value::Str(_), _) => None,
            (Value::Int(v, _), CastTarget::Int(ty)) => Some(Value::Int(ty.wrap(v), ty)),
            (Value::Int(v, _), CastTarget::Bool) => {
                Some(Value::Int(i128::from(v != 0), IntType::new(8, true)))
            }
            (Value::Int(v, _), CastTarget::Pointer) => {
                Some(Value::Int(IntType::ULONG.wrap(v), IntType::ULONG))
            }
            (value @ Value::Int(..), CastTarget::Opaque) => Some(value),
            (Value::Int(..), CastTarget::Float | CastTarget::Void) => None,
        }
    }
}

fn checked(value: i128, ty: IntType) -> Option<Value> {
    ty.fits(value).then_some(Value::Int(value, ty))
}

fn resolve<'a>(
    index: &'a HeaderIndex,
    name: &'a str,
    visiting: &mut HashSet<&'a str>,
    depth: usize,
) -> Option<Value> {
    if depth > MAX_DEPTH || visiting.contains(name) {
        return None;
    }
    let def = index.get(name).filter(|d| !d.is_function_like())?;
    let tokens = tokenize(&def.body)?;
    visiting.insert(name);
    let mut parser = Parser {
        index,
        tokens,
        pos: 0,
        visiting,
        depth,
    };
    let value = parser.expr(0);
    let complete = parser.pos == parser.tokens.len();
    parser.visiting.remove(name);
    if complete {
        value
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i128, IntType),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

const PUNCTS: &[&str] = &[
    "<<", ">>", "(", ")", "~", "!", "-", "+", "*", "/", "%", "&", "^", "|",
];

fn tokenize(body: &str) -> Option<Vec<Token>> {
    let bytes = body.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && (bytes[i] as char).is_ascii_alphanumeric() {
                i += 1;
            }
            let (value, ty) = parse_int(&body[start..i])?;
            tokens.push(Token::Int(value, ty));
        } else if c == '_' || c.is_ascii_alphabetic() {
            let start = i;
            while i < bytes.len() && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
                i += 1;
            }
            tokens.push(Token::Ident(body[start..i].to_string()));
        } else if c == '"' {
            let (s, next) = parse_quoted(body, i)?;
            if let Some(Token::Str(prev)) = tokens.last_mut() {
                prev.push_str(&s);
            } else {
                tokens.push(Token::Str(s));
            }
            i = next;
        } else if c == '\'' {
            let (s, next) = parse_quoted(body, i)?;
            let mut chars = s.chars();
            let ch = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            tokens.push(Token::Int(i128::from(u32::from(ch)), IntType::INT));
            i = next;
        } else {
            let punct = PUNCTS.iter().find(|p| body[i..].starts_with(**p))?;
            tokens.push(Token::Punct(*punct));
            i += punct.len();
        }
    }

    Some(tokens)
}

/// Integer literal with its C type: the first candidate type that holds
/// the value, by suffix and radix
fn parse_int(literal: &str) -> Option<(i128, IntType)> {
    let split = literal
        .find(|c| matches!(c, 'u' | 'U' | 'l' | 'L'))
        .unwrap_or(literal.len());
    let (digits, suffix) = literal.split_at(split);
    if suffix.len() > 3 || !suffix.chars().all(|c| matches!(c, 'u' | 'U' | 'l' | 'L')) {
        return None;
    }
    let unsigned = suffix.chars().any(|c| matches!(c, 'u' | 'U'));
    let long = suffix.chars().any(|c| matches!(c, 'l' | 'L'));

    let (radix, digits) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    let value = i128::from(u64::from_str_radix(digits, radix).ok()?);

    use IntType as T;
    let candidates: &[IntType] = match (unsigned, long, radix == 10) {
        (false, false, true) => &[T::INT, T::LONG],
        (false, false, false) => &[T::INT, T::UINT, T::LONG, T::ULONG],
        (true, false, _) => &[T::UINT, T::ULONG],
        (false, true, true) => &[T::LONG],
        (false, true, false) => &[T::LONG, T::ULONG],
        (true, true, _) => &[T::ULONG],
    };
    let ty = candidates.iter().copied().find(|ty| ty.fits(value))?;
    Some((value, ty))
}

/// Parse a quoted literal starting at `start`; returns the unescaped content
/// and the index after the closing quote.
fn parse_quoted(body: &str, start: usize) -> Option<(String, usize)> {
    let quote = body[start..].chars().next()?;
    let mut out = String::new();
    let mut chars = body[start + 1..].char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, esc) = chars.next()?;
                out.push(match esc {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            }
            c if c == quote => return Some((out, start + 1 + i + c.len_utf8())),
            c => out.push(c),
        }
    }
    None
}

struct Parser<'a, 'v> {
    index: &'a HeaderIndex,
    tokens: Vec<Token>,
    pos: usize,
    visiting: &'v mut HashSet<&'a str>,
    depth: usize,
}

impl<'a, 'v> Parser<'a, 'v> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, punct: &str) -> Option<()> {
        match self.next()? {
            Token::Punct(p) if p == punct => Some(()),
            _ => None,
        }
    }

    /// Precedence climbing over the binary operators
    fn expr(&mut self, min_prec: u8) -> Option<Value> {
        let mut lhs = self.unary()?;

        while let Some(Token::Punct(op)) = self.peek() {
            let op = *op;
            let prec = match binary_precedence(op) {
                Some(p) if p >= min_prec => p,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.expr(prec + 1)?;
            lhs = apply_binary(op, &lhs, &rhs)?;
        }

        Some(lhs)
    }

    fn unary(&mut self) -> Option<Value> {
        match self.peek()? {
            Token::Punct(op @ ("-" | "+" | "~" | "!")) => {
                let op = *op;
                self.pos += 1;
                let operand = self.unary()?;
                apply_unary(op, &operand)
            }
            Token::Punct("(") => match self.cast_target() {
                Some((target, len)) => {
                    self.pos += len;
                    self.unary()?.cast(target)
                }
                None => self.primary(),
            },
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Option<Value> {
        match self.next()? {
            Token::Int(v, ty) => Some(Value::Int(v, ty)),
            Token::Str(s) => Some(Value::Str(s)),
            Token::Ident(name) => {
                let index = self.index;
                let name: &'a str = index.get(&name).map(|d| d.name.as_str())?;
                resolve(index, name, self.visiting, self.depth + 1)
            }
            Token::Punct("(") => {
                let value = self.expr(0)?;
                self.expect(")")?;
                Some(value)
            }
            Token::Punct(_) => None,
        }
    }

    /// `( type-name ) operand` at the current position
    ///
    /// The type name must be built from C type keywords or `duk_*_t`
    /// typedefs, with optional qualifiers and `*`s. Returns the target and
    /// the number of tokens up to and including the closing paren.
    fn cast_target(&self) -> Option<(CastTarget, usize)> {
        let mut words = Vec::new();
        let mut spelling = String::new();
        let mut i = self.pos + 1;

        loop {
            match self.tokens.get(i)? {
                Token::Ident(word) if QUALIFIERS.contains(&word.as_str()) => {}
                Token::Ident(word) if is_type_word(word) && !spelling.contains('*') => {
                    words.push(word.as_str());
                }
                Token::Punct("*") if !words.is_empty() => spelling.push('*'),
                Token::Punct(")") if !words.is_empty() => break,
                _ => return None,
            }
            i += 1;
        }

        let starts_operand = matches!(
            self.tokens.get(i + 1),
            Some(Token::Int(..))
                | Some(Token::Str(_))
                | Some(Token::Ident(_))
                | Some(Token::Punct("("))
                | Some(Token::Punct("-"))
                | Some(Token::Punct("+"))
                | Some(Token::Punct("~"))
                | Some(Token::Punct("!"))
        );
        if !starts_operand {
            return None;
        }

        let c_type = format!("{} {}", words.join(" "), spelling);
        Some((target_of(&c_type)?, i + 1 - self.pos))
    }
}

fn binary_precedence(op: &str) -> Option<u8> {
    Some(match op {
        "|" => 1,
        "^" => 2,
        "&" => 3,
        "<<" | ">>" => 4,
        "+" | "-" => 5,
        "*" | "/" | "%" => 6,
        _ => return None,
    })
}

fn apply_unary(op: &str, operand: &Value) -> Option<Value> {
    let (v, ty) = operand.int()?;
    let ty = ty.promote();
    match op {
        "-" if ty.unsigned => Some(Value::Int(ty.wrap(-v), ty)),
        "-" => checked(-v, ty),
        "+" => Some(Value::Int(v, ty)),
        "~" => Some(Value::Int(ty.wrap(!v), ty)),
        "!" => Some(Value::Int(i128::from(v == 0), IntType::INT)),
        _ => None,
    }
}

/// The usual arithmetic conversions
fn common_type(a: IntType, b: IntType) -> IntType {
    let (a, b) = (a.promote(), b.promote());
    if a == b {
        return a;
    }
    if a.unsigned == b.unsigned {
        return if a.bits >= b.bits { a } else { b };
    }
    let (unsigned, signed) = if a.unsigned { (a, b) } else { (b, a) };
    if unsigned.bits >= signed.bits {
        unsigned
    } else {
        signed
    }
}

fn apply_binary(op: &str, lhs: &Value, rhs: &Value) -> Option<Value> {
    let (a, a_ty) = lhs.int()?;
    let (b, b_ty) = rhs.int()?;

    if op == "<<" || op == ">>" {
        let ty = a_ty.promote();
        if b < 0 || b >= i128::from(ty.bits) {
            return None;
        }
        let shift = b as u32;
        return match op {
            "<<" if ty.unsigned => Some(Value::Int(ty.wrap(a << shift), ty)),
            "<<" if a < 0 => None,
            "<<" => checked(a << shift, ty),
            _ => Some(Value::Int(a >> shift, ty)),
        };
    }

    let ty = common_type(a_ty, b_ty);
    let (a, b) = (ty.wrap(a), ty.wrap(b));
    let raw = match op {
        "|" => a | b,
        "^" => a ^ b,
        "&" => a & b,
        "+" => a + b,
        "-" => a - b,
        "*" if ty.unsigned => i128::from((a as u64).wrapping_mul(b as u64)),
        "*" => a * b,
        "/" => a.checked_div(b)?,
        "%" => a.checked_rem(b)?,
        _ => return None,
    };

    if ty.unsigned {
        Some(Value::Int(ty.wrap(raw), ty))
    } else {
        checked(raw, ty)
    }
}
