//! A small recursive-descent parser over a fixed token alphabet (primitive
//! keywords, identifiers, qualifiers, `* [ ] ( )`, integer literals) that
//! builds a declarator inside-out following the standard C
//! "declarator binds tighter than pointer" rule.

use crate::arch::Architecture;
use crate::error::{Error, Result};
use crate::types::primitive::{self, Family};
use crate::types::{Qualifiers, Type, TypeKind};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Star,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Int(u64),
}

fn tokenize(spelling: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes: Vec<char> = spelling.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == 'x' || bytes[i] == 'X') {
                    i += 1;
                }
                let text: String = bytes[start..i].iter().collect();
                let value = parse_c_integer(&text)?;
                tokens.push(Token::Int(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == '_') {
                    i += 1;
                }
                let text: String = bytes[start..i].iter().collect();
                tokens.push(Token::Word(text));
            }
            other => {
                return Err(Error::value(format!(
                    "invalid character '{other}' in type spelling '{spelling}'"
                )))
            }
        }
    }
    Ok(tokens)
}

fn parse_c_integer(text: &str) -> Result<u64> {
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        u64::from_str_radix(&text[1..], 8)
    } else {
        text.parse::<u64>()
    };
    parsed.map_err(|_| Error::value(format!("invalid integer literal '{text}'")))
}

/// The (possibly qualified, possibly tagged) base type spelled before any
/// declarator punctuation.
#[derive(Debug, Clone)]
pub enum BaseSpec {
    Primitive(Family, Qualifiers),
    Tag(TypeKind, String, Qualifiers),
    Typedef(String, Qualifiers),
}

impl BaseSpec {
    pub fn qualifiers(&self) -> Qualifiers {
        match self {
            BaseSpec::Primitive(_, q) | BaseSpec::Tag(_, _, q) | BaseSpec::Typedef(_, q) => *q,
        }
    }
}

/// One pointer level: the qualifiers trailing its `*`.
type PointerLevel = Qualifiers;

/// The direct-declarator: either suffixes applied straight to the base, or
/// a parenthesized sub-declarator with its own trailing suffixes.
#[derive(Debug, Clone)]
enum Direct {
    Plain(Vec<Option<u64>>),
    Grouped(Box<FullDeclarator>, Vec<Option<u64>>),
}

#[derive(Debug, Clone)]
struct FullDeclarator {
    pointers: Vec<PointerLevel>,
    direct: Direct,
}

pub struct Parsed {
    pub base: BaseSpec,
    declarator: FullDeclarator,
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.bump() {
            Some(tok) if tok == expected => Ok(()),
            other => Err(Error::value(format!(
                "expected {expected:?} in type spelling, found {other:?}"
            ))),
        }
    }
}

pub fn parse(spelling: &str) -> Result<Parsed> {
    let tokens = tokenize(spelling)?;
    let split_at = tokens
        .iter()
        .position(|t| matches!(t, Token::Star | Token::LBracket | Token::LParen))
        .unwrap_or(tokens.len());
    let (base_tokens, decl_tokens) = tokens.split_at(split_at);

    let base = parse_base(base_tokens, spelling)?;

    let mut cursor = Cursor {
        tokens: decl_tokens,
        pos: 0,
    };
    let declarator = parse_declarator(&mut cursor)?;
    if cursor.pos != cursor.tokens.len() {
        return Err(Error::value(format!(
            "trailing garbage in type spelling '{spelling}'"
        )));
    }
    Ok(Parsed { base, declarator })
}

fn parse_base(tokens: &[Token], spelling: &str) -> Result<BaseSpec> {
    let words: Vec<&str> = tokens
        .iter()
        .map(|t| match t {
            Token::Word(w) => Ok(w.as_str()),
            other => Err(Error::value(format!(
                "unexpected {other:?} in base type of '{spelling}'"
            ))),
        })
        .collect::<Result<_>>()?;

    if words.is_empty() {
        return Err(Error::value(format!(
            "empty type spelling '{spelling}'"
        )));
    }

    let (quals, rest): (Vec<&str>, Vec<&str>) =
        words.iter().partition(|w| **w == "const" || **w == "volatile" || **w == "restrict");
    let qualifiers = quals.into_iter().fold(Qualifiers::empty(), |acc, w| {
        acc | match w {
            "const" => Qualifiers::CONST,
            "volatile" => Qualifiers::VOLATILE,
            _ => Qualifiers::RESTRICT,
        }
    });

    match rest.first().copied() {
        Some("struct" | "union" | "enum") if rest.len() == 2 => {
            let kind = match rest[0] {
                "struct" => TypeKind::Struct,
                "union" => TypeKind::Union,
                _ => TypeKind::Enum,
            };
            return Ok(BaseSpec::Tag(kind, rest[1].to_string(), qualifiers));
        }
        _ => {}
    }

    if let Some(family) = primitive::recognize(rest.iter().copied()) {
        return Ok(BaseSpec::Primitive(family, qualifiers));
    }
    if rest.len() == 1 {
        return Ok(BaseSpec::Typedef(rest[0].to_string(), qualifiers));
    }
    Err(Error::value(format!(
        "could not parse type spelling '{spelling}'"
    )))
}

fn parse_quals(cursor: &mut Cursor) -> Qualifiers {
    let mut qualifiers = Qualifiers::empty();
    loop {
        match cursor.peek() {
            Some(Token::Word(w)) if w == "const" => {
                qualifiers |= Qualifiers::CONST;
                cursor.bump();
            }
            Some(Token::Word(w)) if w == "volatile" => {
                qualifiers |= Qualifiers::VOLATILE;
                cursor.bump();
            }
            Some(Token::Word(w)) if w == "restrict" => {
                qualifiers |= Qualifiers::RESTRICT;
                cursor.bump();
            }
            _ => break,
        }
    }
    qualifiers
}

fn parse_declarator(cursor: &mut Cursor) -> Result<FullDeclarator> {
    let mut pointers = Vec::new();
    while matches!(cursor.peek(), Some(Token::Star)) {
        cursor.bump();
        pointers.push(parse_quals(cursor));
    }
    let direct = parse_direct(cursor)?;
    Ok(FullDeclarator { pointers, direct })
}

fn parse_direct(cursor: &mut Cursor) -> Result<Direct> {
    if matches!(cursor.peek(), Some(Token::LParen)) {
        cursor.bump();
        let inner = parse_declarator(cursor)?;
        cursor.expect(&Token::RParen)?;
        let dims = parse_array_suffixes(cursor)?;
        Ok(Direct::Grouped(Box::new(inner), dims))
    } else {
        let dims = parse_array_suffixes(cursor)?;
        Ok(Direct::Plain(dims))
    }
}

fn parse_array_suffixes(cursor: &mut Cursor) -> Result<Vec<Option<u64>>> {
    let mut dims = Vec::new();
    while matches!(cursor.peek(), Some(Token::LBracket)) {
        cursor.bump();
        let len = match cursor.peek() {
            Some(Token::Int(n)) => {
                let n = *n;
                cursor.bump();
                Some(n)
            }
            _ => None,
        };
        cursor.expect(&Token::RBracket)?;
        dims.push(len);
    }
    Ok(dims)
}

fn apply_dims(dims: &[Option<u64>], base: Type) -> Type {
    dims.iter().rev().fold(base, |acc, dim| Type::Array {
        element_type: Box::new(acc),
        length: *dim,
        qualifiers: Qualifiers::empty(),
    })
}

fn apply_pointers(pointers: &[PointerLevel], base: Type, arch: Architecture) -> Type {
    pointers.iter().fold(base, |acc, qualifiers| Type::Pointer {
        size: arch.word_size(),
        referenced_type: Box::new(acc),
        qualifiers: *qualifiers,
    })
}

fn apply_full(declarator: &FullDeclarator, base: Type, arch: Architecture) -> Type {
    let base = apply_pointers(&declarator.pointers, base, arch);
    match &declarator.direct {
        Direct::Plain(dims) => apply_dims(dims, base),
        Direct::Grouped(inner, dims) => {
            let suffixed = apply_dims(dims, base);
            apply_full(inner, suffixed, arch)
        }
    }
}

/// Wrap `base` with the declarator parsed alongside it (pointers, arrays,
/// grouping) to produce the final resolved type.
pub fn apply_declarator(parsed: &Parsed, base: Type, arch: Architecture) -> Type {
    apply_full(&parsed.declarator, base, arch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_hex_and_octal_array_lengths() {
        assert_eq!(parse_c_integer("0x10").unwrap(), 16);
        assert_eq!(parse_c_integer("010").unwrap(), 8);
        assert_eq!(parse_c_integer("10").unwrap(), 10);
    }

    #[test]
    fn grouping_parens_collapse() {
        let tokens = tokenize("int *((*))").unwrap();
        let split_at = tokens
            .iter()
            .position(|t| matches!(t, Token::Star | Token::LBracket | Token::LParen))
            .unwrap();
        let mut cursor = Cursor {
            tokens: &tokens[split_at..],
            pos: 0,
        };
        let declarator = parse_declarator(&mut cursor).unwrap();
        let parsed = Parsed {
            base: BaseSpec::Primitive(Family::Int, Qualifiers::empty()),
            declarator,
        };
        let arch = Architecture::Flags(crate::arch::ArchFlags::IS_64_BIT);
        let resolved = apply_declarator(&parsed, Type::Int {
            name: "int".into(),
            size: 4,
            is_signed: true,
            qualifiers: Qualifiers::empty(),
        }, arch);
        // int *((*)) == int ** : pointer to pointer to int.
        match resolved {
            Type::Pointer { referenced_type, .. } => {
                assert!(matches!(*referenced_type, Type::Pointer { .. }));
            }
            other => panic!("expected pointer, got {other:?}"),
        }
    }
}
