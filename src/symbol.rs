//! Name+kind filtered symbol lookup with a registration-ordered finder
//! chain, mirroring [`crate::types::TypeIndex`]'s shape.

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::types::{Type, TypeKind};

bitflags! {
    /// Which kinds of symbol a [`SymbolIndex::symbol`] call will accept.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FindObjectFlags: u8 {
        const CONSTANT = 0b0000_0001;
        const FUNCTION = 0b0000_0010;
        const VARIABLE = 0b0000_0100;
    }
}

impl FindObjectFlags {
    /// `CONSTANT | FUNCTION | VARIABLE` — every flag this bitset defines.
    pub const ANY: FindObjectFlags = FindObjectFlags::all();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// A resolved symbol. Exactly one of `value` (constants/enumerators) and
/// `address` (variables/functions) is meaningful; `byteorder` accompanies
/// `address`.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub ty: Type,
    pub value: Option<i64>,
    pub address: Option<u64>,
    pub is_enumerator: bool,
    pub byteorder: Option<ByteOrder>,
}

impl Symbol {
    pub fn constant(ty: Type, value: i64) -> Self {
        Symbol {
            ty,
            value: Some(value),
            address: None,
            is_enumerator: false,
            byteorder: None,
        }
    }

    pub fn enumerator(ty: Type, value: i64) -> Self {
        Symbol {
            ty,
            value: Some(value),
            address: None,
            is_enumerator: true,
            byteorder: None,
        }
    }

    pub fn variable(ty: Type, address: u64, byteorder: ByteOrder) -> Self {
        Symbol {
            ty,
            value: None,
            address: Some(address),
            is_enumerator: false,
            byteorder: Some(byteorder),
        }
    }

    pub fn function(ty: Type, address: u64, byteorder: ByteOrder) -> Self {
        Symbol {
            ty,
            value: None,
            address: Some(address),
            is_enumerator: false,
            byteorder: Some(byteorder),
        }
    }

    /// Classify this symbol as `CONSTANT`, `FUNCTION` or `VARIABLE` — never
    /// more than one, regardless of how `flags` were requested.
    pub fn classify(&self) -> FindObjectFlags {
        if self.value.is_some() || self.is_enumerator {
            FindObjectFlags::CONSTANT
        } else if self.ty.kind() == TypeKind::Function && self.address.is_some() {
            FindObjectFlags::FUNCTION
        } else {
            FindObjectFlags::VARIABLE
        }
    }
}

/// `Fn(name, flags, filename) -> Result<Option<Symbol>>`, registered by the
/// client via [`SymbolIndex::add_symbol_finder`].
pub type SymbolFinder = Box<dyn Fn(&str, FindObjectFlags, Option<&str>) -> Result<Option<Symbol>>>;

#[derive(Default)]
pub struct SymbolIndex {
    finders: Vec<SymbolFinder>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_symbol_finder<F>(&mut self, finder: F)
    where
        F: Fn(&str, FindObjectFlags, Option<&str>) -> Result<Option<Symbol>> + 'static,
    {
        self.finders.push(Box::new(finder));
    }

    pub fn symbol(&self, name: &str, flags: FindObjectFlags, filename: Option<&str>) -> Result<Symbol> {
        for finder in &self.finders {
            let Some(candidate) = finder(name, flags, filename)? else {
                continue;
            };
            let classification = candidate.classify();
            if !flags.contains(classification) {
                return Err(Error::type_error(format!("wrong kind for symbol '{name}'")));
            }
            return Ok(candidate);
        }
        Err(Error::not_found("symbol", name, filename))
    }

    /// `name ∈ program`: true iff a symbol of any kind exists for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.symbol(name, FindObjectFlags::ANY, None).is_ok()
    }
}
