//! The type universe: C-spelling parsing, primitive synthesis and the
//! finder chain that resolves tags and typedefs.

mod parser;
mod primitive;

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::arch::Architecture;
use crate::error::{Error, Result};

pub use primitive::canonical_primitive_spellings;

bitflags! {
    /// Qualifiers attachable to any level of a declarator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Qualifiers: u8 {
        const CONST = 0b0000_0001;
        const VOLATILE = 0b0000_0010;
        const RESTRICT = 0b0000_0100;
    }
}

impl fmt::Display for Qualifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.contains(Qualifiers::CONST) {
            parts.push("const");
        }
        if self.contains(Qualifiers::VOLATILE) {
            parts.push("volatile");
        }
        if self.contains(Qualifiers::RESTRICT) {
            parts.push("restrict");
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// The top-level discriminant of a [`Type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Bool,
    Int,
    Float,
    Typedef,
    Pointer,
    Array,
    Function,
    Struct,
    Union,
    Enum,
}

impl TypeKind {
    /// The prefix used in lookup-error messages for tagged/typedef kinds.
    fn spelling_prefix(self) -> Option<&'static str> {
        match self {
            TypeKind::Struct => Some("struct"),
            TypeKind::Union => Some("union"),
            TypeKind::Enum => Some("enum"),
            TypeKind::Typedef => Some("typedef"),
            _ => None,
        }
    }
}

/// A resolved C type. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Void {
        qualifiers: Qualifiers,
    },
    Bool {
        size: u64,
        qualifiers: Qualifiers,
    },
    Int {
        name: Arc<str>,
        size: u64,
        is_signed: bool,
        qualifiers: Qualifiers,
    },
    Float {
        size: u64,
        qualifiers: Qualifiers,
    },
    Typedef {
        name: Arc<str>,
        ty: Box<Type>,
        qualifiers: Qualifiers,
    },
    Pointer {
        size: u64,
        referenced_type: Box<Type>,
        qualifiers: Qualifiers,
    },
    Array {
        element_type: Box<Type>,
        length: Option<u64>,
        qualifiers: Qualifiers,
    },
    Function {
        return_type: Box<Type>,
        qualifiers: Qualifiers,
    },
    Struct {
        tag: Arc<str>,
        qualifiers: Qualifiers,
    },
    Union {
        tag: Arc<str>,
        qualifiers: Qualifiers,
    },
    Enum {
        tag: Arc<str>,
        qualifiers: Qualifiers,
    },
}

impl Type {
    pub fn kind(&self) -> TypeKind {
        match self {
            Type::Void { .. } => TypeKind::Void,
            Type::Bool { .. } => TypeKind::Bool,
            Type::Int { .. } => TypeKind::Int,
            Type::Float { .. } => TypeKind::Float,
            Type::Typedef { .. } => TypeKind::Typedef,
            Type::Pointer { .. } => TypeKind::Pointer,
            Type::Array { .. } => TypeKind::Array,
            Type::Function { .. } => TypeKind::Function,
            Type::Struct { .. } => TypeKind::Struct,
            Type::Union { .. } => TypeKind::Union,
            Type::Enum { .. } => TypeKind::Enum,
        }
    }

    pub fn qualifiers(&self) -> Qualifiers {
        match self {
            Type::Void { qualifiers }
            | Type::Bool { qualifiers, .. }
            | Type::Int { qualifiers, .. }
            | Type::Float { qualifiers, .. }
            | Type::Typedef { qualifiers, .. }
            | Type::Pointer { qualifiers, .. }
            | Type::Array { qualifiers, .. }
            | Type::Function { qualifiers, .. }
            | Type::Struct { qualifiers, .. }
            | Type::Union { qualifiers, .. }
            | Type::Enum { qualifiers, .. } => *qualifiers,
        }
    }

    pub fn with_qualifiers(mut self, qualifiers: Qualifiers) -> Self {
        match &mut self {
            Type::Void { qualifiers: q }
            | Type::Bool { qualifiers: q, .. }
            | Type::Int { qualifiers: q, .. }
            | Type::Float { qualifiers: q, .. }
            | Type::Typedef { qualifiers: q, .. }
            | Type::Pointer { qualifiers: q, .. }
            | Type::Array { qualifiers: q, .. }
            | Type::Function { qualifiers: q, .. }
            | Type::Struct { qualifiers: q, .. }
            | Type::Union { qualifiers: q, .. }
            | Type::Enum { qualifiers: q, .. } => *q = qualifiers,
        }
        self
    }

    pub fn size(&self) -> Option<u64> {
        match self {
            Type::Void { .. } | Type::Function { .. } => None,
            Type::Bool { size, .. }
            | Type::Int { size, .. }
            | Type::Float { size, .. }
            | Type::Pointer { size, .. } => Some(*size),
            Type::Typedef { ty, .. } => ty.size(),
            Type::Array {
                element_type,
                length,
                ..
            } => Some(element_type.size()? * length?),
            Type::Struct { .. } | Type::Union { .. } | Type::Enum { .. } => None,
        }
    }

    pub fn is_signed(&self) -> Option<bool> {
        match self {
            Type::Int { is_signed, .. } => Some(*is_signed),
            Type::Typedef { ty, .. } => ty.is_signed(),
            _ => None,
        }
    }
}

/// `Fn(kind, name, filename) -> Result<Option<Type>>`, registered by the
/// client via [`TypeIndex::add_type_finder`].
pub type TypeFinder = Box<dyn Fn(TypeKind, &str, Option<&str>) -> Result<Option<Type>>>;

/// Something [`TypeIndex::pointer_type`] can build a pointer over: either an
/// already-resolved [`Type`] or a spelling to resolve first.
pub enum TypeOrSpelling<'a> {
    Type(Type),
    Spelling(&'a str),
}

impl From<Type> for TypeOrSpelling<'_> {
    fn from(ty: Type) -> Self {
        TypeOrSpelling::Type(ty)
    }
}

impl<'a> From<&'a str> for TypeOrSpelling<'a> {
    fn from(spelling: &'a str) -> Self {
        TypeOrSpelling::Spelling(spelling)
    }
}

/// The C-spelling parser, primitive synthesizer and finder chain that
/// together resolve names like `int *const` into [`Type`] values.
#[derive(Default)]
pub struct TypeIndex {
    finders: Vec<TypeFinder>,
}

impl TypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type_finder<F>(&mut self, finder: F)
    where
        F: Fn(TypeKind, &str, Option<&str>) -> Result<Option<Type>> + 'static,
    {
        self.finders.push(Box::new(finder));
    }

    /// Resolve a C declarator spelling, e.g. `"int (*[2])[3]"`.
    pub fn type_of(&self, spelling: &str, filename: Option<&str>, arch: Architecture) -> Result<Type> {
        let parsed = parser::parse(spelling)?;
        let base = self.resolve_base(&parsed.base, filename, arch)?;
        Ok(parser::apply_declarator(&parsed, base, arch))
    }

    /// Build a pointer type over `base`, which is either a [`Type`] or a
    /// spelling to resolve first.
    pub fn pointer_type<'a>(
        &self,
        base: impl Into<TypeOrSpelling<'a>>,
        qualifiers: Qualifiers,
        arch: Architecture,
    ) -> Result<Type> {
        let referenced_type = match base.into() {
            TypeOrSpelling::Type(ty) => ty,
            TypeOrSpelling::Spelling(spelling) => self.type_of(spelling, None, arch)?,
        };
        Ok(Type::Pointer {
            size: arch.word_size(),
            referenced_type: Box::new(referenced_type),
            qualifiers,
        })
    }

    fn resolve_base(
        &self,
        base: &parser::BaseSpec,
        filename: Option<&str>,
        arch: Architecture,
    ) -> Result<Type> {
        match base {
            parser::BaseSpec::Primitive(family, _) => {
                self.resolve_primitive(*family, filename, arch)
            }
            parser::BaseSpec::Tag(kind, name, _) => {
                self.resolve_finder_chain(*kind, name, filename)
            }
            parser::BaseSpec::Typedef(name, _) => self.resolve_typedef(name, filename, arch),
        }
        .map(|ty| ty.with_qualifiers(ty.qualifiers() | base.qualifiers()))
    }

    /// `size_t`/`ptrdiff_t` are synthesized the same way a primitive is
    /// (architecture-dependent, no finder required), even though they parse
    /// as a bare identifier like any other typedef name — so they're
    /// special-cased here rather than falling into the generic finder
    /// chain, which would otherwise only ever resolve them via a
    /// client-registered finder and fail with a lookup error by default.
    fn resolve_typedef(&self, name: &str, filename: Option<&str>, arch: Architecture) -> Result<Type> {
        match name {
            "size_t" => self.size_type(false, filename, arch),
            "ptrdiff_t" => self.size_type(true, filename, arch),
            _ => self.resolve_finder_chain(TypeKind::Typedef, name, filename),
        }
    }

    /// Primitive resolution: finders are consulted first, but only a result
    /// whose essential shape matches the synthesized default is accepted —
    /// for `Int` that shape is (name, signedness), and an architecture may
    /// still give `long` a non-default *size* (that's accepted, but a
    /// different signedness or name for the same canonical name is ignored,
    /// falling back to the default). `Float`/`Bool` have no name/signedness
    /// to compare, but `TypeKind::Float` alone doesn't distinguish
    /// `float`/`double`/`long double` (same kind, different `size`), so
    /// their shape check compares `size` instead.
    fn resolve_primitive(
        &self,
        family: primitive::Family,
        filename: Option<&str>,
        arch: Architecture,
    ) -> Result<Type> {
        let canonical = family.canonical_name();
        let default = family.synthesize(arch);
        let kind = default.kind();
        for finder in &self.finders {
            let Some(candidate) = finder(kind, canonical, filename)? else {
                continue;
            };
            if candidate.kind() != kind {
                return Err(Error::type_error(format!(
                    "finder for '{canonical}' returned wrong kind"
                )));
            }
            return Ok(if primitive_shape_matches(&candidate, &default) {
                candidate
            } else {
                default
            });
        }
        Ok(default)
    }

    fn resolve_finder_chain(
        &self,
        kind: TypeKind,
        name: &str,
        filename: Option<&str>,
    ) -> Result<Type> {
        for finder in &self.finders {
            let Some(candidate) = finder(kind, name, filename)? else {
                continue;
            };
            if candidate.kind() != kind {
                return Err(Error::type_error(format!(
                    "finder for '{}' returned wrong kind",
                    spelling_of(kind, name)
                )));
            }
            return Ok(candidate);
        }
        Err(Error::lookup(match filename {
            Some(filename) => format!(
                "could not find '{}' in '{filename}'",
                spelling_of(kind, name)
            ),
            None => format!("could not find '{}'", spelling_of(kind, name)),
        }))
    }

    /// `size_t`, or `ptrdiff_t` if `signed` is requested: the first of
    /// `unsigned long`/`unsigned long long`/`unsigned int` (respectively
    /// the signed trio) whose size equals the architecture's word size.
    pub fn size_type(&self, signed: bool, filename: Option<&str>, arch: Architecture) -> Result<Type> {
        let name = if signed { "ptrdiff_t" } else { "size_t" };
        let candidates: [primitive::Family; 3] = if signed {
            [
                primitive::Family::Long,
                primitive::Family::LongLong,
                primitive::Family::Int,
            ]
        } else {
            [
                primitive::Family::UnsignedLong,
                primitive::Family::UnsignedLongLong,
                primitive::Family::UnsignedInt,
            ]
        };
        for family in candidates {
            let resolved = self.resolve_primitive(family, filename, arch)?;
            if resolved.size() == Some(arch.word_size()) {
                return Ok(Type::Typedef {
                    name: name.into(),
                    ty: Box::new(resolved),
                    qualifiers: Qualifiers::empty(),
                });
            }
        }
        Err(Error::value(format!("no suitable integer type for {name}")))
    }
}

/// Whether a finder-returned primitive candidate has the same essential
/// shape as the architecture's synthesized default for that family — `Int`
/// compares name and signedness (size may legitimately vary by
/// architecture); `Bool`/`Float` compare `size`, since it's the only
/// attribute that distinguishes their sibling families under one `TypeKind`
/// (`float`/`double`/`long double` are all `TypeKind::Float`).
fn primitive_shape_matches(candidate: &Type, default: &Type) -> bool {
    match (candidate, default) {
        (
            Type::Int {
                name: n1,
                is_signed: s1,
                ..
            },
            Type::Int {
                name: n2,
                is_signed: s2,
                ..
            },
        ) => n1 == n2 && s1 == s2,
        (Type::Bool { size: s1, .. }, Type::Bool { size: s2, .. }) => s1 == s2,
        (Type::Float { size: s1, .. }, Type::Float { size: s2, .. }) => s1 == s2,
        (Type::Void { .. }, Type::Void { .. }) => true,
        _ => false,
    }
}

fn spelling_of(kind: TypeKind, name: &str) -> String {
    match kind.spelling_prefix() {
        Some(prefix) => format!("{prefix} {name}"),
        None => name.to_string(),
    }
}
