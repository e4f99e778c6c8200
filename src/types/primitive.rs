//! Recognition and synthesis of the built-in C primitive families:
//! `type("short signed int") == type("signed short")`, and so on, per the
//! token-set table of §4.2.

use std::collections::HashMap;

use crate::arch::Architecture;
use crate::types::{Qualifiers, Type};

/// One of the fourteen recognized primitive families, plus `void`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Void,
    Bool,
    Char,
    SignedChar,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Float,
    Double,
    LongDouble,
}

/// A family's recognized tokens: `required` must all be present (with at
/// least that many copies each); `optional` may be present 0 or 1 times
/// each. Any token outside `required ∪ optional`, or short of a required
/// count, disqualifies the family.
struct Spec {
    family: Family,
    canonical: &'static str,
    required: &'static [&'static str],
    optional: &'static [&'static str],
}

const TABLE: &[Spec] = &[
    Spec { family: Family::Void, canonical: "void", required: &["void"], optional: &[] },
    Spec { family: Family::Bool, canonical: "_Bool", required: &["_Bool"], optional: &[] },
    Spec { family: Family::Char, canonical: "char", required: &["char"], optional: &[] },
    Spec {
        family: Family::SignedChar,
        canonical: "signed char",
        required: &["signed", "char"],
        optional: &[],
    },
    Spec {
        family: Family::UnsignedChar,
        canonical: "unsigned char",
        required: &["unsigned", "char"],
        optional: &[],
    },
    Spec {
        family: Family::Short,
        canonical: "short",
        required: &["short"],
        optional: &["signed", "int"],
    },
    Spec {
        family: Family::UnsignedShort,
        canonical: "unsigned short",
        required: &["short", "unsigned"],
        optional: &["int"],
    },
    Spec {
        family: Family::Int,
        canonical: "int",
        required: &["int"],
        optional: &["signed"],
    },
    Spec {
        family: Family::UnsignedInt,
        canonical: "unsigned int",
        required: &["unsigned", "int"],
        optional: &[],
    },
    Spec {
        family: Family::Long,
        canonical: "long",
        required: &["long"],
        optional: &["signed", "int"],
    },
    Spec {
        family: Family::UnsignedLong,
        canonical: "unsigned long",
        required: &["long", "unsigned"],
        optional: &["int"],
    },
    Spec {
        family: Family::LongLong,
        canonical: "long long",
        required: &["long", "long"],
        optional: &["signed", "int"],
    },
    Spec {
        family: Family::UnsignedLongLong,
        canonical: "unsigned long long",
        required: &["long", "long", "unsigned"],
        optional: &["int"],
    },
    Spec { family: Family::Float, canonical: "float", required: &["float"], optional: &[] },
    Spec { family: Family::Double, canonical: "double", required: &["double"], optional: &[] },
    Spec {
        family: Family::LongDouble,
        canonical: "long double",
        required: &["long", "double"],
        optional: &[],
    },
];

fn count_words<'a>(words: impl IntoIterator<Item = &'a str>) -> HashMap<&'a str, u32> {
    let mut counts = HashMap::new();
    for word in words {
        *counts.entry(word).or_insert(0) += 1;
    }
    counts
}

/// Recognize a primitive family from an unordered multiset of base-spec
/// words (qualifiers like `const` already stripped).
pub fn recognize<'a>(words: impl IntoIterator<Item = &'a str> + Clone) -> Option<Family> {
    let given = count_words(words);
    'spec: for spec in TABLE {
        let required = count_words(spec.required.iter().copied());
        let mut allowed = required.clone();
        for &word in spec.optional {
            *allowed.entry(word).or_insert(0) += 1;
        }
        for (&word, &count) in &given {
            match allowed.get(word) {
                Some(&max) if count <= max => {}
                _ => continue 'spec,
            }
        }
        for (&word, &count) in &required {
            if given.get(word).copied().unwrap_or(0) < count {
                continue 'spec;
            }
        }
        return Some(spec.family);
    }
    None
}

fn spec_of(family: Family) -> &'static Spec {
    TABLE.iter().find(|s| s.family == family).expect("every Family has a Spec")
}

impl Family {
    pub fn canonical_name(self) -> &'static str {
        spec_of(self).canonical
    }

    /// Synthesize the architecture-default [`Type`] for this family.
    pub fn synthesize(self, arch: Architecture) -> Type {
        let word = arch.word_size();
        let qualifiers = Qualifiers::empty();
        match self {
            Family::Void => Type::Void { qualifiers },
            Family::Bool => Type::Bool { size: 1, qualifiers },
            Family::Char => int_type("char", 1, true, qualifiers),
            Family::SignedChar => int_type("signed char", 1, true, qualifiers),
            Family::UnsignedChar => int_type("unsigned char", 1, false, qualifiers),
            Family::Short => int_type("short", 2, true, qualifiers),
            Family::UnsignedShort => int_type("unsigned short", 2, false, qualifiers),
            Family::Int => int_type("int", 4, true, qualifiers),
            Family::UnsignedInt => int_type("unsigned int", 4, false, qualifiers),
            Family::Long => int_type("long", word, true, qualifiers),
            Family::UnsignedLong => int_type("unsigned long", word, false, qualifiers),
            Family::LongLong => int_type("long long", 8, true, qualifiers),
            Family::UnsignedLongLong => int_type("unsigned long long", 8, false, qualifiers),
            Family::Float => Type::Float { size: 4, qualifiers },
            Family::Double => Type::Float { size: 8, qualifiers },
            Family::LongDouble => Type::Float { size: 16, qualifiers },
        }
    }
}

fn int_type(name: &'static str, size: u64, is_signed: bool, qualifiers: Qualifiers) -> Type {
    Type::Int {
        name: name.into(),
        size,
        is_signed,
        qualifiers,
    }
}

/// The canonical spelling of every recognized primitive family, `void`
/// included. Exposed for documentation and exhaustive-permutation tests.
pub fn canonical_primitive_spellings() -> impl Iterator<Item = &'static str> {
    TABLE.iter().map(|spec| spec.canonical)
}
