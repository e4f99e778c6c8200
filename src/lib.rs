#![forbid(unsafe_code)]
//! `dbgcore`: an embeddable core for a programmatic debugger.
//!
//! A [`Program`] owns three queryable objects over a target:
//!
//! - a segmented [`MemoryMap`](memory::MemoryMap), read by address across a
//!   virtual and a physical plane;
//! - a [`TypeIndex`](types::TypeIndex), which parses C declarator spellings
//!   and resolves tags/typedefs through a client-registered finder chain;
//! - a [`SymbolIndex`](symbol::SymbolIndex), which resolves named constants,
//!   functions and variables the same way.
//!
//! The core supplies the address-space/type/symbol bookkeeping; it neither
//! attaches to processes nor parses debug info itself — those are the
//! caller's read callbacks and finders. The only file format the core reads
//! directly is the `PT_LOAD` segment table of an ELF core dump
//! ([`coredump`]), since that's a boundary format, not a debug-info format.

pub mod arch;
pub mod coredump;
pub mod error;
pub mod memory;
pub mod program;
pub mod symbol;
pub mod types;

pub use arch::{ArchFlags, Architecture};
pub use error::{Error, Result};
pub use memory::MemoryMap;
pub use program::Program;
pub use symbol::{ByteOrder, FindObjectFlags, Symbol, SymbolIndex};
pub use types::{Qualifiers, Type, TypeIndex, TypeKind};
