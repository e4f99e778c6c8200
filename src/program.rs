//! [`Program`]: the single owning handle over a target's architecture,
//! memory map, type universe and symbol table.

use std::path::Path;

use crate::arch::Architecture;
use crate::coredump::{self, LoadSegment};
use crate::error::{Error, Result};
use crate::memory::{MemoryMap, ReadCallback};
use crate::symbol::{FindObjectFlags, Symbol, SymbolIndex};
use crate::types::{Qualifiers, Type, TypeIndex, TypeKind, TypeOrSpelling};

/// Which of the three mutually exclusive memory sources has committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemoryInit {
    Unbound,
    Pid,
    CoreDump,
    Manual,
}

/// A target program: its architecture, its address space, its type
/// universe and its symbol table. Single-threaded, no internal locking —
/// see the crate-level docs for the concurrency contract.
pub struct Program {
    architecture: Architecture,
    memory_init: MemoryInit,
    memory: MemoryMap,
    types: TypeIndex,
    symbols: SymbolIndex,
}

impl Program {
    pub fn new(architecture: Architecture) -> Self {
        Program {
            architecture,
            memory_init: MemoryInit::Unbound,
            memory: MemoryMap::new(),
            types: TypeIndex::new(),
            symbols: SymbolIndex::new(),
        }
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    // -- memory -----------------------------------------------------------

    /// Manually register a segment. Always succeeds, any number of times,
    /// regardless of prior binding state; the first manual call (if no
    /// `bind_pid`/`load_core_dump` preceded it) marks memory as bound, so a
    /// later `bind_pid`/`load_core_dump` is then rejected.
    pub fn add_memory_segment<F>(&mut self, address: u64, length: u64, read_fn: F, physical: bool)
    where
        F: Fn(u64, usize, u64, bool) -> Result<Vec<u8>> + 'static,
    {
        self.memory.add_segment(address, length, read_fn, physical);
        if self.memory_init == MemoryInit::Unbound {
            self.memory_init = MemoryInit::Manual;
        }
    }

    fn reject_if_already_bound(&self) -> Result<()> {
        if self.memory_init != MemoryInit::Unbound {
            return Err(Error::value("program memory was already initialized"));
        }
        Ok(())
    }

    /// Model attaching to a live process: the caller supplies a read
    /// callback covering the process's virtual address space (the actual
    /// `ptrace`/`/proc/pid/mem` plumbing is the caller's concern). Resolves
    /// `Architecture::Auto` to `Architecture::Host`.
    pub fn bind_pid(&mut self, _pid: u32, read_fn: ReadCallback) -> Result<()> {
        self.reject_if_already_bound()?;
        self.memory.add_segment(0, u64::MAX, move |a, c, o, p| read_fn(a, c, o, p), false);
        if self.architecture == Architecture::Auto {
            self.architecture = Architecture::Host;
        }
        self.memory_init = MemoryInit::Pid;
        Ok(())
    }

    /// The §4.1 auxiliary entry point: consume an already-parsed list of
    /// `PT_LOAD` program headers.
    pub fn load_core_dump(&mut self, segments: Vec<LoadSegment>) -> Result<()> {
        self.reject_if_already_bound()?;
        for segment in segments {
            self.memory
                .install_load_segment(segment.vaddr, segment.paddr, segment.data, segment.memsz);
        }
        self.memory_init = MemoryInit::CoreDump;
        Ok(())
    }

    /// Parse an ELF core file and install its `PT_LOAD` segments.
    pub fn load_core_dump_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.reject_if_already_bound()?;
        let segments = coredump::read_core_dump_file(path.as_ref())?;
        self.load_core_dump(segments)
    }

    pub fn read(&self, address: u64, count: usize, physical: bool) -> Result<Vec<u8>> {
        self.memory.read(address, count, physical)
    }

    // -- types --------------------------------------------------------------

    pub fn add_type_finder<F>(&mut self, finder: F)
    where
        F: Fn(TypeKind, &str, Option<&str>) -> Result<Option<Type>> + 'static,
    {
        self.types.add_type_finder(finder);
    }

    pub fn type_of(&self, spelling: &str, filename: Option<&str>) -> Result<Type> {
        self.types.type_of(spelling, filename, self.architecture)
    }

    pub fn pointer_type<'a>(&self, base: impl Into<TypeOrSpelling<'a>>, qualifiers: Qualifiers) -> Result<Type> {
        self.types.pointer_type(base, qualifiers, self.architecture)
    }

    pub fn size_t(&self) -> Result<Type> {
        self.types.size_type(false, None, self.architecture)
    }

    pub fn ptrdiff_t(&self) -> Result<Type> {
        self.types.size_type(true, None, self.architecture)
    }

    // -- symbols --------------------------------------------------------------

    pub fn add_symbol_finder<F>(&mut self, finder: F)
    where
        F: Fn(&str, FindObjectFlags, Option<&str>) -> Result<Option<Symbol>> + 'static,
    {
        self.symbols.add_symbol_finder(finder);
    }

    pub fn symbol(&self, name: &str, flags: FindObjectFlags, filename: Option<&str>) -> Result<Symbol> {
        self.symbols.symbol(name, flags, filename)
    }

    /// `name ∈ program`: true iff a symbol of any kind exists for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains(name)
    }

    pub fn constant(&self, name: &str, filename: Option<&str>) -> Result<Symbol> {
        self.convenience_symbol("constant", name, FindObjectFlags::CONSTANT, filename)
    }

    pub fn function(&self, name: &str, filename: Option<&str>) -> Result<Symbol> {
        self.convenience_symbol("function", name, FindObjectFlags::FUNCTION, filename)
    }

    pub fn variable(&self, name: &str, filename: Option<&str>) -> Result<Symbol> {
        self.convenience_symbol("variable", name, FindObjectFlags::VARIABLE, filename)
    }

    /// Convenience type accessor, built on [`Program::type_of`] the way
    /// `constant`/`function`/`variable` are built on [`Program::symbol`].
    pub fn type_(&self, name: &str, filename: Option<&str>) -> Result<Type> {
        self.type_of(name, filename)
    }

    fn convenience_symbol(
        &self,
        thing: &str,
        name: &str,
        flags: FindObjectFlags,
        filename: Option<&str>,
    ) -> Result<Symbol> {
        self.symbols.symbol(name, flags, filename).map_err(|err| match err {
            Error::Lookup(_) => Error::not_found(thing, name, filename),
            other => other,
        })
    }

    /// Container-style access: `program.index("foo")` is to `program.symbol(...)`
    /// what `map[key]` is to an explicit `map.get(key)` call — a missing name
    /// is a [`Error::Key`], not the [`Error::Lookup`] that `symbol` and the
    /// `constant`/`function`/`variable` accessors raise directly.
    pub fn index(&self, name: &str) -> Result<Symbol> {
        self.symbols.symbol(name, FindObjectFlags::ANY, None).map_err(|err| match err {
            Error::Lookup(message) => Error::key(message),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::ArchFlags;

    fn arch64() -> Architecture {
        Architecture::Flags(ArchFlags::IS_64_BIT)
    }

    #[test]
    fn auto_architecture_resolves_to_host_on_bind_pid() {
        let mut program = Program::new(Architecture::Auto);
        program.bind_pid(1234, Box::new(|_a, c, _o, _p| Ok(vec![0u8; c]))).unwrap();
        assert_eq!(program.architecture(), Architecture::Host);
    }

    #[test]
    fn rebinding_pid_after_core_dump_is_rejected() {
        let mut program = Program::new(arch64());
        program.load_core_dump(vec![]).unwrap();
        let err = program
            .bind_pid(1, Box::new(|_a, c, _o, _p| Ok(vec![0u8; c])))
            .unwrap_err();
        match err {
            Error::Value(message) => assert_eq!(message, "program memory was already initialized"),
            other => panic!("expected value error, got {other:?}"),
        }
    }

    #[test]
    fn manual_segments_before_binding_do_not_block_further_manual_segments() {
        let mut program = Program::new(arch64());
        program.add_memory_segment(0, 16, |_a, c, _o, _p| Ok(vec![0u8; c]), false);
        program.add_memory_segment(16, 16, |_a, c, _o, _p| Ok(vec![0u8; c]), false);
        assert!(program.read(0, 32, false).is_ok());
    }

    #[test]
    fn manual_segments_block_subsequent_pid_bind() {
        let mut program = Program::new(arch64());
        program.add_memory_segment(0, 16, |_a, c, _o, _p| Ok(vec![0u8; c]), false);
        let err = program
            .bind_pid(1, Box::new(|_a, c, _o, _p| Ok(vec![0u8; c])))
            .unwrap_err();
        assert!(matches!(err, Error::Value(_)));
    }

    #[test]
    fn finders_register_regardless_of_binding_state() {
        let mut program = Program::new(arch64());
        program.add_type_finder(|_kind, _name, _filename| Ok(None));
        program.add_symbol_finder(|_name, _flags, _filename| Ok(None));
        program.bind_pid(1, Box::new(|_a, c, _o, _p| Ok(vec![0u8; c]))).unwrap();
        program.add_type_finder(|_kind, _name, _filename| Ok(None));
        program.add_symbol_finder(|_name, _flags, _filename| Ok(None));
    }

    #[test]
    fn convenience_accessor_reformats_lookup_error() {
        let program = Program::new(arch64());
        let err = program.variable("missing", None).unwrap_err();
        match err {
            Error::Lookup(message) => assert_eq!(message, "could not find variable 'missing'"),
            other => panic!("expected lookup error, got {other:?}"),
        }
    }

    #[test]
    fn index_reports_a_key_error_not_a_lookup_error() {
        let program = Program::new(arch64());
        let err = program.index("missing").unwrap_err();
        assert!(matches!(err, Error::Key(_)));
    }

    #[test]
    fn contains_reflects_registered_finders() {
        let mut program = Program::new(arch64());
        program.add_symbol_finder(|name, _flags, _filename| {
            if name == "counter" {
                Ok(Some(Symbol::constant(
                    Type::Int {
                        name: "int".into(),
                        size: 4,
                        is_signed: true,
                        qualifiers: Qualifiers::empty(),
                    },
                    1,
                )))
            } else {
                Ok(None)
            }
        });
        assert!(program.contains("counter"));
        assert!(!program.contains("missing"));
    }

    #[test]
    fn size_t_and_ptrdiff_t_resolve_without_finders() {
        let program = Program::new(arch64());
        let size_t = program.size_t().unwrap();
        let ptrdiff_t = program.ptrdiff_t().unwrap();
        assert_eq!(size_t.size(), Some(8));
        assert_eq!(size_t.is_signed(), Some(false));
        assert_eq!(ptrdiff_t.size(), Some(8));
        assert_eq!(ptrdiff_t.is_signed(), Some(true));
    }

    #[test]
    fn type_of_size_t_matches_the_size_t_accessor() {
        let program = Program::new(arch64());
        let via_type_of = program.type_of("size_t", None).unwrap();
        let via_accessor = program.size_t().unwrap();
        assert_eq!(via_type_of, via_accessor);
        let via_type_of = program.type_("ptrdiff_t", None).unwrap();
        let via_accessor = program.ptrdiff_t().unwrap();
        assert_eq!(via_type_of, via_accessor);
    }

    #[test]
    fn read_after_core_dump_finds_installed_segment() {
        let mut program = Program::new(arch64());
        program
            .load_core_dump(vec![LoadSegment {
                vaddr: 0x1000,
                paddr: None,
                data: vec![1, 2, 3, 4],
                memsz: None,
            }])
            .unwrap();
        assert_eq!(program.read(0x1000, 4, false).unwrap(), vec![1, 2, 3, 4]);
    }
}
