//! Target architecture: word width and byte order, plus the two sentinel
//! states a [`crate::Program`] passes through before it knows what it's
//! actually looking at.

use bitflags::bitflags;

bitflags! {
    /// Concrete architecture flags, once resolved.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ArchFlags: u8 {
        const IS_64_BIT = 0b0000_0001;
        const IS_LITTLE_ENDIAN = 0b0000_0010;
    }
}

/// The architecture of a target program.
///
/// `Auto` and `Host` are sentinels, not flag combinations: a genuine
/// 32-bit, big-endian target also has every [`ArchFlags`] bit clear, so the
/// "unresolved" state can't be represented as a bitset value without
/// colliding with it. A [`Program`](crate::Program) starts at `Auto` and is
/// resolved to `Host` the moment it is bound to a live process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    /// Not yet resolved.
    Auto,
    /// Resolved to whatever this crate was compiled for.
    Host,
    /// A concrete, possibly cross, architecture.
    Flags(ArchFlags),
}

impl Architecture {
    pub fn flags(self) -> ArchFlags {
        match self {
            Architecture::Auto => ArchFlags::empty(),
            Architecture::Host => Self::host_flags(),
            Architecture::Flags(flags) => flags,
        }
    }

    fn host_flags() -> ArchFlags {
        let mut flags = ArchFlags::empty();
        if cfg!(target_pointer_width = "64") {
            flags |= ArchFlags::IS_64_BIT;
        }
        if cfg!(target_endian = "little") {
            flags |= ArchFlags::IS_LITTLE_ENDIAN;
        }
        flags
    }

    pub fn is_64_bit(self) -> bool {
        self.flags().contains(ArchFlags::IS_64_BIT)
    }

    pub fn is_little_endian(self) -> bool {
        self.flags().contains(ArchFlags::IS_LITTLE_ENDIAN)
    }

    /// 8 on a 64-bit target, 4 otherwise. Used to size pointers and to pick
    /// between `long`/`long long`/`int` for `size_t` and `ptrdiff_t`.
    pub fn word_size(self) -> u64 {
        if self.is_64_bit() {
            8
        } else {
            4
        }
    }
}

impl Default for Architecture {
    fn default() -> Self {
        Architecture::Auto
    }
}
