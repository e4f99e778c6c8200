//! A minimal ELF32/ELF64 program-header walker: just enough to read
//! `PT_LOAD` entries out of a core-dump file. This is the boundary-level
//! reader SPEC_FULL.md's §4.5 asks for, not a DWARF/section/symtab parser;
//! the result is handed straight to [`crate::memory::MemoryMap`] the same
//! way a caller-parsed list would be.

use std::path::Path;

use anyhow::{bail, ensure, Context};

use crate::error::{Error, Result};

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ET_CORE: u16 = 4;
const PT_LOAD: u32 = 1;

/// One `PT_LOAD` program header, ready for [`crate::Program::load_core_dump`].
pub struct LoadSegment {
    pub vaddr: u64,
    pub paddr: Option<u64>,
    pub data: Vec<u8>,
    pub memsz: Option<u64>,
}

struct ElfHeader {
    is_64: bool,
    little_endian: bool,
    e_type: u16,
    phoff: u64,
    phentsize: u16,
    phnum: u16,
}

pub fn read_core_dump_file(path: &Path) -> Result<Vec<LoadSegment>> {
    let bytes = std::fs::read(path).map_err(|e| Error::value(format!("could not read '{}': {e}", path.display())))?;
    read_core_dump_bytes(&bytes)
}

pub fn read_core_dump_bytes(bytes: &[u8]) -> Result<Vec<LoadSegment>> {
    if bytes.len() < 4 || bytes[0..4] != ELF_MAGIC {
        return Err(Error::file_format("not an ELF file"));
    }
    let header = parse_header(bytes).map_err(|e| Error::value(e.to_string()))?;
    if header.e_type != ET_CORE {
        return Err(Error::value("not an ELF core file"));
    }
    parse_program_headers(bytes, &header).map_err(|e| Error::value(e.to_string()))
}

fn parse_header(bytes: &[u8]) -> anyhow::Result<ElfHeader> {
    ensure!(bytes.len() >= 0x14, "file too short for an ELF header");
    let ei_class = bytes[4];
    let ei_data = bytes[5];
    let is_64 = match ei_class {
        1 => false,
        2 => true,
        other => bail!("unsupported ELF class {other}"),
    };
    let little_endian = match ei_data {
        1 => true,
        2 => false,
        other => bail!("unsupported ELF data encoding {other}"),
    };

    let read_u16 = |off: usize| read_u16_at(bytes, off, little_endian);
    let read_u64 = |off: usize| -> anyhow::Result<u64> {
        if is_64 {
            read_u64_at(bytes, off, little_endian)
        } else {
            read_u32_at(bytes, off, little_endian).map(u64::from)
        }
    };

    let e_type = read_u16(0x10).context("reading e_type")?;
    let (phoff, phentsize, phnum) = if is_64 {
        (
            read_u64(0x20).context("reading e_phoff")?,
            read_u16(0x36).context("reading e_phentsize")?,
            read_u16(0x38).context("reading e_phnum")?,
        )
    } else {
        (
            read_u64(0x1c).context("reading e_phoff")?,
            read_u16(0x2a).context("reading e_phentsize")?,
            read_u16(0x2c).context("reading e_phnum")?,
        )
    };

    Ok(ElfHeader {
        is_64,
        little_endian,
        e_type,
        phoff,
        phentsize,
        phnum,
    })
}

fn parse_program_headers(bytes: &[u8], header: &ElfHeader) -> anyhow::Result<Vec<LoadSegment>> {
    let mut segments = Vec::new();
    for i in 0..header.phnum as usize {
        let base = header.phoff as usize + i * header.phentsize as usize;
        ensure!(base + header.phentsize as usize <= bytes.len(), "program header {i} out of bounds");

        let p_type = read_u32_at(bytes, base, header.little_endian)?;
        if p_type != PT_LOAD {
            continue;
        }

        let (p_offset, p_vaddr, p_paddr, p_filesz, p_memsz) = if header.is_64 {
            (
                read_u64_at(bytes, base + 0x08, header.little_endian)?,
                read_u64_at(bytes, base + 0x10, header.little_endian)?,
                read_u64_at(bytes, base + 0x18, header.little_endian)?,
                read_u64_at(bytes, base + 0x20, header.little_endian)?,
                read_u64_at(bytes, base + 0x28, header.little_endian)?,
            )
        } else {
            (
                u64::from(read_u32_at(bytes, base + 0x04, header.little_endian)?),
                u64::from(read_u32_at(bytes, base + 0x08, header.little_endian)?),
                u64::from(read_u32_at(bytes, base + 0x0c, header.little_endian)?),
                u64::from(read_u32_at(bytes, base + 0x10, header.little_endian)?),
                u64::from(read_u32_at(bytes, base + 0x14, header.little_endian)?),
            )
        };

        let start = p_offset as usize;
        let end = start + p_filesz as usize;
        ensure!(end <= bytes.len(), "PT_LOAD segment {i} file range out of bounds");
        segments.push(LoadSegment {
            vaddr: p_vaddr,
            paddr: (p_paddr != 0).then_some(p_paddr),
            data: bytes[start..end].to_vec(),
            memsz: (p_memsz != p_filesz).then_some(p_memsz),
        });
    }
    Ok(segments)
}

fn read_u16_at(bytes: &[u8], off: usize, little_endian: bool) -> anyhow::Result<u16> {
    ensure!(off + 2 <= bytes.len(), "u16 read at {off} out of bounds");
    let raw: [u8; 2] = bytes[off..off + 2].try_into().unwrap();
    Ok(if little_endian {
        u16::from_le_bytes(raw)
    } else {
        u16::from_be_bytes(raw)
    })
}

fn read_u32_at(bytes: &[u8], off: usize, little_endian: bool) -> anyhow::Result<u32> {
    ensure!(off + 4 <= bytes.len(), "u32 read at {off} out of bounds");
    let raw: [u8; 4] = bytes[off..off + 4].try_into().unwrap();
    Ok(if little_endian {
        u32::from_le_bytes(raw)
    } else {
        u32::from_be_bytes(raw)
    })
}

fn read_u64_at(bytes: &[u8], off: usize, little_endian: bool) -> anyhow::Result<u64> {
    ensure!(off + 8 <= bytes.len(), "u64 read at {off} out of bounds");
    let raw: [u8; 8] = bytes[off..off + 8].try_into().unwrap();
    Ok(if little_endian {
        u64::from_le_bytes(raw)
    } else {
        u64::from_be_bytes(raw)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_elf64_core_one_load(vaddr: u64, data: &[u8], memsz: Option<u64>) -> Vec<u8> {
        let mut buf = vec![0u8; 0x40];
        buf[0..4].copy_from_slice(&ELF_MAGIC);
        buf[4] = 2; // ELFCLASS64
        buf[5] = 1; // little endian
        buf[0x10..0x12].copy_from_slice(&ET_CORE.to_le_bytes());
        let phoff = buf.len() as u64;
        buf[0x20..0x28].copy_from_slice(&phoff.to_le_bytes());
        let phentsize: u16 = 0x38;
        buf[0x36..0x38].copy_from_slice(&phentsize.to_le_bytes());
        let phnum: u16 = 1;
        buf[0x38..0x3a].copy_from_slice(&phnum.to_le_bytes());

        let mut ph = vec![0u8; phentsize as usize];
        ph[0..4].copy_from_slice(&PT_LOAD.to_le_bytes());
        let p_offset = (buf.len() + ph.len()) as u64;
        ph[0x08..0x10].copy_from_slice(&p_offset.to_le_bytes());
        ph[0x10..0x18].copy_from_slice(&vaddr.to_le_bytes());
        ph[0x18..0x20].copy_from_slice(&0u64.to_le_bytes());
        ph[0x20..0x28].copy_from_slice(&(data.len() as u64).to_le_bytes());
        ph[0x28..0x30].copy_from_slice(&memsz.unwrap_or(data.len() as u64).to_le_bytes());
        buf.extend_from_slice(&ph);
        buf.extend_from_slice(data);
        buf
    }

    #[test]
    fn non_elf_file_fails_with_file_format_error() {
        let err = read_core_dump_bytes(b"not an elf").unwrap_err();
        assert!(matches!(err, Error::FileFormat(_)));
    }

    #[test]
    fn elf_file_that_is_not_core_fails_with_value_error() {
        let mut bytes = build_elf64_core_one_load(0x400000, b"abcd", None);
        bytes[0x10..0x12].copy_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        let err = read_core_dump_bytes(&bytes).unwrap_err();
        match err {
            Error::Value(message) => assert_eq!(message, "not an ELF core file"),
            other => panic!("expected value error, got {other:?}"),
        }
    }

    #[test]
    fn reads_a_single_pt_load_segment() {
        let bytes = build_elf64_core_one_load(0x400000, b"abcd", Some(8));
        let segments = read_core_dump_bytes(&bytes).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].vaddr, 0x400000);
        assert_eq!(segments[0].data, b"abcd");
        assert_eq!(segments[0].memsz, Some(8));
    }
}
