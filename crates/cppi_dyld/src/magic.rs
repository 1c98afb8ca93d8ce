//! Object file identification from a header prefix.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of leading bytes inspected when sniffing a file.
pub const HEADER_PROBE_LEN: usize = 1024;

const IMAGE_FILE_DLL: u16 = 0x2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMagic {
    Unknown,
    Archive,
    ElfRelocatable,
    ElfExecutable,
    ElfSharedObject,
    ElfCore,
    MachOObject,
    MachOExecutable,
    MachOFixedVirtualMemorySharedLib,
    MachOCore,
    MachOPreloadExecutable,
    MachODynamicallyLinkedSharedLib,
    MachODynamicLinker,
    MachOBundle,
    MachODynamicallyLinkedSharedLibStub,
    MachODsymCompanion,
    MachOKextBundle,
    MachOUniversalBinary,
    PeCoffExecutable,
}

/// Identifies the object format of `header`.
pub fn identify_magic(header: &[u8]) -> FileMagic {
    if header.len() < 4 {
        return FileMagic::Unknown;
    }

    if header.starts_with(b"!<arch>\n") {
        return FileMagic::Archive;
    }

    if header.starts_with(b"\x7fELF") {
        return identify_elf(header);
    }

    match header[..4] {
        [0xCA, 0xFE, 0xBA, 0xBE] => {
            // Java class files share this magic; fat headers carry a small arch count.
            match read_u32_be(header, 4) {
                Some(count) if count < 43 => FileMagic::MachOUniversalBinary,
                _ => FileMagic::Unknown,
            }
        }
        [0xFE, 0xED, 0xFA, 0xCE | 0xCF] => identify_macho(read_u32_be(header, 12)),
        [0xCE | 0xCF, 0xFA, 0xED, 0xFE] => identify_macho(read_u32_le(header, 12)),
        [b'M', b'Z', ..] => match read_u32_le(header, 0x3c) {
            Some(offset) if pe_signature_at(header, offset as usize) => {
                FileMagic::PeCoffExecutable
            }
            _ => FileMagic::Unknown,
        },
        _ => FileMagic::Unknown,
    }
}

fn identify_elf(header: &[u8]) -> FileMagic {
    let little_endian = header.get(5) == Some(&1);
    let (Some(&lo), Some(&hi)) = (header.get(16), header.get(17)) else {
        return FileMagic::Unknown;
    };
    let elf_type = if little_endian {
        u16::from_le_bytes([lo, hi])
    } else {
        u16::from_be_bytes([lo, hi])
    };
    match elf_type {
        1 => FileMagic::ElfRelocatable,
        2 => FileMagic::ElfExecutable,
        3 => FileMagic::ElfSharedObject,
        4 => FileMagic::ElfCore,
        _ => FileMagic::Unknown,
    }
}

fn identify_macho(file_type: Option<u32>) -> FileMagic {
    match file_type {
        Some(1) => FileMagic::MachOObject,
        Some(2) => FileMagic::MachOExecutable,
        Some(3) => FileMagic::MachOFixedVirtualMemorySharedLib,
        Some(4) => FileMagic::MachOCore,
        Some(5) => FileMagic::MachOPreloadExecutable,
        Some(6) => FileMagic::MachODynamicallyLinkedSharedLib,
        Some(7) => FileMagic::MachODynamicLinker,
        Some(8) => FileMagic::MachOBundle,
        Some(9) => FileMagic::MachODynamicallyLinkedSharedLibStub,
        Some(10) => FileMagic::MachODsymCompanion,
        Some(11) => FileMagic::MachOKextBundle,
        _ => FileMagic::Unknown,
    }
}

fn pe_signature_at(header: &[u8], offset: usize) -> bool {
    header
        .get(offset..offset.saturating_add(4))
        .is_some_and(|sig| sig == b"PE\0\0")
}

/// True when the PE headers in `header` carry the DLL characteristic.
pub fn is_dll(header: &[u8]) -> bool {
    let Some(offset) = read_u32_le(header, 0x3c) else {
        return false;
    };
    let offset = offset as usize;
    let Some(pe_header) = header.get(offset..offset.saturating_add(24)) else {
        return false;
    };
    let characteristics = u16::from_le_bytes([pe_header[22], pe_header[23]]);
    characteristics & IMAGE_FILE_DLL != 0
}

fn read_u32_le(bytes: &[u8], at: usize) -> Option<u32> {
    let chunk = bytes.get(at..at.checked_add(4)?)?;
    Some(u32::from_le_bytes(chunk.try_into().ok()?))
}

fn read_u32_be(bytes: &[u8], at: usize) -> Option<u32> {
    let chunk = bytes.get(at..at.checked_add(4)?)?;
    Some(u32::from_be_bytes(chunk.try_into().ok()?))
}

/// Reads at most [`HEADER_PROBE_LEN`] bytes from the start of `path`.
///
/// Only the prefix is read so a concurrently truncated file cannot fault us.
pub fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut header = Vec::with_capacity(HEADER_PROBE_LEN);
    file.take(HEADER_PROBE_LEN as u64).read_to_end(&mut header)?;
    Ok(header)
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Minimal 64-bit little-endian ELF header of the given `e_type`, padded to `len`.
    pub fn elf(e_type: u16, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len.max(64)];
        bytes[..4].copy_from_slice(b"\x7fELF");
        bytes[4] = 2;
        bytes[5] = 1;
        bytes[6] = 1;
        bytes[16..18].copy_from_slice(&e_type.to_le_bytes());
        bytes
    }

    /// Minimal 64-bit little-endian Mach-O header of the given file type.
    pub fn macho(file_type: u32) -> Vec<u8> {
        let mut bytes = vec![0u8; 64];
        bytes[..4].copy_from_slice(&[0xCF, 0xFA, 0xED, 0xFE]);
        bytes[12..16].copy_from_slice(&file_type.to_le_bytes());
        bytes
    }

    /// Minimal PE image with the given COFF characteristics.
    pub fn pe(characteristics: u16) -> Vec<u8> {
        let mut bytes = vec![0u8; 256];
        bytes[..2].copy_from_slice(b"MZ");
        bytes[0x3c..0x40].copy_from_slice(&0x80u32.to_le_bytes());
        bytes[0x80..0x84].copy_from_slice(b"PE\0\0");
        bytes[0x80 + 22..0x80 + 24].copy_from_slice(&characteristics.to_le_bytes());
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures;
    use super::*;

    #[test]
    fn test_identify_elf() {
        assert_eq!(identify_magic(&fixtures::elf(3, 64)), FileMagic::ElfSharedObject);
        assert_eq!(identify_magic(&fixtures::elf(2, 64)), FileMagic::ElfExecutable);
        assert_eq!(identify_magic(&fixtures::elf(1, 64)), FileMagic::ElfRelocatable);
    }

    #[test]
    fn test_identify_macho() {
        assert_eq!(
            identify_magic(&fixtures::macho(6)),
            FileMagic::MachODynamicallyLinkedSharedLib
        );
        assert_eq!(identify_magic(&fixtures::macho(2)), FileMagic::MachOExecutable);

        let mut fat = vec![0xCA, 0xFE, 0xBA, 0xBE];
        fat.extend_from_slice(&2u32.to_be_bytes());
        assert_eq!(identify_magic(&fat), FileMagic::MachOUniversalBinary);

        let mut class_file = vec![0xCA, 0xFE, 0xBA, 0xBE];
        class_file.extend_from_slice(&0x0000_0034u32.to_be_bytes());
        assert_eq!(identify_magic(&class_file), FileMagic::Unknown);
    }

    #[test]
    fn test_identify_pe() {
        let dll = fixtures::pe(IMAGE_FILE_DLL | 0x0002);
        assert_eq!(identify_magic(&dll), FileMagic::PeCoffExecutable);
        assert!(is_dll(&dll));
        assert!(!is_dll(&fixtures::pe(0x0002)));
    }

    #[test]
    fn test_identify_garbage() {
        assert_eq!(identify_magic(b"hello world"), FileMagic::Unknown);
        assert_eq!(identify_magic(b"\x7fE"), FileMagic::Unknown);
        assert_eq!(identify_magic(b"!<arch>\nfoo"), FileMagic::Archive);
    }

    #[test]
    fn test_read_header_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.so");
        std::fs::write(&path, fixtures::elf(3, 4096)).unwrap();
        let header = read_header(&path).unwrap();
        assert_eq!(header.len(), HEADER_PROBE_LEN);
        assert_eq!(identify_magic(&header), FileMagic::ElfSharedObject);
    }
}
