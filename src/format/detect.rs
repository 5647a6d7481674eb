//! Format and compression sniffing.
//!
//! Detection runs in two steps on a prefix of the source:
//!
//! 1. [`detect_compression`] looks for a whole-stream compression layer
//!    (gzip, bzip2, LZMA-alone).
//! 2. [`detect_container`] looks at the (decompressed) prefix for a ZIP
//!    signature or a TAR header block.
//!
//! ZIP is only recognized without an outer compression layer.

use super::{Compression, Format};

/// Size of one TAR block.
pub const TAR_BLOCK_SIZE: usize = 512;

/// Number of prefix bytes needed for a confident decision.
pub const SNIFF_LEN: usize = TAR_BLOCK_SIZE;

/// Compression layer signatures.
const COMPRESSION_SIGNATURES: &[(&[u8], Compression)] = &[
    // gzip: 0x1F 0x8B, deflate method 0x08
    (&[0x1F, 0x8B, 0x08], Compression::Gzip),
    // bzip2: 'B' 'Z' 'h'
    (&[0x42, 0x5A, 0x68], Compression::Bzip2),
];

/// Container signatures.
const CONTAINER_SIGNATURES: &[(&[u8], Format)] = &[
    // ZIP: 'P' 'K' 0x03 0x04 (local file header)
    (&[0x50, 0x4B, 0x03, 0x04], Format::Zip),
    // ZIP: 'P' 'K' 0x05 0x06 (empty archive)
    (&[0x50, 0x4B, 0x05, 0x06], Format::Zip),
];

/// TAR USTAR signature at offset 257.
const TAR_USTAR_OFFSET: usize = 257;
const TAR_USTAR_SIGNATURE: &[u8] = b"ustar";

/// LZMA-alone header: 1 byte properties, 4 bytes dictionary size, 8 bytes
/// uncompressed size.
const LZMA_HEADER_LEN: usize = 13;

/// Largest uncompressed size we accept as plausible in an LZMA-alone header
/// when the size is not the "unknown" marker (256 GiB).
const LZMA_MAX_PLAUSIBLE_SIZE: u64 = 1 << 38;

/// The detected layout of an existing archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Container format.
    pub format: Format,
    /// Whole-stream compression layer for TAR ([`Compression::None`] for a
    /// plain tarball). For ZIP, the method of the first file entry.
    pub compression: Compression,
}

/// Detects a whole-stream compression layer from the first bytes.
///
/// Returns [`Compression::None`] if no layer is recognized.
pub fn detect_compression(head: &[u8]) -> Compression {
    for (signature, compression) in COMPRESSION_SIGNATURES {
        if head.starts_with(signature) {
            return *compression;
        }
    }
    if is_lzma_alone(head) {
        return Compression::Lzma;
    }
    Compression::None
}

/// Detects the container format from the first bytes of an uncompressed
/// stream.
///
/// `head` should hold at least [`SNIFF_LEN`] bytes when the stream is that
/// long; TAR detection needs a whole header block.
pub fn detect_container(head: &[u8]) -> Option<Format> {
    for (signature, format) in CONTAINER_SIGNATURES {
        if head.starts_with(signature) {
            return Some(*format);
        }
    }
    if looks_like_tar(head) {
        return Some(Format::Tar);
    }
    None
}

/// Returns true if `head` starts with something a TAR reader would accept.
fn looks_like_tar(head: &[u8]) -> bool {
    if head.len() < TAR_BLOCK_SIZE {
        return false;
    }
    let block = &head[..TAR_BLOCK_SIZE];
    if block.iter().all(|&b| b == 0) {
        // An empty tarball is just the end-of-archive marker
        return true;
    }
    if &block[TAR_USTAR_OFFSET..TAR_USTAR_OFFSET + TAR_USTAR_SIGNATURE.len()] == TAR_USTAR_SIGNATURE
    {
        return true;
    }
    // Pre-POSIX v7 headers carry no magic, only a checksum
    tar_checksum_matches(block)
}

/// Verifies the checksum field of a 512-byte TAR header block.
pub(crate) fn tar_checksum_matches(block: &[u8]) -> bool {
    if block.len() != TAR_BLOCK_SIZE {
        return false;
    }
    let mut header = tar::Header::new_old();
    header.as_mut_bytes().copy_from_slice(block);
    let Ok(stored) = header.cksum() else {
        return false;
    };
    header.set_cksum();
    header.cksum().is_ok_and(|computed| computed == stored)
}

/// Heuristic check for an LZMA-alone (`.lzma`) header.
///
/// The format has no magic number, so we check that the properties byte is
/// in range, the dictionary size is one an encoder would pick, and the
/// uncompressed size is either unknown or plausible.
fn is_lzma_alone(head: &[u8]) -> bool {
    if head.len() < LZMA_HEADER_LEN {
        return false;
    }
    // lc + lp * 9 + pb * 45 with lc <= 8, lp <= 4, pb <= 4
    if head[0] >= 225 {
        return false;
    }

    let dict_size = u32::from_le_bytes([head[1], head[2], head[3], head[4]]);
    let dict_ok = dict_size == u32::MAX || dict_size.is_power_of_two() || {
        // 2^n + 2^(n-1)
        let low = dict_size & dict_size.wrapping_neg();
        (dict_size - low).is_power_of_two() && (dict_size - low) == low << 1
    };
    if !dict_ok || dict_size < 4096 {
        return false;
    }

    let mut size_bytes = [0u8; 8];
    size_bytes.copy_from_slice(&head[5..13]);
    let size = u64::from_le_bytes(size_bytes);
    size == u64::MAX || size < LZMA_MAX_PLAUSIBLE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tar_block_with_name(name: &str) -> Vec<u8> {
        let mut header = tar::Header::new_ustar();
        header.set_path(name).unwrap();
        header.set_size(0);
        header.set_cksum();
        header.as_bytes().to_vec()
    }

    #[test]
    fn test_detect_gzip() {
        assert_eq!(detect_compression(&[0x1F, 0x8B, 0x08, 0x00]), Compression::Gzip);
    }

    #[test]
    fn test_detect_bzip2() {
        assert_eq!(detect_compression(b"BZh91AY&SY"), Compression::Bzip2);
    }

    #[test]
    fn test_detect_lzma_alone() {
        // props 0x5D, dict 8 MiB, unknown size
        let mut head = vec![0x5D, 0x00, 0x00, 0x80, 0x00];
        head.extend_from_slice(&[0xFF; 8]);
        assert_eq!(detect_compression(&head), Compression::Lzma);
    }

    #[test]
    fn test_lzma_rejects_odd_dictionary() {
        let mut head = vec![0x5D, 0x01, 0x23, 0x45, 0x00];
        head.extend_from_slice(&[0xFF; 8]);
        assert_eq!(detect_compression(&head), Compression::None);
    }

    #[test]
    fn test_text_is_not_compressed() {
        assert_eq!(detect_compression(b"hello world, plain"), Compression::None);
        assert_eq!(detect_compression(&[]), Compression::None);
    }

    #[test]
    fn test_detect_zip() {
        assert_eq!(detect_container(b"PK\x03\x04rest"), Some(Format::Zip));
        assert_eq!(detect_container(b"PK\x05\x06rest"), Some(Format::Zip));
    }

    #[test]
    fn test_detect_ustar() {
        let block = tar_block_with_name("a.txt");
        assert_eq!(detect_container(&block), Some(Format::Tar));
    }

    #[test]
    fn test_detect_v7_by_checksum() {
        let mut header = tar::Header::new_old();
        header.set_path("old.txt").unwrap();
        header.set_size(3);
        header.set_cksum();
        assert!(tar_checksum_matches(header.as_bytes()));
        assert_eq!(detect_container(header.as_bytes()), Some(Format::Tar));
    }

    #[test]
    fn test_detect_zero_block_as_empty_tar() {
        assert_eq!(detect_container(&[0u8; 1024]), Some(Format::Tar));
    }

    #[test]
    fn test_garbage_is_unknown() {
        assert_eq!(detect_container(&[0xAB; 600]), None);
        assert_eq!(detect_container(b"short"), None);
    }

    #[test]
    fn test_corrupted_checksum_rejected() {
        let mut header = tar::Header::new_old();
        header.set_path("x").unwrap();
        header.set_cksum();
        let mut bytes = header.as_bytes().to_vec();
        bytes[0] ^= 0xFF;
        assert!(!tar_checksum_matches(&bytes));
    }
}
