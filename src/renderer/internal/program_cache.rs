//! On-disk cache of linked program binaries, one file per shader name pair.
//!
//! Layout: 4-byte signature, little-endian u32 blob size, little-endian u32
//! driver format tag, little-endian u64 digest of the shader sources, then
//! the blob.

use std::fs;
use std::path::PathBuf;

use crate::error::ProgramCacheError;
use crate::renderer::gpu::ProgramBinary;

pub(crate) const MAGIC: [u8; 4] = *b"GLPB";
const HEADER_LEN: usize = 20;

/// FNV-1a over both stages, separated so moving text between them changes
/// the digest. Stable across runs and toolchains.
pub(crate) fn source_digest(vert: &str, frag: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    vert.bytes()
        .chain(std::iter::once(0))
        .chain(frag.bytes())
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}

pub(crate) fn encode(binary: &ProgramBinary, digest: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + binary.data.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&(binary.data.len() as u32).to_le_bytes());
    out.extend_from_slice(&binary.format.to_le_bytes());
    out.extend_from_slice(&digest.to_le_bytes());
    out.extend_from_slice(&binary.data);
    out
}

pub(crate) fn decode(
    bytes: &[u8],
    expected_format: Option<u32>,
    expected_digest: u64,
) -> Result<ProgramBinary, ProgramCacheError> {
    if bytes.len() < HEADER_LEN {
        return Err(ProgramCacheError::Truncated(bytes.len()));
    }
    let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if magic != MAGIC {
        return Err(ProgramCacheError::BadMagic(magic));
    }
    let declared = word(4);
    let format = word(8);
    let digest = u64::from(word(12)) | (u64::from(word(16)) << 32);
    let blob = &bytes[HEADER_LEN..];
    if declared as usize != blob.len() || declared == 0 {
        return Err(ProgramCacheError::SizeMismatch {
            declared,
            actual: blob.len(),
        });
    }
    if let Some(expected) = expected_format {
        if expected != format {
            return Err(ProgramCacheError::FormatMismatch {
                expected,
                found: format,
            });
        }
    }
    if digest != expected_digest {
        return Err(ProgramCacheError::SourceMismatch);
    }
    Ok(ProgramBinary {
        format,
        data: blob.to_vec(),
    })
}

#[derive(Debug)]
pub(crate) struct ProgramCache {
    dir: PathBuf,
    /// Format of the last binary this driver produced.
    format: Option<u32>,
}

impl ProgramCache {
    pub(crate) fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            format: None,
        }
    }

    pub(crate) fn path_for(&self, vert: &str, frag: &str) -> PathBuf {
        self.dir.join(format!("{vert}__{frag}.pgm"))
    }

    /// `Ok(None)` when nothing is cached for the pair.
    pub(crate) fn load(
        &self,
        vert: &str,
        frag: &str,
        digest: u64,
    ) -> Result<Option<ProgramBinary>, ProgramCacheError> {
        let path = self.path_for(vert, frag);
        match fs::read(&path) {
            Ok(bytes) => decode(&bytes, self.format, digest).map(Some),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ProgramCacheError::Io { path, source }),
        }
    }

    pub(crate) fn store(
        &mut self,
        vert: &str,
        frag: &str,
        digest: u64,
        binary: &ProgramBinary,
    ) -> Result<(), ProgramCacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| ProgramCacheError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(vert, frag);
        fs::write(&path, encode(binary, digest)).map_err(|source| ProgramCacheError::Io { path, source })?;
        self.format = Some(binary.format);
        Ok(())
    }

    /// Removes a stale entry after the driver rejected it.
    pub(crate) fn evict(&self, vert: &str, frag: &str) {
        let path = self.path_for(vert, frag);
        if let Err(err) = fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                log::debug!("Could not evict {:?}: {}", path, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProgramBinary {
        ProgramBinary {
            format: 0x8E21,
            data: vec![1, 2, 3, 4, 5],
        }
    }

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gl_batch_cache_{tag}_{}", std::process::id()))
    }

    const DIGEST: u64 = 0x0123_4567_89ab_cdef;

    #[test]
    fn header_layout() {
        let bytes = encode(&sample(), DIGEST);
        assert_eq!(&bytes[..4], b"GLPB");
        assert_eq!(&bytes[4..8], &5u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &0x8E21u32.to_le_bytes());
        assert_eq!(&bytes[12..20], &DIGEST.to_le_bytes());
        assert_eq!(decode(&bytes, None, DIGEST).unwrap(), sample());
    }

    #[test]
    fn corrupt_blobs_are_rejected() {
        let mut bytes = encode(&sample(), DIGEST);
        assert!(matches!(decode(&bytes[..6], None, DIGEST), Err(ProgramCacheError::Truncated(6))));
        assert!(matches!(
            decode(&bytes[..bytes.len() - 1], None, DIGEST),
            Err(ProgramCacheError::SizeMismatch { declared: 5, actual: 4 })
        ));
        assert!(matches!(
            decode(&bytes, Some(1), DIGEST),
            Err(ProgramCacheError::FormatMismatch { expected: 1, .. })
        ));
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes, None, DIGEST), Err(ProgramCacheError::BadMagic(_))));
    }

    #[test]
    fn digest_tracks_both_sources() {
        let base = source_digest("void main() {}", "out vec4 c;");
        assert_eq!(base, source_digest("void main() {}", "out vec4 c;"));
        assert_ne!(base, source_digest("void main() { }", "out vec4 c;"));
        assert_ne!(base, source_digest("void main() {}", "out vec4 color;"));
        assert_ne!(source_digest("ab", "c"), source_digest("a", "bc"));
    }

    #[test]
    fn edited_sources_do_not_load_the_old_binary() {
        let dir = temp_dir("edited");
        let mut cache = ProgramCache::new(&dir);
        let old = source_digest("v1", "f");
        cache.store("v", "f", old, &sample()).unwrap();
        assert!(matches!(
            cache.load("v", "f", source_digest("v2", "f")),
            Err(ProgramCacheError::SourceMismatch)
        ));
        assert_eq!(cache.load("v", "f", old).unwrap(), Some(sample()));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn store_then_load() {
        let dir = temp_dir("roundtrip");
        let mut cache = ProgramCache::new(&dir);
        assert!(cache.load("v", "f", DIGEST).unwrap().is_none());
        cache.store("v", "f", DIGEST, &sample()).unwrap();
        assert_eq!(cache.load("v", "f", DIGEST).unwrap(), Some(sample()));
        cache.evict("v", "f");
        assert!(cache.load("v", "f", DIGEST).unwrap().is_none());
        let _ = fs::remove_dir_all(&dir);
    }
}
