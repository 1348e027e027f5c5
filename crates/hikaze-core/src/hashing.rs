//! Streaming SHA-256 for model files.
//!
//! Model files run to many gigabytes, so content is read in fixed chunks and
//! never held in memory as a whole.

use crate::config::ScanConfig;
use crate::error::{HikazeError, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Compute the SHA-256 of a file as lowercase hex.
pub fn sha256_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| HikazeError::io_with_path(e, path))?;
    sha256_reader(file).map_err(|e| match e {
        HikazeError::Io {
            message, source, ..
        } => HikazeError::Io {
            message,
            path: Some(path.to_path_buf()),
            source,
        },
        other => other,
    })
}

/// Compute the SHA-256 of everything `reader` yields.
pub fn sha256_reader(mut reader: impl Read) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; ScanConfig::HASH_CHUNK_SIZE];
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_sha256_known_value() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        let hash = sha256_file(file.path()).unwrap();
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_sha256_empty_input() {
        let hash = sha256_reader(std::io::empty()).unwrap();
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = sha256_file("/definitely/not/here.safetensors").unwrap_err();
        match err {
            HikazeError::Io { path, .. } => {
                assert_eq!(path.unwrap(), Path::new("/definitely/not/here.safetensors"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
