use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::error::{RecoveryError, Result};

/// BLAKE3 fingerprint of a file's full content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; blake3::OUT_LEN]);

impl ContentDigest {
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

pub fn digest_file(path: &Path) -> Result<ContentDigest> {
    let metadata = fs::metadata(path).map_err(|err| RecoveryError::unreadable(path, err))?;
    if !metadata.is_file() {
        return Err(RecoveryError::unreadable(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }

    let file = File::open(path).map_err(|err| RecoveryError::unreadable(path, err))?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0_u8; 64 * 1024];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(RecoveryError::unreadable(path, err)),
        };
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let digest = ContentDigest(*hasher.finalize().as_bytes());
    debug!("digest {} = {}", path.display(), digest);
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::digest_file;

    #[test]
    fn equal_content_gives_equal_digest() {
        let temp = TempDir::new().expect("tempdir");
        let a = temp.path().join("a.txt");
        let b = temp.path().join("b.txt");
        let c = temp.path().join("c.txt");
        fs::write(&a, b"hello").expect("write a");
        fs::write(&b, b"hello").expect("write b");
        fs::write(&c, b"HELLO").expect("write c");

        let da = digest_file(&a).expect("digest a");
        assert_eq!(da, digest_file(&b).expect("digest b"));
        assert_ne!(da, digest_file(&c).expect("digest c"));
        assert_eq!(da.to_hex().len(), 64);
    }

    #[test]
    fn empty_files_match() {
        let temp = TempDir::new().expect("tempdir");
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        fs::write(&a, b"").expect("write a");
        fs::write(&b, b"").expect("write b");

        assert_eq!(
            digest_file(&a).expect("digest a"),
            digest_file(&b).expect("digest b")
        );
    }

    #[test]
    fn missing_file_is_unreadable_not_found() {
        let temp = TempDir::new().expect("tempdir");
        let err = digest_file(&temp.path().join("absent")).expect_err("missing file");
        assert!(err.is_not_found());
    }

    #[test]
    fn directory_is_rejected() {
        let temp = TempDir::new().expect("tempdir");
        let err = digest_file(temp.path()).expect_err("directory is not a file");
        assert!(!err.is_not_found());
    }

    #[test]
    fn digest_spans_multiple_buffers() {
        let temp = TempDir::new().expect("tempdir");
        let a = temp.path().join("big.bin");
        let b = temp.path().join("big2.bin");
        let mut data = vec![7_u8; 200 * 1024];
        fs::write(&a, &data).expect("write a");
        data[150 * 1024] = 8;
        fs::write(&b, &data).expect("write b");

        assert_ne!(
            digest_file(&a).expect("digest a"),
            digest_file(&b).expect("digest b")
        );
    }
}
