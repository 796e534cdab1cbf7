//! Content fingerprints for change detection.
//!
//! Digests are lowercase hex SHA-256. File digesting streams in fixed-size
//! chunks so large PDFs never have to be fully materialised.

use std::{
  fs::File,
  io::{self, Read},
  path::Path,
};

use sha2::{Digest, Sha256};

const CHUNK: usize = 8192;

/// Digest an in-memory byte slice.
pub fn digest_bytes(bytes: &[u8]) -> String {
  hex::encode(Sha256::digest(bytes))
}

/// Digest a file by streaming its contents.
///
/// Blocking; call from `spawn_blocking` on an async runtime.
pub fn digest_file(path: &Path) -> io::Result<String> {
  let mut file = File::open(path)?;
  let mut hasher = Sha256::new();
  let mut buf = [0u8; CHUNK];

  loop {
    let n = file.read(&mut buf)?;
    if n == 0 {
      break;
    }
    hasher.update(&buf[..n]);
  }

  Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn digesting_twice_is_deterministic() {
    let bytes = b"annual balance sheet 2024";
    assert_eq!(digest_bytes(bytes), digest_bytes(bytes));
  }

  #[test]
  fn one_byte_difference_changes_digest() {
    let a = b"annual balance sheet 2024".to_vec();
    let mut b = a.clone();
    b[0] ^= 1;
    assert_ne!(digest_bytes(&a), digest_bytes(&b));
  }

  #[test]
  fn file_digest_matches_byte_digest() {
    let bytes = vec![0xabu8; 3 * CHUNK + 17];

    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(&bytes).unwrap();

    assert_eq!(digest_file(tmp.path()).unwrap(), digest_bytes(&bytes));
  }

  #[test]
  fn missing_file_propagates_read_failure() {
    assert!(digest_file(Path::new("/nonexistent/never.pdf")).is_err());
  }
}
