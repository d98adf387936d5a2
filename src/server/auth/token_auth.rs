use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::server::auth::{AuthBackend, AuthError};

/// Static shared-secret authentication.
///
/// Only SHA-256 digests of the accepted tokens are kept in memory. Digests
/// come from plaintext tokens (hashed on the way in) and/or a token file
/// holding one hex digest per line.
#[derive(Debug, Default, Clone)]
pub struct TokenAuth {
    digests: HashSet<[u8; 32]>,
}

impl TokenAuth {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a backend accepting each of `tokens`. Empty tokens are ignored.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut auth = Self::new();
        for t in tokens {
            auth.add_token(t.as_ref());
        }
        auth
    }

    /// Loads hex digests from `path`. `#` lines are comments; malformed
    /// lines are reported and skipped.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut auth = Self::new();
        auth.load_file(path)?;
        Ok(auth)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;

        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match from_hex(line, 32) {
                Some(bytes) => {
                    let mut digest = [0u8; 32];
                    digest.copy_from_slice(&bytes);
                    self.digests.insert(digest);
                }
                None => eprintln!(
                    "[TokenAuth] ignoring malformed digest on line {} in {:?}",
                    line_no + 1,
                    path
                ),
            }
        }
        Ok(())
    }

    pub fn add_token(&mut self, token: &str) {
        if !token.is_empty() {
            self.digests.insert(hash_token(token));
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// A fresh random token (32 hex chars).
    #[must_use]
    pub fn generate_token() -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        to_hex(&bytes)
    }

    /// The token-file line for `token`.
    #[must_use]
    pub fn digest_hex(token: &str) -> String {
        to_hex(&hash_token(token))
    }
}

impl AuthBackend for TokenAuth {
    fn is_required(&self) -> bool {
        !self.digests.is_empty()
    }

    fn verify(&self, token: &str) -> Result<(), AuthError> {
        if self.digests.contains(&hash_token(token)) {
            Ok(())
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}

fn hash_token(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

fn to_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push(HEX[(b >> 4) as usize] as char);
        s.push(HEX[(b & 0x0f) as usize] as char);
    }
    s
}

// Parse exactly `expected_len` bytes from hex; None if the format is wrong.
fn from_hex(input: &str, expected_len: usize) -> Option<Vec<u8>> {
    if input.len() != expected_len * 2 {
        return None;
    }
    input
        .as_bytes()
        .chunks(2)
        .map(|pair| Some((hex_val(pair[0])? << 4) | hex_val(pair[1])?))
        .collect()
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(10 + c - b'a'),
        b'A'..=b'F' => Some(10 + c - b'A'),
        _ => None,
    }
}
