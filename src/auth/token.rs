use std::fmt;
use std::str::FromStr;

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::{Error, Result};

const TOKEN_PREFIX: &str = "foxden";
const LOOKUP_BYTES: usize = 4;
const SECRET_BYTES: usize = 12;

// OWASP minimum for argon2id: 19 MiB, two passes, one lane.
const HASH_MEMORY_KIB: u32 = 19 * 1024;
const HASH_PASSES: u32 = 2;
const HASH_LANES: u32 = 1;

/// A bearer token as handed to the client: `foxden_<lookup>_<secret>`.
///
/// The lookup half is stored in clear and indexes the token row; only a hash
/// of the secret half is stored.
#[derive(Clone, PartialEq, Eq)]
pub struct RawToken {
    lookup: String,
    secret: String,
}

impl RawToken {
    #[must_use]
    pub fn generate() -> Self {
        Self {
            lookup: hex::encode(rand::random::<[u8; LOOKUP_BYTES]>()),
            secret: hex::encode(rand::random::<[u8; SECRET_BYTES]>()),
        }
    }

    pub fn lookup(&self) -> &str {
        &self.lookup
    }
}

impl fmt::Display for RawToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TOKEN_PREFIX}_{}_{}", self.lookup, self.secret)
    }
}

impl fmt::Debug for RawToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawToken")
            .field("lookup", &self.lookup)
            .field("secret", &"<redacted>")
            .finish()
    }
}

fn is_hex_of_len(s: &str, bytes: usize) -> bool {
    s.len() == bytes * 2 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

impl FromStr for RawToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix(TOKEN_PREFIX)
            .and_then(|r| r.strip_prefix('_'))
            .ok_or(Error::InvalidTokenFormat)?;
        let (lookup, secret) = rest.split_once('_').ok_or(Error::InvalidTokenFormat)?;

        if !is_hex_of_len(lookup, LOOKUP_BYTES) || !is_hex_of_len(secret, SECRET_BYTES) {
            return Err(Error::InvalidTokenFormat);
        }

        Ok(Self {
            lookup: lookup.to_string(),
            secret: secret.to_string(),
        })
    }
}

/// Hashes and verifies token secrets with argon2id.
#[derive(Clone)]
pub struct TokenHasher {
    argon2: Argon2<'static>,
}

impl Default for TokenHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenHasher {
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(HASH_MEMORY_KIB, HASH_PASSES, HASH_LANES, None)
            .expect("argon2 params are constants");

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Returns the PHC string for the token's secret, with a fresh salt.
    pub fn hash(&self, token: &RawToken) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(token.secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::Token(format!("hashing failed: {e}")))
    }

    pub fn verify(&self, token: &RawToken, hash: &str) -> Result<bool> {
        let parsed =
            PasswordHash::new(hash).map_err(|e| Error::Token(format!("stored hash unreadable: {e}")))?;

        match self.argon2.verify_password(token.secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Token(format!("verification failed: {e}"))),
        }
    }
}
