/// Argon2id password hashing
///
/// Hashes are stored in the PHC string format
/// `$argon2id$v=19$m=<KiB>,t=<iterations>,p=<lanes>$<salt>$<hash>` (standard
/// base64, no padding). The encoding carries its own cost parameters, salt and
/// key length, so hashes made under older parameters keep verifying after the
/// configured defaults change.

use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Errors from hashing or verifying a password
///
/// A `Decode` error means the stored hash itself is unusable. That is an
/// operational fault and must not be reported as a failed login.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("malformed password hash: {0}")]
    Decode(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("invalid {name}: {reason}")]
    InvalidParam { name: &'static str, reason: String },
}

/// Tunable Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u8,
    /// Salt length in bytes
    pub salt_length: u32,
    /// Derived key length in bytes
    pub key_length: u32,
}

impl Default for PasswordParams {
    /// 64 MiB, one pass, four lanes, 16-byte salt, 32-byte key
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 1,
            parallelism: 4,
            salt_length: 16,
            key_length: 32,
        }
    }
}

impl PasswordParams {
    /// Defaults overridden by `ARGON_MEMORY`, `ARGON_ITERATIONS`,
    /// `ARGON_PARALLELISM`, `ARGON_SALT_LENGTH` and `ARGON_KEY_LENGTH`.
    pub fn from_env() -> Result<Self, PasswordError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PasswordError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut params = Self::default();

        if let Some(v) = parse_override(&lookup, "ARGON_MEMORY")? {
            params.memory_kib = v;
        }
        if let Some(v) = parse_override(&lookup, "ARGON_ITERATIONS")? {
            params.iterations = v;
        }
        if let Some(v) = parse_override(&lookup, "ARGON_PARALLELISM")? {
            params.parallelism = v;
        }
        if let Some(v) = parse_override(&lookup, "ARGON_SALT_LENGTH")? {
            params.salt_length = v;
        }
        if let Some(v) = parse_override(&lookup, "ARGON_KEY_LENGTH")? {
            params.key_length = v;
        }

        Ok(params)
    }
}

fn parse_override<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, PasswordError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| PasswordError::InvalidParam {
                name,
                reason: e.to_string(),
            }),
    }
}

/// Hash `password` with a fresh random salt under `params`
pub fn hash_password(password: &str, params: &PasswordParams) -> Result<String, PasswordError> {
    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        u32::from(params.parallelism),
        Some(params.key_length as usize),
    )
    .map_err(|e| PasswordError::Hash(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut salt_bytes = vec![0u8; params.salt_length as usize];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| PasswordError::Hash(e.to_string()))?;

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;

    Ok(hash.to_string())
}

/// Check `password` against an encoded hash
///
/// Recomputes the KDF with the parameters, salt and key length embedded in
/// `encoded`; the final comparison is constant-time. Returns `Ok(false)` on a
/// mismatch and `Err` when `encoded` cannot be parsed.
pub fn verify_password(password: &str, encoded: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(encoded).map_err(|e| PasswordError::Decode(e.to_string()))?;

    if parsed.algorithm != argon2::ARGON2ID_IDENT {
        return Err(PasswordError::Decode(format!(
            "unsupported algorithm '{}'",
            parsed.algorithm
        )));
    }
    if parsed.hash.is_none() {
        return Err(PasswordError::Decode("missing hash field".to_string()));
    }

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Decode(e.to_string())),
    }
}
