// ABOUTME: Thin wrappers over platform cryptographic primitives
// ABOUTME: Secure randomness, ChaCha20-Poly1305, Argon2id key derivation, SHA-256, constant-time compare
//
// SECURITY MODEL:
//
// Real primitives:
// - `random_bytes` / `random_token` use ring's SystemRandom (OS CSPRNG)
// - `encrypt` / `decrypt` use ChaCha20-Poly1305 AEAD with a random 96-bit nonce
// - `derive_key` uses Argon2id over a caller-supplied 32-byte salt
// - `constant_time_eq` uses subtle so comparison time does not depend on content
//
// Placeholders (demo grade, NOT a security boundary):
// - `obfuscate` / `deobfuscate` XOR the refresh token with a key derived from a
//   fixed application salt. Anyone who can read durable storage and this binary
//   can recover the token. It only keeps the raw token out of casual view.
// - `hash_password_demo` is a single unsalted-per-call SHA-256 round. It is kept
//   for parity with the client's demo login and must not be used to store
//   credentials.

use argon2::{Argon2, ParamsBuilder, Version};
use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD},
    Engine,
};
use ring::{
    aead::{self, Nonce, UnboundKey},
    error::Unspecified,
    hkdf,
    rand::{SecureRandom, SystemRandom},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Application salt for obfuscation key derivation (constant, not secret)
const APP_SALT: &[u8] = b"campus-client-obfuscation-v1";

/// Nonce size for ChaCha20-Poly1305
const NONCE_SIZE: usize = 12;

/// Salt size accepted by `derive_key`
pub const SALT_SIZE: usize = 32;

/// Prefix marking obfuscated values so stale plain values are rejected
const OBFUSCATION_PREFIX: &str = "obf1:";

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CryptoError {
    #[error("Failed to generate random data: {0}")]
    RandomGeneration(String),

    #[error("Failed to encrypt data: {0}")]
    Encryption(String),

    #[error("Failed to decrypt data: {0}")]
    Decryption(String),

    #[error("Failed to derive encryption key: {0}")]
    KeyDerivation(String),

    #[error("Invalid encrypted data format")]
    InvalidFormat,
}

impl From<Unspecified> for CryptoError {
    fn from(_: Unspecified) -> Self {
        CryptoError::Encryption("Cryptographic operation failed".to_string())
    }
}

/// 256-bit symmetric key
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Crypto service shared by the CSRF guard and the token vault
#[derive(Debug)]
pub struct CryptoPrimitives {
    rng: SystemRandom,
    obfuscation_key: Vec<u8>,
}

impl CryptoPrimitives {
    /// Create the service with the application-derived obfuscation key.
    ///
    /// The key is deterministic so obfuscated values in durable storage can be
    /// read back after a restart.
    pub fn new() -> CryptoResult<Self> {
        let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, b"campus-obfuscation-salt");
        let prk = salt.extract(APP_SALT);

        let mut obfuscation_key = vec![0u8; 32];
        prk.expand(&[b"refresh-token-obfuscation"], hkdf::HKDF_SHA256)
            .map_err(|_| CryptoError::KeyDerivation("HKDF expansion failed".to_string()))?
            .fill(&mut obfuscation_key)
            .map_err(|_| CryptoError::KeyDerivation("Key fill failed".to_string()))?;

        Ok(Self {
            rng: SystemRandom::new(),
            obfuscation_key,
        })
    }

    /// Fill a buffer of `len` bytes from the OS CSPRNG
    pub fn random_bytes(&self, len: usize) -> CryptoResult<Vec<u8>> {
        let mut bytes = vec![0u8; len];
        self.rng.fill(&mut bytes).map_err(|_| {
            CryptoError::RandomGeneration(format!("Failed to generate {} random bytes", len))
        })?;
        Ok(bytes)
    }

    /// Random token of `len` bytes, base64url-encoded without padding
    pub fn random_token(&self, len: usize) -> CryptoResult<String> {
        Ok(URL_SAFE_NO_PAD.encode(self.random_bytes(len)?))
    }

    /// Generate a random salt for `derive_key`
    pub fn generate_salt(&self) -> CryptoResult<Vec<u8>> {
        self.random_bytes(SALT_SIZE)
    }

    /// Derive a symmetric key from a password with Argon2id
    pub fn derive_key(&self, password: &str, salt: &[u8]) -> CryptoResult<SymmetricKey> {
        if password.is_empty() {
            return Err(CryptoError::KeyDerivation("Password is required".to_string()));
        }
        if salt.len() != SALT_SIZE {
            return Err(CryptoError::KeyDerivation(format!(
                "Salt must be {} bytes",
                SALT_SIZE
            )));
        }

        // Memory: 19 MiB, Iterations: 2, Parallelism: 1
        let params = ParamsBuilder::new()
            .m_cost(19 * 1024)
            .t_cost(2)
            .p_cost(1)
            .output_len(32)
            .build()
            .map_err(|e| CryptoError::KeyDerivation(format!("Invalid Argon2 params: {}", e)))?;

        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

        let mut key = [0u8; 32];
        argon2
            .hash_password_into(password.as_bytes(), salt, &mut key)
            .map_err(|e| CryptoError::KeyDerivation(format!("Argon2 derivation failed: {}", e)))?;

        Ok(SymmetricKey(key))
    }

    /// Encrypt a string.
    /// Returns base64-encoded: nonce || ciphertext || tag
    pub fn encrypt(&self, key: &SymmetricKey, plaintext: &str) -> CryptoResult<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        self.rng.fill(&mut nonce_bytes).map_err(|_| {
            CryptoError::RandomGeneration("Failed to generate nonce".to_string())
        })?;
        let nonce = Nonce::try_assume_unique_for_key(&nonce_bytes)?;

        let unbound_key = UnboundKey::new(&aead::CHACHA20_POLY1305, &key.0)?;
        let sealing_key = aead::LessSafeKey::new(unbound_key);

        let mut in_out = plaintext.as_bytes().to_vec();
        sealing_key
            .seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Encryption("Seal operation failed".to_string()))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + in_out.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&in_out);

        Ok(BASE64.encode(&result))
    }

    /// Decrypt a value produced by `encrypt`
    pub fn decrypt(&self, key: &SymmetricKey, ciphertext: &str) -> CryptoResult<String> {
        let encrypted = BASE64
            .decode(ciphertext)
            .map_err(|_| CryptoError::InvalidFormat)?;

        if encrypted.len() < NONCE_SIZE + aead::CHACHA20_POLY1305.tag_len() {
            return Err(CryptoError::InvalidFormat);
        }

        let (nonce_bytes, ciphertext_and_tag) = encrypted.split_at(NONCE_SIZE);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)?;

        let unbound_key = UnboundKey::new(&aead::CHACHA20_POLY1305, &key.0)?;
        let opening_key = aead::LessSafeKey::new(unbound_key);

        let mut in_out = ciphertext_and_tag.to_vec();
        let plaintext = opening_key
            .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Decryption("Open operation failed".to_string()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| CryptoError::Decryption("Invalid UTF-8 in decrypted data".to_string()))
    }

    /// Hex-encoded SHA-256 digest
    pub fn sha256_hex(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    /// Compare two byte strings in constant time
    pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
        a.ct_eq(b).into()
    }

    /// Scramble a value for at-rest storage. Placeholder, see module docs.
    pub fn obfuscate(&self, plaintext: &str) -> String {
        let scrambled = self.xor_with_key(plaintext.as_bytes());
        format!("{}{}", OBFUSCATION_PREFIX, BASE64.encode(scrambled))
    }

    /// Reverse `obfuscate`
    pub fn deobfuscate(&self, encoded: &str) -> CryptoResult<String> {
        let body = encoded
            .strip_prefix(OBFUSCATION_PREFIX)
            .ok_or(CryptoError::InvalidFormat)?;
        let scrambled = BASE64.decode(body).map_err(|_| CryptoError::InvalidFormat)?;

        String::from_utf8(self.xor_with_key(&scrambled))
            .map_err(|_| CryptoError::Decryption("Invalid UTF-8 in obfuscated data".to_string()))
    }

    /// Demo password hash. Placeholder, see module docs.
    pub fn hash_password_demo(password: &str, salt: &str) -> String {
        Self::sha256_hex(format!("{}:{}", salt, password).as_bytes())
    }

    fn xor_with_key(&self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .zip(self.obfuscation_key.iter().cycle())
            .map(|(byte, key)| byte ^ key)
            .collect()
    }
}
