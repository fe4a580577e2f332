//! Password-based symmetric encryption for artifacts.
//!
//! Key material is derived from the password alone: PBKDF2-HMAC-SHA256 with
//! 10 000 iterations and two fixed salts produces a 32-byte AES-256 key and
//! a 16-byte CBC IV. Data is encrypted whole-buffer with AES-256-CBC and
//! PKCS#7 padding, so ciphertext length is the plaintext rounded up to the
//! next 16-byte multiple (a full extra block when already aligned).
//!
//! There is no MAC: tampering is detected structurally, by padding failure
//! here and by the ustar magic check downstream. Fixed salts also mean
//! identical plaintexts under identical passwords encrypt identically; the
//! artifact format depends on this determinism and tests assert it
//! explicitly.

mod password;

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::{Error, Result};

pub use password::Password;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block size in bytes.
const BLOCK_SIZE: usize = 16;

/// Process-wide salt for key derivation.
const KEY_SALT: &[u8] = b"BackupSystemSalt";
/// Process-wide salt for IV derivation.
const IV_SALT: &[u8] = b"BackupSystemIV";
/// PBKDF2 iteration count.
const PBKDF2_ITERATIONS: u32 = 10_000;

/// Password-keyed AES-256-CBC encryptor.
///
/// Created empty; [`init`](Encryptor::init) derives the key material. Using
/// `encrypt`/`decrypt` before `init` is a typed error, not a panic.
#[derive(Default)]
pub struct Encryptor {
    keys: Option<KeyMaterial>,
}

struct KeyMaterial {
    key: [u8; 32],
    iv: [u8; 16],
}

impl std::fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encryptor")
            .field("initialized", &self.keys.is_some())
            .finish()
    }
}

impl Encryptor {
    /// Creates an uninitialized encryptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an encryptor with keys already derived from `password`.
    pub fn initialized(password: &Password) -> Self {
        let mut enc = Self::new();
        enc.init(password);
        enc
    }

    /// Derives the AES key and IV from `password`.
    ///
    /// Derivation is deliberately slow (PBKDF2, 10 000 iterations) and is
    /// done once per encryptor, not per buffer.
    pub fn init(&mut self, password: &Password) {
        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), KEY_SALT, PBKDF2_ITERATIONS, &mut key);

        let mut iv = [0u8; 16];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), IV_SALT, PBKDF2_ITERATIONS, &mut iv);

        self.keys = Some(KeyMaterial { key, iv });
    }

    /// Returns true once key material has been derived.
    pub fn is_initialized(&self) -> bool {
        self.keys.is_some()
    }

    /// Encrypts a buffer.
    ///
    /// Empty input round-trips to empty output without touching the cipher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before [`init`](Encryptor::init).
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let keys = self.keys.as_ref().ok_or(Error::NotInitialized)?;
        if plaintext.is_empty() {
            return Ok(Vec::new());
        }

        let cipher = Aes256CbcEnc::new(&keys.key.into(), &keys.iv.into());
        Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
    }

    /// Decrypts a buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before [`init`](Encryptor::init),
    /// and [`Error::Decryption`] when the input is not block-aligned or
    /// PKCS#7 padding fails validation, which in practice means a wrong
    /// password or a tampered artifact.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let keys = self.keys.as_ref().ok_or(Error::NotInitialized)?;
        if ciphertext.is_empty() {
            return Ok(Vec::new());
        }
        if ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(Error::Decryption(format!(
                "ciphertext length {} is not a multiple of the {BLOCK_SIZE}-byte block size",
                ciphertext.len()
            )));
        }

        let cipher = Aes256CbcDec::new(&keys.key.into(), &keys.iv.into());
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| Error::Decryption("padding validation failed".into()))
    }
}
