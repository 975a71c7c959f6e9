// crates/grafton-client/src/keypair.rs
// ============================================================================
// Module: Keypairs
// Description: Master keypair files and endorsed live signing keys.
// Purpose: Produce the keys that sign every provider request.
// Dependencies: base64, ed25519-dalek, rand, serde_json
// ============================================================================

//! ## Overview
//! The master keypair lives on disk as `{"public_key", "private_key"}` with
//! standard base64 values; the private key is the 32-byte seed followed by
//! the public key. A run never signs with the master key directly: it mints
//! a [`LiveKeypair`] whose public key the master key endorses.
//!
//! Security posture: the key file is written owner-only where the platform
//! supports it and is validated on load (seed and public key must agree).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::SECRET_KEY_LENGTH;
use ed25519_dalek::Signer as _;
use ed25519_dalek::SigningKey;
use ed25519_dalek::VerifyingKey;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Serialize;

use crate::error::KeypairError;
use crate::signing::RequestSignature;
use crate::signing::Signer;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Endorsement carried by keys that must fail signature checks.
const INVALID_ENDORSEMENT: &[u8] = b"not-valid";

// ============================================================================
// SECTION: Master Keypair
// ============================================================================

/// On-disk keypair document.
#[derive(Debug, Serialize, Deserialize)]
struct KeypairDocument {
    /// Standard base64 public key.
    public_key: String,
    /// Standard base64 seed followed by the public key.
    private_key: String,
}

/// Long-lived keypair that endorses live keys.
#[derive(Debug)]
pub struct MasterKeypair {
    /// Master signing key.
    signing_key: SigningKey,
}

impl MasterKeypair {
    /// Generates a fresh random keypair.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: random_signing_key(),
        }
    }

    /// Loads and validates a keypair file.
    ///
    /// # Errors
    ///
    /// Returns [`KeypairError::Io`] when the file cannot be read,
    /// [`KeypairError::Parse`] for malformed content, and
    /// [`KeypairError::Invalid`] when the keys do not form a pair.
    pub fn load(path: &Path) -> Result<Self, KeypairError> {
        let content = fs::read_to_string(path).map_err(|err| KeypairError::Io(err.to_string()))?;
        Self::from_json(&content)
    }

    /// Parses a keypair document.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`] minus the I/O case.
    pub fn from_json(content: &str) -> Result<Self, KeypairError> {
        let document: KeypairDocument =
            serde_json::from_str(content).map_err(|err| KeypairError::Parse(err.to_string()))?;
        let public = STANDARD
            .decode(document.public_key.trim())
            .map_err(|_| KeypairError::Parse("public_key is not base64".to_string()))?;
        let private = STANDARD
            .decode(document.private_key.trim())
            .map_err(|_| KeypairError::Parse("private_key is not base64".to_string()))?;
        let seed: [u8; SECRET_KEY_LENGTH] = private
            .get(..SECRET_KEY_LENGTH)
            .and_then(|seed| seed.try_into().ok())
            .ok_or_else(|| KeypairError::Invalid("private_key is too short".to_string()))?;
        if private.len() != SECRET_KEY_LENGTH * 2 {
            return Err(KeypairError::Invalid("private_key must be 64 bytes".to_string()));
        }
        let signing_key = SigningKey::from_bytes(&seed);
        let derived = signing_key.verifying_key().to_bytes();
        if public.as_slice() != derived || private[SECRET_KEY_LENGTH..] != derived {
            return Err(KeypairError::Invalid("public_key does not match private_key".to_string()));
        }
        Ok(Self {
            signing_key,
        })
    }

    /// Serializes the keypair document.
    #[must_use]
    pub fn to_json(&self) -> String {
        let document = KeypairDocument {
            public_key: self.public_key_base64(),
            private_key: self.private_key_base64(),
        };
        serde_json::to_string(&document).unwrap_or_default()
    }

    /// Writes the keypair to `path`, owner read/write only on unix.
    ///
    /// # Errors
    ///
    /// Returns [`KeypairError::Io`] when the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), KeypairError> {
        let io_error = |err: std::io::Error| KeypairError::Io(err.to_string());
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path).map_err(io_error)?;
        file.write_all(self.to_json().as_bytes()).map_err(io_error)?;
        file.flush().map_err(io_error)
    }

    /// Public key, standard base64.
    #[must_use]
    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Seed followed by public key, standard base64.
    #[must_use]
    pub fn private_key_base64(&self) -> String {
        STANDARD.encode(self.signing_key.to_keypair_bytes())
    }

    /// Master verifying key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Mints a live keypair endorsed by this master key.
    #[must_use]
    pub fn live_keypair(&self) -> LiveKeypair {
        let signing_key = random_signing_key();
        let endorsement =
            self.signing_key.sign(signing_key.verifying_key().as_bytes()).to_bytes().to_vec();
        LiveKeypair {
            signing_key,
            endorsement,
        }
    }
}

// ============================================================================
// SECTION: Live Keypair
// ============================================================================

/// Request signing key plus its master endorsement.
pub struct LiveKeypair {
    /// Live signing key.
    signing_key: SigningKey,
    /// Master signature over the live public key.
    endorsement: Vec<u8>,
}

impl LiveKeypair {
    /// Mints a keypair whose endorsement never verifies.
    #[must_use]
    pub fn unendorsed() -> Self {
        Self {
            signing_key: random_signing_key(),
            endorsement: INVALID_ENDORSEMENT.to_vec(),
        }
    }

    /// Live verifying key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl Signer for LiveKeypair {
    fn sign(&self, canonical: &[u8]) -> RequestSignature {
        RequestSignature {
            value: self.signing_key.sign(canonical).to_bytes().to_vec(),
            public_key: self.signing_key.verifying_key().to_bytes().to_vec(),
            endorsement: self.endorsement.clone(),
        }
    }
}

/// Builds a signing key from OS randomness.
fn random_signing_key() -> SigningKey {
    let mut seed = [0u8; SECRET_KEY_LENGTH];
    OsRng.fill_bytes(&mut seed);
    SigningKey::from_bytes(&seed)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
