// crates/grafton-core/src/identifiers.rs
// ============================================================================
// Module: Grafton Identifiers
// Description: Typed opaque identifiers for platform objects and features.
// Purpose: Provide serializable identifiers with a stable, decodable wire form.
// Dependencies: rand, serde
// ============================================================================

//! ## Overview
//! Platform objects (resources, credentials, callbacks, tokens, users) are
//! named by an [`ObjectId`]: a kind tag plus 16 random bytes, rendered as 34
//! lowercase hex characters. The kind tag is part of the wire form so a
//! decoded identifier always knows what it names. Feature labels are plain
//! strings wrapped in [`FeatureLabel`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of random bytes carried by an object identifier.
const ID_BYTES: usize = 16;
/// Length of the hex wire form (kind byte plus payload).
const ID_HEX_LEN: usize = (ID_BYTES + 1) * 2;

// ============================================================================
// SECTION: Object Identifiers
// ============================================================================

/// Kind of platform object an [`ObjectId`] names.
///
/// # Invariants
/// - `code` values are stable; they are embedded in the wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdKind {
    /// Provisioned resource.
    Resource,
    /// Credential set attached to a resource.
    Credential,
    /// Asynchronous completion callback.
    Callback,
    /// Issued OAuth access token.
    AccessToken,
    /// Platform user.
    User,
}

impl IdKind {
    /// Returns the stable wire code for this kind.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Resource => 0x01,
            Self::Credential => 0x02,
            Self::Callback => 0x03,
            Self::AccessToken => 0x04,
            Self::User => 0x05,
        }
    }

    /// Resolves a wire code back to a kind.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Resource),
            0x02 => Some(Self::Credential),
            0x03 => Some(Self::Callback),
            0x04 => Some(Self::AccessToken),
            0x05 => Some(Self::User),
            _ => None,
        }
    }

    /// Returns a stable label for diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Credential => "credential",
            Self::Callback => "callback",
            Self::AccessToken => "access_token",
            Self::User => "user",
        }
    }
}

/// Identifier decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// Input length did not match the wire form.
    #[error("invalid identifier length: {0}")]
    Length(usize),
    /// Input contained non-hex characters.
    #[error("invalid identifier encoding")]
    Encoding,
    /// Kind tag is not a known object kind.
    #[error("unknown identifier kind: {0:#04x}")]
    UnknownKind(u8),
    /// Identifier decoded but names a different kind of object.
    #[error("expected {expected} identifier, got {actual}")]
    WrongKind {
        /// Kind the caller required.
        expected: &'static str,
        /// Kind found in the identifier.
        actual: &'static str,
    },
}

/// Opaque, typed identifier for a platform object.
///
/// # Invariants
/// - `Display` output always parses back to an equal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    /// Object kind tag.
    kind: IdKind,
    /// Random payload.
    bytes: [u8; ID_BYTES],
}

impl ObjectId {
    /// Generates a fresh random identifier of the given kind.
    #[must_use]
    pub fn generate(kind: IdKind) -> Self {
        let mut bytes = [0u8; ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self {
            kind,
            bytes,
        }
    }

    /// Returns the object kind.
    #[must_use]
    pub const fn kind(&self) -> IdKind {
        self.kind
    }

    /// Parses an identifier and requires it to be of `expected` kind.
    ///
    /// # Errors
    ///
    /// Returns [`IdError`] when decoding fails or the kind differs.
    pub fn parse_kind(value: &str, expected: IdKind) -> Result<Self, IdError> {
        let id: Self = value.parse()?;
        if id.kind != expected {
            return Err(IdError::WrongKind {
                expected: expected.label(),
                actual: id.kind.label(),
            });
        }
        Ok(id)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.kind.code())?;
        for byte in &self.bytes {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for ObjectId {
    type Err = IdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.len() != ID_HEX_LEN {
            return Err(IdError::Length(value.len()));
        }
        if !value.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Err(IdError::Encoding);
        }
        let mut decoded = [0u8; ID_BYTES + 1];
        for (slot, pair) in decoded.iter_mut().zip(value.as_bytes().chunks(2)) {
            let text = std::str::from_utf8(pair).map_err(|_| IdError::Encoding)?;
            *slot = u8::from_str_radix(text, 16).map_err(|_| IdError::Encoding)?;
        }
        let kind = IdKind::from_code(decoded[0]).ok_or(IdError::UnknownKind(decoded[0]))?;
        let mut bytes = [0u8; ID_BYTES];
        bytes.copy_from_slice(&decoded[1..]);
        Ok(Self {
            kind,
            bytes,
        })
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Feature Labels
// ============================================================================

/// Stable label identifying a feature in the test graph.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureLabel(String);

impl FeatureLabel {
    /// Creates a new feature label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Returns the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureLabel {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FeatureLabel {
    fn from(value: String) -> Self {
        Self(value)
    }
}
