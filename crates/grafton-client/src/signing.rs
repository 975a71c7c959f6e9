// crates/grafton-client/src/signing.rs
// ============================================================================
// Module: Request Signing
// Description: Canonical request form, signature headers, and verification.
// Purpose: Prove to the provider that a request came from the marketplace.
// Dependencies: base64, ed25519-dalek, time, url
// ============================================================================

//! ## Overview
//! Each request is stamped with `Date` and `X-Signed-Headers`, reduced to a
//! canonical byte string, and signed with a live key:
//!
//! ```text
//! <lowercase method> <path[?query]>\n
//! <name>: <value>\n        (one line per signed header, in order)
//! <raw body>
//! ```
//!
//! `X-Signature` carries `<signature> <live public key> <endorsement>`, each
//! URL-safe base64 without padding. [`verify_request`] is the provider side of
//! the exchange and is what stub providers call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::Signature;
use ed25519_dalek::Verifier as _;
use ed25519_dalek::VerifyingKey;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use url::Url;

use crate::error::SigningError;

// ============================================================================
// SECTION: Header Names
// ============================================================================

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-signature";
/// Header listing the signed header names.
pub const SIGNED_HEADERS_HEADER: &str = "x-signed-headers";
/// Header naming the callback for this operation.
pub const CALLBACK_ID_HEADER: &str = "x-callback-id";
/// Header carrying the callback URL for this operation.
pub const CALLBACK_URL_HEADER: &str = "x-callback-url";
/// Media type of every signed body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

// ============================================================================
// SECTION: Signatures
// ============================================================================

/// Produces request signatures.
pub trait Signer: Send + Sync {
    /// Signs a canonical request.
    fn sign(&self, canonical: &[u8]) -> RequestSignature;
}

/// Decoded `X-Signature` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSignature {
    /// Signature over the canonical request.
    pub value: Vec<u8>,
    /// Live public key that produced `value`.
    pub public_key: Vec<u8>,
    /// Master signature over `public_key`.
    pub endorsement: Vec<u8>,
}

impl RequestSignature {
    /// Parses a header value of three space-separated base64 fields.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::Malformed`] for a wrong field count or bad
    /// base64.
    pub fn parse(header: &str) -> Result<Self, SigningError> {
        let fields: Vec<&str> = header.split_whitespace().collect();
        let [value, public_key, endorsement] = fields.as_slice() else {
            return Err(SigningError::Malformed(format!("expected 3 fields, got {}", fields.len())));
        };
        let decode = |field: &str, name: &str| {
            URL_SAFE_NO_PAD
                .decode(field)
                .map_err(|_| SigningError::Malformed(format!("{name} is not base64")))
        };
        Ok(Self {
            value: decode(value, "signature")?,
            public_key: decode(public_key, "public key")?,
            endorsement: decode(endorsement, "endorsement")?,
        })
    }
}

impl fmt::Display for RequestSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            URL_SAFE_NO_PAD.encode(&self.value),
            URL_SAFE_NO_PAD.encode(&self.public_key),
            URL_SAFE_NO_PAD.encode(&self.endorsement)
        )
    }
}

// ============================================================================
// SECTION: Canonical Form
// ============================================================================

/// Builds the canonical bytes for a request.
#[must_use]
pub fn canonical_request(method: &str, target: &str, headers: &[(String, String)], body: &[u8]) -> Vec<u8> {
    let mut canonical = format!("{} {target}\n", method.to_ascii_lowercase());
    for (name, value) in headers {
        canonical.push_str(name);
        canonical.push_str(": ");
        canonical.push_str(value);
        canonical.push('\n');
    }
    let mut bytes = canonical.into_bytes();
    bytes.extend_from_slice(body);
    bytes
}

/// Path plus query of `url`, the request target that gets signed.
#[must_use]
pub fn request_target(url: &Url) -> String {
    url.query().map_or_else(|| url.path().to_string(), |query| format!("{}?{query}", url.path()))
}

/// `Host` header value for `url`, including a non-default port.
#[must_use]
pub fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    url.port().map_or_else(|| host.to_string(), |port| format!("{host}:{port}"))
}

/// Current UTC time in whole-second RFC3339.
fn now_date() -> String {
    let now = OffsetDateTime::now_utc();
    let now = now.replace_nanosecond(0).unwrap_or(now);
    now.format(&Rfc3339).unwrap_or_default()
}

/// Returns every header a signed request must carry, signature last.
///
/// `callback` is `(id, url)` for callback-bearing operations; `body` is the
/// JSON payload when present.
#[must_use]
pub fn signed_headers(
    signer: &dyn Signer,
    method: &str,
    url: &Url,
    callback: Option<(&str, &str)>,
    body: Option<&[u8]>,
) -> Vec<(String, String)> {
    let mut headers = vec![("host".to_string(), host_header(url)), ("date".to_string(), now_date())];
    if let Some((id, callback_url)) = callback {
        headers.push((CALLBACK_ID_HEADER.to_string(), id.to_string()));
        headers.push((CALLBACK_URL_HEADER.to_string(), callback_url.to_string()));
    }
    let body = body.filter(|body| !body.is_empty()).unwrap_or_default();
    if !body.is_empty() {
        headers.push(("content-type".to_string(), JSON_CONTENT_TYPE.to_string()));
        headers.push(("content-length".to_string(), body.len().to_string()));
    }
    let names: Vec<&str> = headers.iter().map(|(name, _)| name.as_str()).collect();
    let signed_names = names.join(" ");
    let canonical = canonical_request(method, &request_target(url), &headers, body);
    let signature = signer.sign(&canonical);
    headers.push((SIGNED_HEADERS_HEADER.to_string(), signed_names));
    headers.push((SIGNATURE_HEADER.to_string(), signature.to_string()));
    headers
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Checks a received request against the master public key.
///
/// `header` looks up a request header by lowercase name.
///
/// # Errors
///
/// Returns [`SigningError::MissingHeader`] when a signed header is absent,
/// [`SigningError::Malformed`] for an unusable signature header,
/// [`SigningError::BadEndorsement`] when the master key did not endorse the
/// live key, and [`SigningError::BadSignature`] when the request was altered.
pub fn verify_request<F>(
    master: &VerifyingKey,
    method: &str,
    target: &str,
    header: F,
    body: &[u8],
) -> Result<(), SigningError>
where
    F: Fn(&str) -> Option<String>,
{
    let signed_names = header(SIGNED_HEADERS_HEADER)
        .ok_or_else(|| SigningError::MissingHeader(SIGNED_HEADERS_HEADER.to_string()))?;
    let raw_signature = header(SIGNATURE_HEADER)
        .ok_or_else(|| SigningError::MissingHeader(SIGNATURE_HEADER.to_string()))?;
    let mut headers = Vec::new();
    for name in signed_names.split_whitespace() {
        let value = header(name).ok_or_else(|| SigningError::MissingHeader(name.to_string()))?;
        headers.push((name.to_string(), value));
    }
    let signature = RequestSignature::parse(&raw_signature)?;

    let endorsement =
        Signature::from_slice(&signature.endorsement).map_err(|_| SigningError::BadEndorsement)?;
    master.verify(&signature.public_key, &endorsement).map_err(|_| SigningError::BadEndorsement)?;

    let live_bytes: [u8; 32] = signature
        .public_key
        .as_slice()
        .try_into()
        .map_err(|_| SigningError::Malformed("public key must be 32 bytes".to_string()))?;
    let live = VerifyingKey::from_bytes(&live_bytes)
        .map_err(|_| SigningError::Malformed("public key is not a curve point".to_string()))?;
    let value = Signature::from_slice(&signature.value).map_err(|_| SigningError::BadSignature)?;
    let canonical = canonical_request(method, target, &headers, body);
    live.verify(&canonical, &value).map_err(|_| SigningError::BadSignature)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
