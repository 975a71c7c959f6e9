// crates/grafton-connector/src/oauth.rs
// ============================================================================
// Module: Grants and Tokens
// Description: Grant validation, authorization codes, and bearer issuance.
// Purpose: Authenticate provider calls against the simulated platform.
// Dependencies: base64, ed25519-dalek, rand, serde_json, subtle, time
// ============================================================================

//! ## Overview
//! Grant validation is pure: it classifies a [`TokenRequest`] against the
//! expected client credentials and the code store. The [`TokenIssuer`] mints
//! bearer values of the form `<claims>.<signature>` (both URL-safe base64)
//! signed with a per-connector ed25519 key, and remembers every token it has
//! issued for later bearer lookups.
//!
//! Token request checkpoints, each a short-circuit exit:
//! content type, client credentials, then (authorization code only) the code.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::Signature;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use ed25519_dalek::Verifier;
use grafton_core::IdKind;
use grafton_core::ObjectId;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Serialize;
use subtle::ConstantTimeEq;
use time::Duration;
use time::OffsetDateTime;

use crate::error::ApiError;
use crate::error::OAuthError;
use crate::types::AccessToken;
use crate::types::AuthorizationCode;
use crate::types::GrantType;
use crate::types::TokenRequest;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// The only media type accepted for token requests.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
/// Lifetime of issued tokens, in seconds.
pub const TOKEN_TTL_SECS: u64 = 3_600;
/// Lifetime of authorization codes, in seconds.
pub const CODE_TTL_SECS: i64 = 3_600;
/// Random bytes per authorization code.
const CODE_BYTES: usize = 8;

// ============================================================================
// SECTION: Client Credentials
// ============================================================================

/// OAuth client id and secret the connector expects from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    /// Expected client id.
    pub client_id: String,
    /// Expected client secret.
    pub client_secret: String,
}

impl ClientCredentials {
    /// Builds a credential pair.
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Compares both halves in constant time and reports a single verdict.
    #[must_use]
    pub fn matches(&self, client_id: &str, client_secret: &str) -> bool {
        let id = self.client_id.as_bytes().ct_eq(client_id.as_bytes());
        let secret = self.client_secret.as_bytes().ct_eq(client_secret.as_bytes());
        bool::from(id & secret)
    }
}

// ============================================================================
// SECTION: Grant Validation
// ============================================================================

/// Checks content type, then client credentials.
///
/// # Errors
///
/// Returns `invalid_request` for a body that was neither form nor JSON and
/// `invalid_client` when either credential half is wrong.
pub fn validate_client_credentials_grant(
    request: &TokenRequest,
    expected: &ClientCredentials,
) -> Result<(), OAuthError> {
    if request.content_type != FORM_CONTENT_TYPE {
        return Err(OAuthError::invalid_content_type());
    }
    if !expected.matches(&request.client_id, &request.client_secret) {
        return Err(OAuthError::invalid_client_credentials());
    }
    Ok(())
}

/// Runs the client credential checks, then requires a live code.
///
/// # Errors
///
/// Returns the client credential errors first, then `No code provided` for an
/// unknown code and `Authorization code has expired` for a code with less
/// than one second of validity left.
pub fn validate_authorization_code_grant(
    request: &TokenRequest,
    expected: &ClientCredentials,
    codes: &CodeStore,
    now: OffsetDateTime,
) -> Result<(), OAuthError> {
    validate_client_credentials_grant(request, expected)?;
    let code = codes.lookup(&request.code).ok_or_else(OAuthError::missing_code)?;
    if code.expires_at.unix_timestamp() - now.unix_timestamp() < 1 {
        return Err(OAuthError::expired_code());
    }
    Ok(())
}

// ============================================================================
// SECTION: Authorization Codes
// ============================================================================

/// Authorization codes issued for single sign-on.
#[derive(Debug, Default)]
pub struct CodeStore {
    /// Issued codes in creation order.
    codes: Mutex<Vec<AuthorizationCode>>,
}

impl CodeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a code valid for [`CODE_TTL_SECS`] from now.
    #[must_use]
    pub fn create(&self) -> AuthorizationCode {
        self.create_expiring_at(OffsetDateTime::now_utc() + Duration::seconds(CODE_TTL_SECS))
    }

    /// Issues a code with an explicit expiry.
    #[must_use]
    pub fn create_expiring_at(&self, expires_at: OffsetDateTime) -> AuthorizationCode {
        let mut bytes = [0u8; CODE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let code = AuthorizationCode {
            code: URL_SAFE_NO_PAD.encode(bytes),
            expires_at,
        };
        self.codes.lock().unwrap_or_else(PoisonError::into_inner).push(code.clone());
        code
    }

    /// Finds an issued code.
    #[must_use]
    pub fn lookup(&self, code: &str) -> Option<AuthorizationCode> {
        let codes = self.codes.lock().unwrap_or_else(PoisonError::into_inner);
        codes.iter().find(|entry| entry.code == code).cloned()
    }
}

// ============================================================================
// SECTION: Token Issuer
// ============================================================================

/// Claims carried inside a bearer value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Client the token was issued to.
    pub client_id: String,
    /// Internal token identity.
    pub token_id: ObjectId,
}

/// Mints and recognizes bearer tokens.
pub struct TokenIssuer {
    /// Per-connector signing key.
    signing_key: SigningKey,
    /// Issued tokens keyed by bearer value.
    tokens: Mutex<BTreeMap<String, AccessToken>>,
}

impl TokenIssuer {
    /// Creates an issuer with a fresh random signing key.
    #[must_use]
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(&seed)
    }

    /// Creates an issuer from a fixed 32-byte seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
            tokens: Mutex::new(BTreeMap::new()),
        }
    }

    /// Validates `request` for its grant type and issues a token.
    ///
    /// # Errors
    ///
    /// Returns the grant validator's [`OAuthError`], `unsupported_grant_type`
    /// for unknown grants, or `server_error` when signing fails.
    pub fn issue(
        &self,
        request: &TokenRequest,
        expected: &ClientCredentials,
        codes: &CodeStore,
    ) -> Result<AccessToken, OAuthError> {
        match &request.grant_type {
            GrantType::AuthorizationCode => validate_authorization_code_grant(
                request,
                expected,
                codes,
                OffsetDateTime::now_utc(),
            )?,
            GrantType::ClientCredentials => validate_client_credentials_grant(request, expected)?,
            GrantType::Unsupported(_) => return Err(OAuthError::unsupported_grant_type()),
        }
        let claims = TokenClaims {
            client_id: expected.client_id.clone(),
            token_id: ObjectId::generate(IdKind::AccessToken),
        };
        let bearer = self.sign(&claims)?;
        let token = AccessToken {
            id: claims.token_id,
            bearer: bearer.clone(),
            expires_in: TOKEN_TTL_SECS,
            grant_type: request.grant_type.clone(),
        };
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner).insert(bearer, token.clone());
        Ok(token)
    }

    /// Encodes and signs `claims`.
    fn sign(&self, claims: &TokenClaims) -> Result<String, OAuthError> {
        let payload = serde_json::to_vec(claims).map_err(|_| OAuthError::server_error())?;
        let encoded = URL_SAFE_NO_PAD.encode(payload);
        let signature = self.signing_key.sign(encoded.as_bytes());
        Ok(format!("{encoded}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes())))
    }

    /// Checks that `bearer` was signed by this issuer and decodes its claims.
    #[must_use]
    pub fn verify(&self, bearer: &str) -> Option<TokenClaims> {
        let (encoded, signature) = bearer.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let signature = Signature::from_slice(&signature).ok()?;
        self.signing_key.verifying_key().verify(encoded.as_bytes(), &signature).ok()?;
        let payload = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        serde_json::from_slice(&payload).ok()
    }

    /// Returns the issued token for `bearer`.
    #[must_use]
    pub fn lookup(&self, bearer: &str) -> Option<AccessToken> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner).get(bearer).cloned()
    }

    /// Resolves an `Authorization` header to an issued token.
    ///
    /// # Errors
    ///
    /// Returns, in check order: 400 `Missing Authorization Header`, 400
    /// `Invalid Authorization Header`, 400 `Invalid access token`, and 401
    /// `Unauthorized`.
    pub fn authorize(&self, header: Option<&str>) -> Result<AccessToken, ApiError> {
        let header = header.ok_or_else(|| ApiError::bad_request("Missing Authorization Header"))?;
        let mut parts = header.split(' ');
        let bearer = match (parts.next(), parts.next(), parts.next()) {
            (Some("Bearer"), Some(bearer), None) => bearer,
            _ => return Err(ApiError::bad_request("Invalid Authorization Header")),
        };
        if self.verify(bearer).is_none() {
            return Err(ApiError::bad_request("Invalid access token"));
        }
        self.lookup(bearer).ok_or_else(|| ApiError::unauthorized("Unauthorized"))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
