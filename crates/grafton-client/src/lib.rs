// crates/grafton-client/src/lib.rs
// ============================================================================
// Module: Grafton Client
// Description: Signed provider API client and request signing keys.
// Purpose: Talk to the provider under test the way the marketplace does.
// Dependencies: ed25519-dalek, grafton-core, reqwest
// ============================================================================

//! ## Overview
//! [`ProviderClient`] drives the provisioning API; every request is signed
//! by a [`LiveKeypair`] endorsed by the on-disk [`MasterKeypair`]. Provider
//! stubs check the same signatures with [`verify_request`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod credentials;
pub mod error;
pub mod keypair;
pub mod signing;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::CredentialReply;
pub use client::ProviderClient;
pub use client::Reply;
pub use client::ResourceBody;
pub use client::ResourceMeasures;
pub use client::TraceFn;
pub use credentials::CREDENTIAL_NAME_PATTERN;
pub use credentials::valid_credential_name;
pub use error::KeypairError;
pub use error::ProviderError;
pub use error::ProviderErrorKind;
pub use error::SigningError;
pub use keypair::LiveKeypair;
pub use keypair::MasterKeypair;
pub use signing::RequestSignature;
pub use signing::Signer;
pub use signing::verify_request;
