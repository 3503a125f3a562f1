//! Signing Module: canonical payload encoding and signer recovery
//!
//! Payloads are serialized into a fixed-order, fixed-width byte sequence,
//! hashed together with a domain separator, and signed. Verification
//! recovers the identity that produced a signature so callers can compare it
//! against the role they expect.
//!
//! The curve is abstracted behind [`MessageSigner`] and [`SignatureRecovery`];
//! [`Ed25519Scheme`] is the production scheme.

use std::fmt;

use custody_types::ids::{Address, AssetId, ChainId, RequestId};
use custody_types::numeric::Amount;
use custody_types::payload::{Action, Allocation, AuthorizationPayload, IdentityPayload};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::SigningError;

/// Ed25519 verifying key length
const PUBLIC_KEY_LEN: usize = 32;
/// Ed25519 signature length
const SIGNATURE_LEN: usize = 64;
/// Wire length of an [`Ed25519Scheme`] signature: key followed by signature
pub const ED25519_SIGNATURE_BYTES: usize = PUBLIC_KEY_LEN + SIGNATURE_LEN;

// ---------------------------------------------------------------------------
// Canonical encoding
// ---------------------------------------------------------------------------

/// Deterministic byte encoding.
///
/// Integers are big-endian and fixed width, sequences are prefixed with a
/// `u32` length, and fields are written in declaration order.
pub trait CanonicalEncode {
    fn encode_into(&self, out: &mut Vec<u8>);

    fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }
}

impl CanonicalEncode for Address {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl CanonicalEncode for RequestId {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl CanonicalEncode for ChainId {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0.to_be_bytes());
    }
}

impl CanonicalEncode for Action {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.code());
    }
}

impl CanonicalEncode for AssetId {
    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            AssetId::Native => out.push(0),
            AssetId::Token(_) => out.push(1),
        }
        self.address().encode_into(out);
    }
}

impl CanonicalEncode for Amount {
    fn encode_into(&self, out: &mut Vec<u8>) {
        // Normalized so that equal amounts encode identically.
        let normalized = self.normalize();
        out.extend_from_slice(&normalized.mantissa().to_be_bytes());
        out.extend_from_slice(&normalized.scale().to_be_bytes());
    }
}

impl CanonicalEncode for Allocation {
    fn encode_into(&self, out: &mut Vec<u8>) {
        self.asset.encode_into(out);
        self.amount.encode_into(out);
    }
}

impl CanonicalEncode for AuthorizationPayload {
    fn encode_into(&self, out: &mut Vec<u8>) {
        self.action.encode_into(out);
        self.request_id.encode_into(out);
        out.extend_from_slice(&self.expiry.to_be_bytes());
        self.destination.encode_into(out);
        out.extend_from_slice(&(self.allocations.len() as u32).to_be_bytes());
        for allocation in &self.allocations {
            allocation.encode_into(out);
        }
        self.target_contract.encode_into(out);
        self.chain_id.encode_into(out);
    }
}

impl CanonicalEncode for IdentityPayload {
    fn encode_into(&self, out: &mut Vec<u8>) {
        self.instance.encode_into(out);
        self.identity.encode_into(out);
        out.extend_from_slice(&self.nonce.to_be_bytes());
    }
}

/// SHA-256 over the length-prefixed domain followed by the encoded bytes.
pub fn digest(domain: &str, encoded: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update((domain.len() as u32).to_be_bytes());
    hasher.update(domain.as_bytes());
    hasher.update(encoded);
    hasher.finalize().into()
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// Raw signature bytes as submitted by a caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureBytes(Vec<u8>);

impl SignatureBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

/// Anything able to sign a 32-byte digest on behalf of one identity.
pub trait MessageSigner {
    fn address(&self) -> Address;

    fn sign_digest(&self, digest: &[u8; 32]) -> SignatureBytes;
}

/// Recovers the identity that produced a signature over a digest.
pub trait SignatureRecovery {
    fn recover(&self, digest: &[u8; 32], signature: &SignatureBytes)
        -> Result<Address, SigningError>;
}

/// Ed25519 signing identity
#[derive(Debug, Clone)]
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(&seed),
        }
    }

    /// Deterministic key derived from a label (fixtures, local deployments).
    pub fn from_label(label: &str) -> Self {
        Self::from_seed(Sha256::digest(label.as_bytes()).into())
    }

    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl MessageSigner for Ed25519Signer {
    fn address(&self) -> Address {
        Address::from_key_material(self.key.verifying_key().as_bytes())
    }

    fn sign_digest(&self, digest: &[u8; 32]) -> SignatureBytes {
        let signature = self.key.sign(digest);
        let mut bytes = Vec::with_capacity(ED25519_SIGNATURE_BYTES);
        bytes.extend_from_slice(self.key.verifying_key().as_bytes());
        bytes.extend_from_slice(&signature.to_bytes());
        SignatureBytes(bytes)
    }
}

/// Ed25519 recovery: the signature carries its verifying key, the identity
/// is derived from that key once the signature verifies.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Scheme;

impl SignatureRecovery for Ed25519Scheme {
    fn recover(
        &self,
        digest: &[u8; 32],
        signature: &SignatureBytes,
    ) -> Result<Address, SigningError> {
        let raw = signature.as_slice();
        if raw.len() != ED25519_SIGNATURE_BYTES {
            return Err(SigningError::MalformedSignature {
                expected: ED25519_SIGNATURE_BYTES,
                actual: raw.len(),
            });
        }

        let (key_bytes, sig_bytes) = raw.split_at(PUBLIC_KEY_LEN);
        let key_bytes: [u8; PUBLIC_KEY_LEN] = key_bytes
            .try_into()
            .map_err(|_| SigningError::InvalidPublicKey)?;
        let sig_bytes: [u8; SIGNATURE_LEN] = sig_bytes
            .try_into()
            .map_err(|_| SigningError::VerificationFailed)?;

        let verifying_key =
            VerifyingKey::from_bytes(&key_bytes).map_err(|_| SigningError::InvalidPublicKey)?;
        let sig = Signature::from_bytes(&sig_bytes);

        verifying_key
            .verify(digest, &sig)
            .map_err(|_| SigningError::VerificationFailed)?;

        Ok(Address::from_key_material(&key_bytes))
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Domain-bound encoder and verifier used by every contract instance.
#[derive(Debug, Clone)]
pub struct SignatureCodec<R = Ed25519Scheme> {
    domain: String,
    recovery: R,
}

impl SignatureCodec<Ed25519Scheme> {
    pub fn ed25519(domain: impl Into<String>) -> Self {
        Self::new(domain, Ed25519Scheme)
    }
}

impl<R: SignatureRecovery> SignatureCodec<R> {
    pub fn new(domain: impl Into<String>, recovery: R) -> Self {
        Self {
            domain: domain.into(),
            recovery,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Canonical encoding of a payload.
    pub fn encode<P: CanonicalEncode + ?Sized>(&self, payload: &P) -> Vec<u8> {
        payload.canonical_bytes()
    }

    /// Domain-separated digest of a payload.
    pub fn digest<P: CanonicalEncode + ?Sized>(&self, payload: &P) -> [u8; 32] {
        digest(&self.domain, &payload.canonical_bytes())
    }

    /// Recover the signer of already-encoded bytes.
    pub fn verify(&self, encoded: &[u8], signature: &SignatureBytes) -> Result<Address, SigningError> {
        self.recovery.recover(&digest(&self.domain, encoded), signature)
    }

    /// Recover the signer of a payload.
    pub fn recover<P: CanonicalEncode + ?Sized>(
        &self,
        payload: &P,
        signature: &SignatureBytes,
    ) -> Result<Address, SigningError> {
        self.verify(&payload.canonical_bytes(), signature)
    }

    /// Sign a payload with `signer` under this codec's domain.
    pub fn sign<P: CanonicalEncode + ?Sized>(
        &self,
        signer: &impl MessageSigner,
        payload: &P,
    ) -> SignatureBytes {
        signer.sign_digest(&self.digest(payload))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
