//! Types and traits for confidential records crates
//!
//! A record is one ledger-submittable unit (invoice, financing request or
//! supply-chain event). Sensitive fields travel as [`EncryptedField`]s, the
//! rest as canonical plaintext. Everything here is shared between the
//! client-side prover and the public verifier.

pub mod codec;
pub mod record;
pub mod schema;

pub use codec::{
    check_domain, decode, encode, CanonicalValue, CodecError, FixedDecimal, RawValue, ValueKind,
    DECIMAL_SCALE,
};
pub use record::{EncryptedField, FieldValue, Record, RecordField, SchemaError};
pub use schema::{FieldSpec, RecordKind, Sensitivity};

/// Compressed Ristretto public key (twisted ElGamal).
pub type PublicKeyBytes = [u8; 32];

/// Ledger/network identifier folded into every proof transcript.
pub trait NetworkIdProvider {
    fn network_id() -> [u8; 32];
}

/// All-zero network id, used when no ledger binding is configured.
pub struct DefaultNetwork;
impl NetworkIdProvider for DefaultNetwork {
    fn network_id() -> [u8; 32] {
        [0u8; 32]
    }
}

/// Abstract verifier boundary. Implemented by the public verifier crate.
pub trait RecordVerifier {
    /// True iff `proof` attests that `ciphertext` encrypts, under `public_key`,
    /// some value in the domain of the kind named in the ciphertext header.
    /// Malformed inputs verify to `false`.
    fn verify_field(ciphertext: &[u8], public_key: &[u8], proof: &[u8]) -> bool;

    /// Schema conformance plus [`RecordVerifier::verify_field`] for every
    /// encrypted field.
    fn verify_record(record: &Record) -> bool;
}
