//! # records-prover — client-side confidential record assembly
//!
//! Turns plaintext business records into ledger-submittable [`Record`]s. Every
//! sensitive field is canonicalized, encrypted with twisted ElGamal under a
//! per-submission key, proved to lie inside its kind's domain, and verified
//! once more before the record is sealed.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use records_prover::{build, InvoiceInput, ProverConfig};
//!
//! let config = ProverConfig::from_json(r#"{ "network_id": "0x01...01" }"#)?;
//! let record = build(
//!     InvoiceInput {
//!         amount: 1000,
//!         due_date: 20250601,
//!         payment_terms: "NET30".into(),
//!         invoice_hash: "0x…".into(),
//!         buyer_address: "0x…".into(),
//!     },
//!     &config,
//! )?;
//! let payload = record.into_ledger_bytes();
//! ```
//!
//! ## Byte Layouts
//!
//! **Field ciphertext:**
//! ```text
//! version(1) || kind(1) || limbs * (C(32) || D(32))
//! ```
//!
//! **Field proof:**
//! ```text
//! version(1) || limbs * (Y0(32) || Y1(32) || z_v(32) || z_r(32))
//!            || aux * A(32) || [T(32) || z(32)] || len(2) || range_proof
//! ```
//!
//! Limbs are big-endian 16-bit chunks of the canonical value: 4 for integers
//! and decimals, 2 for dates, 16 for strings, addresses and digests. Dates
//! carry year, month and day commitments and strings carry length and first
//! byte commitments; their bounds are part of the range proof, so the verifier
//! checks them without trusting the client. Addresses prove their 12 pad bytes
//! are zero. See `zkhe_primitives::domain_statement`.
//!
//! ## Security Notes
//!
//! - Keys live only inside a [`SubmissionSession`] and are dropped with it
//! - All scalars are drawn with full 256-bit entropy
//! - Proofs are bound to the network id, the public key and the ciphertext
//! - Days per month, UTF-8 and short string padding are checked before
//!   encryption only

pub mod builder;
pub mod config;
pub mod encrypt;
pub mod keys;
pub mod prove;

use confidential_records_primitives::CodecError;
use thiserror::Error;
use zkhe_primitives::EnvelopeError;

pub use builder::{
    build, BuildError, FinancingRequestInput, InvoiceInput, RecordBuilder, RecordInput,
    SupplyChainEventInput,
};
pub use config::{ConfigError, KeyScope, ProverConfig};
pub use confidential_records_primitives::{Record, RecordKind};
pub use encrypt::{decrypt, encrypt, encrypt_with_rng, Encryption};
pub use keys::{generate_keypair, keypair_from_rng, KeyPair, PublicKey, SecretKey, SubmissionSession};
pub use prove::{prove, prove_with_rng};

#[derive(Debug, Error)]
pub enum ProverError {
    #[error("no secure randomness available")]
    EntropyUnavailable,
    #[error("malformed key")]
    MalformedKey,
    #[error("value out of domain: {0}")]
    OutOfDomain(#[from] CodecError),
    #[error("canonical bytes violate the kind's domain: {0}")]
    DomainViolation(#[source] CodecError),
    #[error("openings do not reproduce the ciphertext")]
    OpeningMismatch,
    #[error("range proof failed: {0}")]
    RangeProof(&'static str),
    #[error("malformed envelope: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("decryption failed: {0}")]
    Decrypt(&'static str),
    #[error("generated proof did not verify")]
    SelfCheckFailed,
}
