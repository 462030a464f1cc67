//! # records-verifier — public verification of confidential record fields
//!
//! Anyone holding a record (typically a ledger node) can check, without any
//! secret, that every encrypted field is a well-formed twisted ElGamal
//! encryption under the attached public key of a value inside its kind's
//! domain.
//!
//! Per field the verifier:
//! 1. parses the ciphertext envelope (version, kind, limbs) and the public key,
//! 2. replays the validity transcript and checks the Σ-responses of every limb:
//!    `z_v·G + z_r·H == Y0 + c·C` and `z_r·P == Y1 + c·D`,
//! 3. for kinds with a domain relation (Date, ShortString, Address), checks
//!    that the relation over `C_i` and the auxiliary commitments opens to zero,
//! 4. checks the aggregated 16-bit Bulletproof over the limb commitments `C_i`
//!    and the bound commitments it derives from the auxiliary ones, bound to
//!    the validity transcript through its context bytes.
//!
//! Malformed input never panics: [`verify`] and
//! [`RecordVerifier::verify_field`] answer `false`, [`check_field`] says why.

use core::marker::PhantomData;

use bulletproofs::RangeProof;
use confidential_records_primitives::{
    DefaultNetwork, FieldValue, NetworkIdProvider, Record, RecordVerifier, SchemaError, ValueKind,
};
use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT as G, ristretto::RistrettoPoint, traits::Identity,
};
use curve25519_dalek_ng as dalek_ng;
use rand_core::OsRng;
use thiserror::Error;
use zkhe_primitives::{
    append_point, bound_commitments, challenge_scalar, domain_statement, labels,
    pedersen_h_generator, points_equal, public_key_from_bytes, range_gens, range_transcript,
    relation_combination, transcript_context_bytes, validity_transcript, EnvelopeError,
    FieldCiphertext, FieldProof, RangeProofVerifier, LIMB_BITS,
};


#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("malformed envelope: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("validity proof failed for limb {limb}")]
    ValidityProof { limb: usize },
    #[error("domain relation proof failed")]
    DomainRelation,
    #[error("range proof failed")]
    RangeProof,
    #[error("record does not follow its schema: {0}")]
    Schema(#[from] SchemaError),
    #[error("field `{field}` carries a {actual} ciphertext, schema declares {expected}")]
    KindMismatch {
        field: String,
        expected: ValueKind,
        actual: ValueKind,
    },
    #[error("field `{field}`: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<VerifyError>,
    },
}

/// Bulletproofs-backed [`RangeProofVerifier`] for aggregated 16-bit proofs.
pub struct BulletproofRangeVerifier;

impl RangeProofVerifier for BulletproofRangeVerifier {
    fn verify_range_proof(
        ctx_bytes: &[u8; 32],
        commitments: &[[u8; 32]],
        proof_bytes: &[u8],
    ) -> Result<(), ()> {
        let m = commitments.len();
        if m == 0 || !m.is_power_of_two() {
            return Err(());
        }
        let proof = RangeProof::from_bytes(proof_bytes).map_err(|_| ())?;
        let (bp_gens, pc_gens) = range_gens(m);
        let mut t = range_transcript(ctx_bytes, m);
        let commits: Vec<dalek_ng::ristretto::CompressedRistretto> = commitments
            .iter()
            .map(|c| dalek_ng::ristretto::CompressedRistretto(*c))
            .collect();

        proof
            .verify_multiple_with_rng(&bp_gens, &pc_gens, &mut t, &commits, LIMB_BITS, &mut OsRng)
            .map_err(|_| ())
    }
}

/// Check one field envelope under an explicit network id. Returns the value
/// kind named by the ciphertext header.
pub fn check_field(
    network_id: &[u8; 32],
    ciphertext: &[u8],
    public_key: &[u8],
    proof: &[u8],
) -> Result<ValueKind, VerifyError> {
    let pk = public_key_from_bytes(public_key)?;
    let ct = FieldCiphertext::from_bytes(ciphertext)?;
    let proof = FieldProof::from_bytes(proof, ct.kind())?;
    let stmt = domain_statement(ct.kind());

    // Replay the Σ-protocol transcript exactly as the prover built it.
    let mut t = validity_transcript(network_id, &pk, ciphertext);
    for r in &proof.responses {
        append_point(&mut t, b"Y0", &r.Y0);
        append_point(&mut t, b"Y1", &r.Y1);
    }
    for a in &proof.aux {
        append_point(&mut t, labels::AUX, a);
    }
    if let Some(rel) = &proof.relation {
        append_point(&mut t, labels::RELATION, &rel.T);
    }
    let c = challenge_scalar(&mut t, labels::CHAL_VALIDITY);

    let h = pedersen_h_generator();
    for (limb, (ct_i, r)) in ct.limbs().iter().zip(&proof.responses).enumerate() {
        let commit_ok = points_equal(&(r.z_v * G + r.z_r * h), &(r.Y0 + c * ct_i.C));
        let handle_ok = points_equal(&(r.z_r * pk), &(r.Y1 + c * ct_i.D));
        if !(commit_ok && handle_ok) {
            return Err(VerifyError::ValidityProof { limb });
        }
    }

    let limb_commitments: Vec<RistrettoPoint> = ct.limbs().iter().map(|l| l.C).collect();
    if let Some(rel) = &proof.relation {
        let zero = relation_combination(&stmt, &limb_commitments, &proof.aux)
            .ok_or(VerifyError::DomainRelation)?;
        if !points_equal(&(rel.z * h), &(rel.T + c * zero)) {
            return Err(VerifyError::DomainRelation);
        }
    }

    let ctx_bytes = transcript_context_bytes(&t);
    let bounds = bound_commitments(&stmt, &proof.aux).ok_or(VerifyError::DomainRelation)?;
    let mut commitments: Vec<[u8; 32]> = limb_commitments
        .iter()
        .chain(&bounds)
        .map(|p| p.compress().to_bytes())
        .collect();
    commitments.resize(
        stmt.range_commitments(limb_commitments.len()),
        RistrettoPoint::identity().compress().to_bytes(),
    );
    BulletproofRangeVerifier::verify_range_proof(&ctx_bytes, &commitments, &proof.range_proof)
        .map_err(|_| VerifyError::RangeProof)?;

    Ok(ct.kind())
}

/// Boolean form of [`check_field`]; failures are logged at debug level.
pub fn verify_field(
    network_id: &[u8; 32],
    ciphertext: &[u8],
    public_key: &[u8],
    proof: &[u8],
) -> bool {
    match check_field(network_id, ciphertext, public_key, proof) {
        Ok(_) => true,
        Err(e) => {
            log::debug!(target: "records-verifier", "field rejected: {e}");
            false
        }
    }
}

/// Verify a field bound to the default (all-zero) network id.
pub fn verify(ciphertext: &[u8], public_key: &[u8], proof: &[u8]) -> bool {
    RecordsVerifier::<DefaultNetwork>::verify_field(ciphertext, public_key, proof)
}

/// Schema conformance plus every encrypted field, in schema order. The first
/// failure is reported.
pub fn check_record(network_id: &[u8; 32], record: &Record) -> Result<(), VerifyError> {
    record.check_schema()?;
    for (spec, field) in record.kind().schema().iter().zip(record.fields()) {
        let FieldValue::Encrypted(enc) = &field.value else {
            continue;
        };
        let wrap = |source: VerifyError| VerifyError::Field {
            field: field.name.clone(),
            source: Box::new(source),
        };
        let kind = check_field(network_id, &enc.ciphertext, &enc.public_key, &enc.proof)
            .map_err(wrap)?;
        if kind != spec.kind {
            return Err(VerifyError::KindMismatch {
                field: field.name.clone(),
                expected: spec.kind,
                actual: kind,
            });
        }
    }
    Ok(())
}

/// Verifier bound to a network id supplied at the type level.
pub struct RecordsVerifier<N = DefaultNetwork>(PhantomData<N>);

impl<N: NetworkIdProvider> RecordsVerifier<N> {
    pub fn check_field(
        ciphertext: &[u8],
        public_key: &[u8],
        proof: &[u8],
    ) -> Result<ValueKind, VerifyError> {
        check_field(&N::network_id(), ciphertext, public_key, proof)
    }

    pub fn check_record(record: &Record) -> Result<(), VerifyError> {
        check_record(&N::network_id(), record)
    }
}

impl<N: NetworkIdProvider> RecordVerifier for RecordsVerifier<N> {
    fn verify_field(ciphertext: &[u8], public_key: &[u8], proof: &[u8]) -> bool {
        verify_field(&N::network_id(), ciphertext, public_key, proof)
    }

    fn verify_record(record: &Record) -> bool {
        match Self::check_record(record) {
            Ok(()) => true,
            Err(e) => {
                log::debug!(target: "records-verifier", "{} record rejected: {e}", record.kind());
                false
            }
        }
    }
}
