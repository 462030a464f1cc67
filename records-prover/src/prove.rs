//! Validity, domain and range proofs for field ciphertexts.

use bulletproofs::RangeProof;
use confidential_records_primitives::{check_domain, CanonicalValue, ValueKind};
use curve25519_dalek::{constants::RISTRETTO_BASEPOINT_POINT as G, scalar::Scalar};
use curve25519_dalek_ng as dalek_ng;
use rand::{CryptoRng, RngCore};
use zkhe_primitives::{
    append_point, challenge_scalar, domain_statement, labels, pedersen_commit,
    pedersen_h_generator, points_equal, range_gens, range_transcript, relation_combination,
    split_limbs, transcript_context_bytes, validity_transcript, DomainStatement, FieldCiphertext,
    FieldProof, LimbResponse, RelationProof, LIMB_BITS,
};

use crate::keys::{random_scalar, PublicKey};
use crate::ProverError;

/// Prove `ciphertext` with thread-local OS-seeded nonces.
pub fn prove(
    value: &CanonicalValue,
    pk: &PublicKey,
    ciphertext: &FieldCiphertext,
    openings: &[Scalar],
    network_id: &[u8; 32],
) -> Result<Vec<u8>, ProverError> {
    prove_with_rng(value, pk, ciphertext, openings, network_id, &mut rand::rng())
}

/// Produce the proof envelope for `ciphertext`.
///
/// `openings` are the per-limb encryption randomness returned by
/// [`crate::encrypt`]; they must reproduce the ciphertext exactly.
pub fn prove_with_rng<R: RngCore + CryptoRng>(
    value: &CanonicalValue,
    pk: &PublicKey,
    ciphertext: &FieldCiphertext,
    openings: &[Scalar],
    network_id: &[u8; 32],
    rng: &mut R,
) -> Result<Vec<u8>, ProverError> {
    check_domain(value).map_err(ProverError::DomainViolation)?;

    let limbs = split_limbs(value);
    if ciphertext.kind() != value.kind()
        || openings.len() != limbs.len()
        || ciphertext.limbs().len() != limbs.len()
    {
        return Err(ProverError::OpeningMismatch);
    }
    for ((v, r), ct) in limbs.iter().zip(openings).zip(ciphertext.limbs()) {
        let handle_ok = points_equal(&(r * pk.point()), &ct.D);
        if !(points_equal(&pedersen_commit(*v, r), &ct.C) && handle_ok) {
            return Err(ProverError::OpeningMismatch);
        }
    }

    let aux = aux_witness(value);
    prove_statement(pk, ciphertext, &limbs, &aux, openings, network_id, rng)
}

/// Auxiliary values of the kind's domain statement, read off the canonical
/// bytes.
pub(crate) fn aux_witness(value: &CanonicalValue) -> Vec<u64> {
    let b = value.as_bytes();
    match value.kind() {
        ValueKind::Date => {
            let ymd = u64::from(u32::from_be_bytes([b[0], b[1], b[2], b[3]]));
            vec![ymd / 10_000, ymd / 100 % 100, ymd % 100]
        }
        ValueKind::ShortString => vec![u64::from(b[0]), u64::from(b[1])],
        _ => Vec::new(),
    }
}

/// Build the envelope from a raw witness. No domain or opening checks happen
/// here; a witness outside the statement yields a proof that fails to verify.
pub(crate) fn prove_statement<R: RngCore + CryptoRng>(
    pk: &PublicKey,
    ciphertext: &FieldCiphertext,
    limbs: &[u64],
    aux: &[u64],
    openings: &[Scalar],
    network_id: &[u8; 32],
    rng: &mut R,
) -> Result<Vec<u8>, ProverError> {
    let stmt = domain_statement(ciphertext.kind());
    if aux.len() != stmt.aux || openings.len() != limbs.len() {
        return Err(ProverError::OpeningMismatch);
    }

    // Σ-protocol over all limbs, aux commitments and the relation, under one
    // challenge.
    let ct_bytes = ciphertext.to_bytes();
    let mut t = validity_transcript(network_id, pk.point(), &ct_bytes);
    let h = pedersen_h_generator();
    let nonces: Vec<(Scalar, Scalar)> = limbs
        .iter()
        .map(|_| (random_scalar(rng), random_scalar(rng)))
        .collect();
    let commitments: Vec<_> = nonces
        .iter()
        .map(|(y_v, y_r)| (y_v * G + y_r * h, y_r * pk.point()))
        .collect();
    for (y0, y1) in &commitments {
        append_point(&mut t, b"Y0", y0);
        append_point(&mut t, b"Y1", y1);
    }

    let aux_blindings: Vec<Scalar> = aux.iter().map(|_| random_scalar(rng)).collect();
    let aux_points: Vec<_> = aux
        .iter()
        .zip(&aux_blindings)
        .map(|(a, s)| pedersen_commit(*a, s))
        .collect();
    for a in &aux_points {
        append_point(&mut t, labels::AUX, a);
    }

    let relation_nonce = if stmt.has_relation() {
        let k = random_scalar(rng);
        append_point(&mut t, labels::RELATION, &(k * h));
        Some(k)
    } else {
        None
    };
    let c = challenge_scalar(&mut t, labels::CHAL_VALIDITY);

    let responses = limbs
        .iter()
        .zip(openings)
        .zip(nonces.iter().zip(&commitments))
        .map(|((v, r), ((y_v, y_r), (y0, y1)))| LimbResponse {
            Y0: *y0,
            Y1: *y1,
            z_v: y_v + c * Scalar::from(*v),
            z_r: y_r + c * r,
        })
        .collect();

    let relation = match relation_nonce {
        Some(k) => {
            let rho = relation_combination(&stmt, openings, &aux_blindings)
                .ok_or(ProverError::OpeningMismatch)?;
            Some(RelationProof {
                T: k * h,
                z: k + c * rho,
            })
        }
        None => None,
    };

    let ctx_bytes = transcript_context_bytes(&t);
    let range_proof = prove_ranges(&ctx_bytes, &stmt, limbs, openings, aux, &aux_blindings)?;

    Ok(FieldProof {
        responses,
        aux: aux_points,
        relation,
        range_proof,
    }
    .to_bytes())
}

/// Aggregated 16-bit Bulletproof over the limbs, both sides of every bound and
/// zero padding, in the order the verifier rebuilds them.
fn prove_ranges(
    ctx_bytes: &[u8; 32],
    stmt: &DomainStatement,
    limbs: &[u64],
    openings: &[Scalar],
    aux: &[u64],
    aux_blindings: &[Scalar],
) -> Result<Vec<u8>, ProverError> {
    let m = stmt.range_commitments(limbs.len());
    let mut values: Vec<u64> = limbs.to_vec();
    let mut blindings: Vec<Scalar> = openings.to_vec();
    for b in stmt.bounds {
        let (a, s) = aux
            .get(b.aux)
            .zip(aux_blindings.get(b.aux))
            .ok_or(ProverError::OpeningMismatch)?;
        values.push(a.wrapping_sub(b.lower));
        blindings.push(*s);
        values.push(b.upper.wrapping_sub(*a));
        blindings.push(-s);
    }
    values.resize(m, 0);
    blindings.resize(m, Scalar::ZERO);

    let (bp_gens, pc_gens) = range_gens(m);
    let mut t = range_transcript(ctx_bytes, m);
    let blindings: Vec<dalek_ng::scalar::Scalar> = blindings
        .iter()
        .map(|r| dalek_ng::scalar::Scalar::from_bytes_mod_order(r.to_bytes()))
        .collect();

    let (proof, _) =
        RangeProof::prove_multiple(&bp_gens, &pc_gens, &mut t, &values, &blindings, LIMB_BITS)
            .map_err(|_| ProverError::RangeProof("bulletproof generation failed"))?;
    Ok(proof.to_bytes())
}
