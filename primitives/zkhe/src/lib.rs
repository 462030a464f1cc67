//! # zkhe-primitives
//!
//! Shared pieces of the field encryption scheme: generators, transcript
//! construction, limb splitting and the byte layouts of ciphertext and proof
//! envelopes. Prover and verifier both go through these functions so that
//! their transcripts cannot drift apart.
//!
//! ## Scheme
//!
//! A canonical value is cut into big-endian 16-bit limbs `v_i`. Each limb is a
//! twisted ElGamal ciphertext under `P = s⁻¹·H`:
//!
//! ```text
//! C_i = v_i·G + r_i·H      (Pedersen commitment, fed to the range proof)
//! D_i = r_i·P              (decrypt handle)
//! ```
//!
//! ## Domain statements
//!
//! The limb range proof alone only bounds the byte width. Kinds with a
//! narrower domain carry a [`DomainStatement`]: auxiliary Pedersen commitments
//! `A_j` to parts of the value, a linear relation over `C_i` and `A_j` that
//! must commit to zero (proved by knowledge of its `H`-discrete log), and
//! two-sided bounds `A_j − lo·G ≥ 0`, `hi·G − A_j ≥ 0` that join the limbs in
//! one aggregated Bulletproof. The verifier derives every bound commitment
//! from the proof itself.
//!
//! ```text
//! Date         aux Y, M, D   2¹⁶·C_0 + C_1 − 10⁴·Y − 10²·M − D = 0
//!                            1000 ≤ Y ≤ 9999, 1 ≤ M ≤ 12, 1 ≤ D ≤ 31
//! ShortString  aux L, B      C_0 − 2⁸·L − B = 0,  L ≤ 31, B ≤ 255
//! Address      no aux        C_0 + … + C_5 = 0
//! ```
//!
//! Calendar validity (days per month), UTF-8 and the zero padding after a
//! short string's length remain prover-side checks.
//!
//! ## Byte layouts
//!
//! **Ciphertext envelope:**
//! ```text
//! version(1) || kind(1) || limbs * (C(32) || D(32))
//! ```
//!
//! **Proof envelope:**
//! ```text
//! version(1) || limbs * (Y0(32) || Y1(32) || z_v(32) || z_r(32))
//!            || aux * A(32) || [T(32) || z(32)] || len(2) || range_proof
//! ```
//! The aux count and the presence of the relation proof `T, z` follow from the
//! kind, so the layout is fixed per kind up to the range proof.

use std::ops::{Add, Mul};
use std::sync::OnceLock;

use bulletproofs::{BulletproofGens, PedersenGens};
use confidential_records_primitives::{
    codec::SHORT_STRING_MAX, CanonicalValue, CodecError, ValueKind,
};
use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT as G,
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
    traits::IsIdentity,
};
use curve25519_dalek_ng as dalek_ng;
use merlin::Transcript;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Envelope format version; bumped on any layout or transcript change.
pub const ENVELOPE_VERSION: u8 = 2;

pub const LIMB_BITS: usize = 16;
pub const LIMB_BYTES: usize = 2;
pub const LIMB_CIPHERTEXT_LEN: usize = 64;
pub const LIMB_RESPONSE_LEN: usize = 128;
pub const AUX_COMMITMENT_LEN: usize = 32;
pub const RELATION_PROOF_LEN: usize = 64;

pub mod labels {
    pub const PROTOCOL: &[u8] = b"confidential-records/zkhe";
    pub const PROTOCOL_V: &[u8] = b"v2";
    pub const CHAL_VALIDITY: &[u8] = b"chal_validity";
    pub const AUX: &[u8] = b"aux";
    pub const RELATION: &[u8] = b"relation_T";
    pub const RANGE: &[u8] = b"limb-range";
    pub const PEDERSEN_H: &[u8] = b"ConfidentialRecords/PedersenH";
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("envelope truncated")]
    Truncated,
    #[error("envelope length {actual}, expected {expected}")]
    Length { expected: usize, actual: usize },
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),
    #[error("unknown value kind tag {0}")]
    UnknownKind(u8),
    #[error("invalid curve point")]
    InvalidPoint,
    #[error("non-canonical scalar")]
    InvalidScalar,
}

// ------------------------------- generators -------------------------------

/// Pedersen blinding generator `H`, independent of the basepoint.
pub fn pedersen_h_generator() -> RistrettoPoint {
    static H: OnceLock<RistrettoPoint> = OnceLock::new();
    *H.get_or_init(|| RistrettoPoint::hash_from_bytes::<sha2::Sha512>(labels::PEDERSEN_H))
}

/// `(G, H)` in the `curve25519-dalek-ng` types the Bulletproofs crate expects.
pub fn pedersen_gens_ng() -> PedersenGens {
    let h = dalek_ng::ristretto::CompressedRistretto(pedersen_h_generator().compress().to_bytes())
        .decompress()
        .expect("H is a valid Ristretto point");
    PedersenGens {
        B: dalek_ng::constants::RISTRETTO_BASEPOINT_POINT,
        B_blinding: h,
    }
}

/// Generators for an aggregated 16-bit range proof over `commitments` values.
pub fn range_gens(commitments: usize) -> (BulletproofGens, PedersenGens) {
    (BulletproofGens::new(LIMB_BITS, commitments), pedersen_gens_ng())
}

// ------------------------------- points -------------------------------

pub fn point_to_bytes(p: &RistrettoPoint) -> [u8; 32] {
    p.compress().to_bytes()
}

pub fn point_from_bytes(bytes: &[u8; 32]) -> Result<RistrettoPoint, EnvelopeError> {
    CompressedRistretto(*bytes)
        .decompress()
        .ok_or(EnvelopeError::InvalidPoint)
}

/// Decode a public key tag. The identity is rejected: nothing encrypted
/// under it could ever be opened.
pub fn public_key_from_bytes(bytes: &[u8]) -> Result<RistrettoPoint, EnvelopeError> {
    let raw: [u8; 32] = bytes.try_into().map_err(|_| EnvelopeError::Length {
        expected: 32,
        actual: bytes.len(),
    })?;
    let p = point_from_bytes(&raw)?;
    if p.is_identity() {
        return Err(EnvelopeError::InvalidPoint);
    }
    Ok(p)
}

pub fn scalar_from_bytes(bytes: &[u8; 32]) -> Result<Scalar, EnvelopeError> {
    Option::<Scalar>::from(Scalar::from_canonical_bytes(*bytes)).ok_or(EnvelopeError::InvalidScalar)
}

pub fn points_equal(a: &RistrettoPoint, b: &RistrettoPoint) -> bool {
    a.ct_eq(b).into()
}

// ------------------------------- limbs -------------------------------

pub const fn limb_count(kind: ValueKind) -> usize {
    kind.width() / LIMB_BYTES
}

/// Big-endian 16-bit limbs of a canonical value.
pub fn split_limbs(value: &CanonicalValue) -> Vec<u64> {
    value
        .as_bytes()
        .chunks_exact(LIMB_BYTES)
        .map(|c| u64::from(u16::from_be_bytes([c[0], c[1]])))
        .collect()
}

pub fn join_limbs(kind: ValueKind, limbs: &[u16]) -> Result<CanonicalValue, CodecError> {
    let bytes: Vec<u8> = limbs.iter().flat_map(|l| l.to_be_bytes()).collect();
    CanonicalValue::from_bytes(kind, bytes)
}

// ------------------------------- domain statements -------------------------------

/// Operand of a domain relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Term {
    Limb(usize),
    Aux(usize),
}

/// `lower ≤ aux ≤ upper`, proved as the two 16-bit ranges `aux − lower` and
/// `upper − aux`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bound {
    pub aux: usize,
    pub lower: u64,
    pub upper: u64,
}

/// What a proof must show about a kind beyond the width of its limbs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DomainStatement {
    /// Auxiliary commitments carried in the proof envelope.
    pub aux: usize,
    /// `Σ coefficient·term` must commit to zero. Empty if the kind has no
    /// relation.
    pub relation: &'static [(Term, i64)],
    pub bounds: &'static [Bound],
}

const UNCONSTRAINED: DomainStatement = DomainStatement {
    aux: 0,
    relation: &[],
    bounds: &[],
};

// YYYYMMDD = 2¹⁶·hi + lo = 10⁴·year + 10²·month + day. With all three bounded
// the decomposition is unique.
const DATE: DomainStatement = DomainStatement {
    aux: 3,
    relation: &[
        (Term::Limb(0), 1 << 16),
        (Term::Limb(1), 1),
        (Term::Aux(0), -10_000),
        (Term::Aux(1), -100),
        (Term::Aux(2), -1),
    ],
    bounds: &[
        Bound { aux: 0, lower: 1000, upper: 9999 },
        Bound { aux: 1, lower: 1, upper: 12 },
        Bound { aux: 2, lower: 1, upper: 31 },
    ],
};

// The first limb is `length || first byte`.
const SHORT_STRING: DomainStatement = DomainStatement {
    aux: 2,
    relation: &[(Term::Limb(0), 1), (Term::Aux(0), -256), (Term::Aux(1), -1)],
    bounds: &[
        Bound { aux: 0, lower: 0, upper: SHORT_STRING_MAX as u64 },
        Bound { aux: 1, lower: 0, upper: 255 },
    ],
};

// Limbs are non-negative, so a zero sum means six zero limbs (12 pad bytes).
const ADDRESS: DomainStatement = DomainStatement {
    aux: 0,
    relation: &[
        (Term::Limb(0), 1),
        (Term::Limb(1), 1),
        (Term::Limb(2), 1),
        (Term::Limb(3), 1),
        (Term::Limb(4), 1),
        (Term::Limb(5), 1),
    ],
    bounds: &[],
};

pub const fn domain_statement(kind: ValueKind) -> DomainStatement {
    match kind {
        ValueKind::Date => DATE,
        ValueKind::ShortString => SHORT_STRING,
        ValueKind::Address => ADDRESS,
        ValueKind::UnsignedInteger | ValueKind::Decimal | ValueKind::Digest => UNCONSTRAINED,
    }
}

impl DomainStatement {
    pub const fn has_relation(&self) -> bool {
        !self.relation.is_empty()
    }

    /// Commitments covered by the range proof: limbs, then two per bound,
    /// padded with identity commitments to a power of two.
    pub const fn range_commitments(&self, limbs: usize) -> usize {
        (limbs + 2 * self.bounds.len()).next_power_of_two()
    }
}

pub fn coefficient(c: i64) -> Scalar {
    let magnitude = Scalar::from(c.unsigned_abs());
    if c < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Evaluate a statement's relation over limb and aux operands. Works on points
/// (verifier) and on blindings (prover). `None` if an operand is missing.
pub fn relation_combination<T>(stmt: &DomainStatement, limbs: &[T], aux: &[T]) -> Option<T>
where
    T: Copy + Default + Add<Output = T> + Mul<Scalar, Output = T>,
{
    stmt.relation.iter().try_fold(T::default(), |acc, (term, c)| {
        let x = match term {
            Term::Limb(i) => limbs.get(*i)?,
            Term::Aux(j) => aux.get(*j)?,
        };
        Some(acc + *x * coefficient(*c))
    })
}

/// `A_j − lo·G` and `hi·G − A_j` for every bound, in order.
pub fn bound_commitments(
    stmt: &DomainStatement,
    aux: &[RistrettoPoint],
) -> Option<Vec<RistrettoPoint>> {
    let mut out = Vec::with_capacity(2 * stmt.bounds.len());
    for b in stmt.bounds {
        let a = aux.get(b.aux)?;
        out.push(a - Scalar::from(b.lower) * G);
        out.push(Scalar::from(b.upper) * G - a);
    }
    Some(out)
}

// ------------------------------- transcripts -------------------------------

pub fn append_point(t: &mut Transcript, label: &'static [u8], p: &RistrettoPoint) {
    t.append_message(label, p.compress().as_bytes());
}

pub fn challenge_scalar(t: &mut Transcript, label: &'static [u8]) -> Scalar {
    let mut wide = [0u8; 64];
    t.challenge_bytes(label, &mut wide);
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Validity transcript: binds the statement (network, key, full ciphertext
/// including its kind header) before any prover message.
pub fn validity_transcript(
    network_id: &[u8; 32],
    public_key: &RistrettoPoint,
    ciphertext: &[u8],
) -> Transcript {
    let mut t = Transcript::new(labels::PROTOCOL);
    t.append_message(b"proto", labels::PROTOCOL_V);
    t.append_message(b"envelope_version", &[ENVELOPE_VERSION]);
    t.append_message(b"network_id", network_id);
    append_point(&mut t, b"pk", public_key);
    t.append_message(b"ciphertext", ciphertext);
    t
}

/// Squeeze 32 bytes from a transcript without advancing it.
pub fn transcript_context_bytes(t: &Transcript) -> [u8; 32] {
    let mut clone = t.clone();
    let mut out = [0u8; 32];
    clone.challenge_bytes(b"ctx", &mut out);
    out
}

/// Range-proof transcript seeded from the validity transcript's context.
pub fn range_transcript(ctx_bytes: &[u8; 32], commitments: usize) -> Transcript {
    let mut t = Transcript::new(labels::RANGE);
    t.append_message(b"ctx", ctx_bytes);
    t.append_u64(b"commitments", commitments as u64);
    t
}

// ------------------------------- ciphertexts -------------------------------

/// One twisted ElGamal limb ciphertext.
#[allow(non_snake_case)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ciphertext {
    pub C: RistrettoPoint,
    pub D: RistrettoPoint,
}

impl Ciphertext {
    pub fn to_bytes(&self) -> [u8; LIMB_CIPHERTEXT_LEN] {
        let mut out = [0u8; LIMB_CIPHERTEXT_LEN];
        out[0..32].copy_from_slice(self.C.compress().as_bytes());
        out[32..64].copy_from_slice(self.D.compress().as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; LIMB_CIPHERTEXT_LEN]) -> Result<Self, EnvelopeError> {
        let (c, d) = bytes.split_at(32);
        Ok(Ciphertext {
            C: point_from_bytes(&to_array(c))?,
            D: point_from_bytes(&to_array(d))?,
        })
    }
}

/// Ciphertext envelope for one field value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldCiphertext {
    kind: ValueKind,
    limbs: Vec<Ciphertext>,
}

impl FieldCiphertext {
    pub fn new(kind: ValueKind, limbs: Vec<Ciphertext>) -> Result<Self, EnvelopeError> {
        if limbs.len() != limb_count(kind) {
            return Err(EnvelopeError::Length {
                expected: limb_count(kind),
                actual: limbs.len(),
            });
        }
        Ok(Self { kind, limbs })
    }

    /// Build an envelope by encrypting each limb of `value` with `f`. The limb
    /// count follows from the canonical width, so this cannot fail.
    pub fn from_limbs(value: &CanonicalValue, f: impl FnMut(u64) -> Ciphertext) -> Self {
        Self {
            kind: value.kind(),
            limbs: split_limbs(value).into_iter().map(f).collect(),
        }
    }

    /// Envelope size for `kind`; independent of the value.
    pub const fn encoded_len(kind: ValueKind) -> usize {
        2 + limb_count(kind) * LIMB_CIPHERTEXT_LEN
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn limbs(&self) -> &[Ciphertext] {
        &self.limbs
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::encoded_len(self.kind));
        out.push(ENVELOPE_VERSION);
        out.push(self.kind.tag());
        for limb in &self.limbs {
            out.extend_from_slice(&limb.to_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let kind = parse_header(bytes)?;
        let expected = Self::encoded_len(kind);
        if bytes.len() != expected {
            return Err(EnvelopeError::Length {
                expected,
                actual: bytes.len(),
            });
        }
        let limbs = bytes[2..]
            .chunks_exact(LIMB_CIPHERTEXT_LEN)
            .map(|chunk| Ciphertext::from_bytes(&to_array(chunk)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { kind, limbs })
    }
}

/// Read `version || kind` from a ciphertext envelope.
pub fn parse_header(bytes: &[u8]) -> Result<ValueKind, EnvelopeError> {
    if bytes.len() < 2 {
        return Err(EnvelopeError::Truncated);
    }
    if bytes[0] != ENVELOPE_VERSION {
        return Err(EnvelopeError::UnsupportedVersion(bytes[0]));
    }
    ValueKind::from_tag(bytes[1]).ok_or(EnvelopeError::UnknownKind(bytes[1]))
}

// ------------------------------- proofs -------------------------------

/// Σ-protocol message for one limb: knowledge of `(v, r)` with
/// `C = v·G + r·H` and `D = r·P`.
#[allow(non_snake_case)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LimbResponse {
    pub Y0: RistrettoPoint,
    pub Y1: RistrettoPoint,
    pub z_v: Scalar,
    pub z_r: Scalar,
}

impl LimbResponse {
    pub fn to_bytes(&self) -> [u8; LIMB_RESPONSE_LEN] {
        let mut out = [0u8; LIMB_RESPONSE_LEN];
        out[0..32].copy_from_slice(self.Y0.compress().as_bytes());
        out[32..64].copy_from_slice(self.Y1.compress().as_bytes());
        out[64..96].copy_from_slice(self.z_v.as_bytes());
        out[96..128].copy_from_slice(self.z_r.as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; LIMB_RESPONSE_LEN]) -> Result<Self, EnvelopeError> {
        Ok(LimbResponse {
            Y0: point_from_bytes(&to_array(&bytes[0..32]))?,
            Y1: point_from_bytes(&to_array(&bytes[32..64]))?,
            z_v: scalar_from_bytes(&to_array(&bytes[64..96]))?,
            z_r: scalar_from_bytes(&to_array(&bytes[96..128]))?,
        })
    }
}

/// Proof that a domain relation commits to zero: `T = k·H`, `z = k + c·ρ`.
#[allow(non_snake_case)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelationProof {
    pub T: RistrettoPoint,
    pub z: Scalar,
}

/// Proof envelope for one field value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldProof {
    pub responses: Vec<LimbResponse>,
    pub aux: Vec<RistrettoPoint>,
    pub relation: Option<RelationProof>,
    pub range_proof: Vec<u8>,
}

impl FieldProof {
    /// Length of everything but the range proof bytes for `kind`.
    pub const fn fixed_len(kind: ValueKind) -> usize {
        let stmt = domain_statement(kind);
        let relation = if stmt.has_relation() {
            RELATION_PROOF_LEN
        } else {
            0
        };
        1 + limb_count(kind) * LIMB_RESPONSE_LEN + stmt.aux * AUX_COMMITMENT_LEN + relation + 2
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            1 + self.responses.len() * LIMB_RESPONSE_LEN
                + self.aux.len() * AUX_COMMITMENT_LEN
                + RELATION_PROOF_LEN
                + 2
                + self.range_proof.len(),
        );
        out.push(ENVELOPE_VERSION);
        for r in &self.responses {
            out.extend_from_slice(&r.to_bytes());
        }
        for a in &self.aux {
            out.extend_from_slice(a.compress().as_bytes());
        }
        if let Some(rel) = &self.relation {
            out.extend_from_slice(rel.T.compress().as_bytes());
            out.extend_from_slice(rel.z.as_bytes());
        }
        out.extend_from_slice(&(self.range_proof.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.range_proof);
        out
    }

    /// Parse a proof for a ciphertext of `kind`. Trailing bytes are rejected.
    pub fn from_bytes(bytes: &[u8], kind: ValueKind) -> Result<Self, EnvelopeError> {
        let fixed = Self::fixed_len(kind);
        if bytes.len() < fixed {
            return Err(EnvelopeError::Truncated);
        }
        if bytes[0] != ENVELOPE_VERSION {
            return Err(EnvelopeError::UnsupportedVersion(bytes[0]));
        }
        let stmt = domain_statement(kind);
        let mut off = 1 + limb_count(kind) * LIMB_RESPONSE_LEN;
        let responses = bytes[1..off]
            .chunks_exact(LIMB_RESPONSE_LEN)
            .map(|chunk| LimbResponse::from_bytes(&to_array(chunk)))
            .collect::<Result<Vec<_>, _>>()?;

        let aux_end = off + stmt.aux * AUX_COMMITMENT_LEN;
        let aux = bytes[off..aux_end]
            .chunks_exact(AUX_COMMITMENT_LEN)
            .map(|chunk| point_from_bytes(&to_array(chunk)))
            .collect::<Result<Vec<_>, _>>()?;
        off = aux_end;

        let relation = if stmt.has_relation() {
            let rel = RelationProof {
                T: point_from_bytes(&to_array(&bytes[off..off + 32]))?,
                z: scalar_from_bytes(&to_array(&bytes[off + 32..off + 64]))?,
            };
            off += RELATION_PROOF_LEN;
            Some(rel)
        } else {
            None
        };

        let len = usize::from(u16::from_le_bytes([bytes[off], bytes[off + 1]]));
        if bytes.len() != fixed + len {
            return Err(EnvelopeError::Length {
                expected: fixed + len,
                actual: bytes.len(),
            });
        }
        Ok(FieldProof {
            responses,
            aux,
            relation,
            range_proof: bytes[fixed..].to_vec(),
        })
    }
}

/// Verifier side of the aggregated limb range proof.
pub trait RangeProofVerifier {
    /// `commitments` are the compressed limb `C_i` in order, then the bound
    /// commitments, then identity padding.
    fn verify_range_proof(
        ctx_bytes: &[u8; 32],
        commitments: &[[u8; 32]],
        proof_bytes: &[u8],
    ) -> Result<(), ()>;
}

/// `v·G + r·H`.
pub fn pedersen_commit(v: u64, r: &Scalar) -> RistrettoPoint {
    Scalar::from(v) * G + r * pedersen_h_generator()
}

fn to_array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    out
}

#[cfg(test)]
mod tests;
