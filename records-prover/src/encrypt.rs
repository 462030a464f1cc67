//! Twisted ElGamal encryption of canonical values, limb by limb.

use std::collections::HashMap;
use std::sync::OnceLock;

use confidential_records_primitives::CanonicalValue;
use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT as G, ristretto::RistrettoPoint, scalar::Scalar,
};
use rand::{CryptoRng, RngCore};
use zkhe_primitives::{join_limbs, pedersen_commit, Ciphertext, FieldCiphertext};

use crate::keys::{random_scalar, PublicKey, SecretKey};
use crate::ProverError;

/// A ciphertext together with the per-limb randomness that opens it.
///
/// The openings are needed once, to prove the ciphertext, and must not leave
/// the prover.
pub struct Encryption {
    pub ciphertext: FieldCiphertext,
    pub openings: Vec<Scalar>,
}

/// Encrypt under `pk` with thread-local OS-seeded randomness.
pub fn encrypt(value: &CanonicalValue, pk: &PublicKey) -> Encryption {
    encrypt_with_rng(value, pk, &mut rand::rng())
}

pub fn encrypt_with_rng<R: RngCore + CryptoRng>(
    value: &CanonicalValue,
    pk: &PublicKey,
    rng: &mut R,
) -> Encryption {
    let mut openings = Vec::new();
    let ciphertext = FieldCiphertext::from_limbs(value, |v| {
        let r = random_scalar(rng);
        openings.push(r);
        Ciphertext {
            C: pedersen_commit(v, &r),
            D: r * pk.point(),
        }
    });
    Encryption {
        ciphertext,
        openings,
    }
}

/// Decrypt a ciphertext envelope: `C_i - s·D_i = v_i·G`, then recover each
/// 16-bit `v_i` by baby-step/giant-step.
pub fn decrypt(ciphertext: &[u8], sk: &SecretKey) -> Result<CanonicalValue, ProverError> {
    let ct = FieldCiphertext::from_bytes(ciphertext)?;
    let table = DiscreteLogTable::get();
    let limbs = ct
        .limbs()
        .iter()
        .map(|limb| {
            table
                .solve(&(limb.C - sk.scalar() * limb.D))
                .ok_or(ProverError::Decrypt("limb outside the 16-bit range"))
        })
        .collect::<Result<Vec<u16>, _>>()?;
    join_limbs(ct.kind(), &limbs).map_err(|_| ProverError::Decrypt("limb count"))
}

const BABY_STEPS: u32 = 1 << 8;

/// Baby steps `j·G` for `j < 2^8`, keyed by compressed encoding.
struct DiscreteLogTable {
    baby: HashMap<[u8; 32], u16>,
    giant: RistrettoPoint,
}

impl DiscreteLogTable {
    fn get() -> &'static Self {
        static TABLE: OnceLock<DiscreteLogTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            let mut baby = HashMap::with_capacity(BABY_STEPS as usize);
            let mut p = RistrettoPoint::default();
            for j in 0..BABY_STEPS {
                baby.insert(p.compress().to_bytes(), j as u16);
                p += G;
            }
            DiscreteLogTable {
                baby,
                giant: Scalar::from(BABY_STEPS) * G,
            }
        })
    }

    fn solve(&self, target: &RistrettoPoint) -> Option<u16> {
        let mut q = *target;
        for i in 0..BABY_STEPS {
            if let Some(j) = self.baby.get(&q.compress().to_bytes()) {
                return u16::try_from(i * BABY_STEPS + u32::from(*j)).ok();
            }
            q -= self.giant;
        }
        None
    }
}
