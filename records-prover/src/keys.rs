//! Key generation and submission sessions.
//!
//! Keys are twisted ElGamal keys: the secret is a non-zero scalar `s` and the
//! public key is `P = s⁻¹·H`. A [`SubmissionSession`] owns the keys for one
//! record and is consumed when the record is sealed.

use core::fmt;

use confidential_records_primitives::{check_domain, CanonicalValue, EncryptedField};
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
use rand::{rngs::OsRng, CryptoRng, RngCore, SeedableRng, TryRngCore};
use rand_chacha::ChaCha20Rng;
use zkhe_primitives::{pedersen_h_generator, public_key_from_bytes, scalar_from_bytes};

use crate::config::{KeyScope, ProverConfig};
use crate::encrypt::encrypt_with_rng;
use crate::prove::prove_with_rng;
use crate::ProverError;

/// Full 256-bit entropy scalar, reduced from 64 uniform bytes.
pub(crate) fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    let mut bytes = [0u8; 64];
    rng.fill_bytes(&mut bytes);
    Scalar::from_bytes_mod_order_wide(&bytes)
}

/// Fill `buf` from the operating system. Never falls back to a weaker source.
fn os_entropy(buf: &mut [u8]) -> Result<(), ProverError> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|_| ProverError::EntropyUnavailable)
}

#[derive(Clone)]
pub struct SecretKey(Scalar);

impl SecretKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, ProverError> {
        let s = scalar_from_bytes(bytes).map_err(|_| ProverError::MalformedKey)?;
        if s == Scalar::ZERO {
            return Err(ProverError::MalformedKey);
        }
        Ok(Self(s))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.invert() * pedersen_h_generator())
    }

    pub(crate) fn scalar(&self) -> &Scalar {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey(RistrettoPoint);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProverError> {
        public_key_from_bytes(bytes)
            .map(Self)
            .map_err(|_| ProverError::MalformedKey)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.compress().to_bytes()
    }

    pub fn point(&self) -> &RistrettoPoint {
        &self.0
    }
}

#[derive(Clone, Debug)]
pub struct KeyPair {
    public: PublicKey,
    secret: SecretKey,
}

impl KeyPair {
    pub fn from_secret(secret: SecretKey) -> Self {
        Self {
            public: secret.public_key(),
            secret,
        }
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

/// Fresh key pair from the operating system CSPRNG.
pub fn generate_keypair() -> Result<KeyPair, ProverError> {
    let mut wide = [0u8; 64];
    loop {
        os_entropy(&mut wide)?;
        let s = Scalar::from_bytes_mod_order_wide(&wide);
        if s != Scalar::ZERO {
            return Ok(KeyPair::from_secret(SecretKey(s)));
        }
    }
}

/// Key pair drawn from a caller-supplied CSPRNG.
pub fn keypair_from_rng<R: RngCore + CryptoRng>(rng: &mut R) -> KeyPair {
    loop {
        let s = random_scalar(rng);
        if s != Scalar::ZERO {
            return KeyPair::from_secret(SecretKey(s));
        }
    }
}

/// Key material and randomness for exactly one record submission.
///
/// Every sensitive field of the record is encrypted, proved and self-verified
/// through [`SubmissionSession::encrypt_field`]. Sealing a record takes the
/// session by value, so its keys cannot leak into a second record.
pub struct SubmissionSession {
    network_id: [u8; 32],
    key_scope: KeyScope,
    rng: ChaCha20Rng,
    record_key: KeyPair,
}

impl SubmissionSession {
    /// Session seeded from operating system entropy.
    pub fn new(config: &ProverConfig) -> Result<Self, ProverError> {
        let mut seed = [0u8; 32];
        os_entropy(&mut seed)?;
        let session = Self::from_seed(config, seed);
        log::debug!(
            target: "records-prover",
            "new submission session, key {}.., scope {:?}",
            hex::encode(&session.public_key().to_bytes()[..4]),
            session.key_scope,
        );
        Ok(session)
    }

    /// Deterministic session for tests. Never use a fixed seed in production.
    pub fn from_seed(config: &ProverConfig, seed: [u8; 32]) -> Self {
        let mut rng = ChaCha20Rng::from_seed(seed);
        let record_key = keypair_from_rng(&mut rng);
        Self {
            network_id: config.network_id,
            key_scope: config.key_scope,
            rng,
            record_key,
        }
    }

    /// The record-level public key. Under [`KeyScope::PerField`] fields carry
    /// their own keys instead.
    pub fn public_key(&self) -> &PublicKey {
        self.record_key.public()
    }

    pub fn network_id(&self) -> &[u8; 32] {
        &self.network_id
    }

    /// Encrypt, prove and self-verify one sensitive value.
    ///
    /// The domain is checked before anything is encrypted. A proof that does
    /// not verify is a defect and surfaces as [`ProverError::SelfCheckFailed`].
    pub fn encrypt_field(&mut self, value: &CanonicalValue) -> Result<EncryptedField, ProverError> {
        check_domain(value).map_err(ProverError::DomainViolation)?;

        let pk = match self.key_scope {
            KeyScope::PerRecord => *self.record_key.public(),
            KeyScope::PerField => *keypair_from_rng(&mut self.rng).public(),
        };

        let enc = encrypt_with_rng(value, &pk, &mut self.rng);
        let proof = prove_with_rng(
            value,
            &pk,
            &enc.ciphertext,
            &enc.openings,
            &self.network_id,
            &mut self.rng,
        )?;
        let ciphertext = enc.ciphertext.to_bytes();
        let public_key = pk.to_bytes();

        if !records_verifier::verify_field(&self.network_id, &ciphertext, &public_key, &proof) {
            log::warn!(
                target: "records-prover",
                "self-check failed for a {} value",
                value.kind()
            );
            return Err(ProverError::SelfCheckFailed);
        }
        log::trace!(
            target: "records-prover",
            "encrypted {} value into {} ciphertext bytes, {} proof bytes",
            value.kind(),
            ciphertext.len(),
            proof.len()
        );

        Ok(EncryptedField {
            ciphertext,
            public_key,
            proof,
        })
    }
}
