use crate::*;
use confidential_records_primitives::{encode, RawValue};
use curve25519_dalek::traits::Identity;

fn sample_ciphertext(kind: ValueKind) -> FieldCiphertext {
    let h = pedersen_h_generator();
    let limbs = (0..limb_count(kind))
        .map(|i| Ciphertext {
            C: pedersen_commit(i as u64, &Scalar::from(3u64 + i as u64)),
            D: Scalar::from(11u64 + i as u64) * h,
        })
        .collect();
    FieldCiphertext::new(kind, limbs).expect("limb count")
}

#[test]
fn h_is_independent_of_basepoint() {
    let h = pedersen_h_generator();
    assert_ne!(h, G);
    assert!(!h.is_identity());
    // Cached and stable.
    assert_eq!(h, pedersen_h_generator());
}

#[test]
fn ng_generators_match_dalek_generators() {
    let pg = pedersen_gens_ng();
    assert_eq!(
        pg.B_blinding.compress().to_bytes(),
        pedersen_h_generator().compress().to_bytes()
    );
    assert_eq!(pg.B.compress().to_bytes(), G.compress().to_bytes());
}

#[test]
fn limb_counts_are_powers_of_two() {
    for kind in ValueKind::ALL {
        let n = limb_count(kind);
        assert!(n.is_power_of_two(), "{kind} has {n} limbs");
        assert_eq!(n * LIMB_BYTES, kind.width());
    }
}

#[test]
fn limbs_split_and_join() {
    let v = encode(ValueKind::UnsignedInteger, &RawValue::Integer(0x0102_0304_0506_0708)).unwrap();
    let limbs = split_limbs(&v);
    assert_eq!(limbs, vec![0x0102, 0x0304, 0x0506, 0x0708]);
    let narrow: Vec<u16> = limbs.iter().map(|l| *l as u16).collect();
    assert_eq!(join_limbs(ValueKind::UnsignedInteger, &narrow).unwrap(), v);
    assert!(join_limbs(ValueKind::Date, &narrow).is_err());
}

#[test]
fn ciphertext_envelope_layout() {
    for kind in ValueKind::ALL {
        let ct = sample_ciphertext(kind);
        let bytes = ct.to_bytes();
        assert_eq!(bytes.len(), FieldCiphertext::encoded_len(kind));
        assert_eq!(bytes[0], ENVELOPE_VERSION);
        assert_eq!(bytes[1], kind.tag());
        assert_eq!(FieldCiphertext::from_bytes(&bytes).unwrap(), ct);
    }
}

#[test]
fn ciphertext_envelope_rejects_malformed_bytes() {
    let bytes = sample_ciphertext(ValueKind::Date).to_bytes();

    assert_eq!(FieldCiphertext::from_bytes(&[]), Err(EnvelopeError::Truncated));

    let mut wrong_version = bytes.clone();
    wrong_version[0] = 9;
    assert_eq!(
        FieldCiphertext::from_bytes(&wrong_version),
        Err(EnvelopeError::UnsupportedVersion(9))
    );

    let mut wrong_kind = bytes.clone();
    wrong_kind[1] = 0xee;
    assert_eq!(
        FieldCiphertext::from_bytes(&wrong_kind),
        Err(EnvelopeError::UnknownKind(0xee))
    );

    // A different kind changes the expected length.
    let mut relabelled = bytes.clone();
    relabelled[1] = ValueKind::UnsignedInteger.tag();
    assert!(matches!(
        FieldCiphertext::from_bytes(&relabelled),
        Err(EnvelopeError::Length { .. })
    ));

    let mut bad_point = bytes.clone();
    bad_point[2..34].copy_from_slice(&[0xff; 32]);
    assert_eq!(
        FieldCiphertext::from_bytes(&bad_point),
        Err(EnvelopeError::InvalidPoint)
    );
}

fn sample_proof(kind: ValueKind) -> FieldProof {
    let h = pedersen_h_generator();
    let stmt = domain_statement(kind);
    FieldProof {
        responses: vec![
            LimbResponse {
                Y0: G,
                Y1: h,
                z_v: Scalar::from(5u64),
                z_r: Scalar::from(6u64),
            };
            limb_count(kind)
        ],
        aux: (0..stmt.aux).map(|j| pedersen_commit(j as u64, &Scalar::ONE)).collect(),
        relation: stmt.has_relation().then_some(RelationProof {
            T: h,
            z: Scalar::from(8u64),
        }),
        range_proof: vec![9u8; 40],
    }
}

#[test]
fn proof_envelope_round_trip_and_truncation() {
    for kind in ValueKind::ALL {
        let proof = sample_proof(kind);
        let bytes = proof.to_bytes();
        assert_eq!(bytes.len(), FieldProof::fixed_len(kind) + 40, "{kind}");
        assert_eq!(FieldProof::from_bytes(&bytes, kind).unwrap(), proof);
    }
    assert_eq!(
        FieldProof::fixed_len(ValueKind::Date),
        1 + 2 * LIMB_RESPONSE_LEN + 3 * AUX_COMMITMENT_LEN + RELATION_PROOF_LEN + 2
    );
    assert_eq!(
        FieldProof::fixed_len(ValueKind::UnsignedInteger),
        1 + 4 * LIMB_RESPONSE_LEN + 2
    );

    let bytes = sample_proof(ValueKind::UnsignedInteger).to_bytes();
    assert_eq!(
        FieldProof::from_bytes(&bytes[..10], ValueKind::UnsignedInteger),
        Err(EnvelopeError::Truncated)
    );
    assert!(FieldProof::from_bytes(&bytes[..bytes.len() - 1], ValueKind::UnsignedInteger).is_err());
    let mut trailing = bytes.clone();
    trailing.push(1);
    assert!(FieldProof::from_bytes(&trailing, ValueKind::UnsignedInteger).is_err());
    // A proof for one kind does not parse as another.
    assert!(FieldProof::from_bytes(&bytes, ValueKind::Date).is_err());

    // Non-canonical scalar in z_v of the first limb.
    let mut bad_scalar = bytes.clone();
    bad_scalar[1 + 64..1 + 96].copy_from_slice(&[0xff; 32]);
    assert_eq!(
        FieldProof::from_bytes(&bad_scalar, ValueKind::UnsignedInteger),
        Err(EnvelopeError::InvalidScalar)
    );

    // Non-canonical relation response.
    let mut bytes = sample_proof(ValueKind::ShortString).to_bytes();
    let z = FieldProof::fixed_len(ValueKind::ShortString) - 2 - 32;
    bytes[z..z + 32].copy_from_slice(&[0xff; 32]);
    assert_eq!(
        FieldProof::from_bytes(&bytes, ValueKind::ShortString),
        Err(EnvelopeError::InvalidScalar)
    );
}

#[test]
fn domain_relations_vanish_on_in_domain_values() {
    let cases = [
        (ValueKind::Date, RawValue::Integer(20250601), vec![2025, 6, 1]),
        (ValueKind::ShortString, RawValue::text("NET30"), vec![5, u64::from(b'N')]),
        (ValueKind::Address, RawValue::hex(format!("0x{}", "ab".repeat(20))), vec![]),
    ];
    for (kind, raw, aux) in cases {
        let value = encode(kind, &raw).unwrap();
        let stmt = domain_statement(kind);
        assert_eq!(stmt.aux, aux.len());

        let limbs: Vec<Scalar> = split_limbs(&value).into_iter().map(Scalar::from).collect();
        let aux: Vec<Scalar> = aux.into_iter().map(Scalar::from).collect();
        assert_eq!(
            relation_combination(&stmt, &limbs, &aux),
            Some(Scalar::ZERO),
            "{kind}"
        );
    }

    // A non-zero address pad leaves a non-zero combination.
    let limbs = vec![Scalar::ONE; 10];
    assert_ne!(
        relation_combination(&domain_statement(ValueKind::Address), &limbs, &[]),
        Some(Scalar::ZERO)
    );
    // Missing operands are reported, not indexed.
    assert_eq!(
        relation_combination(&domain_statement(ValueKind::Date), &limbs, &[]),
        None
    );
}

#[test]
fn bound_commitments_open_to_both_distances() {
    let stmt = domain_statement(ValueKind::Date);
    let r = Scalar::from(77u64);
    let aux = vec![
        pedersen_commit(2025, &r),
        pedersen_commit(6, &r),
        pedersen_commit(1, &r),
    ];
    let bounds = bound_commitments(&stmt, &aux).unwrap();
    assert_eq!(bounds.len(), 6);
    assert_eq!(bounds[0], pedersen_commit(2025 - 1000, &r));
    assert_eq!(bounds[1], pedersen_commit(9999 - 2025, &-r));
    assert_eq!(bounds[2], pedersen_commit(6 - 1, &r));
    assert_eq!(bounds[3], pedersen_commit(12 - 6, &-r));
    assert!(bound_commitments(&stmt, &aux[..2]).is_none());

    // Limbs plus bounds, padded to a power of two.
    assert_eq!(stmt.range_commitments(2), 8);
    assert_eq!(domain_statement(ValueKind::ShortString).range_commitments(16), 32);
    assert_eq!(domain_statement(ValueKind::Address).range_commitments(16), 16);
    assert_eq!(domain_statement(ValueKind::UnsignedInteger).range_commitments(4), 4);
}

#[test]
fn public_key_rejects_identity_and_bad_lengths() {
    let identity = RistrettoPoint::identity().compress().to_bytes();
    assert_eq!(
        public_key_from_bytes(&identity),
        Err(EnvelopeError::InvalidPoint)
    );
    assert!(public_key_from_bytes(&[1u8; 31]).is_err());
    let pk = (Scalar::from(7u64) * pedersen_h_generator()).compress().to_bytes();
    assert!(public_key_from_bytes(&pk).is_ok());
}

#[test]
fn validity_transcript_binds_every_input() {
    let pk = Scalar::from(7u64) * pedersen_h_generator();
    let ct = sample_ciphertext(ValueKind::Date).to_bytes();
    let base = transcript_context_bytes(&validity_transcript(&[0u8; 32], &pk, &ct));

    let other_net = transcript_context_bytes(&validity_transcript(&[1u8; 32], &pk, &ct));
    let other_pk = transcript_context_bytes(&validity_transcript(&[0u8; 32], &(pk + G), &ct));
    let mut ct2 = ct.clone();
    ct2[1] = ValueKind::UnsignedInteger.tag();
    let other_ct = transcript_context_bytes(&validity_transcript(&[0u8; 32], &pk, &ct2));

    assert_ne!(base, other_net);
    assert_ne!(base, other_pk);
    assert_ne!(base, other_ct);

    // Squeezing context does not advance the transcript.
    let t = validity_transcript(&[0u8; 32], &pk, &ct);
    assert_eq!(transcript_context_bytes(&t), transcript_context_bytes(&t));
}
