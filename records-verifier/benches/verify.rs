use confidential_records_primitives::{encode, RawValue, RecordVerifier as _, ValueKind};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use records_prover::{
    keypair_from_rng, InvoiceInput, ProverConfig, RecordInput as _, SubmissionSession,
};
use records_verifier::{verify_field, RecordsVerifier};
use std::hint::black_box;

const NET: [u8; 32] = [0u8; 32];

fn field_fixture(kind: ValueKind, raw: RawValue) -> (Vec<u8>, [u8; 32], Vec<u8>) {
    use rand::SeedableRng;
    let mut rng = rand_chacha::ChaCha20Rng::from_seed([9u8; 32]);
    let value = encode(kind, &raw).expect("in domain");
    let kp = keypair_from_rng(&mut rng);
    let enc = records_prover::encrypt_with_rng(&value, kp.public(), &mut rng);
    let proof = records_prover::prove_with_rng(
        &value,
        kp.public(),
        &enc.ciphertext,
        &enc.openings,
        &NET,
        &mut rng,
    )
    .expect("prove");
    (enc.ciphertext.to_bytes(), kp.public().to_bytes(), proof)
}

fn bench_verify_field(c: &mut Criterion) {
    let mut g = c.benchmark_group("verify_field");
    g.throughput(Throughput::Elements(1));

    let fixtures = [
        (ValueKind::Date, RawValue::Integer(20250601)),
        (ValueKind::UnsignedInteger, RawValue::Integer(1000)),
        (ValueKind::ShortString, RawValue::text("NET30")),
    ];
    for (kind, raw) in fixtures {
        let (ct, pk, proof) = field_fixture(kind, raw);
        g.bench_function(BenchmarkId::from_parameter(kind.name()), |b| {
            b.iter(|| {
                let ok = verify_field(&NET, &ct, &pk, &proof);
                assert!(ok, "{kind} verify");
                black_box(ok);
            });
        });
    }

    g.finish();
}

fn bench_verify_record(c: &mut Criterion) {
    let mut g = c.benchmark_group("verify_record");
    g.throughput(Throughput::Elements(1));

    let record = InvoiceInput {
        amount: 1000,
        due_date: 20250601,
        payment_terms: "NET30".into(),
        invoice_hash: format!("0x{}", "cd".repeat(32)),
        buyer_address: format!("0x{}", "ab".repeat(20)),
    }
    .into_builder()
    .and_then(|b| b.seal_with(SubmissionSession::from_seed(&ProverConfig::new(NET), [1u8; 32])))
    .expect("seal");

    g.bench_function(BenchmarkId::from_parameter("invoice"), |b| {
        b.iter(|| {
            let ok = RecordsVerifier::<confidential_records_primitives::DefaultNetwork>::verify_record(
                &record,
            );
            assert!(ok, "invoice verify");
            black_box(ok);
        });
    });

    g.finish();
}

criterion_group!(benches, bench_verify_field, bench_verify_record);
criterion_main!(benches);
