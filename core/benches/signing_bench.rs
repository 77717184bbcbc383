// Signing & verification benchmarks for keystone.
//
// Covers key generation, message and digest signing, low-R grinding,
// verification, and public-key recovery.

use criterion::{criterion_group, criterion_main, Criterion};

use keystone_core::crypto::keys::PrivateKey;
use keystone_core::crypto::signatures::{message_hash, recover_message_signer, Signer};

const MESSAGE: &str = "transfer 500 sats from alice to bob; nonce=42";

fn bench_key_generation(c: &mut Criterion) {
    c.bench_function("secp256k1/key_generate", |b| {
        b.iter(PrivateKey::generate);
    });
}

fn bench_sign_message(c: &mut Criterion) {
    let key = PrivateKey::generate().unwrap();

    c.bench_function("secp256k1/sign_message", |b| {
        b.iter(|| key.sign_message(MESSAGE).unwrap());
    });
}

fn bench_sign_low_r(c: &mut Criterion) {
    let key = PrivateKey::generate().unwrap();
    let secret = key.to_bytes().unwrap();
    let digest = message_hash(MESSAGE);
    let mut signer = Signer::new();

    c.bench_function("secp256k1/sign_low_r", |b| {
        b.iter(|| signer.sign_low_r(&digest, &secret).unwrap());
    });
}

fn bench_verify_message(c: &mut Criterion) {
    let key = PrivateKey::generate().unwrap();
    let public = key.public_key().unwrap();
    let signature = key.sign_message(MESSAGE).unwrap();

    c.bench_function("secp256k1/verify_message", |b| {
        b.iter(|| public.verify_message(MESSAGE, &signature));
    });
}

fn bench_recover_signer(c: &mut Criterion) {
    let key = PrivateKey::generate().unwrap();
    let encoded = key.sign_message(MESSAGE).unwrap().to_message_base64(true);

    c.bench_function("secp256k1/recover_signer", |b| {
        b.iter(|| recover_message_signer(MESSAGE, &encoded).unwrap());
    });
}

criterion_group!(
    benches,
    bench_key_generation,
    bench_sign_message,
    bench_sign_low_r,
    bench_verify_message,
    bench_recover_signer,
);
criterion_main!(benches);
