use secrecy::SecretString;
use vidsync_crypto::{KdfHash, KdfParams, PasswordDigest, SubKey};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

fn digest() -> PasswordDigest {
    let params = KdfParams {
        version: "bench",
        introduced: "2024-01-01T00:00:00Z",
        algorithm: KdfHash::Sha512,
        iterations: 1,
    };
    PasswordDigest::from_password(&SecretString::from("bench password"), "salt", Some(&params))
}

#[divan::bench(args = [1_000, 10_000, 100_000])]
fn bench_pbkdf2(bencher: divan::Bencher, iterations: u32) {
    let params = KdfParams {
        version: "bench",
        introduced: "2024-01-01T00:00:00Z",
        algorithm: KdfHash::Sha512,
        iterations,
    };
    let password = SecretString::from("bench password");
    bencher.bench(|| {
        PasswordDigest::from_password(divan::black_box(&password), "salt", Some(&params))
    });
}

#[divan::bench]
fn bench_derive_key(bencher: divan::Bencher) {
    let digest = digest();
    bencher.bench(|| {
        digest
            .derive_key(divan::black_box("ExtensionDataSync-cipher--stacks::main"))
            .unwrap()
    });
}

#[divan::bench(args = [256, 4096, 65536])]
fn bench_seal(bencher: divan::Bencher, size: usize) {
    let key = SubKey::from_bytes([0xABu8; 32]);
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| key.seal(divan::black_box(&data), b"remote-key").unwrap());
}

#[divan::bench(args = [256, 4096, 65536])]
fn bench_open(bencher: divan::Bencher, size: usize) {
    let key = SubKey::from_bytes([0xABu8; 32]);
    let sealed = key.seal(&make_data(size), b"remote-key").unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| key.open(divan::black_box(&sealed), b"remote-key").unwrap());
}

fn main() {
    divan::main();
}
