use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jingwei::hashing::{canonical, derive_pair, srol_n, KmerHasher};

fn synthetic_sequence(len: usize) -> Vec<u8> {
    const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];
    let mut state = 0x2545_F491_4F6C_DD1Du64;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            BASES[(state >> 60) as usize & 0x03]
        })
        .collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    let seq = synthetic_sequence(10_000);
    let k = 25;

    c.bench_function("roll_10k", |b| {
        b.iter(|| {
            let mut hasher = KmerHasher::new(black_box(&seq), k);
            let mut acc = 0u64;
            while hasher.roll() {
                acc ^= canonical(hasher.forward_hash(), hasher.reverse_hash());
            }
            acc
        })
    });

    c.bench_function("seahash_10k_windows", |b| {
        b.iter(|| {
            let mut acc = 0u64;
            for window in black_box(&seq).windows(k) {
                acc ^= seahash::hash(window);
            }
            acc
        })
    });

    let key = 0x1234_5678_abcd_ef01u64;
    c.bench_function("derive_pair", |b| b.iter(|| derive_pair(black_box(key))));
    c.bench_function("srol_n", |b| b.iter(|| srol_n(black_box(key), black_box(17))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
