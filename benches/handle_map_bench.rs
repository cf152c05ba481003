use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rc_handlemap::{Handle, HandleMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn filled(n: usize) -> (HandleMap<u64>, Vec<Handle>) {
    let m = HandleMap::new();
    let handles = lcg(7).take(n).map(|x| m.insert(x).unwrap()).collect();
    (m, handles)
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("handle_map_insert_10k", |b| {
        b.iter_batched(
            HandleMap::<u64>::new,
            |m| {
                for x in lcg(1).take(10_000) {
                    black_box(m.insert(x).unwrap());
                }
                m
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_grab_release_hit(c: &mut Criterion) {
    c.bench_function("handle_map_grab_release_hit", |b| {
        let (m, handles) = filled(20_000);
        let mut it = handles.iter().cycle();
        b.iter(|| {
            let h = *it.next().unwrap();
            black_box(m.grab(h));
            black_box(m.release(h));
        })
    });
}

fn bench_grab_miss(c: &mut Criterion) {
    c.bench_function("handle_map_grab_miss", |b| {
        let (m, _handles) = filled(10_000);
        let mut miss = lcg(0xdead_beef).map(|x| Handle::from_raw((x >> 32) as u32 | 0x8000_0000));
        b.iter(|| black_box(m.grab(miss.next().unwrap())))
    });
}

fn bench_insert_release_churn(c: &mut Criterion) {
    c.bench_function("handle_map_insert_release_churn", |b| {
        let m = HandleMap::new();
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            let h = m.insert(n).unwrap();
            black_box(m.release(h));
        })
    });
}

fn bench_contended_grab(c: &mut Criterion) {
    c.bench_function("handle_map_grab_release_with_3_readers", |b| {
        let (m, handles) = filled(1_000);
        let m = Arc::new(m);
        let handles = Arc::new(handles);
        let stop = Arc::new(AtomicBool::new(false));
        let workers: Vec<_> = (0..3u64)
            .map(|seed| {
                let (m, handles, stop) = (m.clone(), handles.clone(), stop.clone());
                thread::spawn(move || {
                    let mut idx = lcg(seed).map(|x| (x >> 33) as usize % handles.len());
                    while !stop.load(Ordering::Relaxed) {
                        let h = handles[idx.next().unwrap()];
                        if m.grab(h).is_some() {
                            m.release(h);
                        }
                    }
                })
            })
            .collect();

        let mut it = handles.iter().cycle();
        b.iter(|| {
            let h = *it.next().unwrap();
            black_box(m.grab(h));
            black_box(m.release(h));
        });

        stop.store(true, Ordering::Relaxed);
        for w in workers {
            w.join().unwrap();
        }
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert, bench_grab_release_hit, bench_grab_miss,
        bench_insert_release_churn, bench_contended_grab
}
criterion_main!(benches);
