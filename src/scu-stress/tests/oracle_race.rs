use std::sync::Barrier;

use crossbeam::thread;
use scu_api::misc::BuildInfoResponse;
use scu_stress::{Oracle, Verdict};

const NUM_THREADS: usize = 16;
const NUM_ROUNDS: usize = 50;

fn info(build: u32) -> BuildInfoResponse {
    BuildInfoResponse {
        build,
        commit: 0xc0ffee,
    }
}

#[test]
fn concurrent_first_record_same_value() {
    for _ in 0..NUM_ROUNDS {
        let oracle = Oracle::new("build-info");
        let barrier = Barrier::new(NUM_THREADS);
        let verdicts: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = (0..NUM_THREADS)
                .map(|_| {
                    let oracle = &oracle;
                    let barrier = &barrier;
                    s.spawn(move |_| {
                        barrier.wait();
                        oracle.check(info(7))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
        .unwrap();

        let recorded = verdicts
            .iter()
            .filter(|v| **v == Ok(Verdict::Recorded))
            .count();
        assert_eq!(recorded, 1);
        assert!(verdicts.iter().all(Result::is_ok));
    }
}

#[test]
fn concurrent_first_record_different_values() {
    for _ in 0..NUM_ROUNDS {
        let oracle = Oracle::new("build-info");
        let barrier = Barrier::new(NUM_THREADS);
        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = (0..NUM_THREADS as u32)
                .map(|i| {
                    let oracle = &oracle;
                    let barrier = &barrier;
                    s.spawn(move |_| {
                        barrier.wait();
                        (i, oracle.check(info(i)))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
        .unwrap();

        let winner = oracle.expected().copied().unwrap();
        let mut recorded = 0;
        for (i, result) in results {
            match result {
                Ok(Verdict::Recorded) => {
                    assert_eq!(info(i), winner);
                    recorded += 1;
                }
                Ok(Verdict::Matched) => panic!("value {i} cannot match another thread's value"),
                Err(mismatch) => {
                    assert_ne!(info(i), winner);
                    assert_eq!(mismatch.expected, winner.to_string());
                    assert_eq!(mismatch.observed, info(i).to_string());
                }
            }
        }
        assert_eq!(recorded, 1);
    }
}
