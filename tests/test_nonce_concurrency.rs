//! Nonce coordinator under contention: strict monotonicity per signer
//! across concurrent dispensers.

use std::sync::Arc;
use std::thread;

use chrono::Utc;
use exec_flow::store::nonce::{NonceCoordinator, NonceRequest};

const SIGNER: &str = "0x1111111111111111111111111111111111111111";

#[test]
fn concurrent_nonces_are_unique_and_increasing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hyperliquid-nonce.json");
    let coordinator = Arc::new(NonceCoordinator::with_defaults(&path));
    let start_ms = Utc::now().timestamp_millis() as u64;

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                coordinator
                    .next_nonce(NonceRequest {
                        signer: SIGNER,
                        floor: None,
                    })
                    .unwrap()
            })
        })
        .collect();

    let mut nonces: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let max = *nonces.iter().max().unwrap();

    nonces.sort_unstable();
    nonces.dedup();
    assert_eq!(nonces.len(), 20, "all dispensed nonces must be distinct");
    assert!(
        nonces.iter().all(|&n| n >= start_ms),
        "every nonce is at least wall-clock millis at start"
    );

    // The persisted high-water mark equals the largest dispensed value.
    assert_eq!(coordinator.last_nonce(SIGNER).unwrap(), Some(max));
}

#[test]
fn signers_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator =
        NonceCoordinator::with_defaults(dir.path().join("hyperliquid-nonce.json"));

    let a1 = coordinator
        .next_nonce(NonceRequest {
            signer: "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            floor: None,
        })
        .unwrap();
    let b1 = coordinator
        .next_nonce(NonceRequest {
            signer: "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
            floor: None,
        })
        .unwrap();
    let a2 = coordinator
        .next_nonce(NonceRequest {
            signer: "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            floor: None,
        })
        .unwrap();

    assert!(a2 > a1, "same signer (case-insensitive) strictly increases");
    assert!(b1 > 0);
}
