use std::sync::{Arc, Barrier};
use std::thread;

use bytes::Bytes;

use crate::utils::{Harness, IMAGE_ID};

#[test]
fn test_concurrent_loads_start_a_single_fetch() {
    let harness = Harness::new();
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    thread::scope(|scope| {
        for _ in 0..threads {
            let barrier = Arc::clone(&barrier);
            let loader = harness.loader.clone();
            scope.spawn(move || {
                barrier.wait();
                for _ in 0..100 {
                    assert!(loader.load_element(IMAGE_ID).is_loading());
                }
            });
        }
    });

    assert_eq!(harness.transport.fetches(IMAGE_ID), 1);
}

#[test]
fn test_completion_from_another_thread() {
    let harness = Harness::new();

    harness.loader.load_element(IMAGE_ID);
    let callback = harness.transport.callback(IMAGE_ID);

    thread::spawn(move || {
        if !callback.on_content_type_known("image/png") {
            callback.on_loaded("image/png", Bytes::from_static(b"png"));
        }
    })
    .join()
    .unwrap();

    assert_eq!(
        harness.loader.load_element(IMAGE_ID).bytes(),
        Some(&Bytes::from_static(b"png"))
    );
}

#[test]
fn test_concurrent_retries_after_expiry_start_a_single_fetch() {
    let harness = Harness::new();

    harness.loader.load_element(IMAGE_ID);
    harness.transport.callback(IMAGE_ID).on_failed();
    harness.advance_minutes(31);

    thread::scope(|scope| {
        for _ in 0..8 {
            let loader = harness.loader.clone();
            scope.spawn(move || loader.load_element(IMAGE_ID));
        }
    });

    assert_eq!(harness.transport.fetches(IMAGE_ID), 2);
}
