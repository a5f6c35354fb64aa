use bytes::Bytes;
use linkloader_service::{ElementState, LinkedElement};

use crate::utils::{Harness, IMAGE_ID};

#[test]
fn test_unknown_element_starts_fetch() {
    let harness = Harness::new();

    harness.loader.load_element(IMAGE_ID);

    assert_eq!(harness.transport.fetches(IMAGE_ID), 1);
}

#[test]
fn test_first_call_returns_loading_element() {
    let harness = Harness::new();

    assert_eq!(
        harness.loader.load_element(IMAGE_ID),
        LinkedElement::loading(IMAGE_ID)
    );
}

#[test]
fn test_fetch_is_only_started_once() {
    let harness = Harness::new();

    harness.loader.load_element(IMAGE_ID);
    harness.loader.load_element(IMAGE_ID);

    assert_eq!(harness.transport.fetches(IMAGE_ID), 1);
}

#[test]
fn test_content_type_policy() {
    let harness = Harness::new();

    harness.loader.load_element(IMAGE_ID);
    let callback = harness.transport.callback(IMAGE_ID);

    assert!(!callback.on_content_type_known("image/png"));
    assert!(callback.on_content_type_known("audio/mpeg"));
    assert!(callback.on_content_type_known("video/mkv"));
    assert!(callback.on_content_type_known("text/plain"));
    assert!(callback.on_content_type_known("application/zip"));
}

#[test]
fn test_image_can_be_loaded() {
    let harness = Harness::new();
    let image = Bytes::from(linkloader_test::read_fixture("gpl.png"));

    assert!(harness.loader.load_element(IMAGE_ID).is_loading());
    let callback = harness.transport.callback(IMAGE_ID);
    assert!(!callback.on_content_type_known("image/png"));
    callback.on_loaded("image/png", image.clone());

    let element = harness.loader.load_element(IMAGE_ID);
    assert_eq!(
        element.state(),
        &ElementState::Loaded {
            content_type: "image/png".into(),
            bytes: image.clone(),
        }
    );

    let properties = element.properties().unwrap();
    assert_eq!(properties.size, image.len() as u64);
    assert_eq!(properties.size_human, format!("{} B", image.len()));
}

#[test]
fn test_loaded_image_is_never_fetched_again() {
    let harness = Harness::new();

    harness.loader.load_element(IMAGE_ID);
    harness
        .transport
        .callback(IMAGE_ID)
        .on_loaded("image/png", Bytes::from_static(b"png"));

    for _ in 0..10 {
        harness.advance_minutes(60 * 24);
        assert!(harness.loader.load_element(IMAGE_ID).is_loaded());
    }
    assert_eq!(harness.transport.fetches(IMAGE_ID), 1);
}

#[test]
fn test_image_is_not_loaded_again_after_it_failed() {
    let harness = Harness::new();

    harness.loader.load_element(IMAGE_ID);
    harness.transport.callback(IMAGE_ID).on_failed();

    assert!(harness.loader.load_element(IMAGE_ID).is_failed());
    assert!(harness.loader.load_element(IMAGE_ID).is_failed());
    assert_eq!(harness.transport.fetches(IMAGE_ID), 1);
}

#[test]
fn test_image_is_loaded_again_after_failure_expired() {
    let harness = Harness::new();

    harness.loader.load_element(IMAGE_ID);
    harness.transport.callback(IMAGE_ID).on_failed();

    harness.advance_minutes(29);
    assert!(harness.loader.load_element(IMAGE_ID).is_failed());
    assert_eq!(harness.transport.fetches(IMAGE_ID), 1);

    harness.advance_minutes(2);
    let element = harness.loader.load_element(IMAGE_ID);
    assert!(!element.is_failed());
    assert!(element.is_loading());
    assert_eq!(harness.transport.fetches(IMAGE_ID), 2);

    // the second generation completes normally
    harness
        .transport
        .callback(IMAGE_ID)
        .on_loaded("image/png", Bytes::from_static(b"png"));
    assert!(harness.loader.load_element(IMAGE_ID).is_loaded());
}

#[test]
fn test_cancelled_fetch_is_remembered_as_failure() {
    let harness = Harness::new();

    harness.loader.load_element("KSK@song.mp3");
    let callback = harness.transport.callback("KSK@song.mp3");
    assert!(callback.on_content_type_known("audio/mpeg"));
    assert!(harness.loader.load_element("KSK@song.mp3").is_loading());
    callback.on_failed();

    assert!(harness.loader.load_element("KSK@song.mp3").is_failed());
    assert_eq!(harness.transport.fetches("KSK@song.mp3"), 1);
}

#[test]
fn test_identifiers_do_not_share_state() {
    let harness = Harness::new();

    harness.loader.load_element(IMAGE_ID);
    harness.loader.load_element("CHK@other.jpg");
    harness.transport.callback("CHK@other.jpg").on_failed();

    assert!(harness.loader.load_element(IMAGE_ID).is_loading());
    assert!(harness.loader.load_element("CHK@other.jpg").is_failed());
    assert_eq!(harness.loader.cache().len(), 2);
}
