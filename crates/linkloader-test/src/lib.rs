//! Helpers for testing the element loader.
//!
//! In every test, call [`setup`]. This will set up the logger so that all console output is
//! captured by the test runner.

use std::path::{Path, PathBuf};

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `linkloader-service` crate and
///    mutes all other logs.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("linkloader_service=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Returns the absolute path to the given fixture.
///
/// Fixtures are located in the `tests/fixtures` directory, located from the workspace root.
///
/// # Panics
///
/// Panics if the fixture path does not exist on the file system.
pub fn fixture(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();

    let mut full_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    full_path.pop(); // to /crates/
    full_path.pop(); // to /
    full_path.push("./tests/fixtures/");
    full_path.push(path);

    assert!(full_path.exists(), "'{}' does not exist", path.display());

    full_path
}

/// Returns the contents of a fixture.
///
/// # Panics
///
/// Panics if the fixture does not exist or cannot be read.
pub fn read_fixture(path: impl AsRef<Path>) -> Vec<u8> {
    std::fs::read(fixture(path)).unwrap()
}
