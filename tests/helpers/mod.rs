#![allow(dead_code)]

pub mod capture;
pub mod memory;
pub mod relay;
pub mod tls;

/// Install a test subscriber once per binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("mimic=debug")
        .with_test_writer()
        .try_init();
}
