pub mod cli;
pub mod commit;
pub mod engine;
pub mod error;
pub mod idempotency;
pub mod indent;
pub mod line_index;
pub mod locator;
pub mod mutator;
pub mod patch;
pub mod session;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
