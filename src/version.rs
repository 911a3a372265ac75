/// Cargo package version reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
