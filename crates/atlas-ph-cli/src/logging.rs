//! Tracing setup for the command-line tool.
//!
//! Events go to stderr so stdout carries only readings and replies.

use tracing_subscriber::filter::{EnvFilter, LevelFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise each `-v` raises the level one step
/// above INFO.
pub fn init(verbose: u8) {
    let default_level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
