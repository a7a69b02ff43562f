use env_logger::{Builder, Env, fmt::TimestampPrecision};

/// Initialise `env_logger` from `RUST_LOG`, defaulting to `info`.
///
/// Calling this more than once is harmless.
pub fn init_logging() {
    let _ = Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(Some(TimestampPrecision::Seconds))
        .try_init();
}
