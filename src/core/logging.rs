//! Logging initialization

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info` and millisecond
/// timestamps. Override the filter with the RUST_LOG environment variable.
/// Calling it more than once is harmless.
///
/// # Example
/// ```
/// cavern::core::logging::init();
/// log::info!("Generation started");
/// ```
pub fn init() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .try_init();
}
