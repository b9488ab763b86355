/// Installs the process logger for the command-line driver
///
/// Logs go to stderr so stdout only carries the JSON result.
/// Log level is Debug in development builds and Info in production builds;
/// `RUST_LOG` overrides it.
pub fn init() {
    let default_filter = if cfg!(debug_assertions) {
        "info,ekascribe_lib=debug,ekascribe_protocol=debug,ekascribe=debug"
    } else {
        "info"
    };

    // A logger installed by the embedding program takes precedence
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .format_timestamp_millis()
        .try_init()
        .ok();
}
