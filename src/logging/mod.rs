use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs go to stderr so that command output
/// on stdout stays clean.
pub fn init(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::new(if verbose { "vaultsync=debug" } else { "vaultsync=info" })
}
