//! Process-wide tracing subscriber.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Level for a `-v` count: none is WARN, each flag one step noisier.
pub fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Filter from the `-v` count, or from configured directives when no `-v`
/// was given. Directives that fail to parse are skipped.
pub fn filter_for(verbose: u8, configured: Option<&str>) -> EnvFilter {
    let builder = EnvFilter::builder().with_default_directive(level_for(verbose).into());
    match configured {
        Some(directives) if verbose == 0 => builder.parse_lossy(directives),
        _ => builder.parse_lossy(""),
    }
}

/// Install the global subscriber on stderr. Returns false when one is
/// already installed.
pub fn init(verbose: u8, configured: Option<&str>, ansi: bool) -> bool {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter_for(verbose, configured))
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
