//! Error types for the console host binary.

/// Top-level error for the console host.
///
/// Each variant wraps a startup or I/O failure so `main` can propagate
/// it with `?`.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Settings could not be loaded.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: rankup_core::config::ConfigError,
    },

    /// The tick state could not be built.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: rankup_core::tick::TickError,
    },

    /// Reading host events from stdin failed.
    #[error("console input error: {source}")]
    Input {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
