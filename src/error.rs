// Construction-time errors. Per-metric read failures never surface here; they become `None`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error(
        "platform '{0}' is not supported; supported platforms: Windows, Linux, macOS"
    )]
    UnsupportedPlatform(String),
}
