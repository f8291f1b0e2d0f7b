// Host platform identification

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlatformType {
    Unknown,
    Windows,
    Linux,
    Mac,
}

impl PlatformType {
    /// Platform of the running host, resolved at compile time.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            PlatformType::Windows
        } else if cfg!(target_os = "linux") {
            PlatformType::Linux
        } else if cfg!(target_os = "macos") {
            PlatformType::Mac
        } else {
            PlatformType::Unknown
        }
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, PlatformType::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlatformType::Unknown => "unknown",
            PlatformType::Windows => "windows",
            PlatformType::Linux => "linux",
            PlatformType::Mac => "macos",
        }
    }
}

impl std::fmt::Display for PlatformType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
