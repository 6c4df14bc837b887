use std::fmt;

use serde::Serialize;

/// Why a remux attempt failed, as far as ffmpeg's stderr tells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    StreamOffline,
    AccessDenied,
    StreamExpired,
    StreamUnstable,
    Interrupted,
    Conversion,
}

impl FailureCause {
    pub fn message(&self) -> &'static str {
        match self {
            FailureCause::StreamOffline => {
                "Cannot connect to video stream. The stream may be offline or blocked."
            }
            FailureCause::AccessDenied => {
                "Access denied to video stream. The stream may require authentication."
            }
            FailureCause::StreamExpired => "Video stream not found. The stream may have expired.",
            FailureCause::StreamUnstable => {
                "Video stream timeout. The stream may be too slow or unstable."
            }
            FailureCause::Interrupted => {
                "Video conversion was interrupted. The stream may be too large or corrupted."
            }
            FailureCause::Conversion => "Video conversion failed.",
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Ordered `(stderr pattern, cause)` pairs; the first match wins.
pub const DIAGNOSTIC_TABLE: &[(&str, FailureCause)] = &[
    ("Connection refused", FailureCause::StreamOffline),
    ("Network is unreachable", FailureCause::StreamOffline),
    ("403", FailureCause::AccessDenied),
    ("Forbidden", FailureCause::AccessDenied),
    ("404", FailureCause::StreamExpired),
    ("Not Found", FailureCause::StreamExpired),
    ("timeout", FailureCause::StreamUnstable),
    ("timed out", FailureCause::StreamUnstable),
];

/// `killed` marks a process that ended without an exit code.
pub fn classify(stderr: &str, killed: bool) -> FailureCause {
    DIAGNOSTIC_TABLE
        .iter()
        .find(|(pattern, _)| stderr.contains(pattern))
        .map(|(_, cause)| *cause)
        .unwrap_or(if killed {
            FailureCause::Interrupted
        } else {
            FailureCause::Conversion
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_ffmpeg_diagnostics() {
        assert_eq!(
            classify("tcp://10.0.0.1:80: Connection refused", false),
            FailureCause::StreamOffline
        );
        assert_eq!(
            classify("Server returned 403 Forbidden (access denied)", false),
            FailureCause::AccessDenied
        );
        assert_eq!(classify("HTTP error 404 Not Found", false), FailureCause::StreamExpired);
        assert_eq!(
            classify("Connection to tcp://cdn timed out", false),
            FailureCause::StreamUnstable
        );
    }

    #[test]
    fn table_order_decides_ties() {
        assert_eq!(
            classify("Connection refused after 403", false),
            FailureCause::StreamOffline
        );
    }

    #[test]
    fn signal_termination_is_interrupted() {
        assert_eq!(classify("", true), FailureCause::Interrupted);
        assert_eq!(classify("Invalid data found", false), FailureCause::Conversion);
        assert_eq!(
            FailureCause::Conversion.to_string(),
            "Video conversion failed."
        );
    }
}
