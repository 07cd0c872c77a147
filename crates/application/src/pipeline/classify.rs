//! Classification of transport failures.

use std::sync::LazyLock;

use courier_domain::FailureCause;
use regex::Regex;

/// Messages browsers and proxies emit for blocked cross-origin requests.
/// Opaque fetch failures are counted as cross-origin since that is their
/// common cause in a browser context.
#[allow(clippy::expect_used)]
static CORS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bcors\b|cross-origin|access-control-allow|failed to fetch|networkerror when attempting to fetch resource|load failed",
    )
    .expect("valid CORS pattern")
});

#[allow(clippy::expect_used)]
static NETWORK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)network|connect|dns|resolve|timed? ?out|refused|unreachable|reset by peer|error sending request|certificate|tls",
    )
    .expect("valid network pattern")
});

/// Derives a failure cause from a transport error message.
#[must_use]
pub fn classify(message: &str) -> FailureCause {
    if CORS_PATTERN.is_match(message) {
        FailureCause::Cors
    } else if NETWORK_PATTERN.is_match(message) {
        FailureCause::Network
    } else {
        FailureCause::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cors_messages() {
        for message in [
            "Failed to fetch",
            "NetworkError when attempting to fetch resource.",
            "Load failed",
            "Blocked by CORS policy: No 'Access-Control-Allow-Origin' header",
            "Cross-Origin Request Blocked",
        ] {
            assert_eq!(classify(message), FailureCause::Cors, "{message}");
        }
    }

    #[test]
    fn test_network_messages() {
        for message in [
            "error sending request for url (https://api.example/)",
            "dns error: failed to lookup address information",
            "tcp connect error: Connection refused (os error 111)",
            "operation timed out",
        ] {
            assert_eq!(classify(message), FailureCause::Network, "{message}");
        }
    }

    #[test]
    fn test_unknown_messages() {
        assert_eq!(classify("something odd happened"), FailureCause::Unknown);
        assert_eq!(classify(""), FailureCause::Unknown);
    }
}
