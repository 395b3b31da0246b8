use std::time::Duration;

use thiserror::Error;

/// Errors returned by the provisioner authorization surface.
///
/// Every operation reports failure through this enum; nothing is logged and
/// swallowed. [`InvalidConfiguration`](Error::InvalidConfiguration) values
/// are produced at init time and mean the provisioner must stay out of the
/// authority's active set.
#[derive(Debug, Error)]
pub enum Error {
    /// The provisioner configuration cannot be activated.
    #[error("invalid provisioner configuration: {0}")]
    InvalidConfiguration(String),

    /// A challenge name outside the supported ACME challenge set.
    ///
    /// Carries the rejected value verbatim.
    #[error("acme challenge {0:?} is not supported")]
    UnsupportedChallenge(String),

    /// An order identifier type this provisioner cannot authorize.
    #[error("unsupported ACME identifier type {0:?}")]
    UnsupportedIdentifierType(String),

    /// The name policy rejected an identifier.
    #[error("policy denied identifier {identifier:?}: {reason}")]
    PolicyDenied {
        /// Identifier value as it appeared in the order.
        identifier: String,
        /// Denial reason reported by the policy gate.
        reason: String,
    },

    /// The requested certificate lifetime falls outside the claim bounds.
    #[error(
        "requested certificate duration of {requested:?} is outside the authorized range \
         [{min:?}, {max:?}]"
    )]
    DurationOutOfRange {
        /// Window requested by the order.
        requested: Duration,
        /// Smallest lifetime the claims allow.
        min: Duration,
        /// Largest lifetime the claims allow.
        max: Duration,
    },

    /// The subject public key does not meet the signing requirements.
    #[error("{0}")]
    UnsupportedKey(String),

    /// Renewal is not permitted for the presented certificate.
    #[error("{0}")]
    RenewalDenied(String),

    /// A common name was forced but the certificate carries no DNS names to
    /// take it from.
    #[error("cannot force common name, certificate has no DNS names")]
    MissingCommonName,

    /// The validity validator ran before any validity window was set.
    #[error("certificate validity window is not set")]
    MissingValidity,

    /// An authorization method was called before `init`.
    #[error("provisioner {0:?} is not initialized")]
    NotInitialized(String),
}

impl Error {
    /// Builds a [`PolicyDenied`](Error::PolicyDenied) for `identifier`.
    pub fn policy_denied(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::PolicyDenied {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            Error::UnsupportedChallenge("http-02".into()).to_string(),
            r#"acme challenge "http-02" is not supported"#,
        );

        assert_eq!(
            Error::policy_denied("example.com", "name not allowed").to_string(),
            r#"policy denied identifier "example.com": name not allowed"#,
        );

        assert_eq!(
            Error::DurationOutOfRange {
                requested: Duration::from_secs(60),
                min: Duration::from_secs(300),
                max: Duration::from_secs(86_400),
            }
            .to_string(),
            "requested certificate duration of 60s is outside the authorized range [300s, 86400s]",
        );
    }
}
