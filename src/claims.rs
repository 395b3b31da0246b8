use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

const DEFAULT_MIN_TLS_CERT_DURATION: Duration = Duration::from_secs(5 * 60);
const DEFAULT_MAX_TLS_CERT_DURATION: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_TLS_CERT_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Certificate lifetime and renewal claims.
///
/// Carried at two levels of the authority configuration: globally, and as
/// per-provisioner overrides. Every field is optional; an absent claim is
/// inherited (see [`Claimer`]). Durations use humantime strings.
///
/// # Example JSON
///
/// ```json
/// {
///   "minTLSCertDuration": "5m",
///   "maxTLSCertDuration": "24h",
///   "defaultTLSCertDuration": "12h",
///   "disableRenewal": false,
///   "allowRenewalAfterExpiry": false
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Claims {
    /// Smallest leaf lifetime an order may request.
    #[serde(
        rename = "minTLSCertDuration",
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_tls_cert_duration: Option<Duration>,

    /// Largest leaf lifetime an order may request.
    #[serde(
        rename = "maxTLSCertDuration",
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_tls_cert_duration: Option<Duration>,

    /// Lifetime applied when an order does not request a validity window.
    #[serde(
        rename = "defaultTLSCertDuration",
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_tls_cert_duration: Option<Duration>,

    /// Forbids certificate renewal through this provisioner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_renewal: Option<bool>,

    /// Permits renewing a certificate that has already expired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_renewal_after_expiry: Option<bool>,
}

impl Claims {
    /// The process-wide defaults: 5 minute minimum, 24 hour maximum and
    /// default, renewal enabled, no renewal after expiry.
    pub fn global_defaults() -> Self {
        Claims {
            min_tls_cert_duration: Some(DEFAULT_MIN_TLS_CERT_DURATION),
            max_tls_cert_duration: Some(DEFAULT_MAX_TLS_CERT_DURATION),
            default_tls_cert_duration: Some(DEFAULT_TLS_CERT_DURATION),
            disable_renewal: Some(false),
            allow_renewal_after_expiry: Some(false),
        }
    }
}

/// Resolves effective claim values for one provisioner.
///
/// Lookup order: the provisioner's own claims, then the authority's global
/// claims, then the built-in defaults. The merged result is validated on
/// construction, so a claimer never hands out inconsistent bounds.
#[derive(Debug, Clone)]
pub struct Claimer {
    global: Claims,
    provisioner: Option<Claims>,
}

impl Claimer {
    /// Creates a claimer and validates the merged claim set.
    pub fn new(provisioner: Option<Claims>, global: Claims) -> Result<Self, Error> {
        let claimer = Self {
            global,
            provisioner,
        };
        claimer.validate()?;
        Ok(claimer)
    }

    /// Effective minimum leaf lifetime.
    pub fn min_tls_cert_duration(&self) -> Duration {
        self.claim(
            |claims| claims.min_tls_cert_duration,
            DEFAULT_MIN_TLS_CERT_DURATION,
        )
    }

    /// Effective maximum leaf lifetime.
    pub fn max_tls_cert_duration(&self) -> Duration {
        self.claim(
            |claims| claims.max_tls_cert_duration,
            DEFAULT_MAX_TLS_CERT_DURATION,
        )
    }

    /// Effective default leaf lifetime.
    pub fn default_tls_cert_duration(&self) -> Duration {
        self.claim(
            |claims| claims.default_tls_cert_duration,
            DEFAULT_TLS_CERT_DURATION,
        )
    }

    /// Whether renewal is disabled.
    pub fn is_renewal_disabled(&self) -> bool {
        self.claim(|claims| claims.disable_renewal, false)
    }

    /// Whether an expired certificate may still be renewed.
    pub fn allows_renewal_after_expiry(&self) -> bool {
        self.claim(|claims| claims.allow_renewal_after_expiry, false)
    }

    fn claim<T>(&self, field: impl Fn(&Claims) -> Option<T>, fallback: T) -> T {
        self.provisioner
            .as_ref()
            .and_then(&field)
            .or_else(|| field(&self.global))
            .unwrap_or(fallback)
    }

    fn validate(&self) -> Result<(), Error> {
        let min = self.min_tls_cert_duration();
        let max = self.max_tls_cert_duration();
        let default = self.default_tls_cert_duration();

        if min.is_zero() {
            return Err(Error::InvalidConfiguration(
                "claims: minTLSCertDuration must be greater than 0".into(),
            ));
        }
        if max.is_zero() {
            return Err(Error::InvalidConfiguration(
                "claims: maxTLSCertDuration must be greater than 0".into(),
            ));
        }
        if default.is_zero() {
            return Err(Error::InvalidConfiguration(
                "claims: defaultTLSCertDuration must be greater than 0".into(),
            ));
        }
        if min > max {
            return Err(Error::InvalidConfiguration(format!(
                "claims: minTLSCertDuration ({min:?}) cannot be greater than \
                 maxTLSCertDuration ({max:?})"
            )));
        }
        if default < min || default > max {
            return Err(Error::InvalidConfiguration(format!(
                "claims: defaultTLSCertDuration ({default:?}) must lie between \
                 minTLSCertDuration ({min:?}) and maxTLSCertDuration ({max:?})"
            )));
        }

        Ok(())
    }
}

/// Serde support for durations as humantime strings (`"5m"`, `"24h"`).
mod humantime_serde {
    use std::time::Duration;

    use serde::{de, Deserialize as _, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(duration) => {
                serializer.serialize_str(&humantime::format_duration(*duration).to_string())
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        value
            .map(|raw| humantime::parse_duration(&raw).map_err(de::Error::custom))
            .transpose()
    }
}
