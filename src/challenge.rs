use std::{
    borrow::Cow,
    fmt,
    hash::{Hash, Hasher},
};

use serde::{ser::Serializer, Deserialize, Serialize};

use crate::error::Error;

/// An ACME challenge name.
///
/// Holds the value as configured; comparison and hashing are
/// case-insensitive and the serialized form is lower case. Unknown names are
/// representable so a configuration can be parsed first and rejected by
/// [`validate`](AcmeChallenge::validate) with an error naming the value.
///
/// See [RFC 8555 §8] for the challenge catalogue.
///
/// [RFC 8555 §8]: https://datatracker.ietf.org/doc/html/rfc8555#section-8
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct AcmeChallenge(Cow<'static, str>);

impl AcmeChallenge {
    /// The `http-01` challenge.
    ///
    /// See [RFC 8555 §8.3](https://datatracker.ietf.org/doc/html/rfc8555#section-8.3).
    pub const HTTP_01: AcmeChallenge = AcmeChallenge(Cow::Borrowed("http-01"));

    /// The `dns-01` challenge.
    ///
    /// See [RFC 8555 §8.4](https://datatracker.ietf.org/doc/html/rfc8555#section-8.4).
    pub const DNS_01: AcmeChallenge = AcmeChallenge(Cow::Borrowed("dns-01"));

    /// The `tls-alpn-01` challenge.
    ///
    /// See [RFC 8737](https://datatracker.ietf.org/doc/html/rfc8737).
    pub const TLS_ALPN_01: AcmeChallenge = AcmeChallenge(Cow::Borrowed("tls-alpn-01"));

    /// The `device-attest-01` challenge from the ACME device attestation
    /// draft. Never enabled unless a configuration lists it.
    pub const DEVICE_ATTEST_01: AcmeChallenge = AcmeChallenge(Cow::Borrowed("device-attest-01"));

    const KNOWN: [AcmeChallenge; 4] = [
        Self::HTTP_01,
        Self::DNS_01,
        Self::TLS_ALPN_01,
        Self::DEVICE_ATTEST_01,
    ];

    /// Returns the challenge name as configured, original case preserved.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks the name against the supported challenge set.
    ///
    /// Matching is case-insensitive.
    pub fn validate(&self) -> Result<(), Error> {
        if Self::KNOWN.iter().any(|known| known == self) {
            Ok(())
        } else {
            Err(Error::UnsupportedChallenge(self.as_str().to_owned()))
        }
    }
}

impl PartialEq for AcmeChallenge {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for AcmeChallenge {}

impl Hash for AcmeChallenge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
        // str-style terminator, so hashing agrees with case-folded equality
        state.write_u8(0xff);
    }
}

impl fmt::Display for AcmeChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_ascii_lowercase())
    }
}

impl Serialize for AcmeChallenge {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_ascii_lowercase())
    }
}

impl From<&str> for AcmeChallenge {
    fn from(value: &str) -> Self {
        AcmeChallenge(Cow::Owned(value.to_owned()))
    }
}

impl From<String> for AcmeChallenge {
    fn from(value: String) -> Self {
        AcmeChallenge(Cow::Owned(value))
    }
}
