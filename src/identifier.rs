use std::{borrow::Cow, fmt};

use serde::{Deserialize, Serialize};

/// An ACME identifier type.
///
/// RFC 8555 registers `dns`; [RFC 8738] adds `ip`. Types are matched
/// exactly: the registered values are lower case on the wire. Unknown types
/// are representable and rejected during order authorization.
///
/// [RFC 8738]: https://datatracker.ietf.org/doc/html/rfc8738
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierKind(Cow<'static, str>);

impl IdentifierKind {
    /// The `dns` identifier type.
    pub const DNS: IdentifierKind = IdentifierKind(Cow::Borrowed("dns"));

    /// The `ip` identifier type.
    pub const IP: IdentifierKind = IdentifierKind(Cow::Borrowed("ip"));

    /// Returns the type name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdentifierKind {
    fn from(value: &str) -> Self {
        IdentifierKind(Cow::Owned(value.to_owned()))
    }
}

impl From<String> for IdentifierKind {
    fn from(value: String) -> Self {
        IdentifierKind(Cow::Owned(value))
    }
}

/// One identifier from an ACME order.
///
/// See [RFC 8555 §7.1.3].
///
/// # Example JSON
///
/// ```json
/// {
///   "type": "dns",
///   "value": "machine.example.org"
/// }
/// ```
///
/// [RFC 8555 §7.1.3]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.3
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcmeIdentifier {
    /// Identifier type.
    #[serde(rename = "type")]
    pub kind: IdentifierKind,

    /// Identifier value.
    pub value: String,
}

impl AcmeIdentifier {
    /// Builds a `dns` identifier.
    pub fn dns(value: impl Into<String>) -> Self {
        Self {
            kind: IdentifierKind::DNS,
            value: value.into(),
        }
    }

    /// Builds an `ip` identifier.
    pub fn ip(value: impl Into<String>) -> Self {
        Self {
            kind: IdentifierKind::IP,
            value: value.into(),
        }
    }
}
