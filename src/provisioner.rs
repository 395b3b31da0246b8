use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use x509_cert::Certificate;

use crate::{
    challenge::AcmeChallenge, error::Error, identifier::AcmeIdentifier, sign::SignConstraint,
};

/// Provisioner type tag, spelled uppercase in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    #[serde(rename = "ACME")]
    Acme,
}

impl Kind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Kind::Acme => "ACME",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability surface an authority uses to drive issuance, independent of
/// the provisioner's configuration shape.
///
/// Authorities hold initialized provisioners as `Arc<dyn Provisioner>` and
/// share them freely across tasks; nothing here takes `&mut self`.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Stable identifier, unique within the authority.
    fn id(&self) -> String;

    /// Configured name, unique within the authority.
    fn name(&self) -> &str;

    /// The provisioner type tag.
    fn kind(&self) -> Kind;

    /// Whether the given challenge type may be used against this provisioner.
    fn is_challenge_enabled(&self, challenge: &AcmeChallenge) -> bool;

    /// Decides whether an order may include the given identifier.
    async fn authorize_order_identifier(&self, identifier: &AcmeIdentifier) -> Result<(), Error>;

    /// Authorizes a signing request, returning the constraint chain to run
    /// over the certificate template.
    async fn authorize_sign(&self, token: &str) -> Result<Vec<SignConstraint>, Error>;

    /// Decides whether a revocation request may proceed.
    async fn authorize_revoke(&self, token: &str) -> Result<(), Error>;

    /// Decides whether the given certificate may be renewed.
    async fn authorize_renew(&self, cert: &Certificate) -> Result<(), Error>;
}
