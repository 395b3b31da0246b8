//! Name-policy seam consulted during order authorization and signing.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{error::Error, options::X509Options};

/// Decides whether a name may appear in an issued certificate.
///
/// Denials surface as [`Error::PolicyDenied`]; an `Ok(())` return means the
/// name passed. Implementations are shared across tasks behind an [`Arc`].
#[async_trait]
pub trait X509Policy: Send + Sync {
    /// Checks an IP identifier against the policy.
    async fn is_ip_allowed(&self, ip: std::net::IpAddr) -> Result<(), Error>;

    /// Checks a DNS identifier against the policy.
    async fn is_dns_allowed(&self, name: &str) -> Result<(), Error>;
}

/// Builds an [`X509Policy`] from a provisioner's configured rules.
///
/// Registered on [`Config`](crate::Config) by the embedding authority; the
/// policy engine itself lives outside this crate.
pub trait X509PolicyFactory: Send + Sync {
    /// Builds a policy from the given options.
    fn build(&self, options: &X509Options) -> Result<Arc<dyn X509Policy>, Error>;
}

/// Builds the name policy for one provisioner, if its options call for one.
///
/// No options, or options without allow/deny rules, mean no policy at all.
/// Rules without a registered factory are a configuration error, so a
/// misconfigured provisioner fails at init rather than silently issuing.
pub(crate) fn new_x509_policy(
    factory: Option<&dyn X509PolicyFactory>,
    options: Option<&X509Options>,
) -> Result<Option<Arc<dyn X509Policy>>, Error> {
    let Some(options) = options else {
        return Ok(None);
    };
    if !options.has_policy() {
        return Ok(None);
    }

    match factory {
        Some(factory) => factory.build(options).map(Some),
        None => Err(Error::InvalidConfiguration(
            "x509 name policy options are set but no policy engine is registered".into(),
        )),
    }
}
