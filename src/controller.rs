use std::{sync::Arc, time::Duration};

use time::{OffsetDateTime, PrimitiveDateTime};
use x509_cert::Certificate;

use crate::{
    claims::{Claimer, Claims},
    error::Error,
    options::Options,
    policy::{self, X509Policy, X509PolicyFactory},
};

/// Authority-level configuration handed to every provisioner at init.
#[derive(Clone, Default)]
pub struct Config {
    /// Global claims, overridable per provisioner.
    pub claims: Claims,

    /// Builds name policies for provisioners that configure allow/deny rules.
    pub policy_factory: Option<Arc<dyn X509PolicyFactory>>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("claims", &self.claims)
            .field("policy_factory", &self.policy_factory.is_some())
            .finish()
    }
}

/// Issuance state a provisioner resolves once at init: merged claims and the
/// optional name policy.
#[derive(Clone)]
pub struct Controller {
    provisioner_name: String,
    claimer: Claimer,
    policy: Option<Arc<dyn X509Policy>>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("provisioner_name", &self.provisioner_name)
            .field("claimer", &self.claimer)
            .field("policy", &self.policy.is_some())
            .finish()
    }
}

impl Controller {
    /// Merges the provisioner's claims with the authority's and builds the
    /// name policy, validating both.
    pub fn new(
        name: &str,
        claims: Option<&Claims>,
        options: Option<&Options>,
        config: &Config,
    ) -> Result<Self, Error> {
        let claimer = Claimer::new(claims.cloned(), config.claims.clone())?;
        let policy = policy::new_x509_policy(
            config.policy_factory.as_deref(),
            options.and_then(|options| options.x509.as_ref()),
        )?;

        Ok(Controller {
            provisioner_name: name.to_owned(),
            claimer,
            policy,
        })
    }

    /// Effective minimum leaf lifetime.
    pub fn min_tls_cert_duration(&self) -> Duration {
        self.claimer.min_tls_cert_duration()
    }

    /// Effective maximum leaf lifetime.
    pub fn max_tls_cert_duration(&self) -> Duration {
        self.claimer.max_tls_cert_duration()
    }

    /// Effective default leaf lifetime.
    pub fn default_tls_cert_duration(&self) -> Duration {
        self.claimer.default_tls_cert_duration()
    }

    /// The name policy, when one is configured.
    pub fn policy(&self) -> Option<&Arc<dyn X509Policy>> {
        self.policy.as_ref()
    }

    /// Decides whether the given certificate may be renewed under the
    /// effective claims.
    pub fn authorize_renew(&self, cert: &Certificate) -> Result<(), Error> {
        if self.claimer.is_renewal_disabled() {
            return Err(Error::RenewalDenied(format!(
                "renew is disabled for provisioner '{}'",
                self.provisioner_name
            )));
        }

        if !self.claimer.allows_renewal_after_expiry() {
            let not_after = expiry(cert)?;
            if not_after < OffsetDateTime::now_utc() {
                return Err(Error::RenewalDenied("certificate has expired".into()));
            }
        }

        Ok(())
    }
}

fn expiry(cert: &Certificate) -> Result<OffsetDateTime, Error> {
    let not_after = cert.tbs_certificate.validity.not_after.to_date_time();
    Ok(PrimitiveDateTime::try_from(not_after)
        .map_err(|err| Error::RenewalDenied(format!("cannot read certificate expiry: {err}")))?
        .assume_utc())
}
