use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use x509_cert::Certificate;

use crate::{
    challenge::AcmeChallenge,
    claims::Claims,
    controller::{Config, Controller},
    error::Error,
    identifier::AcmeIdentifier,
    options::Options,
    provisioner::{Kind, Provisioner},
    sign::{ProvisionerExtension, SignConstraint},
};

/// Challenges enabled when the configuration does not list any.
const DEFAULT_CHALLENGES: [AcmeChallenge; 3] = [
    AcmeChallenge::HTTP_01,
    AcmeChallenge::DNS_01,
    AcmeChallenge::TLS_ALPN_01,
];

/// ACME provisioner configuration and authorization logic.
///
/// Deserialized from the authority configuration, then initialized exactly
/// once with [`init`](Acme::init) before use. Initialization validates the
/// configuration and resolves the merged claims and name policy; afterwards
/// the provisioner is immutable and can be shared across tasks.
///
/// # Example JSON
///
/// ```json
/// {
///   "type": "ACME",
///   "name": "acme-prod",
///   "forceCN": true,
///   "challenges": ["http-01", "dns-01"],
///   "claims": {
///     "maxTLSCertDuration": "8h",
///     "defaultTLSCertDuration": "8h"
///   },
///   "options": {
///     "x509": {
///       "allow": { "dns": ["*.example.com"] }
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acme {
    /// Stable identifier; falls back to `acme/{name}` when unset.
    #[serde(skip)]
    pub id: Option<String>,

    /// Provisioner type tag, `"ACME"` in well-formed configurations.
    #[serde(rename = "type")]
    pub kind: String,

    /// Provisioner name, unique within the authority.
    pub name: String,

    /// Copies the first DNS name into an empty common name at signing time.
    #[serde(default, rename = "forceCN")]
    pub force_cn: bool,

    /// Requires external account binding material on new accounts. Carried
    /// for the account layer; nothing here enforces it.
    #[serde(default, rename = "requireEAB")]
    pub require_eab: bool,

    /// Challenge types clients may use. Empty means the default set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub challenges: Vec<AcmeChallenge>,

    /// Claim overrides for this provisioner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<Claims>,

    /// Signing options, including name policy rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,

    #[serde(skip)]
    ctl: Option<Arc<Controller>>,
}

impl Acme {
    /// A bare provisioner with the given name and no overrides.
    pub fn new(name: impl Into<String>) -> Self {
        Acme {
            id: None,
            kind: Kind::Acme.as_str().to_owned(),
            name: name.into(),
            force_cn: false,
            require_eab: false,
            challenges: Vec::new(),
            claims: None,
            options: None,
            ctl: None,
        }
    }

    /// Validates the configuration and resolves the merged claims and name
    /// policy. Must be called once before any authorize operation.
    pub fn init(&mut self, config: &Config) -> Result<(), Error> {
        if self.kind.is_empty() {
            return Err(Error::InvalidConfiguration(
                "provisioner type cannot be empty".into(),
            ));
        }
        if self.name.is_empty() {
            return Err(Error::InvalidConfiguration(
                "provisioner name cannot be empty".into(),
            ));
        }
        for challenge in &self.challenges {
            challenge.validate()?;
        }

        let ctl = Controller::new(
            &self.name,
            self.claims.as_ref(),
            self.options.as_ref(),
            config,
        )?;
        self.ctl = Some(Arc::new(ctl));

        log::debug!("initialized ACME provisioner {:?}", self.name);

        Ok(())
    }

    fn controller(&self) -> Result<&Controller, Error> {
        self.ctl
            .as_deref()
            .ok_or_else(|| Error::NotInitialized(self.name.clone()))
    }

    /// Stable identifier, falling back to `acme/{name}`.
    pub fn id(&self) -> String {
        match &self.id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!("acme/{}", self.name),
        }
    }

    /// Challenge types clients may use against this provisioner.
    pub fn enabled_challenges(&self) -> &[AcmeChallenge] {
        if self.challenges.is_empty() {
            &DEFAULT_CHALLENGES
        } else {
            &self.challenges
        }
    }

    /// Whether the given challenge type is enabled. Matching ignores case.
    pub fn is_challenge_enabled(&self, challenge: &AcmeChallenge) -> bool {
        self.enabled_challenges()
            .iter()
            .any(|enabled| enabled == challenge)
    }

    /// Leaf lifetime applied when an order does not request one.
    pub fn default_tls_cert_duration(&self) -> Result<Duration, Error> {
        Ok(self.controller()?.default_tls_cert_duration())
    }

    /// Signing options, when configured.
    pub fn options(&self) -> Option<&Options> {
        self.options.as_ref()
    }

    /// Decides whether an order may include the given identifier.
    ///
    /// DNS and IP identifiers pass unless the name policy denies them;
    /// every other identifier type is rejected.
    pub async fn authorize_order_identifier(
        &self,
        identifier: &AcmeIdentifier,
    ) -> Result<(), Error> {
        let ctl = self.controller()?;

        match identifier.kind.as_str() {
            "ip" => {
                let Some(policy) = ctl.policy() else {
                    return Ok(());
                };
                match identifier.value.parse() {
                    Ok(ip) => policy.is_ip_allowed(ip).await,
                    Err(_) => Err(Error::policy_denied(
                        identifier.value.clone(),
                        "value is not a valid IP address",
                    )),
                }
            }
            "dns" => {
                let Some(policy) = ctl.policy() else {
                    return Ok(());
                };
                policy.is_dns_allowed(&identifier.value).await
            }
            kind => Err(Error::UnsupportedIdentifierType(kind.to_owned())),
        }
    }

    /// Authorizes a signing request, returning the constraint chain to run
    /// over the certificate template.
    ///
    /// The token is unused: by the time an ACME order reaches signing, its
    /// authorizations have already been validated. The chain is ordered with
    /// modifiers first, so validators see the template with defaults applied.
    pub async fn authorize_sign(&self, _token: &str) -> Result<Vec<SignConstraint>, Error> {
        let ctl = self.controller()?;

        Ok(vec![
            SignConstraint::ProvisionerExtension(ProvisionerExtension {
                kind: Kind::Acme,
                name: self.name.clone(),
                credential_id: None,
            }),
            SignConstraint::ForceCn(self.force_cn),
            SignConstraint::DefaultDuration(ctl.default_tls_cert_duration()),
            SignConstraint::PublicKeyPolicy,
            SignConstraint::Validity {
                min: ctl.min_tls_cert_duration(),
                max: ctl.max_tls_cert_duration(),
            },
            SignConstraint::NamePolicy(ctl.policy().cloned()),
        ])
    }

    /// Authorizes a revocation request.
    ///
    /// Any account that proves control of the certificate may revoke it, so
    /// there is nothing to check here.
    pub async fn authorize_revoke(&self, _token: &str) -> Result<(), Error> {
        // TODO: make revocation configurable per provisioner.
        Ok(())
    }

    /// Decides whether the given certificate may be renewed, based on the
    /// effective claims.
    pub async fn authorize_renew(&self, cert: &Certificate) -> Result<(), Error> {
        self.controller()?.authorize_renew(cert)
    }
}

#[async_trait]
impl Provisioner for Acme {
    fn id(&self) -> String {
        Acme::id(self)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> Kind {
        Kind::Acme
    }

    fn is_challenge_enabled(&self, challenge: &AcmeChallenge) -> bool {
        Acme::is_challenge_enabled(self, challenge)
    }

    async fn authorize_order_identifier(&self, identifier: &AcmeIdentifier) -> Result<(), Error> {
        Acme::authorize_order_identifier(self, identifier).await
    }

    async fn authorize_sign(&self, token: &str) -> Result<Vec<SignConstraint>, Error> {
        Acme::authorize_sign(self, token).await
    }

    async fn authorize_revoke(&self, token: &str) -> Result<(), Error> {
        Acme::authorize_revoke(self, token).await
    }

    async fn authorize_renew(&self, cert: &Certificate) -> Result<(), Error> {
        Acme::authorize_renew(self, cert).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{
        date, provisioner_with_policy, test_cert, AllowAll, DenyDns, FixedPolicyFactory,
    };

    #[test]
    fn test_init_rejects_empty_type() {
        let mut acme = Acme::new("dev");
        acme.kind = String::new();

        let err = acme.init(&Config::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidConfiguration(msg) if msg == "provisioner type cannot be empty"
        ));
    }

    #[test]
    fn test_init_rejects_empty_name() {
        let mut acme = Acme::new("");

        let err = acme.init(&Config::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidConfiguration(msg) if msg == "provisioner name cannot be empty"
        ));
    }

    #[test]
    fn test_init_rejects_unknown_challenges() {
        let mut acme = Acme::new("dev");
        acme.challenges = vec![AcmeChallenge::from("http-02")];

        let err = acme.init(&Config::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedChallenge(raw) if raw == "http-02"));
    }

    #[test]
    fn test_init_rejects_invalid_claims() {
        let mut acme = Acme::new("dev");
        acme.claims = Some(Claims {
            min_tls_cert_duration: Some(Duration::from_secs(600)),
            max_tls_cert_duration: Some(Duration::from_secs(60)),
            default_tls_cert_duration: Some(Duration::from_secs(60)),
            ..Default::default()
        });

        let err = acme.init(&Config::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_init_builds_controller() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut acme = Acme::new("dev");
        acme.claims = Some(Claims {
            default_tls_cert_duration: Some(Duration::from_secs(12 * 3600)),
            ..Default::default()
        });

        acme.init(&Config::default()).unwrap();

        assert_eq!(
            acme.default_tls_cert_duration().unwrap(),
            Duration::from_secs(12 * 3600)
        );
    }

    #[tokio::test]
    async fn test_operations_require_init() {
        let acme = Acme::new("late");

        let err = acme.default_tls_cert_duration().unwrap_err();
        assert!(matches!(err, Error::NotInitialized(name) if name == "late"));

        let err = acme
            .authorize_order_identifier(&AcmeIdentifier::dns("a.example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotInitialized(_)));
    }

    #[test]
    fn test_default_challenge_set() {
        let mut acme = Acme::new("dev");
        acme.init(&Config::default()).unwrap();

        assert!(acme.is_challenge_enabled(&AcmeChallenge::HTTP_01));
        assert!(acme.is_challenge_enabled(&AcmeChallenge::DNS_01));
        assert!(acme.is_challenge_enabled(&AcmeChallenge::TLS_ALPN_01));
        assert!(!acme.is_challenge_enabled(&AcmeChallenge::DEVICE_ATTEST_01));
    }

    #[test]
    fn test_configured_challenges_replace_defaults() {
        let mut acme = Acme::new("dev");
        acme.challenges = vec![AcmeChallenge::DEVICE_ATTEST_01];
        acme.init(&Config::default()).unwrap();

        assert!(acme.is_challenge_enabled(&AcmeChallenge::DEVICE_ATTEST_01));
        assert!(!acme.is_challenge_enabled(&AcmeChallenge::HTTP_01));
        assert!(!acme.is_challenge_enabled(&AcmeChallenge::DNS_01));
        assert!(!acme.is_challenge_enabled(&AcmeChallenge::TLS_ALPN_01));
    }

    #[test]
    fn test_challenge_matching_ignores_case() {
        let mut acme = Acme::new("dev");
        acme.init(&Config::default()).unwrap();

        assert!(acme.is_challenge_enabled(&AcmeChallenge::from("HTTP-01")));
    }

    #[tokio::test]
    async fn test_order_identifier_allowed_without_policy() {
        let mut acme = Acme::new("dev");
        acme.init(&Config::default()).unwrap();

        acme.authorize_order_identifier(&AcmeIdentifier::dns("a.example.com"))
            .await
            .unwrap();
        acme.authorize_order_identifier(&AcmeIdentifier::ip("10.0.0.1"))
            .await
            .unwrap();

        // even a malformed address: there is no policy to consult
        acme.authorize_order_identifier(&AcmeIdentifier::ip("999.0.0.1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_order_identifier_with_policy() {
        let acme = provisioner_with_policy(Arc::new(DenyDns));

        let err = acme
            .authorize_order_identifier(&AcmeIdentifier::dns("a.example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PolicyDenied { .. }));

        acme.authorize_order_identifier(&AcmeIdentifier::ip("10.0.0.1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_order_identifier_rejects_malformed_ip_with_policy() {
        let acme = provisioner_with_policy(Arc::new(AllowAll));

        let err = acme
            .authorize_order_identifier(&AcmeIdentifier::ip("999.0.0.1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::PolicyDenied { identifier, .. } if identifier == "999.0.0.1"
        ));
    }

    #[tokio::test]
    async fn test_order_identifier_rejects_unknown_kinds() {
        let mut acme = Acme::new("dev");
        acme.init(&Config::default()).unwrap();
        let identifier = AcmeIdentifier {
            kind: "email".into(),
            value: "user@example.com".to_owned(),
        };

        let err = acme
            .authorize_order_identifier(&identifier)
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            Error::UnsupportedIdentifierType(kind) if kind == "email"
        ));

        // a configured gate makes no difference
        let acme = provisioner_with_policy(Arc::new(AllowAll));
        let err = acme
            .authorize_order_identifier(&identifier)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedIdentifierType(_)));
    }

    #[tokio::test]
    async fn test_sign_chain_shape() {
        let mut acme = Acme::new("dev");
        acme.init(&Config::default()).unwrap();

        let chain = acme.authorize_sign("token").await.unwrap();
        assert_eq!(chain.len(), 6);

        assert!(matches!(
            &chain[0],
            SignConstraint::ProvisionerExtension(ext)
                if ext.kind == Kind::Acme && ext.name == "dev" && ext.credential_id.is_none()
        ));
        assert!(matches!(chain[1], SignConstraint::ForceCn(false)));
        assert!(matches!(
            chain[2],
            SignConstraint::DefaultDuration(duration) if duration == Duration::from_secs(86_400)
        ));
        assert!(matches!(chain[3], SignConstraint::PublicKeyPolicy));
        assert!(matches!(
            chain[4],
            SignConstraint::Validity { min, max }
                if min == Duration::from_secs(300) && max == Duration::from_secs(86_400)
        ));
        assert!(matches!(chain[5], SignConstraint::NamePolicy(None)));

        let (modifiers, validators) = chain.split_at(3);
        assert!(modifiers.iter().all(SignConstraint::is_modifier));
        assert!(validators.iter().all(SignConstraint::is_validator));
    }

    #[tokio::test]
    async fn test_sign_chain_carries_policy_and_force_cn() {
        let mut acme = provisioner_with_policy(Arc::new(AllowAll));
        acme.force_cn = true;

        let chain = acme.authorize_sign("token").await.unwrap();

        assert!(matches!(chain[1], SignConstraint::ForceCn(true)));
        assert!(matches!(&chain[5], SignConstraint::NamePolicy(Some(_))));
    }

    #[tokio::test]
    async fn test_revoke_is_allowed() {
        let acme = Acme::new("dev");

        acme.authorize_revoke("token").await.unwrap();
    }

    #[tokio::test]
    async fn test_renew_follows_claims() {
        let cert = test_cert(date(2024, 1, 1), date(2049, 1, 1));

        let mut acme = Acme::new("dev");
        acme.init(&Config::default()).unwrap();
        acme.authorize_renew(&cert).await.unwrap();

        let mut acme = Acme::new("dev");
        acme.claims = Some(Claims {
            disable_renewal: Some(true),
            ..Default::default()
        });
        acme.init(&Config::default()).unwrap();

        let err = acme.authorize_renew(&cert).await.unwrap_err();
        assert!(matches!(err, Error::RenewalDenied(msg) if msg.contains("renew is disabled")));
    }

    #[test]
    fn test_id_falls_back_to_name() {
        let mut acme = Acme::new("staging");
        assert_eq!(acme.id(), "acme/staging");

        acme.id = Some("provisioner-1".to_owned());
        assert_eq!(acme.id(), "provisioner-1");
    }

    #[test]
    fn test_config_round_trip() {
        let mut acme: Acme = serde_json::from_str(
            r#"{
                "type": "ACME",
                "name": "acme-prod",
                "forceCN": true,
                "requireEAB": true,
                "challenges": ["http-01", "dns-01"],
                "claims": {
                    "maxTLSCertDuration": "12h",
                    "defaultTLSCertDuration": "12h"
                },
                "options": {
                    "x509": {
                        "allow": { "dns": ["*.example.com"] }
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(acme.name, "acme-prod");
        assert!(acme.force_cn);
        assert!(acme.require_eab);
        assert_eq!(
            acme.challenges,
            [AcmeChallenge::HTTP_01, AcmeChallenge::DNS_01]
        );

        // policy rules require an engine to be registered
        let err = acme.init(&Config::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));

        let config = Config {
            policy_factory: Some(Arc::new(FixedPolicyFactory(Arc::new(AllowAll)))),
            ..Default::default()
        };
        acme.init(&config).unwrap();

        assert_eq!(
            acme.default_tls_cert_duration().unwrap(),
            Duration::from_secs(12 * 3600)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shared_across_tasks() {
        let mut acme = Acme::new("shared");
        acme.init(&Config::default()).unwrap();
        let acme = Arc::new(acme);

        let handles = (0..8)
            .map(|i| {
                let acme = Arc::clone(&acme);
                tokio::spawn(async move {
                    let identifier = AcmeIdentifier::dns(format!("host-{i}.example.com"));
                    acme.authorize_order_identifier(&identifier).await.unwrap();

                    let chain = acme.authorize_sign("token").await.unwrap();
                    assert_eq!(chain.len(), 6);
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.await.unwrap();
        }
    }
}
