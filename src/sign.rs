//! Constraints applied when an authorized order is signed.

use std::{fmt, net::IpAddr, sync::Arc, time::Duration};

use der::{
    asn1::{ObjectIdentifier, UintRef},
    Decode as _, Reader as _, SliceReader,
};
use time::OffsetDateTime;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::{error::Error, policy::X509Policy, provisioner::Kind};

/// rsaEncryption (RFC 8017).
pub(crate) const RSA_ENCRYPTION_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// id-ecPublicKey (RFC 5480).
pub(crate) const EC_PUBLIC_KEY_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// id-Ed25519 (RFC 8410).
pub(crate) const ED25519_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

const MIN_RSA_KEY_BITS: usize = 2048;

/// Issuing-provisioner details stamped into the leaf certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionerExtension {
    pub kind: Kind,
    pub name: String,

    /// Credential the order was authorized with; empty for ACME, where
    /// authorization comes from completed challenges rather than a token.
    pub credential_id: Option<String>,
}

/// The leaf certificate as it is being assembled, before signing.
///
/// Modifier constraints fill in the gaps an order left open; validator
/// constraints then check the finished shape.
#[derive(Debug, Clone)]
pub struct CertTemplate {
    pub common_name: Option<String>,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub not_before: Option<OffsetDateTime>,
    pub not_after: Option<OffsetDateTime>,
    pub public_key: SubjectPublicKeyInfoOwned,
    pub provisioner: Option<ProvisionerExtension>,
}

impl CertTemplate {
    /// An empty template for the given subject key.
    pub fn new(public_key: SubjectPublicKeyInfoOwned) -> Self {
        CertTemplate {
            common_name: None,
            dns_names: Vec::new(),
            ip_addresses: Vec::new(),
            not_before: None,
            not_after: None,
            public_key,
            provisioner: None,
        }
    }
}

/// One link of the chain returned by a successful sign authorization.
///
/// The chain is ordered: modifiers first, so validators always see the
/// template with defaults already applied.
pub enum SignConstraint {
    /// Stamps the issuing provisioner into the certificate.
    ProvisionerExtension(ProvisionerExtension),

    /// Copies the first DNS name into an empty common name, when enabled.
    ForceCn(bool),

    /// Fills a missing validity window with the provisioner default.
    DefaultDuration(Duration),

    /// Rejects weak or unknown public keys.
    PublicKeyPolicy,

    /// Checks the validity window against the effective claim bounds.
    Validity { min: Duration, max: Duration },

    /// Checks every subject name against the provisioner's name policy.
    NamePolicy(Option<Arc<dyn X509Policy>>),
}

impl fmt::Debug for SignConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignConstraint::ProvisionerExtension(ext) => {
                f.debug_tuple("ProvisionerExtension").field(ext).finish()
            }
            SignConstraint::ForceCn(force) => f.debug_tuple("ForceCn").field(force).finish(),
            SignConstraint::DefaultDuration(duration) => {
                f.debug_tuple("DefaultDuration").field(duration).finish()
            }
            SignConstraint::PublicKeyPolicy => f.write_str("PublicKeyPolicy"),
            SignConstraint::Validity { min, max } => f
                .debug_struct("Validity")
                .field("min", min)
                .field("max", max)
                .finish(),
            SignConstraint::NamePolicy(policy) => f
                .debug_tuple("NamePolicy")
                .field(&policy.is_some())
                .finish(),
        }
    }
}

impl SignConstraint {
    /// Whether this constraint mutates the template.
    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            SignConstraint::ProvisionerExtension(_)
                | SignConstraint::ForceCn(_)
                | SignConstraint::DefaultDuration(_)
        )
    }

    /// Whether this constraint checks the template without changing it.
    pub fn is_validator(&self) -> bool {
        !self.is_modifier()
    }

    /// Applies this constraint to the template, mutating or validating it.
    pub async fn apply(&self, template: &mut CertTemplate) -> Result<(), Error> {
        match self {
            SignConstraint::ProvisionerExtension(ext) => {
                template.provisioner = Some(ext.clone());
                Ok(())
            }

            SignConstraint::ForceCn(force) => {
                if !*force {
                    return Ok(());
                }
                match &template.common_name {
                    Some(name) if !name.is_empty() => Ok(()),
                    _ => match template.dns_names.first() {
                        Some(name) => {
                            template.common_name = Some(name.clone());
                            Ok(())
                        }
                        None => Err(Error::MissingCommonName),
                    },
                }
            }

            SignConstraint::DefaultDuration(duration) => {
                let not_before = *template
                    .not_before
                    .get_or_insert_with(OffsetDateTime::now_utc);
                if template.not_after.is_none() {
                    template.not_after = Some(not_before + *duration);
                }
                Ok(())
            }

            SignConstraint::PublicKeyPolicy => validate_public_key(&template.public_key),

            SignConstraint::Validity { min, max } => {
                let (Some(not_before), Some(not_after)) = (template.not_before, template.not_after)
                else {
                    return Err(Error::MissingValidity);
                };

                // negative windows collapse to zero and fail the minimum
                let requested =
                    Duration::try_from(not_after - not_before).unwrap_or(Duration::ZERO);

                if requested < *min || requested > *max {
                    return Err(Error::DurationOutOfRange {
                        requested,
                        min: *min,
                        max: *max,
                    });
                }

                Ok(())
            }

            SignConstraint::NamePolicy(policy) => {
                let Some(policy) = policy else {
                    return Ok(());
                };

                for name in &template.dns_names {
                    policy.is_dns_allowed(name).await?;
                }
                for ip in &template.ip_addresses {
                    policy.is_ip_allowed(*ip).await?;
                }
                if let Some(name) = template
                    .common_name
                    .as_deref()
                    .filter(|name| !name.is_empty())
                {
                    match name.parse::<IpAddr>() {
                        Ok(ip) => policy.is_ip_allowed(ip).await?,
                        Err(_) => policy.is_dns_allowed(name).await?,
                    }
                }

                Ok(())
            }
        }
    }
}

fn validate_public_key(spki: &SubjectPublicKeyInfoOwned) -> Result<(), Error> {
    let oid = spki.algorithm.oid;

    if oid == EC_PUBLIC_KEY_OID || oid == ED25519_OID {
        return Ok(());
    }

    if oid == RSA_ENCRYPTION_OID {
        let bits = rsa_modulus_bits(spki)?;
        if bits < MIN_RSA_KEY_BITS {
            return Err(Error::UnsupportedKey(format!(
                "certificate request RSA key must be at least {MIN_RSA_KEY_BITS} bits \
                 (size: {bits})"
            )));
        }
        return Ok(());
    }

    Err(Error::UnsupportedKey(format!(
        "unsupported public key algorithm {oid}"
    )))
}

/// `RSAPublicKey ::= SEQUENCE { modulus INTEGER, publicExponent INTEGER }`
fn rsa_modulus_bits(spki: &SubjectPublicKeyInfoOwned) -> Result<usize, Error> {
    let key = spki
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| Error::UnsupportedKey("RSA public key is not octet aligned".into()))?;

    let mut reader = SliceReader::new(key)
        .map_err(|err| Error::UnsupportedKey(format!("malformed RSA public key: {err}")))?;

    reader
        .sequence(|reader| {
            let modulus = UintRef::decode(reader)?;
            let _exponent = UintRef::decode(reader)?;

            let bytes = modulus.as_bytes();
            Ok(match bytes.first() {
                Some(first) => bytes.len() * 8 - first.leading_zeros() as usize,
                None => 0,
            })
        })
        .map_err(|err| Error::UnsupportedKey(format!("malformed RSA public key: {err}")))
}
