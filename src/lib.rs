//! ACME provisioner authorization core for certificate authority servers.
//!
//! An [`Acme`] provisioner decides, on the CA side, what an [RFC 8555] client
//! is allowed to do: which challenge types it may answer, which order
//! identifiers it may claim, how long the issued certificate may live, and
//! whether it may be renewed or revoked. It does not validate challenges or
//! sign certificates; it produces the decisions and constraints the rest of
//! the authority acts on:
//!
//! - [`Acme::authorize_order_identifier`] gates identifiers as orders are
//!   created, consulting the configured name policy.
//! - [`Acme::authorize_sign`] returns the [`sign::SignConstraint`] chain to
//!   run over the certificate template before signing.
//! - [`Acme::authorize_renew`] and [`Acme::authorize_revoke`] gate the
//!   certificate lifecycle after issuance.
//!
//! Authorities plug in their own name policy engine through
//! [`policy::X509PolicyFactory`] and tune lifetimes through [`Claims`].
//!
//! # Usage
//!
//! ```
//! use acme_provisioner::{Acme, AcmeChallenge, Config};
//!
//! # fn main() -> Result<(), acme_provisioner::Error> {
//! let mut acme = Acme::new("dev");
//! acme.init(&Config::default())?;
//!
//! assert!(acme.is_challenge_enabled(&AcmeChallenge::HTTP_01));
//! assert!(!acme.is_challenge_enabled(&AcmeChallenge::DEVICE_ATTEST_01));
//! assert_eq!(acme.id(), "acme/dev");
//! # Ok(())
//! # }
//! ```
//!
//! After [`Acme::init`] the provisioner is immutable; wrap it in an
//! [`Arc`](std::sync::Arc) and share it across tasks.
//!
//! [RFC 8555]: https://datatracker.ietf.org/doc/html/rfc8555

#![deny(rust_2018_idioms, nonstandard_style, future_incompatible)]

mod acme;
mod challenge;
mod claims;
mod controller;
mod error;
mod identifier;
mod options;
mod provisioner;

pub mod policy;
pub mod sign;


pub use crate::{
    acme::Acme,
    challenge::AcmeChallenge,
    claims::{Claimer, Claims},
    controller::{Config, Controller},
    error::Error,
    identifier::{AcmeIdentifier, IdentifierKind},
    options::{Options, X509NameOptions, X509Options},
    provisioner::{Kind, Provisioner},
};
