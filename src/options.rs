use serde::{Deserialize, Serialize};

/// Per-provisioner signing options.
///
/// Only X.509 options exist today; the wrapper leaves room for other
/// certificate flavors in the configuration format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    /// X.509 leaf certificate options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x509: Option<X509Options>,
}

/// X.509 signing options: certificate template and name policy rules.
///
/// # Example JSON
///
/// ```json
/// {
///   "template": "{{ toJson .Insecure.CR }}",
///   "templateData": { "ou": "ops" },
///   "allow": { "dns": ["*.example.com"] },
///   "deny": { "dns": ["internal.example.com"] },
///   "allowWildcardNames": true
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct X509Options {
    /// Certificate template applied at signing time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Data made available to the template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_data: Option<serde_json::Value>,

    /// Names the provisioner may issue for.
    #[serde(rename = "allow", skip_serializing_if = "Option::is_none")]
    pub allowed_names: Option<X509NameOptions>,

    /// Names the provisioner must refuse.
    #[serde(rename = "deny", skip_serializing_if = "Option::is_none")]
    pub denied_names: Option<X509NameOptions>,

    /// Whether wildcard names pass the policy.
    pub allow_wildcard_names: bool,
}

impl X509Options {
    /// Whether any name policy rules are configured.
    pub fn has_policy(&self) -> bool {
        self.allowed_names.is_some() || self.denied_names.is_some()
    }
}

/// One side of the name policy: the names to allow or deny.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct X509NameOptions {
    /// DNS domains, with `*.domain` matching one label.
    #[serde(rename = "dns", skip_serializing_if = "Vec::is_empty")]
    pub dns_domains: Vec<String>,

    /// IP addresses or CIDR ranges.
    #[serde(rename = "ip", skip_serializing_if = "Vec::is_empty")]
    pub ip_ranges: Vec<String>,

    /// Email addresses or `@domain` suffixes.
    #[serde(rename = "email", skip_serializing_if = "Vec::is_empty")]
    pub email_addresses: Vec<String>,

    /// URI domains.
    #[serde(rename = "uri", skip_serializing_if = "Vec::is_empty")]
    pub uri_domains: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_options() {
        let options: Options = serde_json::from_str(
            r#"{
                "x509": {
                    "template": "{{ toJson .Insecure.CR }}",
                    "templateData": { "ou": "ops" },
                    "allow": {
                        "dns": ["*.example.com"],
                        "ip": ["10.0.0.0/8"]
                    },
                    "deny": { "dns": ["internal.example.com"] },
                    "allowWildcardNames": true
                }
            }"#,
        )
        .unwrap();

        let x509 = options.x509.unwrap();
        assert_eq!(x509.template.as_deref(), Some("{{ toJson .Insecure.CR }}"));
        assert_eq!(
            x509.template_data,
            Some(serde_json::json!({ "ou": "ops" }))
        );
        assert!(x509.allow_wildcard_names);

        let allow = x509.allowed_names.as_ref().unwrap();
        assert_eq!(allow.dns_domains, ["*.example.com"]);
        assert_eq!(allow.ip_ranges, ["10.0.0.0/8"]);

        let deny = x509.denied_names.as_ref().unwrap();
        assert_eq!(deny.dns_domains, ["internal.example.com"]);

        assert!(x509.has_policy());
    }

    #[test]
    fn test_template_only_options_have_no_policy() {
        let options: X509Options = serde_json::from_str(
            r#"{ "template": "{{ toJson .Subject }}" }"#,
        )
        .unwrap();

        assert!(!options.has_policy());
    }

    #[test]
    fn test_empty_name_options_serialize_compactly() {
        let json = serde_json::to_value(X509NameOptions::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }
}
