//! Certificate extraction utilities.

use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::{GeneralName, ParsedExtension};

/// Extracts the subject Common Name, if present and printable.
pub(crate) fn extract_common_name(cert: &X509Certificate<'_>) -> Option<String> {
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string)
}

/// Extracts DNS names from the Subject Alternative Name extension.
///
/// IP addresses, e-mail addresses and other name types are ignored.
pub(crate) fn extract_certificate_sans(cert: &X509Certificate<'_>) -> Vec<String> {
    let mut sans = Vec::new();

    for ext in cert.extensions() {
        if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
            for general_name in &san.general_names {
                if let GeneralName::DNSName(dns_name) = general_name {
                    sans.push(dns_name.to_string());
                }
            }
        }
    }

    sans
}

/// Expiry of the certificate as a Unix timestamp in seconds.
pub(crate) fn extract_not_after(cert: &X509Certificate<'_>) -> i64 {
    cert.validity().not_after.timestamp()
}
