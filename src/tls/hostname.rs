//! Hostname matching against certificate names.

/// Converts a hostname to its ASCII-compatible (punycode) form.
///
/// Uses the WHATWG host parser from `url`, which also lowercases. Hosts the
/// parser rejects are returned lowercased but otherwise unchanged.
pub fn to_ascii_hostname(hostname: &str) -> String {
    let trimmed = hostname.trim_end_matches('.');
    url::Url::parse(&format!("https://{trimmed}/"))
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| trimmed.to_lowercase())
}

/// Returns true if `hostname` is covered by the certificate CN or any SAN.
///
/// Both the hostname as given and its ASCII form are compared, ignoring case.
/// A name may carry exactly one leading wildcard label: `*.example.com`
/// covers `a.example.com` but neither `example.com` nor `a.b.example.com`.
pub fn hostname_matches(hostname: &str, common_name: Option<&str>, sans: &[String]) -> bool {
    let given = hostname.trim_end_matches('.').to_lowercase();
    let ascii = to_ascii_hostname(hostname);
    let candidates = [given.as_str(), ascii.as_str()];

    sans.iter()
        .map(String::as_str)
        .chain(common_name)
        .any(|name| {
            let name = name.trim_end_matches('.').to_lowercase();
            candidates.iter().any(|host| name_matches(&name, host))
        })
}

fn name_matches(pattern: &str, host: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(suffix) => match host.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == suffix,
            None => false,
        },
        None => pattern == host,
    }
}
