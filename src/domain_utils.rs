use thiserror::Error;

/// Rejected before any network activity happens.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidDomainError {
    #[error("domain is empty")]
    Empty,

    #[error("malformed domain '{0}'")]
    Malformed(String),
}

/// Normalize user input into a bare lowercase host.
///
/// Accepts things like `https://www.Example.com/privacy?x=1` and returns
/// `example.com`. Scheme, credentials, port, path, query, fragment, a trailing
/// dot and a leading `www.` are all stripped.
pub fn normalize_domain(input: &str) -> Result<String, InvalidDomainError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InvalidDomainError::Empty);
    }

    let mut host = trimmed.to_lowercase();

    if let Some(idx) = host.find("://") {
        host = host[idx + 3..].to_string();
    }

    // Cut at the first path / query / fragment delimiter
    if let Some(idx) = host.find(|c| matches!(c, '/' | '?' | '#')) {
        host.truncate(idx);
    }

    // Drop userinfo and port
    if let Some(idx) = host.rfind('@') {
        host = host[idx + 1..].to_string();
    }
    if let Some(idx) = host.find(':') {
        host.truncate(idx);
    }

    let host = host.trim_end_matches('.');
    let host = host.strip_prefix("www.").unwrap_or(host);

    if host.is_empty() {
        return Err(InvalidDomainError::Empty);
    }
    if !is_valid_domain(host) {
        return Err(InvalidDomainError::Malformed(input.trim().to_string()));
    }

    Ok(host.to_string())
}

/// Basic domain validation
pub fn is_valid_domain(domain: &str) -> bool {
    // Must contain at least one dot
    if !domain.contains('.') {
        return false;
    }

    // Must not contain protocols or paths
    if domain.contains("://") || domain.contains('/') {
        return false;
    }

    // Must not start or end with dot or hyphen
    if domain.starts_with('.') || domain.ends_with('.')
        || domain.starts_with('-') || domain.ends_with('-') {
        return false;
    }

    // Must not contain consecutive dots
    if domain.contains("..") {
        return false;
    }

    if domain.len() > 253 {
        return false;
    }

    domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// Extract the registrable domain (e.g. example.com from eu.mail.example.com)
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();
    let parts: Vec<&str> = host.split('.').collect();

    // If it's already a base domain (2 parts), return as-is
    if parts.len() <= 2 {
        return host;
    }

    let last_two = format!("{}.{}", parts[parts.len() - 2], parts[parts.len() - 1]);

    // Compound TLDs (e.g., .co.uk, .com.au) need 3 parts for the apex
    let compound_tlds = ["co.uk", "co.au", "com.au", "co.nz", "co.jp", "co.kr",
                         "com.br", "com.mx", "com.cn", "org.uk", "net.au", "co.za",
                         "com.tr", "co.in", "ac.uk", "gov.uk"];
    if compound_tlds.contains(&last_two.as_str()) {
        format!("{}.{}", parts[parts.len() - 3], last_two)
    } else {
        last_two
    }
}

/// True when `host` is `target` itself or one of its subdomains.
///
/// `target` is reduced to its registrable domain first, so a crawl of
/// `shop.example.com` accepts `privacy@example.com` and `dpo@eu.example.com`.
pub fn is_same_or_subdomain(host: &str, target: &str) -> bool {
    let host = host.trim_end_matches('.').to_lowercase();
    let target = registrable_domain(target);

    host == target || host.ends_with(&format!(".{}", target))
}

/// Domain part of an email address, lowercased.
pub fn email_domain(email: &str) -> Option<String> {
    let (local, domain) = email.rsplit_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(domain.trim_end_matches('.').to_lowercase())
}
