use regex::Regex;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("domain label is empty")]
    Empty,
    #[error("domain label too long (max 63 characters)")]
    TooLong,
    #[error("domain too long (max 253 characters)")]
    DomainTooLong,
    #[error("domain label contains invalid characters (only a-z, 0-9, and '-' allowed)")]
    InvalidCharacters,
    #[error("domain label must not start or end with '-'")]
    LeadingOrTrailingHyphen,
    #[error("domain label must not contain '--' outside of an xn-- prefix")]
    DoubleHyphen,
    #[error("domain must have at least two labels")]
    SingleLabel,
}

lazy_static::lazy_static! {
    /// Only lowercase letters, digits and '-'
    static ref LABEL_RE: Regex = Regex::new(r"^[a-z0-9-]+$").unwrap();
}

pub fn validate_label(label: &str) -> Result<(), ValidationError> {
    if label.is_empty() {
        return Err(ValidationError::Empty);
    }
    if label.len() > 63 {
        return Err(ValidationError::TooLong);
    }
    if !LABEL_RE.is_match(label) {
        return Err(ValidationError::InvalidCharacters);
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(ValidationError::LeadingOrTrailingHyphen);
    }
    // punycode labels carry "--" at positions 3-4
    let rest = label.strip_prefix("xn--").unwrap_or(label);
    if rest.contains("--") {
        return Err(ValidationError::DoubleHyphen);
    }

    Ok(())
}

/// Lower-case, trim and drop the trailing dot so the same domain always maps
/// to the same registry key.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

pub fn validate_fqdn_ascii(domain: &str) -> Result<(), ValidationError> {
    let d = domain.trim_end_matches('.');
    if d.is_empty() {
        return Err(ValidationError::Empty);
    }
    if d.len() > 253 {
        return Err(ValidationError::DomainTooLong);
    }
    if !d.contains('.') {
        return Err(ValidationError::SingleLabel);
    }
    for label in d.split('.') {
        validate_label(label)?;
    }
    Ok(())
}
