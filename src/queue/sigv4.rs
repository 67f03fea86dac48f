//! AWS Signature Version 4 request signing.
//! Reference: <https://docs.aws.amazon.com/IAM/latest/UserGuide/create-signed-request.html>

use std::fmt::Write;

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Everything about a request that goes into its signature.
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a str,
    /// Header name/value pairs, including `host` and `x-amz-date`.
    pub headers: &'a [(String, String)],
    pub payload: &'a [u8],
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn canonical_request(req: &SignableRequest<'_>) -> (String, String) {
    let canonical_query = if req.query.is_empty() {
        String::new()
    } else {
        let mut params: Vec<&str> = req.query.split('&').collect();
        params.sort_unstable();
        params.join("&")
    };

    let mut sorted_headers: Vec<(String, &str)> = req
        .headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim()))
        .collect();
    sorted_headers.sort_by(|a, b| a.0.cmp(&b.0));

    let canonical_headers = sorted_headers
        .iter()
        .fold(String::new(), |mut acc, (k, v)| {
            let _ = writeln!(acc, "{k}:{v}");
            acc
        });
    let signed_headers = sorted_headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let hashed_payload = hex::encode(Sha256::digest(req.payload));
    let canonical = format!(
        "{}\n{}\n{canonical_query}\n{canonical_headers}\n{signed_headers}\n{hashed_payload}",
        req.method, req.path
    );
    (canonical, signed_headers)
}

pub fn signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, InvalidLength> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

/// Build the `Authorization` header value. `amz_date` is the request's
/// `x-amz-date` (`YYYYMMDDTHHMMSSZ`).
pub fn authorization(
    credentials: &AwsCredentials,
    region: &str,
    service: &str,
    amz_date: &str,
    req: &SignableRequest<'_>,
) -> Result<String, InvalidLength> {
    let date = amz_date.get(..8).unwrap_or(amz_date);
    let scope = format!("{date}/{region}/{service}/aws4_request");

    let (canonical, signed_headers) = canonical_request(req);
    let hashed_canonical = hex::encode(Sha256::digest(canonical.as_bytes()));
    let string_to_sign = format!("{ALGORITHM}\n{amz_date}\n{scope}\n{hashed_canonical}");

    let key = signing_key(&credentials.secret_access_key, date, region, service)?;
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

    Ok(format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.access_key_id
    ))
}
