//! Signed-proxy request verification.
//!
//! The storefront's trusted front door attaches an HMAC-SHA256 signature over
//! a canonical projection of each forwarded request. Two signature carriers
//! are supported, tried in order:
//!
//! 1. **Header mode** — `x-proxy-signature` carries a base64 MAC over the
//!    sorted raw query pairs joined with `&`, a newline, and the body bytes.
//! 2. **Query mode** — a `signature` query parameter (64 hex chars) carries a
//!    MAC over the decoded `key=value` pairs concatenated in key order with
//!    no separator, followed by the body bytes.
//!
//! Any missing or undecodable input verifies as `false`; the comparison is
//! delegated to the HMAC primitive's constant-time verify.


use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the base64 signature in header mode.
pub const SIGNATURE_HEADER: &str = "x-proxy-signature";

/// Query parameter carrying the hex signature in query mode.
pub const SIGNATURE_PARAM: &str = "signature";

/// Keys excluded from the query-mode canonical form.
const EXCLUDED_PARAMS: [&str; 3] = ["signature", "hmac", "shopify_hmac"];

/// The pieces of an incoming request that participate in verification.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    /// Query string exactly as received, percent-encoding preserved.
    pub raw_query: &'a str,
    /// Value of [`SIGNATURE_HEADER`], if present.
    pub header_signature: Option<&'a str>,
    /// Raw request body bytes.
    pub body: &'a [u8],
}

/// Decides whether `request` was signed by the trusted proxy under `secret`.
///
/// Body bytes are bound into both canonical forms, so a tampered POST body
/// fails verification even when the query parameters are untouched.
pub fn verify(secret: &str, request: &SignedRequest<'_>) -> bool {
    if secret.is_empty() {
        return false;
    }

    if let Some(signature) = request.header_signature {
        return verify_header_mode(secret, request.raw_query, signature, request.body);
    }

    if let Some(signature) = query_param_value(request.raw_query, SIGNATURE_PARAM) {
        return verify_query_mode(secret, request.raw_query, &signature, request.body);
    }

    false
}

/// Header mode: `sorted_raw_pairs.join("&") + "\n" + body`.
fn verify_header_mode(secret: &str, raw_query: &str, signature_b64: &str, body: &[u8]) -> bool {
    let Ok(signature) = BASE64.decode(signature_b64) else {
        return false;
    };

    let mut pairs: Vec<&str> = raw_query.split('&').filter(|p| !p.is_empty()).collect();
    pairs.sort_unstable();

    let mut message = pairs.join("&").into_bytes();
    message.push(b'\n');
    message.extend_from_slice(body);

    verify_mac(secret, &message, &signature)
}

/// Query mode: decoded `key=value` pairs concatenated in alphabetical key
/// order with no separator, multi-valued keys comma-joined, then the body.
fn verify_query_mode(secret: &str, raw_query: &str, signature_hex: &str, body: &[u8]) -> bool {
    if signature_hex.len() != 64 {
        return false;
    }
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };

    // (key, joined values) in alphabetical key order, values in arrival order.
    let mut grouped: Vec<(String, String)> = Vec::new();
    for (key, value) in decoded_pairs(raw_query) {
        if EXCLUDED_PARAMS.contains(&key.as_str()) {
            continue;
        }
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, joined)) => {
                joined.push(',');
                joined.push_str(&value);
            }
            None => grouped.push((key, value)),
        }
    }
    grouped.sort_by(|a, b| a.0.cmp(&b.0));

    let mut message = Vec::new();
    for (key, value) in &grouped {
        message.extend_from_slice(key.as_bytes());
        message.push(b'=');
        message.extend_from_slice(value.as_bytes());
    }
    message.extend_from_slice(body);

    verify_mac(secret, &message, &signature)
}

fn verify_mac(secret: &str, message: &[u8], signature: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(message);
    // Constant-time comparison; never short-circuits on partial matches.
    mac.verify_slice(signature).is_ok()
}

/// Returns the decoded value of the first occurrence of `name`.
fn query_param_value(raw_query: &str, name: &str) -> Option<String> {
    decoded_pairs(raw_query)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

fn decoded_pairs(raw_query: &str) -> impl Iterator<Item = (String, String)> + '_ {
    raw_query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (decode_component(key), decode_component(value)),
            None => (decode_component(pair), String::new()),
        })
}

/// Form-urlencoded decoding: `+` is a space, `%XX` sequences are resolved.
/// Undecodable input falls back to the raw text so verification fails on the
/// MAC rather than panicking.
fn decode_component(component: &str) -> String {
    let plus_decoded = component.replace('+', " ");
    match urlencoding::decode(&plus_decoded) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => plus_decoded,
    }
}

/// Computes the header-mode signature for a request. Test and tooling helper;
/// the server only ever verifies.
pub fn sign_header_mode(secret: &str, raw_query: &str, body: &[u8]) -> String {
    let mut pairs: Vec<&str> = raw_query.split('&').filter(|p| !p.is_empty()).collect();
    pairs.sort_unstable();

    let mut message = pairs.join("&").into_bytes();
    message.push(b'\n');
    message.extend_from_slice(body);

    BASE64.encode(compute_mac(secret, &message))
}

/// Computes the query-mode signature for a request, excluding the signature
/// parameters themselves. Test and tooling helper.
pub fn sign_query_mode(secret: &str, raw_query: &str, body: &[u8]) -> String {
    let mut grouped: Vec<(String, String)> = Vec::new();
    for (key, value) in decoded_pairs(raw_query) {
        if EXCLUDED_PARAMS.contains(&key.as_str()) {
            continue;
        }
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, joined)) => {
                joined.push(',');
                joined.push_str(&value);
            }
            None => grouped.push((key, value)),
        }
    }
    grouped.sort_by(|a, b| a.0.cmp(&b.0));

    let mut message = Vec::new();
    for (key, value) in &grouped {
        message.extend_from_slice(key.as_bytes());
        message.push(b'=');
        message.extend_from_slice(value.as_bytes());
    }
    message.extend_from_slice(body);

    hex::encode(compute_mac(secret, &message))
}

fn compute_mac(secret: &str, message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}
