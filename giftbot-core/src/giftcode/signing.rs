use std::collections::BTreeMap;
use md5::{Digest, Md5};

/// Shared secret the game backend expects when none is configured.
pub const DEFAULT_SIGN_SECRET: &str = "Uiv#87#SPan.ECsp";

/// `md5(k1=v1&k2=v2...<secret>)` over the keys in lexicographic order.
/// Values go in verbatim; URL-encoding happens later when the form is sent.
pub fn sign_params(params: &BTreeMap<String, String>, secret: &str) -> String {
    let joined = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Md5::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Returns `params` plus the `sign` entry.
pub fn signed_form(mut params: BTreeMap<String, String>, secret: &str) -> BTreeMap<String, String> {
    let sign = sign_params(&params, secret);
    params.insert("sign".to_string(), sign);
    params
}
