//! API-key authentication (§6, §10). The 48-character opaque key is
//! accepted in body field `api_key` or header `X-API-Key`; only the SHA-256
//! hash is ever persisted or compared.

use crate::domain::errors::{AppError, AuthError};
use crate::domain::types::Account;
use crate::infrastructure::http::state::AppState;
use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

pub fn hash_api_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(digest)
}

fn extract_key(headers: &HeaderMap, body_key: Option<&str>) -> Option<String> {
    headers
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| body_key.map(str::to_string))
}

/// Authenticates `account_number` against the key in `headers`/`body_key`.
/// `AuthError::InvalidKey` if no account owns that key hash at all,
/// `AuthError::AccountMismatch` if the key belongs to a different account.
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    body_key: Option<&str>,
    account_number: i64,
) -> Result<Account, AppError> {
    let key = extract_key(headers, body_key).ok_or(AuthError::MissingKey)?;
    let hash = hash_api_key(&key);

    match state.accounts.find_by_api_key_hash(&hash).await? {
        Some(account) if account.account_number == account_number => Ok(account),
        Some(_) => Err(AuthError::AccountMismatch.into()),
        None => Err(AuthError::InvalidKey.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_not_reversible_length() {
        let h1 = hash_api_key("abc123");
        let h2 = hash_api_key("abc123");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64); // hex-encoded SHA-256
    }

    #[test]
    fn header_takes_precedence_over_body() {
        let mut headers = HeaderMap::new();
        headers.insert("X-API-Key", "from-header".parse().unwrap());
        let key = extract_key(&headers, Some("from-body"));
        assert_eq!(key.as_deref(), Some("from-header"));
    }

    #[test]
    fn falls_back_to_body_key() {
        let headers = HeaderMap::new();
        let key = extract_key(&headers, Some("from-body"));
        assert_eq!(key.as_deref(), Some("from-body"));
    }
}
