//! Server invite codes.
//!
//! `ChatRepository` has no invite table — membership is granted directly via
//! `add_server_member`. Rather than add a persisted invites table for a
//! single `code -> server_id` mapping, an invite code here is a
//! self-contained, HMAC-signed token (`server_id.expires_at.signature`,
//! base32-encoded) verified against the server's own JWT signing key. This
//! mirrors the bootstrap-token exchange in `api::auth::manager` more closely
//! than it mirrors a database row.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::core::secret::SecretManager;
use crate::utils::crypto;

type HmacSha256 = Hmac<Sha256>;

pub struct DecodedInvite {
    pub server_id: String,
    pub expires_at: Option<i64>,
}

fn sign(key: &[u8], server_id: &str, expires_at: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(server_id.as_bytes());
    mac.update(&expires_at.to_be_bytes());
    crypto::encode_hex(&mac.finalize().into_bytes())
}

pub async fn create_code(
    secrets: &SecretManager,
    server_id: &str,
    expires_at: Option<i64>,
) -> anyhow::Result<String> {
    let key = secrets.get_jwt_signing_key().await?;
    let exp = expires_at.unwrap_or(0);
    let sig = sign(&key, server_id, exp);
    Ok(format!("{server_id}.{exp}.{sig}"))
}

pub async fn decode_code(secrets: &SecretManager, code: &str) -> Option<DecodedInvite> {
    let mut parts = code.splitn(3, '.');
    let server_id = parts.next()?;
    let exp_str = parts.next()?;
    let sig = parts.next()?;
    let exp: i64 = exp_str.parse().ok()?;

    let key = secrets.get_jwt_signing_key().await.ok()?;
    let expected = sign(&key, server_id, exp);
    if !crypto::constant_time_eq(&expected, sig) {
        return None;
    }

    Some(DecodedInvite {
        server_id: server_id.to_string(),
        expires_at: if exp == 0 { None } else { Some(exp) },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::AppStorage;

    async fn secrets() -> SecretManager {
        let storage = AppStorage::init_for_test(std::env::temp_dir().join(format!(
            "sidechat-invite-test-{}",
            crypto::generate_token(8)
        )));
        SecretManager::init(&storage).await.unwrap()
    }

    #[tokio::test]
    async fn round_trips_a_valid_code() {
        let secrets = secrets().await;
        let code = create_code(&secrets, "srv1", Some(1_999_999_999)).await.unwrap();
        let decoded = decode_code(&secrets, &code).await.unwrap();
        assert_eq!(decoded.server_id, "srv1");
        assert_eq!(decoded.expires_at, Some(1_999_999_999));
    }

    #[tokio::test]
    async fn rejects_tampered_code() {
        let secrets = secrets().await;
        let code = create_code(&secrets, "srv1", None).await.unwrap();
        let tampered = code.replace("srv1", "srv2");
        assert!(decode_code(&secrets, &tampered).await.is_none());
    }
}
