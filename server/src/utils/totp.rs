//! TOTP (RFC 6238) generation and verification for two-factor authentication.
//!
//! Built directly on `hmac`/`sha2` rather than a dedicated TOTP crate, since
//! the algorithm is a handful of lines and the server already depends on
//! both for other purposes.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SECRET_BYTES: usize = 20;
const TIME_STEP_SECS: u64 = 30;
const CODE_DIGITS: u32 = 6;
/// Number of adjacent time steps (past and future) tolerated for clock drift.
const WINDOW: i64 = 1;

/// Generate a new random TOTP secret, base32-encoded (RFC 4648, no padding).
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base32_encode(&bytes)
}

/// Build the `otpauth://` URL a client authenticator app scans as a QR code.
pub fn otpauth_url(issuer: &str, account: &str, secret: &str) -> String {
    format!(
        "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&algorithm=SHA256&digits={CODE_DIGITS}&period={TIME_STEP_SECS}",
    )
}

/// Verify a 6-digit code against a base32 secret, tolerating +/-1 time step.
pub fn verify_code(secret: &str, code: &str, now_unix: i64) -> bool {
    let Some(key) = base32_decode(secret) else {
        return false;
    };
    let step = now_unix / TIME_STEP_SECS as i64;
    (-WINDOW..=WINDOW).any(|offset| generate_code(&key, step + offset) == code)
}

fn generate_code(key: &[u8], step: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(&(step as u64).to_be_bytes());
    let hash = mac.finalize().into_bytes();

    let offset = (hash[hash.len() - 1] & 0x0f) as usize;
    let truncated = ((hash[offset] as u32 & 0x7f) << 24)
        | ((hash[offset + 1] as u32) << 16)
        | ((hash[offset + 2] as u32) << 8)
        | (hash[offset + 3] as u32);

    format!(
        "{:0width$}",
        truncated % 10u32.pow(CODE_DIGITS),
        width = CODE_DIGITS as usize
    )
}

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

fn base32_encode(bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for &byte in bytes {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn base32_decode(s: &str) -> Option<Vec<u8>> {
    let mut buffer: u32 = 0;
    let mut bits = 0;
    let mut out = Vec::new();
    for c in s.trim_end_matches('=').chars() {
        let idx = BASE32_ALPHABET
            .iter()
            .position(|&b| b as char == c.to_ascii_uppercase())?;
        buffer = (buffer << 5) | idx as u32;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base32_round_trips() {
        let bytes = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let encoded = base32_encode(&bytes);
        assert_eq!(base32_decode(&encoded).unwrap(), bytes);
    }

    #[test]
    fn generated_secret_verifies_itself() {
        let secret = generate_secret();
        let key = base32_decode(&secret).unwrap();
        let now = 1_700_000_000i64;
        let code = generate_code(&key, now / TIME_STEP_SECS as i64);
        assert!(verify_code(&secret, &code, now));
    }

    #[test]
    fn tolerates_one_step_of_clock_drift() {
        let secret = generate_secret();
        let key = base32_decode(&secret).unwrap();
        let now = 1_700_000_000i64;
        let next_step_code = generate_code(&key, now / TIME_STEP_SECS as i64 + 1);
        assert!(verify_code(&secret, &next_step_code, now));
    }

    #[test]
    fn rejects_wrong_code() {
        let secret = generate_secret();
        assert!(!verify_code(&secret, "000000", 1_700_000_000));
    }

    #[test]
    fn otpauth_url_contains_secret() {
        let url = otpauth_url("SideChat", "alice", "ABCDEFGH");
        assert!(url.starts_with("otpauth://totp/SideChat:alice?"));
        assert!(url.contains("secret=ABCDEFGH"));
    }
}
