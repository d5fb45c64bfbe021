//! Authentication key derivation and HMAC operations (RFC 3414).
//!
//! - Password-to-key derivation (1MB expansion + hash)
//! - Key localization (binding key to engine ID)
//! - HMAC-96 authentication for message integrity

use digest::{Digest, KeyInit, Mac, OutputSizeUser};
use hmac::Hmac;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::AuthProtocol;

/// Passwords shorter than this are accepted but logged; net-snmp rejects them.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Localized authentication key.
///
/// Derived from a password and bound to one engine ID. Key material is
/// zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LocalizedKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl LocalizedKey {
    /// Derive a localized key from a password and engine ID (RFC 3414 A.2).
    ///
    /// Empty passwords give an all-zero key of the digest length.
    pub fn from_password(protocol: AuthProtocol, password: &[u8], engine_id: &[u8]) -> Self {
        if password.len() < MIN_PASSWORD_LENGTH {
            tracing::warn!(
                target: "snmp_cache::auth",
                { password_len = password.len(), min_len = MIN_PASSWORD_LENGTH },
                "SNMPv3 password is shorter than recommended minimum"
            );
        }
        let mut master_key = password_to_key(protocol, password);
        let key = localize_key(protocol, &master_key, engine_id);
        master_key.zeroize();
        Self { key, protocol }
    }

    pub fn from_str_password(protocol: AuthProtocol, password: &str, engine_id: &[u8]) -> Self {
        Self::from_password(protocol, password.as_bytes(), engine_id)
    }

    /// Wrap an already-localized key.
    pub fn from_bytes(protocol: AuthProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn mac_len(&self) -> usize {
        self.protocol.mac_len()
    }

    /// HMAC over `data`, truncated to 12 bytes.
    pub fn compute_hmac(&self, data: &[u8]) -> Vec<u8> {
        let truncate_len = self.protocol.mac_len();
        match self.protocol {
            AuthProtocol::Md5 => hmac_md5(&self.key, data, truncate_len),
            AuthProtocol::Sha1 => hmac_sha1(&self.key, data, truncate_len),
        }
    }

    /// Constant-time comparison against `expected`.
    pub fn verify_hmac(&self, data: &[u8], expected: &[u8]) -> bool {
        let computed = self.compute_hmac(data);
        if computed.len() != expected.len() {
            return false;
        }
        let mut result = 0u8;
        for (a, b) in computed.iter().zip(expected.iter()) {
            result |= a ^ b;
        }
        result == 0
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizedKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Password to key transformation (RFC 3414 A.2.1).
pub(crate) fn password_to_key(protocol: AuthProtocol, password: &[u8]) -> Vec<u8> {
    const EXPANSION_SIZE: usize = 1_048_576;

    match protocol {
        AuthProtocol::Md5 => password_to_key_impl::<md5::Md5>(password, EXPANSION_SIZE),
        AuthProtocol::Sha1 => password_to_key_impl::<sha1::Sha1>(password, EXPANSION_SIZE),
    }
}

fn password_to_key_impl<D>(password: &[u8], expansion_size: usize) -> Vec<u8>
where
    D: Digest + Default,
{
    if password.is_empty() {
        return vec![0u8; <D as OutputSizeUser>::output_size()];
    }

    let mut hasher = D::new();

    // Hash the repeated password in 64-byte chunks, as net-snmp does.
    let mut buf = [0u8; 64];
    let mut password_index = 0;
    let mut count = 0;

    while count < expansion_size {
        for byte in &mut buf {
            *byte = password[password_index];
            password_index = (password_index + 1) % password.len();
        }
        hasher.update(buf);
        count += 64;
    }
    buf.zeroize();

    hasher.finalize().to_vec()
}

/// localized_key = H(master_key || engine_id || master_key)
fn localize_key(protocol: AuthProtocol, master_key: &[u8], engine_id: &[u8]) -> Vec<u8> {
    match protocol {
        AuthProtocol::Md5 => localize_key_impl::<md5::Md5>(master_key, engine_id),
        AuthProtocol::Sha1 => localize_key_impl::<sha1::Sha1>(master_key, engine_id),
    }
}

fn localize_key_impl<D>(master_key: &[u8], engine_id: &[u8]) -> Vec<u8>
where
    D: Digest + Default,
{
    let mut hasher = D::new();
    hasher.update(master_key);
    hasher.update(engine_id);
    hasher.update(master_key);
    hasher.finalize().to_vec()
}

type HmacMd5 = Hmac<md5::Md5>;
type HmacSha1 = Hmac<sha1::Sha1>;

// HMAC takes keys of any length, so key setup cannot fail for these two.
fn hmac_md5(key: &[u8], data: &[u8], truncate_len: usize) -> Vec<u8> {
    let Ok(mut mac) = <HmacMd5 as KeyInit>::new_from_slice(key) else {
        return vec![0u8; truncate_len];
    };
    Mac::update(&mut mac, data);
    mac.finalize().into_bytes()[..truncate_len].to_vec()
}

fn hmac_sha1(key: &[u8], data: &[u8], truncate_len: usize) -> Vec<u8> {
    let Ok(mut mac) = <HmacSha1 as KeyInit>::new_from_slice(key) else {
        return vec![0u8; truncate_len];
    };
    Mac::update(&mut mac, data);
    mac.finalize().into_bytes()[..truncate_len].to_vec()
}

/// Write the HMAC of `message` into its zeroed auth-params slot.
pub fn authenticate_message(
    key: &LocalizedKey,
    message: &mut [u8],
    auth_offset: usize,
    auth_len: usize,
) {
    let mac = key.compute_hmac(message);
    message[auth_offset..auth_offset + auth_len].copy_from_slice(&mac);
}

/// Check the HMAC carried in an incoming message.
pub fn verify_message(
    key: &LocalizedKey,
    message: &[u8],
    auth_offset: usize,
    auth_len: usize,
) -> bool {
    let Some(received_mac) = message.get(auth_offset..auth_offset + auth_len) else {
        return false;
    };

    let mut msg_copy = message.to_vec();
    msg_copy[auth_offset..auth_offset + auth_len].fill(0);

    key.verify_hmac(&msg_copy, received_mac)
}
