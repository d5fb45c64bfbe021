//! Privacy (encryption) for SNMPv3 (RFC 3414, RFC 3826).
//!
//! ## DES-CBC
//! - Salt (privParameters): engineBoots (4 bytes) || counter (4 bytes)
//! - IV: pre-IV XOR salt, where pre-IV is the last 8 bytes of the 16-byte key
//!
//! ## AES-128-CFB
//! - Salt (privParameters): 64-bit counter
//! - IV: engineBoots || engineTime || salt (concatenation, not XOR)

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::auth::LocalizedKey;
use super::{AuthProtocol, PrivProtocol};
use crate::error::{CryptoErrorKind, Error, Result};

/// Non-zero u64 from the OS random source.
fn random_nonzero_u64() -> u64 {
    let mut buf = [0u8; 8];
    loop {
        if let Err(e) = getrandom::fill(&mut buf) {
            tracing::warn!(target: "snmp_cache::crypto", { error = %e }, "OS randomness unavailable; seeding salt from clock");
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(1);
            return nanos.max(1);
        }
        let val = u64::from_ne_bytes(buf);
        if val != 0 {
            return val;
        }
    }
}

/// Thread-safe salt counter shared across encryptions.
#[derive(Debug)]
pub struct SaltCounter(AtomicU64);

impl SaltCounter {
    /// Counter seeded from cryptographic randomness.
    pub fn new() -> Self {
        Self(AtomicU64::new(random_nonzero_u64()))
    }

    pub fn from_value(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Next salt value. Zero is skipped on wraparound, as net-snmp does.
    pub fn next(&self) -> u64 {
        let val = self.0.fetch_add(1, Ordering::SeqCst);
        if val == 0 {
            self.0.fetch_add(1, Ordering::SeqCst)
        } else {
            val
        }
    }
}

impl Default for SaltCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Privacy key for encryption/decryption.
///
/// Derived like an authentication key (RFC 3414 A.2) and then split by
/// protocol: DES uses 8 key bytes plus an 8-byte pre-IV, AES-128 the first
/// 16 bytes. Key material is zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: PrivProtocol,
}

impl PrivKey {
    pub fn from_password(
        auth_protocol: AuthProtocol,
        priv_protocol: PrivProtocol,
        password: &[u8],
        engine_id: &[u8],
    ) -> Self {
        let localized = LocalizedKey::from_password(auth_protocol, password, engine_id);
        Self {
            key: localized.as_bytes().to_vec(),
            protocol: priv_protocol,
        }
    }

    /// Wrap raw localized key bytes.
    pub fn from_bytes(protocol: PrivProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> PrivProtocol {
        self.protocol
    }

    fn key_parts(&self) -> Result<(&[u8], &[u8])> {
        if self.key.len() < self.protocol.key_len() {
            return Err(Error::crypto(None, CryptoErrorKind::InvalidKeyLength));
        }
        Ok(match self.protocol {
            PrivProtocol::Des => (&self.key[..8], &self.key[8..16]),
            PrivProtocol::Aes128 => (&self.key[..16], &[][..]),
        })
    }

    /// Encrypt a serialized ScopedPDU, returning `(ciphertext, privParameters)`.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt_counter: &SaltCounter,
    ) -> Result<(Bytes, Bytes)> {
        let salt = salt_counter.next();
        match self.protocol {
            PrivProtocol::Des => self.encrypt_des(plaintext, engine_boots, salt),
            PrivProtocol::Aes128 => self.encrypt_aes(plaintext, engine_boots, engine_time, salt),
        }
    }

    /// Decrypt msgData using the privParameters carried in the message.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes> {
        let Ok(salt) = <[u8; 8]>::try_from(priv_params) else {
            return Err(Error::crypto(
                None,
                CryptoErrorKind::InvalidPrivParamsLength {
                    actual: priv_params.len(),
                },
            ));
        };

        match self.protocol {
            PrivProtocol::Des => self.decrypt_des(ciphertext, &salt),
            PrivProtocol::Aes128 => self.decrypt_aes(ciphertext, engine_boots, engine_time, &salt),
        }
    }

    /// DES-CBC (RFC 3414 Section 8.1.1).
    fn encrypt_des(&self, plaintext: &[u8], engine_boots: u32, salt_int: u64) -> Result<(Bytes, Bytes)> {
        use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
        type DesCbc = cbc::Encryptor<des::Des>;

        let (key, pre_iv) = self.key_parts()?;

        let mut salt = [0u8; 8];
        salt[..4].copy_from_slice(&engine_boots.to_be_bytes());
        salt[4..].copy_from_slice(&(salt_int as u32).to_be_bytes());
        let iv = xor_iv(pre_iv, &salt);

        // Zero-pad to the block size; the receiver ignores trailing bytes
        // after the ScopedPDU.
        let padded_len = plaintext.len().div_ceil(8) * 8;
        let mut buffer = vec![0u8; padded_len.max(8)];
        buffer[..plaintext.len()].copy_from_slice(plaintext);
        let len = buffer.len();

        let cipher = DesCbc::new_from_slices(key, &iv)
            .map_err(|_| Error::crypto(None, CryptoErrorKind::InvalidKeyLength))?;
        let ciphertext = cipher
            .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
            .map_err(|_| Error::crypto(None, CryptoErrorKind::CipherError))?;

        Ok((Bytes::copy_from_slice(ciphertext), Bytes::copy_from_slice(&salt)))
    }

    fn decrypt_des(&self, ciphertext: &[u8], salt: &[u8; 8]) -> Result<Bytes> {
        use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding};
        type DesCbc = cbc::Decryptor<des::Des>;

        if !ciphertext.len().is_multiple_of(8) {
            return Err(Error::crypto(
                None,
                CryptoErrorKind::InvalidCiphertextLength {
                    length: ciphertext.len(),
                },
            ));
        }

        let (key, pre_iv) = self.key_parts()?;
        let iv = xor_iv(pre_iv, salt);

        let cipher = DesCbc::new_from_slices(key, &iv)
            .map_err(|_| Error::crypto(None, CryptoErrorKind::InvalidKeyLength))?;
        let mut buffer = ciphertext.to_vec();
        let plaintext = cipher
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map_err(|_| Error::crypto(None, CryptoErrorKind::CipherError))?;

        Ok(Bytes::copy_from_slice(plaintext))
    }

    /// AES-128-CFB (RFC 3826 Section 3.1).
    fn encrypt_aes(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: u64,
    ) -> Result<(Bytes, Bytes)> {
        use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
        type Aes128Cfb = cfb_mode::Encryptor<aes::Aes128>;

        let (key, _) = self.key_parts()?;
        let salt_bytes = salt.to_be_bytes();
        let iv = aes_iv(engine_boots, engine_time, &salt_bytes);

        let mut buffer = plaintext.to_vec();
        let cipher = Aes128Cfb::new_from_slices(key, &iv)
            .map_err(|_| Error::crypto(None, CryptoErrorKind::InvalidKeyLength))?;
        cipher.encrypt(&mut buffer);

        Ok((Bytes::from(buffer), Bytes::copy_from_slice(&salt_bytes)))
    }

    fn decrypt_aes(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: &[u8; 8],
    ) -> Result<Bytes> {
        use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
        type Aes128Cfb = cfb_mode::Decryptor<aes::Aes128>;

        let (key, _) = self.key_parts()?;
        let iv = aes_iv(engine_boots, engine_time, salt);

        let mut buffer = ciphertext.to_vec();
        let cipher = Aes128Cfb::new_from_slices(key, &iv)
            .map_err(|_| Error::crypto(None, CryptoErrorKind::InvalidKeyLength))?;
        cipher.decrypt(&mut buffer);

        Ok(Bytes::from(buffer))
    }
}

fn xor_iv(pre_iv: &[u8], salt: &[u8; 8]) -> [u8; 8] {
    let mut iv = [0u8; 8];
    for (i, byte) in iv.iter_mut().enumerate() {
        *byte = pre_iv[i] ^ salt[i];
    }
    iv
}

fn aes_iv(engine_boots: u32, engine_time: u32, salt: &[u8; 8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
    iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
    iv[8..].copy_from_slice(salt);
    iv
}

impl std::fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::hex::decode as decode_hex;

    fn engine_id() -> Vec<u8> {
        decode_hex("80001f8880e9630000d61ff449").unwrap()
    }

    #[test]
    fn des_roundtrip_pads_to_block() {
        let key = PrivKey::from_password(AuthProtocol::Md5, PrivProtocol::Des, b"privpass1", &engine_id());
        let salts = SaltCounter::from_value(0x0102_0304);
        let plaintext = b"scoped pdu bytes";

        let (ciphertext, params) = key.encrypt(plaintext, 7, 100, &salts).unwrap();
        assert_eq!(ciphertext.len() % 8, 0);
        assert_eq!(&params[..4], &7u32.to_be_bytes());
        assert_eq!(&params[4..], &0x0102_0304u32.to_be_bytes());

        let decrypted = key.decrypt(&ciphertext, 7, 100, &params).unwrap();
        assert_eq!(&decrypted[..plaintext.len()], plaintext);
    }

    #[test]
    fn aes_roundtrip_keeps_length() {
        let key = PrivKey::from_password(AuthProtocol::Sha1, PrivProtocol::Aes128, b"privpass1", &engine_id());
        let salts = SaltCounter::from_value(42);
        let plaintext = b"odd length payload!";

        let (ciphertext, params) = key.encrypt(plaintext, 3, 1234, &salts).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len());
        assert_eq!(&params[..], &42u64.to_be_bytes());

        let decrypted = key.decrypt(&ciphertext, 3, 1234, &params).unwrap();
        assert_eq!(&decrypted[..], plaintext);

        // Engine time is part of the IV.
        let wrong = key.decrypt(&ciphertext, 3, 1235, &params).unwrap();
        assert_ne!(&wrong[..], plaintext);
    }

    #[test]
    fn rejects_bad_params_and_lengths() {
        let key = PrivKey::from_bytes(PrivProtocol::Des, vec![1u8; 16]);
        let err = key.decrypt(&[0u8; 16], 0, 0, &[0u8; 4]).unwrap_err();
        assert!(matches!(
            *err,
            Error::Crypto {
                kind: CryptoErrorKind::InvalidPrivParamsLength { actual: 4 },
                ..
            }
        ));

        let err = key.decrypt(&[0u8; 15], 0, 0, &[0u8; 8]).unwrap_err();
        assert!(matches!(
            *err,
            Error::Crypto {
                kind: CryptoErrorKind::InvalidCiphertextLength { length: 15 },
                ..
            }
        ));

        let short = PrivKey::from_bytes(PrivProtocol::Aes128, vec![1u8; 8]);
        assert!(short.encrypt(b"x", 0, 0, &SaltCounter::from_value(1)).is_err());
    }

    #[test]
    fn salt_counter_skips_zero() {
        let counter = SaltCounter::from_value(u64::MAX);
        assert_eq!(counter.next(), u64::MAX);
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);
    }

    #[test]
    fn successive_encryptions_differ() {
        let key = PrivKey::from_bytes(PrivProtocol::Aes128, vec![9u8; 16]);
        let salts = SaltCounter::new();
        let (a, pa) = key.encrypt(b"same plaintext", 1, 1, &salts).unwrap();
        let (b, pb) = key.encrypt(b"same plaintext", 1, 1, &salts).unwrap();
        assert_ne!(pa, pb);
        assert_ne!(a, b);
    }
}
