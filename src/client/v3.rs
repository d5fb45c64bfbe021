//! SNMPv3 client side: USM configuration, engine discovery, message
//! protection and response processing.

use std::sync::PoisonError;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{Span, instrument};
use zeroize::Zeroizing;

use crate::ber::Decoder;
use crate::error::{CryptoErrorKind, Error, ErrorStatus, Result};
use crate::format::hex;
use crate::message::{
    MSG_MAX_SIZE, Message, MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message,
    V3MessageData,
};
use crate::pdu::{Pdu, PduType};
use crate::transport::Transport;
use crate::v3::auth::{authenticate_message, verify_message};
use crate::v3::{
    AuthProtocol, EngineState, LocalizedKey, PrivKey, PrivProtocol, UsmSecurityParams,
    is_decryption_error_report, is_not_in_time_window_report, is_unknown_engine_id_report,
    is_unknown_user_name_report, is_unsupported_sec_level_report, is_wrong_digest_report,
    parse_discovery_response,
};

use super::Client;

/// USM user settings carried in [`ClientConfig`](super::ClientConfig).
#[derive(Clone)]
pub struct V3SecurityConfig {
    pub username: Bytes,
    pub auth: Option<(AuthProtocol, Zeroizing<Vec<u8>>)>,
    pub privacy: Option<(PrivProtocol, Zeroizing<Vec<u8>>)>,
}

impl V3SecurityConfig {
    pub fn new(username: impl Into<Bytes>) -> Self {
        Self {
            username: username.into(),
            auth: None,
            privacy: None,
        }
    }

    pub fn auth(mut self, protocol: AuthProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.auth = Some((protocol, Zeroizing::new(password.into())));
        self
    }

    pub fn privacy(mut self, protocol: PrivProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.privacy = Some((protocol, Zeroizing::new(password.into())));
        self
    }

    /// Privacy without authentication degrades to noAuthNoPriv.
    pub fn security_level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (None, _) => SecurityLevel::NoAuthNoPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
        }
    }

    /// Localize the configured passwords to `engine_id`.
    pub(super) fn derive_keys(&self, engine_id: &[u8]) -> V3DerivedKeys {
        tracing::trace!(
            target: "snmp_cache::client",
            { engine_id_len = engine_id.len(), has_auth = self.auth.is_some(), has_priv = self.privacy.is_some() },
            "deriving localized keys"
        );

        let auth_key = self
            .auth
            .as_ref()
            .map(|(protocol, password)| LocalizedKey::from_password(*protocol, password, engine_id));

        let priv_key = match (&self.auth, &self.privacy) {
            (Some((auth_protocol, _)), Some((priv_protocol, password))) => Some(
                PrivKey::from_password(*auth_protocol, *priv_protocol, password, engine_id),
            ),
            _ => None,
        };

        V3DerivedKeys { auth_key, priv_key }
    }
}

impl std::fmt::Debug for V3SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V3SecurityConfig")
            .field("username", &String::from_utf8_lossy(&self.username))
            .field("auth", &self.auth.as_ref().map(|(p, _)| p))
            .field("privacy", &self.privacy.as_ref().map(|(p, _)| p))
            .finish()
    }
}

/// Keys localized to the discovered engine.
pub(super) struct V3DerivedKeys {
    pub auth_key: Option<LocalizedKey>,
    pub priv_key: Option<PrivKey>,
}

/// What a matching v3 reply turned out to be.
#[derive(Debug)]
pub(super) enum V3Reply {
    Pdu(Pdu),
    /// usmStatsNotInTimeWindows report carrying the agent's clock.
    NotInTimeWindow { boots: u32, time: u32 },
}

impl<T: Transport> Client<T> {
    fn security(&self) -> Result<&V3SecurityConfig> {
        self.inner
            .config
            .v3_security
            .as_ref()
            .ok_or_else(|| Error::Config("no SNMPv3 security configured".into()).boxed())
    }

    fn engine_snapshot(&self) -> Option<EngineState> {
        self.inner
            .engine_state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_engine(&self, engine: EngineState) -> Result<()> {
        let keys = self.security()?.derive_keys(&engine.engine_id);
        *self
            .inner
            .derived_keys
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(keys);
        *self
            .inner
            .engine_state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(engine);
        Ok(())
    }

    /// Forget the engine so the next request rediscovers it.
    fn forget_engine(&self) {
        *self
            .inner
            .engine_state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        *self
            .inner
            .derived_keys
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Discover engine ID, boots and time unless already known.
    #[instrument(level = "debug", skip(self), fields(snmp.target = %self.peer_addr()))]
    pub(super) async fn ensure_engine_discovered(&self) -> Result<()> {
        if self.engine_snapshot().is_some() {
            return Ok(());
        }

        let target = self.peer_addr();
        let max_attempts = self.inner.config.retry.max_attempts;
        let start = Instant::now();

        for attempt in 0..=max_attempts {
            let msg_id = self.next_request_id();
            tracing::debug!(target: "snmp_cache::client", { snmp.msg_id = msg_id, snmp.attempt = attempt }, "performing engine discovery");
            let discovery = V3Message::discovery_request(msg_id).encode();
            self.inner.transport.send(&discovery).await?;

            let reply = self
                .recv_until(msg_id, |data| match Message::decode_from(data, target)? {
                    Message::V3(msg) if msg.msg_id() == msg_id => Ok(Some(msg)),
                    _ => Ok(None),
                })
                .await;

            match reply {
                Ok(msg) => {
                    let engine = parse_discovery_response(&msg.security_params, target)?;
                    tracing::debug!(
                        target: "snmp_cache::client",
                        { snmp.engine_id = %hex::Bytes(&engine.engine_id), snmp.engine_boots = engine.engine_boots, snmp.engine_time = engine.engine_time },
                        "engine discovered"
                    );
                    return self.store_engine(engine);
                }
                Err(e) if matches!(*e, Error::Timeout { .. }) => {
                    if attempt < max_attempts {
                        self.backoff(attempt).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Timeout {
            target,
            elapsed: start.elapsed(),
            retries: max_attempts,
        }
        .boxed())
    }

    /// Encode, encrypt and sign `pdu` with the current engine time.
    pub(super) fn build_v3_message(&self, pdu: &Pdu) -> Result<Vec<u8>> {
        let security = self.security()?;
        let security_level = security.security_level();
        let engine = self
            .engine_snapshot()
            .ok_or_else(|| Error::Config("SNMPv3 engine not discovered".into()).boxed())?;

        let derived = self
            .inner
            .derived_keys
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let keys = derived.as_ref();

        let engine_boots = engine.engine_boots;
        let engine_time = engine.estimated_time();
        let scoped_pdu = ScopedPdu::new(engine.engine_id.clone(), Bytes::new(), pdu.clone());

        let (data, priv_params) = if security_level.requires_priv() {
            let priv_key = keys
                .and_then(|k| k.priv_key.as_ref())
                .ok_or_else(|| Error::crypto(Some(self.peer_addr()), CryptoErrorKind::NoPrivKey))?;
            let plaintext = scoped_pdu.encode_to_bytes();
            let (ciphertext, salt) = priv_key
                .encrypt(&plaintext, engine_boots, engine_time, &self.inner.salt_counter)
                .map_err(|e| match *e {
                    Error::Crypto { kind, .. } => Error::crypto(Some(self.peer_addr()), kind),
                    _ => e,
                })?;
            tracing::trace!(
                target: "snmp_cache::client",
                { plaintext_len = plaintext.len(), ciphertext_len = ciphertext.len() },
                "encrypted scoped PDU"
            );
            (V3MessageData::Encrypted(ciphertext), salt)
        } else {
            (V3MessageData::Plaintext(scoped_pdu), Bytes::new())
        };

        let mut usm = UsmSecurityParams::new(
            engine.engine_id.clone(),
            engine_boots,
            engine_time,
            security.username.clone(),
        );
        let auth_key = if security_level.requires_auth() {
            let key = keys
                .and_then(|k| k.auth_key.as_ref())
                .ok_or_else(|| Error::Auth { target: self.peer_addr() }.boxed())?;
            usm = usm.with_auth_placeholder(key.mac_len());
            Some(key)
        } else {
            None
        };
        if security_level.requires_priv() {
            usm = usm.with_priv_params(priv_params);
        }

        let global_data = MsgGlobalData::new(
            pdu.request_id,
            MSG_MAX_SIZE,
            MsgFlags::new(security_level, true),
        );
        let mut encoded = V3Message::new(global_data, usm.encode(), data).encode().to_vec();

        if let Some(key) = auth_key {
            let Some((offset, len)) = UsmSecurityParams::find_auth_params_offset(&encoded) else {
                tracing::debug!(target: "snmp_cache::client", "auth params not found in encoded message");
                return Err(Error::Auth {
                    target: self.peer_addr(),
                }
                .boxed());
            };
            authenticate_message(key, &mut encoded, offset, len);
            tracing::trace!(target: "snmp_cache::client", { auth_params_offset = offset, auth_params_len = len }, "applied HMAC authentication");
        }

        Ok(encoded)
    }

    /// Check, decrypt and classify a datagram received for `request_id`.
    ///
    /// `Ok(None)` means the datagram answers some other request.
    pub(super) fn process_v3_response(&self, data: Bytes, request_id: i32) -> Result<Option<V3Reply>> {
        let target = self.peer_addr();
        let security_level = self.security()?.security_level();

        let msg = match Message::decode_from(data.clone(), target)? {
            Message::V3(msg) => msg,
            Message::Community(_) => {
                tracing::debug!(target: "snmp_cache::client", { snmp.target = %target }, "community message in reply to v3 request");
                return Err(Error::MalformedResponse { target }.boxed());
            }
        };
        if msg.msg_id() != request_id {
            tracing::debug!(
                target: "snmp_cache::client",
                { snmp.target = %target, snmp.msg_id = request_id, snmp.received_id = msg.msg_id() },
                "discarding response with mismatched msgID"
            );
            return Ok(None);
        }

        let usm = UsmSecurityParams::decode(msg.security_params.clone())
            .map_err(|_| Error::MalformedResponse { target }.boxed())?;
        let authenticated = msg.security_level().requires_auth();

        let derived = self
            .inner
            .derived_keys
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        if authenticated {
            let key = derived
                .as_ref()
                .and_then(|k| k.auth_key.as_ref())
                .ok_or_else(|| Error::Auth { target }.boxed())?;
            let Some((offset, len)) = UsmSecurityParams::find_auth_params_offset(&data) else {
                tracing::debug!(target: "snmp_cache::client", { snmp.target = %target }, "auth params not found in response");
                return Err(Error::Auth { target }.boxed());
            };
            if !verify_message(key, &data, offset, len) {
                tracing::debug!(target: "snmp_cache::client", { snmp.target = %target }, "HMAC verification failed");
                return Err(Error::Auth { target }.boxed());
            }
        }

        let pdu = match msg.data {
            V3MessageData::Plaintext(scoped) => scoped.pdu,
            V3MessageData::Encrypted(ciphertext) => {
                let priv_key = derived
                    .as_ref()
                    .and_then(|k| k.priv_key.as_ref())
                    .ok_or_else(|| Error::crypto(Some(target), CryptoErrorKind::NoPrivKey))?;
                let plaintext = priv_key
                    .decrypt(&ciphertext, usm.engine_boots, usm.engine_time, &usm.priv_params)
                    .map_err(|e| match *e {
                        Error::Crypto { kind, .. } => Error::crypto(Some(target), kind),
                        _ => e,
                    })?;
                let mut decoder = Decoder::with_target(plaintext, target);
                ScopedPdu::decode(&mut decoder)?.pdu
            }
        };
        drop(derived);

        if pdu.pdu_type == PduType::Report {
            return self.classify_report(&pdu, &usm).map(Some);
        }

        if security_level.requires_auth() && !authenticated {
            tracing::debug!(target: "snmp_cache::client", { snmp.target = %target }, "unauthenticated response to authenticated request");
            return Err(Error::Auth { target }.boxed());
        }
        if pdu.request_id != request_id {
            tracing::debug!(
                target: "snmp_cache::client",
                { snmp.target = %target, snmp.request_id = request_id, snmp.received_id = pdu.request_id },
                "discarding response with mismatched request id"
            );
            return Ok(None);
        }

        if authenticated
            && let Some(state) = self
                .inner
                .engine_state
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .as_mut()
        {
            state.update_time(usm.engine_boots, usm.engine_time);
        }

        Ok(Some(V3Reply::Pdu(pdu)))
    }

    fn classify_report(&self, pdu: &Pdu, usm: &UsmSecurityParams) -> Result<V3Reply> {
        let target = self.peer_addr();

        if is_not_in_time_window_report(pdu) {
            return Ok(V3Reply::NotInTimeWindow {
                boots: usm.engine_boots,
                time: usm.engine_time,
            });
        }
        if is_unknown_engine_id_report(pdu) {
            tracing::debug!(target: "snmp_cache::client", { snmp.target = %target }, "agent no longer knows our engine ID");
            self.forget_engine();
            return Err(Error::Auth { target }.boxed());
        }
        if is_wrong_digest_report(pdu)
            || is_unknown_user_name_report(pdu)
            || is_unsupported_sec_level_report(pdu)
        {
            tracing::debug!(
                target: "snmp_cache::client",
                { snmp.target = %target, snmp.report_oid = ?pdu.varbinds.first().map(|vb| vb.oid.to_string()) },
                "agent rejected credentials"
            );
            return Err(Error::Auth { target }.boxed());
        }
        if is_decryption_error_report(pdu) {
            return Err(Error::crypto(Some(target), CryptoErrorKind::CipherError));
        }

        Err(Error::Snmp {
            target,
            status: ErrorStatus::GenErr,
            index: 0,
            oid: pdu.varbinds.first().map(|vb| vb.oid.clone()),
        }
        .boxed())
    }

    /// Adopt the agent's clock from a notInTimeWindow report.
    fn resync_engine_time(&self, boots: u32, time: u32) {
        let mut state = self
            .inner
            .engine_state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = state.as_mut() {
            tracing::debug!(
                target: "snmp_cache::client",
                { snmp.engine_boots = boots, snmp.engine_time = time },
                "resynchronizing engine time"
            );
            *engine = EngineState::new(engine.engine_id.clone(), boots, time);
        }
    }

    /// Send a v3 request, discovering the engine first if needed.
    ///
    /// Timeouts are retried per the retry policy. A notInTimeWindow report
    /// resynchronizes the clock and resends once without using up an attempt.
    #[instrument(
        level = "debug",
        skip(self, pdu),
        fields(
            snmp.target = %self.peer_addr(),
            snmp.request_id = pdu.request_id,
            snmp.security_level = ?self.inner.config.v3_security.as_ref().map(|s| s.security_level()),
            snmp.attempt = tracing::field::Empty,
            snmp.elapsed_ms = tracing::field::Empty,
        )
    )]
    pub(super) async fn send_v3_and_recv(&self, pdu: Pdu) -> Result<Pdu> {
        let start = Instant::now();
        self.ensure_engine_discovered().await?;

        let request_id = pdu.request_id;
        let max_attempts = self.inner.config.retry.max_attempts;
        let mut attempt = 0;
        let mut resynced = false;

        loop {
            Span::current().record("snmp.attempt", attempt);

            let data = self.build_v3_message(&pdu)?;
            tracing::debug!(
                target: "snmp_cache::client",
                { snmp.pdu_type = %pdu.pdu_type, snmp.bytes = data.len() },
                "sending V3 {} request",
                pdu.pdu_type
            );
            self.inner.transport.send(&data).await?;

            let reply = self
                .recv_until(request_id, |bytes| self.process_v3_response(bytes, request_id))
                .await;

            match reply {
                Ok(V3Reply::Pdu(response)) => {
                    Span::current().record("snmp.elapsed_ms", start.elapsed().as_millis() as u64);
                    return self.check_error_status(response);
                }
                Ok(V3Reply::NotInTimeWindow { boots, time }) if !resynced => {
                    self.resync_engine_time(boots, time);
                    resynced = true;
                }
                Ok(V3Reply::NotInTimeWindow { .. }) => {
                    tracing::debug!(target: "snmp_cache::client", "still not in time window after resync");
                    Span::current().record("snmp.elapsed_ms", start.elapsed().as_millis() as u64);
                    return Err(Error::Auth {
                        target: self.peer_addr(),
                    }
                    .boxed());
                }
                Err(e) if matches!(*e, Error::Timeout { .. }) => {
                    if attempt >= max_attempts {
                        break;
                    }
                    self.backoff(attempt).await;
                    attempt += 1;
                    tracing::debug!(target: "snmp_cache::client", "retrying V3 request");
                }
                Err(e) => {
                    Span::current().record("snmp.elapsed_ms", start.elapsed().as_millis() as u64);
                    return Err(e);
                }
            }
        }

        Span::current().record("snmp.elapsed_ms", start.elapsed().as_millis() as u64);
        Err(Error::Timeout {
            target: self.peer_addr(),
            elapsed: start.elapsed(),
            retries: max_attempts,
        }
        .boxed())
    }
}
