//! Engine discovery and time synchronization (RFC 3414 Section 4).
//!
//! 1. The client sends a noAuthNoPriv request with an empty engine ID.
//! 2. The agent answers with a Report carrying usmStatsUnknownEngineIDs.
//! 3. The Report's USM parameters hold the engine ID, boots and time.
//!
//! After that the client tracks engine time locally and re-syncs whenever
//! an authenticated response or a notInTimeWindow Report arrives.

use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::v3::UsmSecurityParams;

/// Time window in seconds (RFC 3414 Section 2.2.3).
pub const TIME_WINDOW: u32 = 150;

/// snmpEngineTime is a 31-bit value.
pub const MAX_ENGINE_TIME: u32 = 2147483647;

/// usmStats prefix, 1.3.6.1.6.3.15.1.1; the counter arc follows.
const USM_STATS: [u32; 9] = [1, 3, 6, 1, 6, 3, 15, 1, 1];

const UNSUPPORTED_SEC_LEVELS: u32 = 1;
const NOT_IN_TIME_WINDOWS: u32 = 2;
const UNKNOWN_USER_NAMES: u32 = 3;
const UNKNOWN_ENGINE_IDS: u32 = 4;
const WRONG_DIGESTS: u32 = 5;
const DECRYPTION_ERRORS: u32 = 6;

/// Discovered engine state.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    /// Engine time at last sync.
    pub engine_time: u32,
    /// Local instant `engine_time` was received.
    pub synced_at: Instant,
    /// Highest engine time seen in this boot cycle (RFC 3414 Section 2.3).
    pub latest_received_engine_time: u32,
}

impl EngineState {
    pub fn new(engine_id: Bytes, engine_boots: u32, engine_time: u32) -> Self {
        Self {
            engine_id,
            engine_boots,
            engine_time,
            synced_at: Instant::now(),
            latest_received_engine_time: engine_time,
        }
    }

    /// Synced engine time plus local elapsed time, capped at 2^31-1.
    pub fn estimated_time(&self) -> u32 {
        let elapsed = u32::try_from(self.synced_at.elapsed().as_secs()).unwrap_or(u32::MAX);
        self.engine_time.saturating_add(elapsed).min(MAX_ENGINE_TIME)
    }

    /// Adopt the boots/time of an authenticated response (RFC 3414 3.2
    /// step 7b): a newer boot cycle, or a later time in the same cycle.
    pub fn update_time(&mut self, response_boots: u32, response_time: u32) -> bool {
        let newer = response_boots > self.engine_boots
            || (response_boots == self.engine_boots
                && response_time > self.latest_received_engine_time);
        if newer {
            self.engine_boots = response_boots;
            self.engine_time = response_time;
            self.synced_at = Instant::now();
            self.latest_received_engine_time = response_time;
        }
        newer
    }

    /// Whether a message's boots/time falls inside the 150 second window.
    pub fn is_in_time_window(&self, msg_boots: u32, msg_time: u32) -> bool {
        // latched boots never authenticate
        if self.engine_boots == MAX_ENGINE_TIME {
            return false;
        }
        if msg_boots != self.engine_boots {
            return false;
        }
        msg_time.abs_diff(self.estimated_time()) <= TIME_WINDOW
    }
}

/// Engine state from a discovery Report's USM security parameters.
pub fn parse_discovery_response(security_params: &Bytes, target: SocketAddr) -> Result<EngineState> {
    let usm = UsmSecurityParams::decode(security_params.clone())
        .map_err(|_| Error::MalformedResponse { target }.boxed())?;

    if usm.engine_id.is_empty() {
        tracing::debug!(target: "snmp_cache::engine", { snmp.target = %target }, "discovery response contained empty engine ID");
        return Err(Error::MalformedResponse { target }.boxed());
    }

    tracing::debug!(
        target: "snmp_cache::engine",
        { snmp.target = %target, engine_id = %crate::format::hex::Bytes(&usm.engine_id), engine_boots = usm.engine_boots, engine_time = usm.engine_time },
        "discovered engine"
    );

    Ok(EngineState::new(usm.engine_id, usm.engine_boots, usm.engine_time))
}

fn is_report_for(pdu: &Pdu, counter: u32) -> bool {
    if pdu.pdu_type != PduType::Report {
        return false;
    }
    let oid = Oid::new(USM_STATS.iter().copied().chain([counter, 0]));
    pdu.varbinds.iter().any(|vb| vb.oid == oid)
}

/// usmStatsUnknownEngineIDs: the discovery answer.
pub fn is_unknown_engine_id_report(pdu: &Pdu) -> bool {
    is_report_for(pdu, UNKNOWN_ENGINE_IDS)
}

pub fn is_not_in_time_window_report(pdu: &Pdu) -> bool {
    is_report_for(pdu, NOT_IN_TIME_WINDOWS)
}

pub fn is_wrong_digest_report(pdu: &Pdu) -> bool {
    is_report_for(pdu, WRONG_DIGESTS)
}

pub fn is_unsupported_sec_level_report(pdu: &Pdu) -> bool {
    is_report_for(pdu, UNSUPPORTED_SEC_LEVELS)
}

pub fn is_unknown_user_name_report(pdu: &Pdu) -> bool {
    is_report_for(pdu, UNKNOWN_USER_NAMES)
}

pub fn is_decryption_error_report(pdu: &Pdu) -> bool {
    is_report_for(pdu, DECRYPTION_ERRORS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::value::Value;
    use crate::varbind::VarBind;

    fn report(oid: Oid) -> Pdu {
        Pdu {
            pdu_type: PduType::Report,
            request_id: 1,
            error_status: 0,
            error_index: 0,
            varbinds: vec![VarBind::new(oid, Value::Counter32(1))],
        }
    }

    #[test]
    fn report_classification() {
        let pdu = report(oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0));
        assert!(is_unknown_engine_id_report(&pdu));
        assert!(!is_not_in_time_window_report(&pdu));

        let pdu = report(oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 2, 0));
        assert!(is_not_in_time_window_report(&pdu));

        let pdu = report(oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 5, 0));
        assert!(is_wrong_digest_report(&pdu));
        assert!(!is_decryption_error_report(&pdu));

        assert!(is_unknown_user_name_report(&report(oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 3, 0))));
        assert!(is_unsupported_sec_level_report(&report(oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 1, 0))));

        let mut response = report(oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0));
        response.pdu_type = PduType::Response;
        assert!(!is_unknown_engine_id_report(&response));
    }

    #[test]
    fn time_window() {
        let state = EngineState::new(Bytes::from_static(b"engine"), 5, 1000);
        assert!(state.is_in_time_window(5, 1000));
        assert!(state.is_in_time_window(5, 1140));
        assert!(!state.is_in_time_window(5, 1200));
        assert!(!state.is_in_time_window(4, 1000));

        let latched = EngineState::new(Bytes::from_static(b"engine"), MAX_ENGINE_TIME, 0);
        assert!(!latched.is_in_time_window(MAX_ENGINE_TIME, 0));
    }

    #[test]
    fn update_time_only_moves_forward() {
        let mut state = EngineState::new(Bytes::from_static(b"engine"), 5, 1000);
        assert!(!state.update_time(5, 900));
        assert!(!state.update_time(4, 5000));
        assert!(state.update_time(5, 1100));
        assert_eq!(state.engine_time, 1100);
        assert!(state.update_time(6, 3));
        assert_eq!((state.engine_boots, state.engine_time), (6, 3));
    }

    #[test]
    fn discovery_requires_engine_id() {
        let target = SocketAddr::from(([192, 0, 2, 7], 161));
        let params = UsmSecurityParams::new(&b"\x80\x00\x1f\x88\x04"[..], 3, 77, Bytes::new()).encode();
        let state = parse_discovery_response(&params, target).unwrap();
        assert_eq!(state.engine_boots, 3);
        assert_eq!(state.engine_time, 77);

        let empty = UsmSecurityParams::empty().encode();
        let err = parse_discovery_response(&empty, target).unwrap_err();
        assert_eq!(err.target(), Some(target));
    }
}
