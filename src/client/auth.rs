//! Authentication settings for [`Client`](super::Client).
//!
//! ```rust
//! use snmp_cache::Auth;
//! use snmp_cache::v3::{AuthProtocol, PrivProtocol};
//!
//! let v2c = Auth::v2c("public");
//! let v3: Auth = Auth::usm("monitor")
//!     .auth(AuthProtocol::Sha1, "authpass123")
//!     .privacy(PrivProtocol::Aes128, "privpass123")
//!     .into();
//! # let _ = (v2c, v3);
//! ```

use crate::v3::{AuthProtocol, PrivProtocol};

/// How a client authenticates.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Auth {
    /// SNMPv2c community string.
    Community { community: String },
    /// SNMPv3 User-based Security Model.
    Usm(UsmAuth),
}

impl Default for Auth {
    fn default() -> Self {
        Auth::v2c("public")
    }
}

impl Auth {
    pub fn v2c(community: impl Into<String>) -> Self {
        Auth::Community {
            community: community.into(),
        }
    }

    /// Start a USM configuration. Without `auth`/`privacy` the user is
    /// noAuthNoPriv.
    pub fn usm(username: impl Into<String>) -> UsmBuilder {
        UsmBuilder::new(username)
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Community { .. } => f.debug_struct("Community").finish_non_exhaustive(),
            Auth::Usm(usm) => f.debug_tuple("Usm").field(usm).finish(),
        }
    }
}

/// SNMPv3 USM user.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UsmAuth {
    pub username: String,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub auth_protocol: Option<AuthProtocol>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub auth_password: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub priv_protocol: Option<PrivProtocol>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub priv_password: Option<String>,
}

impl std::fmt::Debug for UsmAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsmAuth")
            .field("username", &self.username)
            .field("auth_protocol", &self.auth_protocol)
            .field("priv_protocol", &self.priv_protocol)
            .finish_non_exhaustive()
    }
}

/// Builder returned by [`Auth::usm`].
pub struct UsmBuilder {
    username: String,
    auth: Option<(AuthProtocol, String)>,
    privacy: Option<(PrivProtocol, String)>,
}

impl UsmBuilder {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            auth: None,
            privacy: None,
        }
    }

    pub fn auth(mut self, protocol: AuthProtocol, password: impl Into<String>) -> Self {
        self.auth = Some((protocol, password.into()));
        self
    }

    /// Privacy needs `auth` as well; the builder's `connect` rejects it otherwise.
    pub fn privacy(mut self, protocol: PrivProtocol, password: impl Into<String>) -> Self {
        self.privacy = Some((protocol, password.into()));
        self
    }
}

impl From<UsmBuilder> for Auth {
    fn from(b: UsmBuilder) -> Auth {
        let (auth_protocol, auth_password) = b.auth.unzip();
        let (priv_protocol, priv_password) = b.privacy.unzip();
        Auth::Usm(UsmAuth {
            username: b.username,
            auth_protocol,
            auth_password,
            priv_protocol,
            priv_password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_public_v2c() {
        match Auth::default() {
            Auth::Community { community } => assert_eq!(community, "public"),
            other => panic!("expected community, got {other:?}"),
        }
    }

    #[test]
    fn usm_without_security() {
        let auth: Auth = Auth::usm("readonly").into();
        match auth {
            Auth::Usm(usm) => {
                assert_eq!(usm.username, "readonly");
                assert!(usm.auth_protocol.is_none());
                assert!(usm.priv_password.is_none());
            }
            other => panic!("expected USM, got {other:?}"),
        }
    }

    #[test]
    fn usm_auth_priv() {
        let auth: Auth = Auth::usm("admin")
            .auth(AuthProtocol::Md5, "authpass")
            .privacy(PrivProtocol::Des, "privpass")
            .into();
        let Auth::Usm(usm) = auth else {
            panic!("expected USM");
        };
        assert_eq!(usm.auth_protocol, Some(AuthProtocol::Md5));
        assert_eq!(usm.auth_password.as_deref(), Some("authpass"));
        assert_eq!(usm.priv_protocol, Some(PrivProtocol::Des));
        assert_eq!(usm.priv_password.as_deref(), Some("privpass"));
    }

    #[test]
    fn debug_hides_secrets() {
        let auth = Auth::v2c("s3cret");
        assert!(!format!("{auth:?}").contains("s3cret"));

        let auth: Auth = Auth::usm("admin").auth(AuthProtocol::Sha1, "hunter22").into();
        let dbg = format!("{auth:?}");
        assert!(dbg.contains("admin"));
        assert!(!dbg.contains("hunter22"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_from_config() {
        let auth: Auth = serde_json::from_str(r#"{"community": "ops"}"#).unwrap();
        assert!(matches!(auth, Auth::Community { ref community } if community == "ops"));

        let auth: Auth = serde_json::from_str(
            r#"{"username": "monitor", "auth_protocol": "Sha1", "auth_password": "authpass123"}"#,
        )
        .unwrap();
        let Auth::Usm(usm) = auth else {
            panic!("expected USM");
        };
        assert_eq!(usm.auth_protocol, Some(AuthProtocol::Sha1));
        assert!(usm.priv_protocol.is_none());
    }
}
