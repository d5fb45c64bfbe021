//! SNMP credentials as the cache layer accepts them.
//!
//! These are validated on construction and convert into a client [`Auth`].
//!
//! ```rust
//! use snmp_cache::credentials::{SnmpCred, SnmpCredV3};
//!
//! let cred = SnmpCredV3::new(Some("monitor"), Some("sha1"), Some("authpass"), None, None).unwrap();
//! assert_eq!(cred.to_string(), "SNMPv3 user: monitor Auth: sha1 Priv: None");
//!
//! let err = SnmpCredV3::new(Some("monitor"), Some("sha512"), Some("x"), None, None).unwrap_err();
//! assert!(err.to_string().starts_with("Unsupported authentication type"));
//! # let _: SnmpCred = cred.into();
//! ```

use std::fmt;

use crate::client::Auth;
use crate::error::{Error, Result};
use crate::v3::{AuthProtocol, PrivProtocol};

const AUTH_SUPPORTED: &str = "[None, 'md5', 'sha1']";
const PRIV_SUPPORTED: &str = "[None, 'des', 'aes']";

/// SNMPv2c community credential.
#[derive(Clone, PartialEq, Eq)]
pub struct SnmpCredV2 {
    pub community: String,
}

impl SnmpCredV2 {
    pub fn new(community: impl Into<String>) -> Self {
        Self {
            community: community.into(),
        }
    }
}

impl fmt::Display for SnmpCredV2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SNMPv2 community: {}", self.community)
    }
}

impl fmt::Debug for SnmpCredV2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnmpCredV2").finish_non_exhaustive()
    }
}

impl From<SnmpCredV2> for Auth {
    fn from(cred: SnmpCredV2) -> Auth {
        Auth::v2c(cred.community)
    }
}

/// SNMPv3 USM credential.
#[derive(Clone, PartialEq, Eq)]
pub struct SnmpCredV3 {
    pub user: String,
    pub auth: Option<AuthProtocol>,
    pub auth_pass: Option<String>,
    pub priv_: Option<PrivProtocol>,
    pub priv_pass: Option<String>,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

fn auth_name(protocol: AuthProtocol) -> &'static str {
    match protocol {
        AuthProtocol::Md5 => "md5",
        AuthProtocol::Sha1 => "sha1",
    }
}

fn priv_name(protocol: PrivProtocol) -> &'static str {
    match protocol {
        PrivProtocol::Des => "des",
        PrivProtocol::Aes128 => "aes",
    }
}

impl SnmpCredV3 {
    /// Validate and build a v3 credential.
    ///
    /// Empty strings are treated as absent. Protocol names are matched
    /// exactly (`md5`, `sha1`, `des`, `aes`).
    pub fn new(
        user: Option<&str>,
        auth: Option<&str>,
        auth_pass: Option<&str>,
        priv_: Option<&str>,
        priv_pass: Option<&str>,
    ) -> Result<Self> {
        let user = user.unwrap_or_default();
        let auth_name_in = non_empty(auth);
        let auth_pass = non_empty(auth_pass).map(str::to_string);
        let priv_name_in = non_empty(priv_);
        let priv_pass = non_empty(priv_pass).map(str::to_string);

        if user.is_empty() {
            return Err(credential("Username missing!".to_string()));
        }

        let auth = match auth_name_in {
            None => None,
            Some("md5") => Some(AuthProtocol::Md5),
            Some("sha1") => Some(AuthProtocol::Sha1),
            Some(other) => {
                return Err(credential(format!(
                    "Unsupported authentication type \"{other}\"! Supported list: {AUTH_SUPPORTED}"
                )));
            }
        };

        let priv_ = match priv_name_in {
            None => None,
            Some("des") => Some(PrivProtocol::Des),
            Some("aes") => Some(PrivProtocol::Aes128),
            Some(other) => {
                return Err(credential(format!(
                    "Unsupported priv type \"{other}\"! Supported priv: {PRIV_SUPPORTED}"
                )));
            }
        };

        if let (Some(a), None) = (auth, &auth_pass) {
            return Err(credential(format!(
                "Auth type {} provided but no password!",
                auth_name(a)
            )));
        }
        if let (Some(p), None) = (priv_, &priv_pass) {
            return Err(credential(format!(
                "Priv type {} provided but no password!",
                priv_name(p)
            )));
        }

        Ok(Self {
            user: user.to_string(),
            auth,
            auth_pass,
            priv_,
            priv_pass,
        })
    }
}

fn credential(msg: String) -> Box<Error> {
    Error::Credential(msg.into()).boxed()
}

impl fmt::Display for SnmpCredV3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SNMPv3 user: {} Auth: {} Priv: {}",
            self.user,
            self.auth.map_or("None", auth_name),
            self.priv_.map_or("None", priv_name)
        )
    }
}

impl fmt::Debug for SnmpCredV3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnmpCredV3")
            .field("user", &self.user)
            .field("auth", &self.auth)
            .field("priv_", &self.priv_)
            .finish_non_exhaustive()
    }
}

impl From<SnmpCredV3> for Auth {
    fn from(cred: SnmpCredV3) -> Auth {
        let mut usm = Auth::usm(cred.user);
        if let (Some(protocol), Some(password)) = (cred.auth, cred.auth_pass) {
            usm = usm.auth(protocol, password);
        }
        if let (Some(protocol), Some(password)) = (cred.priv_, cred.priv_pass) {
            usm = usm.privacy(protocol, password);
        }
        usm.into()
    }
}

/// Either credential kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpCred {
    V2(SnmpCredV2),
    V3(SnmpCredV3),
}

impl fmt::Display for SnmpCred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnmpCred::V2(c) => c.fmt(f),
            SnmpCred::V3(c) => c.fmt(f),
        }
    }
}

impl From<SnmpCredV2> for SnmpCred {
    fn from(cred: SnmpCredV2) -> Self {
        SnmpCred::V2(cred)
    }
}

impl From<SnmpCredV3> for SnmpCred {
    fn from(cred: SnmpCredV3) -> Self {
        SnmpCred::V3(cred)
    }
}

impl From<SnmpCred> for Auth {
    fn from(cred: SnmpCred) -> Auth {
        match cred {
            SnmpCred::V2(c) => c.into(),
            SnmpCred::V3(c) => c.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(
        user: Option<&str>,
        auth: Option<&str>,
        auth_pass: Option<&str>,
        priv_: Option<&str>,
        priv_pass: Option<&str>,
    ) -> String {
        SnmpCredV3::new(user, auth, auth_pass, priv_, priv_pass)
            .unwrap_err()
            .to_string()
    }

    #[test]
    fn v2_display_and_auth() {
        let cred = SnmpCredV2::new("public");
        assert_eq!(cred.to_string(), "SNMPv2 community: public");
        match Auth::from(cred) {
            Auth::Community { community } => assert_eq!(community, "public"),
            other => panic!("expected community, got {other:?}"),
        }
    }

    #[test]
    fn v3_validation_messages() {
        assert_eq!(err(Some(""), None, None, None, None), "Username missing!");
        assert_eq!(err(None, Some("md5"), None, None, None), "Username missing!");
        assert_eq!(
            err(Some("u"), Some("sha256"), Some("x"), None, None),
            "Unsupported authentication type \"sha256\"! Supported list: [None, 'md5', 'sha1']"
        );
        assert_eq!(
            err(Some("u"), Some("md5"), Some("x"), Some("3des"), Some("y")),
            "Unsupported priv type \"3des\"! Supported priv: [None, 'des', 'aes']"
        );
        assert_eq!(
            err(Some("u"), Some("md5"), Some(""), None, None),
            "Auth type md5 provided but no password!"
        );
        assert_eq!(
            err(Some("u"), Some("sha1"), Some("pw"), Some("aes"), None),
            "Priv type aes provided but no password!"
        );
    }

    #[test]
    fn unsupported_priv_is_checked_before_missing_auth_password() {
        assert!(err(Some("u"), Some("md5"), None, Some("rc4"), None).starts_with("Unsupported priv"));
    }

    #[test]
    fn protocol_names_are_exact() {
        assert!(SnmpCredV3::new(Some("u"), Some("MD5"), Some("pw"), None, None).is_err());
        assert!(SnmpCredV3::new(Some("u"), Some("sha"), Some("pw"), None, None).is_err());
    }

    #[test]
    fn v3_empty_strings_are_absent() {
        let cred = SnmpCredV3::new(Some("u"), Some(""), Some(""), Some(""), Some("")).unwrap();
        assert_eq!(cred.auth, None);
        assert_eq!(cred.priv_pass, None);
        assert_eq!(cred.to_string(), "SNMPv3 user: u Auth: None Priv: None");
    }

    #[test]
    fn v3_into_auth() {
        let cred = SnmpCredV3::new(Some("admin"), Some("md5"), Some("a"), Some("des"), Some("p")).unwrap();
        assert_eq!(cred.to_string(), "SNMPv3 user: admin Auth: md5 Priv: des");
        let Auth::Usm(usm) = Auth::from(SnmpCred::from(cred)) else {
            panic!("expected USM");
        };
        assert_eq!(usm.username, "admin");
        assert_eq!(usm.auth_protocol, Some(AuthProtocol::Md5));
        assert_eq!(usm.priv_protocol, Some(PrivProtocol::Des));
        assert_eq!(usm.priv_password.as_deref(), Some("p"));
    }

    #[test]
    fn debug_hides_secrets() {
        let v2 = SnmpCred::from(SnmpCredV2::new("s3cret"));
        assert!(!format!("{v2:?}").contains("s3cret"));
        let v3 = SnmpCredV3::new(Some("u"), Some("sha1"), Some("hunter22"), None, None).unwrap();
        assert!(!format!("{v3:?}").contains("hunter22"));
    }
}
