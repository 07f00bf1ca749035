//  CONFIG.rs
//    by Lut99
//
//  Created:
//    17 Oct 2026, 13:05:31
//  Last edited:
//    19 Oct 2026, 15:34:09
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the configuration file of the `session-remote-auth` server.
//

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::auth::StaticUser;
use crate::session::{DEFAULT_COOKIE_NAME, DEFAULT_SESSION_TIMEOUT};


/***** CONSTANTS *****/
/// How long we wait for the authority by default.
pub const DEFAULT_AUTHENTICATION_TIMEOUT: Duration = Duration::from_secs(30);





/***** ERRORS *****/
/// Defines the errors that occur when loading a [`Config`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to open config file '{}'", .path.display())]
    FileOpen { path: PathBuf, source: std::io::Error },
    #[error("Failed to parse config file '{}' as YAML", .path.display())]
    FileParse { path: PathBuf, source: serde_yaml::Error },
    #[error("'AuthenticationServerURL' must be given when using the Remote authenticator")]
    MissingServerUrl,
    #[error("'StaticUsers' must list at least one user when using the Static authenticator")]
    MissingStaticUsers,
    #[error("'SessionCookieName' {0:?} is not a valid cookie name")]
    IllegalCookieName(String),
}





/***** HELPER FUNCTIONS *****/
#[inline]
fn default_authentication_timeout() -> u64 { DEFAULT_AUTHENTICATION_TIMEOUT.as_secs() }
#[inline]
fn default_session_timeout() -> u64 { DEFAULT_SESSION_TIMEOUT.as_secs() }
#[inline]
fn default_session_cookie_name() -> String { DEFAULT_COOKIE_NAME.into() }





/***** LIBRARY *****/
/// Which [`Authenticator`](auth_resolver::Authenticator) checks the credentials.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
pub enum AuthenticatorKind {
    /// Forward them to the authentication server.
    #[default]
    Remote,
    /// Check them against `StaticUsers`.
    Static,
}



/// The contents of the configuration file.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// The transports to enable, in order.
    #[serde(rename = "AuthTypes", default)]
    pub auth_types: Option<Vec<String>>,
    /// The base URL of the remote authority.
    #[serde(rename = "AuthenticationServerURL", default)]
    pub authentication_server_url: Option<String>,
    /// Timeout for calls to the remote authority, in seconds.
    #[serde(rename = "AuthenticationTimeout", default = "default_authentication_timeout")]
    pub authentication_timeout: u64,
    /// Where to send clients after a successful POST login.
    #[serde(rename = "PostRedirectURL", default)]
    pub post_redirect_url: Option<String>,
    /// Idle timeout of sessions, in seconds.
    #[serde(rename = "SessionTimeout", default = "default_session_timeout")]
    pub session_timeout: u64,
    /// The cookie that carries the session identifier.
    #[serde(rename = "SessionCookieName", default = "default_session_cookie_name")]
    pub session_cookie_name: String,
    /// Which authenticator to use.
    #[serde(rename = "Authenticator", default)]
    pub authenticator: AuthenticatorKind,
    /// The users for the Static authenticator.
    #[serde(rename = "StaticUsers", default)]
    pub static_users: Vec<StaticUser>,
}

impl Config {
    /// Loads the configuration from the given YAML file.
    ///
    /// # Errors
    /// This function errors if the file could not be read, was not valid YAML or is not a valid configuration.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path: &Path = path.as_ref();
        debug!("Loading config file '{}'...", path.display());
        let handle: File = File::open(path).map_err(|source| ConfigError::FileOpen { path: path.into(), source })?;
        let config: Self = serde_yaml::from_reader(handle).map_err(|source| ConfigError::FileParse { path: path.into(), source })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the parts of the configuration that serde can't.
    ///
    /// # Errors
    /// This function errors if the selected authenticator misses its settings or the cookie name is unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.authenticator {
            AuthenticatorKind::Remote if self.authentication_server_url.is_none() => return Err(ConfigError::MissingServerUrl),
            AuthenticatorKind::Static if self.static_users.is_empty() => return Err(ConfigError::MissingStaticUsers),
            _ => {},
        }
        let name: &str = &self.session_cookie_name;
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)) {
            return Err(ConfigError::IllegalCookieName(self.session_cookie_name.clone()));
        }
        Ok(())
    }

    /// The timeout for calls to the remote authority.
    #[inline]
    pub fn authentication_timeout(&self) -> Duration { Duration::from_secs(self.authentication_timeout) }

    /// The idle timeout of sessions.
    #[inline]
    pub fn session_timeout(&self) -> Duration { Duration::from_secs(self.session_timeout) }
}





/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str("AuthenticationServerURL: \"http://localhost:8080/1.0/\"\n").unwrap();
        config.validate().unwrap();
        assert_eq!(config.auth_types, None);
        assert_eq!(config.authenticator, AuthenticatorKind::Remote);
        assert_eq!(config.authentication_timeout(), DEFAULT_AUTHENTICATION_TIMEOUT);
        assert_eq!(config.session_timeout(), Duration::from_secs(3600));
        assert_eq!(config.session_cookie_name, "UserSession");
        assert_eq!(config.post_redirect_url, None);
    }

    #[test]
    fn test_full() {
        let config: Config = serde_yaml::from_str(
            r#"
AuthTypes: [POST, HTTP]
Authenticator: Static
PostRedirectURL: "http://elsewhere"
SessionTimeout: 60
StaticUsers:
  - Username: testuser
    Password: testpassword
    UserRole: User
"#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.auth_types, Some(vec!["POST".to_string(), "HTTP".to_string()]));
        assert_eq!(config.static_users.len(), 1);
        assert_eq!(config.session_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid() {
        let config: Config = serde_yaml::from_str("AuthTypes: [HTTP]\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::MissingServerUrl)));

        let config: Config = serde_yaml::from_str("Authenticator: Static\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::MissingStaticUsers)));

        let config: Config = serde_yaml::from_str("AuthenticationServerURL: \"http://a/\"\nSessionCookieName: \"a b\"\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::IllegalCookieName(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(Config::from_path("/definitely/not/here.yml"), Err(ConfigError::FileOpen { .. })));
    }
}
