//  LIB.rs
//    by Lut99
//
//  Created:
//    14 Oct 2026, 10:02:11
//  Last edited:
//    19 Oct 2026, 11:40:27
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the data that flows through an authentication attempt
//!   ([`Credentials`] in, [`AuthResult`] out) and the [`Authenticator`]
//!   interface that turns one into the other.
//

use std::error::Error;
use std::fmt::{Debug, Display, Formatter, Result as FResult};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};


/***** CONSTANTS *****/
/// The identity field the authority uses to tell us who logged in.
pub const USER_ID_FIELD: &str = "UserID";





/***** ERRORS *****/
/// Defines the errors an [`Authenticator`] may produce.
///
/// Note that a denial is NOT an error; it is an [`AuthResult`] with `LoggedIn = false`.
#[derive(Debug)]
pub enum AuthenticatorError {
    /// The authority could not be reached or sent back something that isn't an authentication packet.
    InvalidAuthResponse { url: String, reason: String },
    /// Some other failure of a custom authenticator.
    Other(String),
}
impl Display for AuthenticatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use AuthenticatorError::*;
        match self {
            InvalidAuthResponse { url, reason } => write!(f, "Invalid authentication response from '{url}': {reason}"),
            Other(msg) => write!(f, "{msg}"),
        }
    }
}
impl Error for AuthenticatorError {}





/***** AUXILLARY *****/
/// A username/password pair as presented by a client.
///
/// Constructed per request and never persisted. The [`Debug`] impl hides the password.
#[derive(Clone, Deserialize, Eq, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}
impl Credentials {
    #[inline]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}
impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult { f.debug_struct("Credentials").field("username", &self.username).field("password", &"<redacted>").finish() }
}



/// The normalized outcome of an authentication attempt.
///
/// Identity fields (`UserID`, `UserRole`, ...) are opaque to us and kept as-is in [`AuthResult::identity`].
/// The remote session identifier is captured in a separate, private field the moment the result is built from an authority
/// response, so later rewrites of `SessionID` by the local session layer cannot lose it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AuthResult {
    #[serde(rename = "LoggedIn", default)]
    pub logged_in:  bool,
    #[serde(rename = "SessionID", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error:      Option<Value>,
    /// Everything else the authority told us.
    #[serde(flatten)]
    pub identity:   Map<String, Value>,

    #[serde(skip)]
    override_session_id: Option<String>,
}

impl AuthResult {
    /// Creates the canonical "not authenticated" packet.
    ///
    /// # Arguments
    /// - `seed`: If given, the session identifier to put in the packet.
    ///
    /// # Returns
    /// A packet with `LoggedIn = false`, `UserID = 0` and nothing else.
    pub fn empty(seed: Option<&str>) -> Self {
        let mut identity: Map<String, Value> = Map::new();
        identity.insert(USER_ID_FIELD.into(), Value::from(0));
        Self { logged_in: false, session_id: seed.map(String::from), error: None, identity, override_session_id: None }
    }

    /// Builds a result from the body an authority sent back for an accepted login.
    ///
    /// `LoggedIn` defaults to `true` if the authority left it out. Any non-empty `SessionID` in the body becomes the
    /// override for the local session.
    ///
    /// # Errors
    /// This function errors if the body has fields of the wrong type (e.g., a non-string `SessionID`).
    pub fn from_authority(mut body: Map<String, Value>) -> Result<Self, serde_json::Error> {
        body.entry("LoggedIn").or_insert(Value::Bool(true));
        let mut result: Self = serde_json::from_value(Value::Object(body))?;
        result.override_session_id = result.session_id.clone().filter(|id| !id.is_empty());
        Ok(result)
    }

    /// Builds a successful result out of identity fields only, without any remote session.
    pub fn logged_in(identity: Map<String, Value>) -> Self { Self { logged_in: true, session_id: None, error: None, identity, override_session_id: None } }

    /// Returns the session identifier the authority issued, if any.
    ///
    /// This is fixed at construction and unaffected by [`AuthResult::with_session_id()`].
    #[inline]
    pub fn override_session_id(&self) -> Option<&str> { self.override_session_id.as_deref() }

    /// Returns the numeric `UserID` of this result, if there is one.
    ///
    /// Numbers and numeric strings are both accepted.
    pub fn user_id(&self) -> Option<i64> { self.identity.get(USER_ID_FIELD).and_then(user_id_of) }

    /// Replaces the visible `SessionID` (e.g., with the local one). The override is kept.
    #[inline]
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }
}



/// Interprets a JSON value as a user identifier.
///
/// # Returns
/// The identifier, or [`None`] if the value is not an integer (or a string holding one).
pub fn user_id_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Decides whether a user identifier sent by an authority means the login was accepted (i.e., it is greater than zero).
///
/// Fractions are compared as-is, so `0.5` accepts.
///
/// # Returns
/// Whether the identifier is positive, or [`None`] if the value is not a number (or a string holding one).
pub fn is_positive_user_id(value: &Value) -> Option<bool> {
    let id: f64 = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    if id.is_nan() {
        return None;
    }
    Some(id > 0.0)
}





/***** LIBRARY *****/
/// Turns [`Credentials`] into an [`AuthResult`].
///
/// Exactly one of these is injected into the server; which one is a deployment choice.
#[async_trait::async_trait]
pub trait Authenticator {
    /// Checks the given credentials.
    ///
    /// # Returns
    /// An [`AuthResult`]. Rejected credentials are reported with `LoggedIn = false`, not as an error.
    ///
    /// # Errors
    /// This function errors if the check itself could not be performed.
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthResult, AuthenticatorError>;
}





/***** TESTS *****/
#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test body is not an object"),
        }
    }

    #[test]
    fn test_from_authority_captures_override() {
        let result = AuthResult::from_authority(body(json!({ "UserID": 7, "SessionID": "remote-1", "UserRole": "User" }))).unwrap();
        assert!(result.logged_in);
        assert_eq!(result.override_session_id(), Some("remote-1"));
        assert_eq!(result.user_id(), Some(7));
        assert_eq!(result.identity.get("UserRole"), Some(&json!("User")));

        // The local layer may rewrite the visible id, but the override stays put
        let local = result.with_session_id("local-9");
        assert_eq!(local.session_id.as_deref(), Some("local-9"));
        assert_eq!(local.override_session_id(), Some("remote-1"));
    }

    #[test]
    fn test_from_authority_without_session() {
        let result = AuthResult::from_authority(body(json!({ "UserID": 3 }))).unwrap();
        assert_eq!(result.override_session_id(), None);

        let result = AuthResult::from_authority(body(json!({ "UserID": 3, "SessionID": "" }))).unwrap();
        assert_eq!(result.override_session_id(), None);
    }

    #[test]
    fn test_from_authority_respects_logged_in() {
        let result = AuthResult::from_authority(body(json!({ "UserID": 3, "LoggedIn": false }))).unwrap();
        assert!(!result.logged_in);
    }

    #[test]
    fn test_from_authority_rejects_bad_session_type() {
        assert!(AuthResult::from_authority(body(json!({ "UserID": 3, "SessionID": 42 }))).is_err());
    }

    #[test]
    fn test_override_is_not_serialized() {
        let result = AuthResult::from_authority(body(json!({ "UserID": 1, "SessionID": "abc" }))).unwrap();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value, json!({ "LoggedIn": true, "SessionID": "abc", "UserID": 1 }));

        // And reading it back never invents an override
        let back: AuthResult = serde_json::from_value(value).unwrap();
        assert_eq!(back.override_session_id(), None);
    }

    #[test]
    fn test_empty_packet() {
        let packet = AuthResult::empty(Some("seed"));
        assert!(!packet.logged_in);
        assert_eq!(packet.session_id.as_deref(), Some("seed"));
        assert_eq!(packet.user_id(), Some(0));
        assert_eq!(packet.identity.len(), 1);
    }

    #[test]
    fn test_user_id_of() {
        assert_eq!(user_id_of(&json!(12)), Some(12));
        assert_eq!(user_id_of(&json!(-1)), Some(-1));
        assert_eq!(user_id_of(&json!(" 5 ")), Some(5));
        assert_eq!(user_id_of(&json!("nope")), None);
        assert_eq!(user_id_of(&json!(null)), None);
    }

    #[test]
    fn test_is_positive_user_id() {
        assert_eq!(is_positive_user_id(&json!(1)), Some(true));
        assert_eq!(is_positive_user_id(&json!(0.5)), Some(true));
        assert_eq!(is_positive_user_id(&json!("0.5")), Some(true));
        assert_eq!(is_positive_user_id(&json!(0)), Some(false));
        assert_eq!(is_positive_user_id(&json!(-0.5)), Some(false));
        assert_eq!(is_positive_user_id(&json!("NaN")), None);
        assert_eq!(is_positive_user_id(&json!("nope")), None);
        assert_eq!(is_positive_user_id(&json!(true)), None);

        // And fractions are never truncated into an identifier
        assert_eq!(user_id_of(&json!(0.5)), None);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("alice", "hunter2");
        let dbg = format!("{creds:?}");
        assert!(dbg.contains("alice"));
        assert!(!dbg.contains("hunter2"));
    }
}
