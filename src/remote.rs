//  REMOTE.rs
//    by Lut99
//
//  Created:
//    16 Oct 2026, 15:30:12
//  Last edited:
//    19 Oct 2026, 14:48:03
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements an [`Authenticator`] that forwards credentials to a remote
//!   authentication authority.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::time::Duration;

use auth_resolver::{is_positive_user_id, AuthResult, Authenticator, AuthenticatorError, Credentials, USER_ID_FIELD};
use log::{debug, error, trace};
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::{Map, Value};


/***** CONSTANTS *****/
/// The path (relative to the server URL) of the authority's login endpoint.
pub const AUTHENTICATE_ENDPOINT: &str = "Authenticate";





/***** ERRORS *****/
/// Defines the errors that occur when building a [`RemoteAuthenticator`].
#[derive(Debug)]
pub enum RemoteAuthenticatorError {
    /// The configured server URL does not make a valid endpoint.
    IllegalUrl { raw: String, err: url::ParseError },
    /// The HTTP client could not be built.
    ClientBuild { err: reqwest::Error },
}
impl Display for RemoteAuthenticatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use RemoteAuthenticatorError::*;
        match self {
            IllegalUrl { raw, .. } => write!(f, "Authentication server endpoint '{raw}' is not a valid URL"),
            ClientBuild { .. } => write!(f, "Failed to build HTTP client for authentication server"),
        }
    }
}
impl Error for RemoteAuthenticatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        use RemoteAuthenticatorError::*;
        match self {
            IllegalUrl { err, .. } => Some(err),
            ClientBuild { err } => Some(err),
        }
    }
}





/***** AUXILLARY *****/
/// The body we send to the authority.
#[derive(Serialize)]
struct AuthenticateRequest<'a> {
    #[serde(rename = "UserName")]
    username: &'a str,
    #[serde(rename = "Password")]
    password: &'a str,
}





/***** LIBRARY *****/
/// Asks a remote authority whether credentials are any good.
///
/// The authority is expected to answer `POST <server>Authenticate` with a JSON object carrying at least a `UserID`. A positive
/// `UserID` means the login was accepted, and the whole body (including any `SessionID`) becomes the [`AuthResult`].
#[derive(Clone, Debug)]
pub struct RemoteAuthenticator {
    /// The endpoint we post to.
    endpoint: Url,
    /// The client we post with. Owns the timeout.
    client:   Client,
}

impl RemoteAuthenticator {
    /// Constructor for the RemoteAuthenticator.
    ///
    /// # Arguments
    /// - `server_url`: The base URL of the authority. [`AUTHENTICATE_ENDPOINT`] is appended verbatim, so it should end in a slash.
    /// - `timeout`: How long to wait for the authority before giving up.
    ///
    /// # Returns
    /// A new RemoteAuthenticator.
    ///
    /// # Errors
    /// This function errors if the resulting endpoint is not a URL or if the client could not be built.
    pub fn new(server_url: impl AsRef<str>, timeout: Duration) -> Result<Self, RemoteAuthenticatorError> {
        let raw: String = format!("{}{AUTHENTICATE_ENDPOINT}", server_url.as_ref());
        let endpoint: Url = Url::parse(&raw).map_err(|err| RemoteAuthenticatorError::IllegalUrl { raw, err })?;
        let client: Client = Client::builder().timeout(timeout).build().map_err(|err| RemoteAuthenticatorError::ClientBuild { err })?;
        Ok(Self { endpoint, client })
    }

    /// Returns the endpoint this authenticator posts to.
    #[inline]
    pub fn endpoint(&self) -> &Url { &self.endpoint }

    /// Builds the error for a response we can't use, logging it along the way.
    fn invalid(&self, credentials: &Credentials, reason: impl Into<String>) -> AuthenticatorError {
        let reason: String = reason.into();
        error!("Invalid authentication response from remote server (url: '{}', user: '{}'): {reason}", self.endpoint, credentials.username);
        AuthenticatorError::InvalidAuthResponse { url: self.endpoint.to_string(), reason }
    }
}

#[async_trait::async_trait]
impl Authenticator for RemoteAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthResult, AuthenticatorError> {
        debug!("Sending authentication request for user '{}' to '{}'", credentials.username, self.endpoint);
        let body = AuthenticateRequest { username: &credentials.username, password: &credentials.password };
        let res = match self.client.post(self.endpoint.clone()).json(&body).send().await {
            Ok(res) => res,
            Err(err) => return Err(self.invalid(credentials, err.to_string())),
        };
        let status = res.status();
        let body: Value = match res.json().await {
            Ok(body) => body,
            Err(err) => return Err(self.invalid(credentials, format!("body is not JSON (status {status}): {err}"))),
        };
        let body: Map<String, Value> = match body {
            Value::Object(body) => body,
            other => return Err(self.invalid(credentials, format!("body is not an object (status {status}): {other}"))),
        };

        // Classify on the user ID
        let accepted: bool = match body.get(USER_ID_FIELD).and_then(is_positive_user_id) {
            Some(accepted) => accepted,
            None => return Err(self.invalid(credentials, format!("no numeric '{USER_ID_FIELD}' in body (status {status})"))),
        };
        if accepted {
            trace!("Remote auth successful for user '{}' (UserID {})", credentials.username, body[USER_ID_FIELD]);
            return AuthResult::from_authority(body).map_err(|err| self.invalid(credentials, format!("malformed authentication packet: {err}")));
        }

        trace!("Remote auth denied for user '{}'", credentials.username);
        let mut packet: AuthResult = AuthResult::empty(None);
        packet.error = body.get("Error").filter(|err| !err.is_null()).cloned();
        Ok(packet)
    }
}





/***** TESTS *****/
