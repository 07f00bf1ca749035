//  AUTH.rs
//    by Lut99
//
//  Created:
//    17 Oct 2026, 11:20:54
//  Last edited:
//    19 Oct 2026, 15:20:18
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements an [`Authenticator`] that checks credentials against a
//!   fixed list of users.
//

use std::collections::HashMap;

use auth_resolver::{AuthResult, Authenticator, AuthenticatorError, Credentials, USER_ID_FIELD};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Map, Value};


/***** CONSTANTS *****/
/// The error reported with a denial.
pub const DENIED_ERROR: &str = "Unknown user or wrong password";





/***** AUXILLARY *****/
/// A user as it appears in the configuration file.
#[derive(Clone, Deserialize)]
pub struct StaticUser {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Password")]
    pub password: String,
    /// Any other fields, which are returned as the user's identity.
    #[serde(flatten)]
    pub identity: Map<String, Value>,
}
impl std::fmt::Debug for StaticUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticUser").field("username", &self.username).field("password", &"<redacted>").field("identity", &self.identity).finish()
    }
}





/***** LIBRARY *****/
/// Authenticates against a list of users known up front.
///
/// Users without a `UserID` get one based on their position in the list (starting at 1). It never hands out a session of its own.
#[derive(Clone, Debug)]
pub struct StaticAuthenticator {
    users: HashMap<String, StaticUser>,
}

impl StaticAuthenticator {
    /// Constructor for the StaticAuthenticator.
    ///
    /// # Arguments
    /// - `users`: The users to accept. If a username appears twice, the last one wins.
    ///
    /// # Returns
    /// A new StaticAuthenticator.
    pub fn new(users: impl IntoIterator<Item = StaticUser>) -> Self {
        let mut map: HashMap<String, StaticUser> = HashMap::new();
        for (i, mut user) in users.into_iter().enumerate() {
            user.identity.entry(USER_ID_FIELD).or_insert_with(|| Value::from(i as u64 + 1));
            // Nobody gets to sneak in a session or a login state through the config
            user.identity.remove("SessionID");
            user.identity.remove("LoggedIn");
            if let Some(old) = map.insert(user.username.clone(), user) {
                warn!("User '{}' is defined more than once; using the last definition", old.username);
            }
        }
        Self { users: map }
    }

    /// Returns the number of known users.
    #[inline]
    pub fn len(&self) -> usize { self.users.len() }

    /// Returns whether there are no known users.
    #[inline]
    pub fn is_empty(&self) -> bool { self.users.is_empty() }
}

#[async_trait::async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthResult, AuthenticatorError> {
        match self.users.get(&credentials.username) {
            Some(user) if user.password == credentials.password => {
                debug!("Static user '{}' logged in", credentials.username);
                Ok(AuthResult::logged_in(user.identity.clone()))
            },
            _ => {
                debug!("Static authentication denied for user '{}'", credentials.username);
                let mut packet: AuthResult = AuthResult::empty(None);
                packet.error = Some(Value::String(DENIED_ERROR.into()));
                Ok(packet)
            },
        }
    }
}





/***** TESTS *****/
