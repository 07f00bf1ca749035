use auth_resolver::Credentials;
use serde::Deserialize;

/// The body of a `POST /1.0/Authenticate`, either as JSON or as a URL-encoded form.
#[derive(Debug, Default, Deserialize)]
pub struct AuthenticatePostModel {
    #[serde(rename = "Username")]
    pub username: Option<String>,
    #[serde(rename = "Password")]
    pub password: Option<String>,
}

impl AuthenticatePostModel {
    /// Returns the credentials in this body, if both fields are there and non-empty.
    pub fn to_credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => Some(Credentials::new(username.clone(), password.clone())),
            _ => None,
        }
    }
}
