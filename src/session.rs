//  SESSION.rs
//    by Lut99
//
//  Created:
//    17 Oct 2026, 09:41:27
//  Last edited:
//    19 Oct 2026, 15:12:44
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements an in-process, cookie-backed [`SessionService`].
//

use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::sync::Arc;
use std::time::Duration;

use auth_resolver::AuthResult;
use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, trace};
use session_resolver::{Session, SessionRoutes, SessionService};
use tokio::sync::RwLock;
use warp::http::header::{COOKIE, SET_COOKIE};
use warp::http::HeaderMap;
use warp::reject::Rejection;
use warp::reply::Reply;
use warp::Filter;


/***** CONSTANTS *****/
/// The default name of the session cookie.
pub const DEFAULT_COOKIE_NAME: &str = "UserSession";
/// The default idle time after which a session is forgotten.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(3600);





/***** ERRORS *****/
/// Defines the errors that occur when creating a session in the [`MemorySessionStore`].
#[derive(Debug)]
pub enum MemorySessionError {
    /// The identifier we were told to use is empty.
    EmptyId,
    /// The identifier we were told to use can't be put in a cookie.
    IllegalId { id: String },
}
impl Display for MemorySessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use MemorySessionError::*;
        match self {
            EmptyId => write!(f, "Cannot create session with an empty identifier"),
            IllegalId { id } => write!(f, "Cannot create session with identifier {id:?} (contains characters not allowed in a cookie)"),
        }
    }
}
impl Error for MemorySessionError {}





/***** HELPER FUNCTIONS *****/
/// Checks whether the given value may appear in a cookie value unquoted (RFC 6265, `cookie-octet`).
fn is_cookie_safe(value: &str) -> bool { value.bytes().all(|b| b.is_ascii_graphic() && !matches!(b, b'"' | b',' | b';' | b'\\')) }

/// Finds the value of the cookie with the given name in the request's headers.
fn find_cookie<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
}





/***** AUXILLARY *****/
/// A session with its expiry time.
#[derive(Clone, Debug)]
struct Entry {
    session: Session,
    expires: DateTime<Utc>,
}





/***** LIBRARY *****/
/// Keeps sessions in memory, handing them to clients as a cookie.
///
/// Sessions expire after being idle for the configured timeout; every request that presents one resets the clock.
#[derive(Debug)]
pub struct MemorySessionStore {
    cookie_name: String,
    timeout:     Duration,
    sessions:    RwLock<HashMap<String, Entry>>,
}

impl Default for MemorySessionStore {
    #[inline]
    fn default() -> Self { Self::new(DEFAULT_COOKIE_NAME, DEFAULT_SESSION_TIMEOUT) }
}

impl MemorySessionStore {
    /// Constructor for the MemorySessionStore.
    ///
    /// # Arguments
    /// - `cookie_name`: The name of the cookie the session identifier is handed out in.
    /// - `timeout`: How long a session may go unused before it is forgotten.
    ///
    /// # Returns
    /// A new, empty MemorySessionStore.
    pub fn new(cookie_name: impl Into<String>, timeout: Duration) -> Self {
        Self { cookie_name: cookie_name.into(), timeout, sessions: RwLock::new(HashMap::new()) }
    }

    /// Returns the name of the cookie we use.
    #[inline]
    pub fn cookie_name(&self) -> &str { &self.cookie_name }

    /// Computes the expiry time of a session used right now.
    fn expiry(&self) -> DateTime<Utc> {
        let ttl: TimeDelta = TimeDelta::from_std(self.timeout).unwrap_or_else(|_| TimeDelta::max_value());
        Utc::now().checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Returns how many sessions are currently alive.
    pub async fn active_sessions(&self) -> usize {
        let now: DateTime<Utc> = Utc::now();
        self.sessions.read().await.values().filter(|entry| entry.expires > now).count()
    }

    /// Drops the session with the given identifier, if any.
    ///
    /// # Returns
    /// The dropped [`Session`], or [`None`] if there was none (alive).
    pub async fn remove(&self, id: &str) -> Option<Session> {
        let entry: Entry = self.sessions.write().await.remove(id)?;
        if entry.expires <= Utc::now() {
            return None;
        }
        info!("Dropped session '{id}'");
        Some(entry.session)
    }

    /// Renders the `Set-Cookie` value that makes the client forget its session.
    pub fn clear_cookie(&self) -> String { format!("{}=; Path=/; HttpOnly; Max-Age=0", self.cookie_name) }

    // GET /1.0/CheckSession
    async fn handle_check_session(this: Arc<Self>, headers: HeaderMap) -> Result<Box<dyn Reply>, Rejection> {
        let user: AuthResult = match this.current_session(&headers).await {
            Some(session) => session.user,
            None => this.format_empty_user_packet(None),
        };
        Ok(Box::new(warp::reply::json(&user)))
    }

    // GET /1.0/Deauthenticate
    async fn handle_deauthenticate(this: Arc<Self>, headers: HeaderMap) -> Result<Box<dyn Reply>, Rejection> {
        match find_cookie(&headers, &this.cookie_name) {
            Some(id) => {
                if this.remove(id).await.is_none() {
                    debug!("Deauthentication request for unknown session '{id}'");
                }
            },
            None => debug!("Deauthentication request without session cookie"),
        }
        let reply = warp::reply::json(&this.format_empty_user_packet(None));
        Ok(Box::new(warp::reply::with_header(reply, SET_COOKIE, this.clear_cookie())))
    }
}

#[async_trait::async_trait]
impl SessionService for MemorySessionStore {
    type Error = MemorySessionError;

    async fn current_session(&self, headers: &HeaderMap) -> Option<Session> {
        let id: &str = find_cookie(headers, &self.cookie_name)?;

        let mut sessions = self.sessions.write().await;
        let entry: &mut Entry = sessions.get_mut(id)?;
        if entry.expires <= Utc::now() {
            debug!("Session '{id}' expired at {}", entry.expires);
            sessions.remove(id);
            return None;
        }
        entry.expires = self.expiry();
        trace!("Session '{id}' extended until {}", entry.expires);
        Some(entry.session.clone())
    }

    async fn create_session(&self, user: &AuthResult, override_id: Option<&str>) -> Result<Session, Self::Error> {
        let id: String = match override_id {
            Some("") => return Err(MemorySessionError::EmptyId),
            Some(id) if !is_cookie_safe(id) => return Err(MemorySessionError::IllegalId { id: id.into() }),
            Some(id) => id.into(),
            None => uuid::Uuid::new_v4().to_string(),
        };

        let session = Session { id: id.clone(), user: user.clone().with_session_id(id.clone()) };
        let entry = Entry { session: session.clone(), expires: self.expiry() };

        let mut sessions = self.sessions.write().await;
        // Sweep whatever nobody came back for
        let now: DateTime<Utc> = Utc::now();
        let before: usize = sessions.len();
        sessions.retain(|_, entry| entry.expires > now);
        if sessions.len() < before {
            debug!("Forgot {} expired session(s)", before - sessions.len());
        }
        if sessions.insert(id.clone(), entry).is_some() {
            debug!("Replaced existing session '{id}'");
        }
        Ok(session)
    }

    fn format_empty_user_packet(&self, seed: Option<&str>) -> AuthResult { AuthResult::empty(seed) }

    fn set_cookie(&self, session: &Session) -> String {
        format!("{}={}; Path=/; HttpOnly; Max-Age={}", self.cookie_name, session.id, self.timeout.as_secs())
    }

    fn routes(self: Arc<Self>) -> SessionRoutes {
        let this: Arc<Self> = self;
        let with_self = warp::any().map(move || this.clone());

        let check = warp::get()
            .and(warp::path!("1.0" / "CheckSession"))
            .and(with_self.clone())
            .and(warp::header::headers_cloned())
            .and_then(Self::handle_check_session);
        let deauth =
            warp::get().and(warp::path!("1.0" / "Deauthenticate")).and(with_self).and(warp::header::headers_cloned()).and_then(Self::handle_deauthenticate);

        check.or(deauth).unify().boxed()
    }
}





/***** TESTS *****/
