//  LIB.rs
//    by Lut99
//
//  Created:
//    14 Oct 2026, 10:31:52
//  Last edited:
//    19 Oct 2026, 11:12:03
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the interface of the local session subsystem, as consumed by
//!   the authentication gate.
//

use std::error::Error;
use std::sync::Arc;

use auth_resolver::AuthResult;
use serde::Serialize;
use warp::filters::BoxedFilter;
use warp::http::HeaderMap;
use warp::reply::Reply;


/***** AUXILLARY *****/
/// The routes a [`SessionService`] contributes to the server.
pub type SessionRoutes = BoxedFilter<(Box<dyn Reply>,)>;



/// A local session as known to the [`SessionService`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Session {
    /// The identifier of the session, i.e., what the client presents on subsequent requests.
    pub id:   String,
    /// The user packet stored with this session. Its `SessionID` equals [`Session::id`].
    pub user: AuthResult,
}





/***** LIBRARY *****/
/// Defines how the local session subsystem looks like in general.
#[async_trait::async_trait]
pub trait SessionService {
    /// The error type emitted when creating a session fails.
    type Error: 'static + Send + Sync + Error;

    /// Finds the session the given request belongs to.
    ///
    /// # Arguments
    /// - `headers`: The headers of the incoming request.
    ///
    /// # Returns
    /// The live [`Session`], or [`None`] if the request carries no (valid) session.
    async fn current_session(&self, headers: &HeaderMap) -> Option<Session>;

    /// Checks whether the given request carries a logged-in session.
    async fn is_logged_in(&self, headers: &HeaderMap) -> bool { self.current_session(headers).await.map(|session| session.user.logged_in).unwrap_or(false) }

    /// Creates a new session for a successfully authenticated user.
    ///
    /// # Arguments
    /// - `user`: The [`AuthResult`] to store with the session.
    /// - `override_id`: If given, the session MUST use this identifier instead of generating one.
    ///
    /// # Returns
    /// The new [`Session`], already persisted.
    ///
    /// # Errors
    /// This function errors if the session could not be persisted. Callers must then not report a successful login.
    async fn create_session(&self, user: &AuthResult, override_id: Option<&str>) -> Result<Session, Self::Error>;

    /// Returns the canonical "not authenticated" user packet.
    ///
    /// # Arguments
    /// - `seed`: An optional session identifier to put in the packet.
    fn format_empty_user_packet(&self, seed: Option<&str>) -> AuthResult;

    /// Renders the `Set-Cookie` value that hands the given session to a client.
    fn set_cookie(&self, session: &Session) -> String;

    /// Returns the service's own routes (e.g., a session check), to be connected before any authentication route.
    fn routes(self: Arc<Self>) -> SessionRoutes;
}
