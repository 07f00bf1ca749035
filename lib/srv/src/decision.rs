//  DECISION.rs
//    by Lut99
//
//  Created:
//    14 Oct 2026, 13:20:07
//  Last edited:
//    19 Oct 2026, 13:41:55
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the decision procedure shared by every authentication
//!   transport of the [`Srv`].
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};

use auth_resolver::{AuthResult, Authenticator, Credentials};
use enum_debug::EnumDebug;
use error_trace::ErrorTrace as _;
use log::{debug, error, info, trace};
use session_resolver::{Session, SessionService};
use warp::http::{HeaderMap, StatusCode};
use warp::reject::Reject;
use warp::reply::Reply;

use crate::Srv;


/***** ERRORS *****/
/// Defines the ways a decision may fail instead of producing a [`Verdict`].
#[derive(Debug)]
pub enum DecisionError<E> {
    /// The request did not carry (usable) credentials at all.
    CredentialsMissing,
    /// The user was authenticated, but the local session could not be created.
    SessionCreate { username: String, err: E },
}
impl<E> Display for DecisionError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use DecisionError::*;
        match self {
            CredentialsMissing => write!(f, "Request carries no credentials"),
            SessionCreate { username, .. } => write!(f, "Failed to create local session for user '{username}'"),
        }
    }
}
impl<E: 'static + Error> Error for DecisionError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        use DecisionError::*;
        match self {
            CredentialsMissing => None,
            SessionCreate { err, .. } => Some(err),
        }
    }
}



/// Rejection raised when a login succeeded remotely but could not be persisted locally.
///
/// Renders as a generic 500; the details only go to the log.
#[derive(Debug)]
pub struct SessionFailure;
impl SessionFailure {
    /// The body sent to the client.
    pub const MESSAGE: &'static str = "Failed to create session.";

    /// Renders this failure as a response.
    pub fn to_reply(&self) -> impl Reply { warp::reply::with_status(Self::MESSAGE, StatusCode::INTERNAL_SERVER_ERROR) }
}
impl Reject for SessionFailure {}





/***** LIBRARY *****/
/// The outcome of a [`Srv::decide()`].
#[derive(Clone, Debug, EnumDebug)]
pub enum Verdict {
    /// The request already belonged to a logged-in session; nobody was asked anything.
    AlreadyLoggedIn(Session),
    /// The credentials were rejected, or could not be checked.
    Denied,
    /// The credentials were accepted and a local session has been created for them.
    NewlyAuthenticated {
        /// What the authenticator told us.
        result:  AuthResult,
        /// The session that now represents the user.
        session: Session,
    },
}
impl Verdict {
    /// Returns the session the request is (now) logged in with, if any.
    #[inline]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::AlreadyLoggedIn(session) => Some(session),
            Self::Denied => None,
            Self::NewlyAuthenticated { session, .. } => Some(session),
        }
    }
}



impl<A, S> Srv<A, S>
where
    A: 'static + Authenticator + Send + Sync,
    S: 'static + SessionService + Send + Sync,
{
    /// Decides whether a request gets in.
    ///
    /// In order, this:
    /// 1. Lets requests with a logged-in session through without consulting anyone;
    /// 2. Extracts the credentials using the transport-specific `extract`;
    /// 3. Asks the authenticator about them, treating any failure as a denial; and
    /// 4. On success, creates the local session, under the authority's session identifier if it issued one.
    ///
    /// The session is persisted before this function returns, so any response sent afterwards already refers to it.
    ///
    /// # Arguments
    /// - `headers`: The headers of the request, used to find an existing session.
    /// - `extract`: Pulls the [`Credentials`] out of the request, or returns [`None`] if there are none.
    ///
    /// # Returns
    /// A [`Verdict`] saying how the request was let in (or not).
    ///
    /// # Errors
    /// This function errors if there were no credentials to check, or if the local session could not be created.
    pub async fn decide<F>(&self, headers: &HeaderMap, extract: F) -> Result<Verdict, DecisionError<S::Error>>
    where
        F: FnOnce() -> Option<Credentials>,
    {
        // Step 1: Anyone logged in already gets in for free
        if let Some(session) = self.sessions.current_session(headers).await {
            if session.user.logged_in {
                trace!("Request belongs to logged-in session '{}'", session.id);
                return Ok(Verdict::AlreadyLoggedIn(session));
            }
        }

        // Step 2: Find out who they claim to be
        let credentials: Credentials = extract().ok_or(DecisionError::CredentialsMissing)?;
        debug!("Authenticating user '{}'...", credentials.username);

        // Step 3: Ask the authenticator
        let result: AuthResult = match self.authenticator.authenticate(&credentials).await {
            Ok(result) => result,
            Err(err) => {
                error!("{}", err.trace());
                debug!("Denying user '{}' since the authenticator failed", credentials.username);
                return Ok(Verdict::Denied);
            },
        };
        if !result.logged_in {
            if let Some(err) = &result.error {
                debug!("Authenticator denied user '{}': {err}", credentials.username);
            } else {
                debug!("Authenticator denied user '{}'", credentials.username);
            }
            return Ok(Verdict::Denied);
        }

        // Step 4: Create the local session, synchronizing its identifier with the remote one if there is one
        let override_id: Option<&str> = result.override_session_id().filter(|id| !id.is_empty());
        if let Some(id) = override_id {
            debug!("Authority issued session '{id}'; using it as the local session identifier");
        }
        let session: Session = match self.sessions.create_session(&result, override_id).await {
            Ok(session) => session,
            Err(err) => return Err(DecisionError::SessionCreate { username: credentials.username, err }),
        };
        info!("User '{}' logged in with session '{}'", credentials.username, session.id);

        Ok(Verdict::NewlyAuthenticated { result, session })
    }
}
