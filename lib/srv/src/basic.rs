//  BASIC.rs
//    by Lut99
//
//  Created:
//    15 Oct 2026, 09:12:48
//  Last edited:
//    19 Oct 2026, 13:47:30
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the HTTP Basic challenge/response gate of the [`Srv`].
//

use std::sync::Arc;

use auth_resolver::{Authenticator, Credentials};
use base64ct::Encoding as _;
use enum_debug::EnumDebug as _;
use error_trace::ErrorTrace as _;
use log::{debug, error, trace};
use session_resolver::SessionService;
use warp::http::header::{AUTHORIZATION, SET_COOKIE, WWW_AUTHENTICATE};
use warp::http::{HeaderMap, StatusCode};
use warp::reject::{Reject, Rejection};
use warp::reply::Reply;
use warp::Filter;

use crate::decision::{DecisionError, SessionFailure, Verdict};
use crate::{Routes, Srv};


/***** CONSTANTS *****/
/// The challenge we send along with every 401.
pub const BASIC_CHALLENGE: &str = "Basic realm=\"Secure Area\"";
/// The body sent when no credentials were given.
pub const NEED_INPUT: &str = "Access denied. Need input.";
/// The body sent when the given credentials were not accepted.
pub const INCORRECT_INPUT: &str = "Access denied. Incorrect input.";





/***** AUXILLARY *****/
/// What a request's `Authorization`-header tells us.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BasicAuthorization {
    /// There is no `Authorization`-header at all.
    Anonymous,
    /// There is one, but it isn't a well-formed Basic one.
    Malformed,
    /// Proper Basic credentials.
    Credentials(Credentials),
}
impl BasicAuthorization {
    /// Reads the Basic credentials from the given headers.
    ///
    /// # Arguments
    /// - `headers`: The [`HeaderMap`] of the request to examine.
    ///
    /// # Returns
    /// A new BasicAuthorization describing what we found.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header: &str = match headers.get(AUTHORIZATION) {
            Some(value) => match value.to_str() {
                Ok(value) => value,
                Err(_) => {
                    debug!("Authorization header is not valid ASCII");
                    return Self::Malformed;
                },
            },
            None => return Self::Anonymous,
        };

        // Split the scheme off (which is case-insensitive)
        let (scheme, encoded): (&str, &str) = match header.trim().split_once(' ') {
            Some(parts) => parts,
            None => {
                debug!("Authorization header has no scheme");
                return Self::Malformed;
            },
        };
        if !scheme.eq_ignore_ascii_case("Basic") {
            debug!("Authorization header uses unsupported scheme '{scheme}'");
            return Self::Malformed;
        }

        // Decode the rest
        let decoded: Vec<u8> = match base64ct::Base64::decode_vec(encoded.trim()) {
            Ok(decoded) => decoded,
            Err(err) => {
                debug!("Failed to decode Basic credentials as base64: {err}");
                return Self::Malformed;
            },
        };
        let decoded: String = match String::from_utf8(decoded) {
            Ok(decoded) => decoded,
            Err(_) => {
                debug!("Basic credentials are not valid UTF-8");
                return Self::Malformed;
            },
        };
        match decoded.split_once(':') {
            Some((username, password)) => Self::Credentials(Credentials::new(username, password)),
            None => {
                debug!("Basic credentials have no ':' separator");
                Self::Malformed
            },
        }
    }

    /// Returns the credentials, if any.
    #[inline]
    pub fn into_credentials(self) -> Option<Credentials> {
        match self {
            Self::Credentials(credentials) => Some(credentials),
            Self::Anonymous | Self::Malformed => None,
        }
    }
}



/// Rejection that makes the client (re)try with Basic credentials.
#[derive(Debug)]
pub struct BasicChallenge {
    /// The body to send along.
    pub message: &'static str,
}
impl BasicChallenge {
    /// Challenge for requests without credentials.
    #[inline]
    pub fn need_input() -> Self { Self { message: NEED_INPUT } }

    /// Challenge for requests with rejected credentials.
    #[inline]
    pub fn incorrect_input() -> Self { Self { message: INCORRECT_INPUT } }

    /// Renders the challenge as a 401 response.
    pub fn to_reply(&self) -> impl Reply {
        warp::reply::with_header(warp::reply::with_status(self.message, StatusCode::UNAUTHORIZED), WWW_AUTHENTICATE, BASIC_CHALLENGE)
    }
}
impl Reject for BasicChallenge {}





/***** LIBRARY *****/
impl<A, S> Srv<A, S>
where
    A: 'static + Authenticator + Send + Sync,
    S: 'static + SessionService + Send + Sync,
{
    /// Runs the Basic gate for a single request.
    ///
    /// # Returns
    /// The `Set-Cookie` value for a session that was created by this request, or [`None`] if it was already logged in.
    ///
    /// # Errors
    /// This function rejects with a [`BasicChallenge`] if the request may not pass, or with a [`SessionFailure`] if it may
    /// but we couldn't remember it.
    async fn handle_basic_auth(&self, headers: HeaderMap) -> Result<Option<String>, Rejection> {
        let verdict: Verdict = match self.decide(&headers, || BasicAuthorization::from_headers(&headers).into_credentials()).await {
            Ok(verdict) => verdict,
            Err(DecisionError::CredentialsMissing) => {
                trace!("No Basic credentials given; challenging");
                return Err(warp::reject::custom(BasicChallenge::need_input()));
            },
            Err(err) => {
                error!("{}", err.trace());
                return Err(warp::reject::custom(SessionFailure));
            },
        };
        trace!("Basic gate verdict: {}", verdict.variant());

        match verdict {
            Verdict::AlreadyLoggedIn(_) => Ok(None),
            Verdict::NewlyAuthenticated { session, .. } => Ok(Some(self.sessions.set_cookie(&session))),
            Verdict::Denied => Err(warp::reject::custom(BasicChallenge::incorrect_input())),
        }
    }

    /// The Basic gate as a filter, extracting the `Set-Cookie` value of any new session.
    pub fn basic_gate(this: Arc<Self>) -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
        Self::with_self(this).and(warp::header::headers_cloned()).and_then(|this: Arc<Self>, headers: HeaderMap| async move { this.handle_basic_auth(headers).await })
    }

    /// Puts the given routes behind the Basic gate.
    ///
    /// Requests that pass the gate continue to `inner`; if the gate created a session, its cookie is set on `inner`'s reply.
    /// That includes the replies to requests `inner` rejects (e.g., a 404), so a session is never created without the
    /// client hearing about it.
    pub fn with_basic_auth(this: Arc<Self>, inner: Routes) -> Routes {
        Self::basic_gate(this)
            .and(inner.recover(crate::recover_gated).unify())
            .map(|cookie: Option<String>, reply: Box<dyn Reply>| -> Box<dyn Reply> {
                match cookie {
                    Some(cookie) => Box::new(warp::reply::with_header(reply, SET_COOKIE, cookie)),
                    None => reply,
                }
            })
            .boxed()
    }
}





/***** TESTS *****/
