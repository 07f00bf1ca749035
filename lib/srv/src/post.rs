//  POST.rs
//    by Lut99
//
//  Created:
//    15 Oct 2026, 14:02:33
//  Last edited:
//    19 Oct 2026, 13:50:16
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the POST-based credential submission endpoint of the
//!   [`Srv`].
//

use std::sync::Arc;

use auth_resolver::{Authenticator, Credentials};
use enum_debug::EnumDebug as _;
use error_trace::ErrorTrace as _;
use futures_util::{Stream, StreamExt as _};
use log::{debug, error, info, trace};
use session_resolver::{Session, SessionService};
use warp::http::header::{CONTENT_TYPE, LOCATION, SET_COOKIE};
use warp::http::{HeaderMap, StatusCode};
use warp::hyper::body::Buf;
use warp::reject::Rejection;
use warp::reply::Reply;
use warp::Filter;

use crate::basic::{INCORRECT_INPUT, NEED_INPUT};
use crate::decision::{DecisionError, SessionFailure, Verdict};
use crate::models::AuthenticatePostModel;
use crate::{Routes, Srv};


/***** CONSTANTS *****/
/// The path the endpoint is served on.
pub const AUTHENTICATE_PATH: &str = "/1.0/Authenticate";
/// The largest body we're willing to read.
pub const MAX_BODY_SIZE: usize = 16 * 1024;
/// The body sent when a submission exceeds [`MAX_BODY_SIZE`].
pub const BODY_TOO_LARGE: &str = "Request body too large.";





/***** AUXILLARY *****/
/// What came out of reading a submission body.
#[derive(Debug)]
enum SubmittedBody {
    /// The full body.
    Complete(Vec<u8>),
    /// The body is larger than [`MAX_BODY_SIZE`].
    TooLarge,
}





/***** HELPER FUNCTIONS *****/
/// Reads a submission body of at most [`MAX_BODY_SIZE`] bytes.
///
/// Works with and without a `Content-Length` (e.g., chunked uploads). A body that breaks off halfway is read as far as it
/// got, which then fails to parse as missing input.
async fn read_body<S, B>(body: S) -> Result<SubmittedBody, Rejection>
where
    S: Stream<Item = Result<B, warp::Error>>,
    B: Buf,
{
    let mut body = Box::pin(body);
    let mut read: Vec<u8> = Vec::new();
    while let Some(chunk) = body.next().await {
        let mut chunk: B = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                debug!("Failed to read authentication body: {err}");
                break;
            },
        };
        if read.len() + chunk.remaining() > MAX_BODY_SIZE {
            debug!("Authentication body exceeds {MAX_BODY_SIZE} bytes");
            return Ok(SubmittedBody::TooLarge);
        }
        while chunk.has_remaining() {
            let part: &[u8] = chunk.chunk();
            let len: usize = part.len();
            read.extend_from_slice(part);
            chunk.advance(len);
        }
    }
    Ok(SubmittedBody::Complete(read))
}


/// Parses a submission body according to its content type.
///
/// Bodies we can't make sense of are treated as empty, which makes them fail as missing input later on.
fn parse_body(headers: &HeaderMap, body: &[u8]) -> AuthenticatePostModel {
    let content_type: &str = headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok()).unwrap_or("");

    let parsed: Result<AuthenticatePostModel, String> = if content_type.starts_with("application/x-www-form-urlencoded") {
        serde_urlencoded::from_bytes(body).map_err(|err| err.to_string())
    } else if content_type.starts_with("application/json") {
        serde_json::from_slice(body).map_err(|err| err.to_string())
    } else {
        // Be lenient for clients that don't bother with a content type
        serde_json::from_slice(body).or_else(|_| serde_urlencoded::from_bytes(body)).map_err(|err| err.to_string())
    };
    match parsed {
        Ok(model) => model,
        Err(err) => {
            debug!("Failed to parse authentication body (content type '{content_type}'): {err}");
            AuthenticatePostModel::default()
        },
    }
}





/***** LIBRARY *****/
impl<A, S> Srv<A, S>
where
    A: 'static + Authenticator + Send + Sync,
    S: 'static + SessionService + Send + Sync,
{
    // POST /1.0/Authenticate
    // in: { "Username": ..., "Password": ... } as JSON or form
    // out:
    //  - 200 AuthResult (no redirect configured)
    //  - 302 Location (redirect configured)
    //  - 401 text
    //  - 413 text (body too large)
    //  - 500 text (session could not be created)
    async fn handle_post_authenticate(this: Arc<Self>, headers: HeaderMap, body: SubmittedBody) -> Result<Box<dyn Reply>, Rejection> {
        info!("Handling POST authentication request");
        let body: Vec<u8> = match body {
            SubmittedBody::Complete(body) => body,
            SubmittedBody::TooLarge => return Ok(Box::new(warp::reply::with_status(BODY_TOO_LARGE, StatusCode::PAYLOAD_TOO_LARGE))),
        };

        // Both fields must be there before we bother anyone
        let credentials: Credentials = match parse_body(&headers, &body).to_credentials() {
            Some(credentials) => credentials,
            None => {
                debug!("POST authentication request misses username and/or password");
                return Ok(Box::new(warp::reply::with_status(NEED_INPUT, StatusCode::UNAUTHORIZED)));
            },
        };

        let verdict: Verdict = match this.decide(&headers, move || Some(credentials)).await {
            Ok(verdict) => verdict,
            Err(DecisionError::CredentialsMissing) => return Ok(Box::new(warp::reply::with_status(NEED_INPUT, StatusCode::UNAUTHORIZED))),
            Err(err) => {
                error!("{}", err.trace());
                return Ok(Box::new(SessionFailure.to_reply()));
            },
        };
        trace!("POST authentication verdict: {}", verdict.variant());

        let (session, cookie): (Session, Option<String>) = match verdict {
            Verdict::Denied => return Ok(Box::new(warp::reply::with_status(INCORRECT_INPUT, StatusCode::UNAUTHORIZED))),
            Verdict::AlreadyLoggedIn(session) => (session, None),
            Verdict::NewlyAuthenticated { session, .. } => {
                let cookie: String = this.sessions.set_cookie(&session);
                (session, Some(cookie))
            },
        };

        // Either send them on or tell them who they are
        let reply: Box<dyn Reply> = match this.post_redirect_url().await {
            Some(url) => {
                debug!("Redirecting authenticated user to '{url}'");
                Box::new(warp::reply::with_header(warp::reply::with_status(warp::reply(), StatusCode::FOUND), LOCATION, url))
            },
            None => Box::new(warp::reply::with_status(warp::reply::json(&session.user), StatusCode::OK)),
        };
        Ok(match cookie {
            Some(cookie) => Box::new(warp::reply::with_header(reply, SET_COOKIE, cookie)),
            None => reply,
        })
    }

    /// The POST authentication endpoint as a filter.
    pub fn post_authenticate(this: Arc<Self>) -> Routes {
        warp::post()
            .and(warp::path!("1.0" / "Authenticate"))
            .and(Self::with_self(this))
            .and(warp::header::headers_cloned())
            .and(warp::body::stream().and_then(read_body))
            .and_then(Self::handle_post_authenticate)
            .boxed()
    }
}





/***** TESTS *****/
