//  LIB.rs
//    by Lut99
//
//  Created:
//    14 Oct 2026, 11:05:40
//  Last edited:
//    19 Oct 2026, 13:58:12
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the [`Srv`], which layers remote authentication on top of
//!   a set of warp routes.
//

use std::convert::Infallible;
use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::future::{pending, Future};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use auth_resolver::Authenticator;
use error_trace::trace;
use log::{debug, info, warn};
use session_resolver::SessionService;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::RwLock;
use warp::filters::BoxedFilter;
use warp::http::{HeaderMap, StatusCode};
use warp::reject::{InvalidHeader, InvalidQuery, LengthRequired, MethodNotAllowed, MissingHeader, PayloadTooLarge, Rejection, UnsupportedMediaType};
use warp::reply::Reply;
use warp::Filter;

pub mod basic;
pub mod decision;
pub mod models;
pub mod post;
#[cfg(test)]
mod tests;

pub use decision::{DecisionError, Verdict};


/***** CONSTANTS *****/
/// The transports enabled when none are configured.
pub const DEFAULT_AUTH_TYPES: [&str; 1] = ["HTTP"];





/***** ERRORS *****/
/// Defines the error for transports we don't know about.
#[derive(Debug)]
pub struct UnsupportedTransport {
    /// The name as it appeared in the configuration.
    pub name: String,
}
impl Display for UnsupportedTransport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult { write!(f, "Auth type '{}' not supported!", self.name) }
}
impl Error for UnsupportedTransport {}





/***** HELPER FUNCTIONS *****/
/// Resolves once the process is asked to stop, either by SIGTERM (e.g., `docker stop`) or SIGINT.
///
/// If neither can be listened for, this never resolves.
pub async fn shutdown_signal() {
    let sigterm = async {
        match signal(SignalKind::terminate()) {
            Ok(mut handler) => {
                handler.recv().await;
            },
            Err(err) => {
                warn!("{}", trace!(("Cannot listen for SIGTERM; it will not stop the server gracefully"), err));
                pending::<()>().await
            },
        }
    };
    let sigint = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("{}", trace!(("Cannot listen for SIGINT; it will not stop the server gracefully"), err));
            pending::<()>().await
        }
    };

    tokio::select! {
        _ = sigterm => info!("Received SIGTERM; shutting down gracefully..."),
        _ = sigint => info!("Received SIGINT; shutting down gracefully..."),
    }
}

/// Maps the rejections warp itself raises to the status it would answer them with.
fn rejection_status(err: &Rejection) -> StatusCode {
    if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.find::<MethodNotAllowed>().is_some() {
        StatusCode::METHOD_NOT_ALLOWED
    } else if err.find::<LengthRequired>().is_some() {
        StatusCode::LENGTH_REQUIRED
    } else if err.find::<PayloadTooLarge>().is_some() {
        StatusCode::PAYLOAD_TOO_LARGE
    } else if err.find::<UnsupportedMediaType>().is_some() {
        StatusCode::UNSUPPORTED_MEDIA_TYPE
    } else if err.find::<InvalidHeader>().is_some() || err.find::<MissingHeader>().is_some() || err.find::<InvalidQuery>().is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Turns the rejections raised by the gate into proper responses.
///
/// Anything we don't recognize is passed on for warp to handle.
async fn handle_rejection(err: Rejection) -> Result<Box<dyn Reply>, Rejection> {
    if let Some(challenge) = err.find::<basic::BasicChallenge>() {
        Ok(Box::new(challenge.to_reply()))
    } else if let Some(failure) = err.find::<decision::SessionFailure>() {
        Ok(Box::new(failure.to_reply()))
    } else {
        debug!("Passing on unhandled rejection: {err:?}");
        Err(err)
    }
}

/// Turns every rejection of the routes behind the Basic gate into a response.
///
/// Those routes are tried last, so nothing else would match anyway; answering here keeps the gate's `Set-Cookie` on the reply.
async fn recover_gated(err: Rejection) -> Result<Box<dyn Reply>, Rejection> {
    match handle_rejection(err).await {
        Ok(reply) => Ok(reply),
        Err(err) => {
            let status: StatusCode = rejection_status(&err);
            debug!("Answering rejection behind the Basic gate with {status}");
            Ok(Box::new(warp::reply::with_status(warp::reply(), status)))
        },
    }
}





/***** AUXILLARY *****/
/// The routes as a type-erased filter, so they can be layered in any order.
pub type Routes = BoxedFilter<(Box<dyn Reply>,)>;



/// The ways a client may present credentials.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthType {
    /// HTTP Basic challenge/response on every route behind it.
    Http,
    /// A username/password submission to `POST /1.0/Authenticate`.
    Post,
}
impl FromStr for AuthType {
    type Err = UnsupportedTransport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HTTP" => Ok(Self::Http),
            "POST" => Ok(Self::Post),
            raw => Err(UnsupportedTransport { name: raw.into() }),
        }
    }
}





/***** LIBRARY *****/
pub struct Srv<A, S> {
    addr: SocketAddr,
    auth_types: Option<Vec<String>>,
    authenticator: A,
    sessions: Arc<S>,
    post_redirect_url: RwLock<Option<String>>,
}

impl<A, S> Srv<A, S>
where
    A: 'static + Authenticator + Send + Sync,
    S: 'static + SessionService + Send + Sync,
{
    /// Constructor for the Srv.
    ///
    /// # Arguments
    /// - `addr`: The address to serve on when [`Srv::run()`] is called.
    /// - `auth_types`: The transports to enable, in order. [`None`] means [`DEFAULT_AUTH_TYPES`].
    /// - `authenticator`: The [`Authenticator`] that checks all credentials.
    /// - `sessions`: The [`SessionService`] that keeps track of who is logged in.
    ///
    /// # Returns
    /// A new Srv without a redirect URL.
    pub fn new(addr: impl Into<SocketAddr>, auth_types: Option<Vec<String>>, authenticator: A, sessions: S) -> Self {
        Srv { addr: addr.into(), auth_types, authenticator, sessions: Arc::new(sessions), post_redirect_url: RwLock::new(None) }
    }

    /// Makes the POST endpoint redirect to the given URL on success instead of returning the user packet.
    ///
    /// Passing [`None`] switches back to returning the packet. Last write wins.
    pub async fn set_post_redirect_url(&self, url: Option<String>) {
        debug!("Setting POST redirect URL to {url:?}");
        *self.post_redirect_url.write().await = url;
    }

    /// Returns the URL the POST endpoint currently redirects to, if any.
    pub async fn post_redirect_url(&self) -> Option<String> { self.post_redirect_url.read().await.clone() }

    /// Checks if the request with the given headers belongs to a logged-in session.
    #[inline]
    pub async fn check_if_logged_in(&self, headers: &HeaderMap) -> bool { self.sessions.is_logged_in(headers).await }

    /// Returns the session service used by this server.
    #[inline]
    pub fn sessions(&self) -> &Arc<S> { &self.sessions }

    fn with_self(this: Arc<Self>) -> impl Filter<Extract = (Arc<Self>,), Error = Infallible> + Clone { warp::any().map(move || this.clone()) }

    /// Resolves the configured transports into the ones we'll install.
    ///
    /// Unknown names are warned about and skipped, as are duplicates.
    fn auth_types(&self) -> Vec<AuthType> {
        let names: Vec<String> = match &self.auth_types {
            Some(names) => names.clone(),
            None => DEFAULT_AUTH_TYPES.iter().map(|name| name.to_string()).collect(),
        };

        let mut types: Vec<AuthType> = Vec::with_capacity(names.len());
        for name in names {
            match name.parse::<AuthType>() {
                Ok(kind) if types.contains(&kind) => warn!("Auth type '{name}' given more than once; ignoring duplicate"),
                Ok(kind) => types.push(kind),
                Err(err) => warn!("{err}"),
            }
        }
        types
    }

    /// Wires the session routes, the enabled authentication transports and the given application routes together.
    ///
    /// The session service's routes always come first and are never gated. Every transport then applies to what is
    /// configured after it: the Basic gate wraps all later routes (including `app`), the POST endpoint is tried before them.
    ///
    /// # Arguments
    /// - `this`: The server, behind an [`Arc`].
    /// - `app`: The host's own routes.
    ///
    /// # Returns
    /// The combined [`Routes`], without rejection handling (see [`Srv::filter()`]).
    pub fn routes(this: Arc<Self>, app: Routes) -> Routes {
        let types: Vec<AuthType> = this.auth_types();

        let mut routes: Routes = app;
        for kind in types.into_iter().rev() {
            routes = match kind {
                AuthType::Http => {
                    info!("Installing HTTP Basic authentication gate");
                    Self::with_basic_auth(this.clone(), routes)
                },
                AuthType::Post => {
                    info!("Installing POST authentication endpoint at '{}'", post::AUTHENTICATE_PATH);
                    Self::post_authenticate(this.clone()).or(routes).unify().boxed()
                },
            };
        }

        this.sessions.clone().routes().or(routes).unify().boxed()
    }

    /// Like [`Srv::routes()`], but with the gate's rejections turned into responses.
    pub fn filter(this: Arc<Self>, app: Routes) -> Routes { Self::routes(this, app).recover(handle_rejection).unify().boxed() }

    /// Serves the given application routes behind the configured authentication until SIGTERM or SIGINT arrives.
    #[inline]
    pub async fn run(self, app: Routes) { self.run_until(app, shutdown_signal()).await }

    /// Serves the given application routes behind the configured authentication until `shutdown` resolves.
    ///
    /// In-flight requests are finished before this returns.
    pub async fn run_until(self, app: Routes, shutdown: impl 'static + Future<Output = ()> + Send) {
        let addr: SocketAddr = self.addr;
        let index: Routes = Self::filter(Arc::new(self), app);

        let (addr, srv) = warp::serve(index).bind_with_graceful_shutdown(addr, shutdown);
        info!("Now serving at {addr}; ready for requests");
        srv.await;
        info!("Server at {addr} stopped");
    }
}
