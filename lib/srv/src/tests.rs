//  TESTS.rs
//    by Lut99
//
//  Created:
//    16 Oct 2026, 10:14:09
//  Last edited:
//    19 Oct 2026, 17:05:12
//  Auto updated?
//    Yes
//
//  Description:
//!   Tests the [`Srv`] end-to-end against in-process authenticators and
//!   session stores.
//

use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use auth_resolver::{AuthResult, Authenticator, AuthenticatorError, Credentials};
use base64ct::Encoding as _;
use serde_json::{json, Map, Value};
use session_resolver::{Session, SessionRoutes, SessionService};
use warp::http::header::{COOKIE, LOCATION, SET_COOKIE, WWW_AUTHENTICATE};
use warp::http::{HeaderMap, StatusCode};
use warp::hyper::body::Bytes;
use warp::reply::Reply;
use warp::Filter;

use crate::basic::{BASIC_CHALLENGE, INCORRECT_INPUT, NEED_INPUT};
use crate::decision::SessionFailure;
use crate::{Routes, Srv, Verdict};


/***** HELPERS *****/
const COOKIE_NAME: &str = "UserSession";

#[derive(Debug)]
struct StoreFull;
impl Display for StoreFull {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult { write!(f, "Session store is full") }
}
impl Error for StoreFull {}

/// Keeps sessions in a map and finds them by cookie.
#[derive(Default)]
struct TestStore {
    sessions: Mutex<HashMap<String, Session>>,
    counter:  AtomicUsize,
    broken:   bool,
}
impl TestStore {
    fn broken() -> Self { Self { broken: true, ..Default::default() } }

    fn len(&self) -> usize { self.sessions.lock().unwrap().len() }

    fn get(&self, id: &str) -> Option<Session> { self.sessions.lock().unwrap().get(id).cloned() }
}
#[async_trait::async_trait]
impl SessionService for TestStore {
    type Error = StoreFull;

    async fn current_session(&self, headers: &HeaderMap) -> Option<Session> {
        let cookies: &str = headers.get(COOKIE)?.to_str().ok()?;
        let id: &str = cookies.split(';').filter_map(|pair| pair.trim().strip_prefix("UserSession=")).next()?;
        self.get(id)
    }

    async fn create_session(&self, user: &AuthResult, override_id: Option<&str>) -> Result<Session, Self::Error> {
        if self.broken {
            return Err(StoreFull);
        }
        let id: String = match override_id {
            Some(id) => id.into(),
            None => format!("local-{}", self.counter.fetch_add(1, Ordering::SeqCst)),
        };
        let session = Session { id: id.clone(), user: user.clone().with_session_id(id.clone()) };
        self.sessions.lock().unwrap().insert(id, session.clone());
        Ok(session)
    }

    fn format_empty_user_packet(&self, seed: Option<&str>) -> AuthResult { AuthResult::empty(seed) }

    fn set_cookie(&self, session: &Session) -> String { format!("{COOKIE_NAME}={}; Path=/; HttpOnly", session.id) }

    fn routes(self: Arc<Self>) -> SessionRoutes {
        warp::get()
            .and(warp::path!("1.0" / "CheckSession"))
            .and(warp::header::headers_cloned())
            .and_then(move |headers: HeaderMap| {
                let this = self.clone();
                async move {
                    let user: AuthResult = match this.current_session(&headers).await {
                        Some(session) => session.user,
                        None => this.format_empty_user_packet(None),
                    };
                    Ok::<Box<dyn Reply>, warp::Rejection>(Box::new(warp::reply::json(&user)))
                }
            })
            .boxed()
    }
}



/// Accepts `testuser:testpassword` and counts how often it is asked.
#[derive(Default)]
struct CountingAuthenticator {
    calls:      AtomicUsize,
    session_id: Option<String>,
}
impl CountingAuthenticator {
    fn issuing(session_id: &str) -> Self { Self { calls: AtomicUsize::new(0), session_id: Some(session_id.into()) } }
}
#[async_trait::async_trait]
impl Authenticator for CountingAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthResult, AuthenticatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if credentials.username != "testuser" || credentials.password != "testpassword" {
            let mut packet = AuthResult::empty(None);
            packet.error = Some(json!("Unknown user or wrong password"));
            return Ok(packet);
        }

        let mut body: Map<String, Value> = Map::new();
        body.insert("UserID".into(), json!(1));
        body.insert("UserRole".into(), json!("User"));
        if let Some(id) = &self.session_id {
            body.insert("SessionID".into(), json!(id));
        }
        AuthResult::from_authority(body).map_err(|err| AuthenticatorError::Other(err.to_string()))
    }
}

/// Never manages to reach anyone.
struct UnreachableAuthenticator;
#[async_trait::async_trait]
impl Authenticator for UnreachableAuthenticator {
    async fn authenticate(&self, _credentials: &Credentials) -> Result<AuthResult, AuthenticatorError> {
        Err(AuthenticatorError::InvalidAuthResponse { url: "http://localhost:1/Authenticate".into(), reason: "connection refused".into() })
    }
}



fn app() -> Routes { warp::path("app").map(|| -> Box<dyn Reply> { Box::new("Hello from the app") }).boxed() }

fn server<A>(auth_types: &[&str], authenticator: A, store: TestStore) -> Arc<Srv<A, TestStore>>
where
    A: 'static + Authenticator + Send + Sync,
{
    Arc::new(Srv::new(([127, 0, 0, 1], 0), Some(auth_types.iter().map(|name| name.to_string()).collect()), authenticator, store))
}

fn basic(username: &str, password: &str) -> String {
    format!("Basic {}", base64ct::Base64::encode_string(format!("{username}:{password}").as_bytes()))
}

fn body_str(body: &Bytes) -> &str { std::str::from_utf8(body).unwrap() }

fn cookie_of(headers: &HeaderMap) -> String {
    let set_cookie: &str = headers.get(SET_COOKIE).expect("no Set-Cookie header").to_str().unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}





/***** TESTS *****/
#[tokio::test]
async fn test_basic_without_credentials_is_challenged() {
    let srv = server(&["HTTP"], CountingAuthenticator::default(), TestStore::default());
    let filter = Srv::filter(srv.clone(), app());

    let res = warp::test::request().method("GET").path("/app").reply(&filter).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers().get(WWW_AUTHENTICATE).unwrap(), BASIC_CHALLENGE);
    assert_eq!(body_str(res.body()), NEED_INPUT);
    assert_eq!(srv.authenticator.calls.load(Ordering::SeqCst), 0);

    // A broken header counts as no header
    let res = warp::test::request().method("GET").path("/app").header("authorization", "Basic !!!").reply(&filter).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_str(res.body()), NEED_INPUT);
    assert_eq!(srv.authenticator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_basic_with_wrong_credentials_is_denied() {
    let srv = server(&["HTTP"], CountingAuthenticator::default(), TestStore::default());
    let filter = Srv::filter(srv.clone(), app());

    let res = warp::test::request().method("GET").path("/app").header("authorization", basic("bad", "wrong")).reply(&filter).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers().get(WWW_AUTHENTICATE).unwrap(), BASIC_CHALLENGE);
    assert_eq!(body_str(res.body()), INCORRECT_INPUT);
    assert!(res.headers().get(SET_COOKIE).is_none());
    assert_eq!(srv.sessions().len(), 0);
}

#[tokio::test]
async fn test_basic_adopts_remote_session() {
    let srv = server(&["HTTP"], CountingAuthenticator::issuing("remote-abc"), TestStore::default());
    let filter = Srv::filter(srv.clone(), app());

    let res = warp::test::request().method("GET").path("/app").header("authorization", basic("testuser", "testpassword")).reply(&filter).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_str(res.body()), "Hello from the app");
    assert_eq!(cookie_of(res.headers()), "UserSession=remote-abc");

    let session = srv.sessions().get("remote-abc").expect("remote session was not adopted");
    assert_eq!(session.user.session_id.as_deref(), Some("remote-abc"));
    assert_eq!(session.user.identity.get("UserRole"), Some(&json!("User")));
}

#[tokio::test]
async fn test_basic_generates_session_without_remote_one() {
    let srv = server(&["HTTP"], CountingAuthenticator::default(), TestStore::default());
    let filter = Srv::filter(srv.clone(), app());

    let res = warp::test::request().method("GET").path("/app").header("authorization", basic("testuser", "testpassword")).reply(&filter).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(cookie_of(res.headers()), "UserSession=local-0");
    assert_eq!(srv.sessions().len(), 1);
}

#[tokio::test]
async fn test_basic_session_short_circuits() {
    let srv = server(&["HTTP"], CountingAuthenticator::issuing("remote-abc"), TestStore::default());
    let filter = Srv::filter(srv.clone(), app());

    let res = warp::test::request().method("GET").path("/app").header("authorization", basic("testuser", "testpassword")).reply(&filter).await;
    let cookie: String = cookie_of(res.headers());
    assert_eq!(srv.authenticator.calls.load(Ordering::SeqCst), 1);

    // With the cookie, nobody is asked anything, not even with broken credentials attached
    let res = warp::test::request()
        .method("GET")
        .path("/app")
        .header("cookie", &cookie)
        .header("authorization", basic("bad", "wrong"))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get(SET_COOKIE).is_none());
    assert_eq!(srv.authenticator.calls.load(Ordering::SeqCst), 1);
    assert!(srv.check_if_logged_in(&{
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie.parse().unwrap());
        headers
    })
    .await);
}

#[tokio::test]
async fn test_unreachable_authenticator_is_a_denial() {
    let srv = server(&["HTTP"], UnreachableAuthenticator, TestStore::default());
    let filter = Srv::filter(srv.clone(), app());

    let res = warp::test::request().method("GET").path("/app").header("authorization", basic("testuser", "testpassword")).reply(&filter).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_str(res.body()), INCORRECT_INPUT);
    assert_eq!(srv.sessions().len(), 0);
}

#[tokio::test]
async fn test_session_failure_is_not_a_login() {
    let srv = server(&["HTTP", "POST"], CountingAuthenticator::issuing("remote-abc"), TestStore::broken());
    let filter = Srv::filter(srv.clone(), app());

    let res = warp::test::request().method("GET").path("/app").header("authorization", basic("testuser", "testpassword")).reply(&filter).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_str(res.body()), SessionFailure::MESSAGE);
    assert!(res.headers().get(SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_post_returns_user_packet() {
    let srv = server(&["POST"], CountingAuthenticator::issuing("remote-abc"), TestStore::default());
    let filter = Srv::filter(srv.clone(), app());

    let res = warp::test::request()
        .method("POST")
        .path("/1.0/Authenticate")
        .header("content-type", "application/json")
        .body(r#"{"Username":"testuser","Password":"testpassword"}"#)
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(cookie_of(res.headers()), "UserSession=remote-abc");
    let packet: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(packet["LoggedIn"], json!(true));
    assert_eq!(packet["UserRole"], json!("User"));
    assert_eq!(packet["SessionID"], json!("remote-abc"));
}

#[tokio::test]
async fn test_post_redirects_when_configured() {
    let srv = server(&["POST"], CountingAuthenticator::default(), TestStore::default());
    srv.set_post_redirect_url(Some("http://elsewhere".into())).await;
    let filter = Srv::filter(srv.clone(), app());

    let res = warp::test::request()
        .method("POST")
        .path("/1.0/Authenticate")
        .header("content-type", "application/x-www-form-urlencoded")
        .body("Username=testuser&Password=testpassword")
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers().get(LOCATION).unwrap(), "http://elsewhere");
    assert!(res.headers().get(SET_COOKIE).is_some());

    // And unsetting it goes back to the packet
    srv.set_post_redirect_url(None).await;
    assert_eq!(srv.post_redirect_url().await, None);
}

#[tokio::test]
async fn test_post_missing_field_is_not_forwarded() {
    let srv = server(&["POST"], CountingAuthenticator::default(), TestStore::default());
    let filter = Srv::filter(srv.clone(), app());

    let res = warp::test::request()
        .method("POST")
        .path("/1.0/Authenticate")
        .header("content-type", "application/json")
        .body(r#"{"Username":"testuser"}"#)
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_str(res.body()), NEED_INPUT);
    assert_eq!(srv.authenticator.calls.load(Ordering::SeqCst), 0);

    let res = warp::test::request()
        .method("POST")
        .path("/1.0/Authenticate")
        .header("content-type", "application/json")
        .body(r#"{"Username":"bad","Password":"wrong"}"#)
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_str(res.body()), INCORRECT_INPUT);
    assert_eq!(srv.authenticator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_post_before_basic_is_reachable_without_basic() {
    let srv = server(&["POST", "HTTP"], CountingAuthenticator::default(), TestStore::default());
    let filter = Srv::filter(srv.clone(), app());

    let res = warp::test::request()
        .method("POST")
        .path("/1.0/Authenticate")
        .header("content-type", "application/json")
        .body(r#"{"Username":"testuser","Password":"testpassword"}"#)
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let cookie: String = cookie_of(res.headers());

    // The app is still gated, but the POST session opens it
    let res = warp::test::request().method("GET").path("/app").reply(&filter).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let res = warp::test::request().method("GET").path("/app").header("cookie", &cookie).reply(&filter).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(srv.authenticator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_basic_before_post_gates_post() {
    let srv = server(&["HTTP", "POST"], CountingAuthenticator::default(), TestStore::default());
    let filter = Srv::filter(srv.clone(), app());

    let res = warp::test::request()
        .method("POST")
        .path("/1.0/Authenticate")
        .header("content-type", "application/json")
        .body(r#"{"Username":"testuser","Password":"testpassword"}"#)
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers().get(WWW_AUTHENTICATE).unwrap(), BASIC_CHALLENGE);
    assert_eq!(srv.authenticator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_session_routes_are_never_gated() {
    let srv = server(&["HTTP"], CountingAuthenticator::default(), TestStore::default());
    let filter = Srv::filter(srv.clone(), app());

    let res = warp::test::request().method("GET").path("/1.0/CheckSession").reply(&filter).await;
    assert_eq!(res.status(), StatusCode::OK);
    let packet: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(packet, json!({ "LoggedIn": false, "UserID": 0 }));
}

#[tokio::test]
async fn test_unknown_and_duplicate_transports_are_skipped() {
    let srv = server(&["LDAP", "HTTP", "HTTP"], CountingAuthenticator::default(), TestStore::default());
    assert_eq!(srv.auth_types(), vec![crate::AuthType::Http]);

    let filter = Srv::filter(srv.clone(), app());
    let res = warp::test::request().method("GET").path("/app").header("authorization", basic("testuser", "testpassword")).reply(&filter).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(srv.authenticator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_transports_leaves_app_open() {
    let srv = server(&[], CountingAuthenticator::default(), TestStore::default());
    let filter = Srv::filter(srv.clone(), app());

    let res = warp::test::request().method("GET").path("/app").reply(&filter).await;
    assert_eq!(res.status(), StatusCode::OK);

    // And the default is the Basic gate
    let srv: Srv<CountingAuthenticator, TestStore> = Srv::new(([127, 0, 0, 1], 0), None, CountingAuthenticator::default(), TestStore::default());
    assert_eq!(srv.auth_types(), vec![crate::AuthType::Http]);
}

#[tokio::test]
async fn test_decide_verdicts() {
    let srv = server(&["HTTP"], CountingAuthenticator::issuing("remote-abc"), TestStore::default());

    let verdict = srv.decide(&HeaderMap::new(), || Some(Credentials::new("testuser", "testpassword"))).await.unwrap();
    let session: Session = match verdict {
        Verdict::NewlyAuthenticated { result, session } => {
            assert_eq!(result.override_session_id(), Some("remote-abc"));
            session
        },
        other => panic!("Expected a new session, got {other:?}"),
    };

    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, format!("UserSession={}", session.id).parse().unwrap());
    let verdict = srv.decide(&headers, || panic!("credentials extracted for a logged-in session")).await.unwrap();
    assert!(matches!(verdict, Verdict::AlreadyLoggedIn(_)));
    assert_eq!(verdict.session(), Some(&session));

    assert!(matches!(srv.decide(&HeaderMap::new(), || None).await, Err(crate::DecisionError::CredentialsMissing)));
    assert!(matches!(srv.decide(&HeaderMap::new(), || Some(Credentials::new("bad", "wrong"))).await, Ok(Verdict::Denied)));
}

#[tokio::test]
async fn test_basic_login_on_unknown_route_keeps_cookie() {
    let srv = server(&["HTTP"], CountingAuthenticator::default(), TestStore::default());
    let filter = Srv::filter(srv.clone(), app());

    let res = warp::test::request().method("GET").path("/nope").header("authorization", basic("testuser", "testpassword")).reply(&filter).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let cookie: String = cookie_of(res.headers());
    assert_eq!(srv.sessions().len(), 1);

    // The session is usable afterwards, so nobody needs to ask again
    let res = warp::test::request().method("POST").path("/app").header("cookie", &cookie).reply(&filter).await;
    assert_eq!(res.status(), StatusCode::OK);
    let res = warp::test::request().method("GET").path("/nope").header("cookie", &cookie).reply(&filter).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.headers().get(SET_COOKIE).is_none());
    assert_eq!(srv.authenticator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(srv.sessions().len(), 1);
}

#[tokio::test]
async fn test_post_without_content_length() {
    let srv = server(&["POST", "HTTP"], CountingAuthenticator::default(), TestStore::default());
    let filter = Srv::filter(srv.clone(), app());

    // No body at all means no `Content-Length` either; it must still reach the endpoint
    let res = warp::test::request().method("POST").path("/1.0/Authenticate").reply(&filter).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().get(WWW_AUTHENTICATE).is_none());
    assert_eq!(body_str(res.body()), NEED_INPUT);
    assert_eq!(srv.authenticator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_post_body_too_large() {
    let srv = server(&["POST"], CountingAuthenticator::default(), TestStore::default());
    let filter = Srv::filter(srv.clone(), app());

    let password: String = "x".repeat(crate::post::MAX_BODY_SIZE);
    let res = warp::test::request()
        .method("POST")
        .path("/1.0/Authenticate")
        .header("content-type", "application/json")
        .body(format!(r#"{{"Username":"testuser","Password":"{password}"}}"#))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_str(res.body()), crate::post::BODY_TOO_LARGE);
    assert_eq!(srv.authenticator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_run_until_stops_on_shutdown() {
    let srv: Srv<CountingAuthenticator, TestStore> = Srv::new(([127, 0, 0, 1], 0), None, CountingAuthenticator::default(), TestStore::default());
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(srv.run_until(app(), async move {
        let _ = stopped.await;
    }));

    stop.send(()).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(5), handle).await.expect("server did not stop").unwrap();
}
