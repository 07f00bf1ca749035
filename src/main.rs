//  MAIN.rs
//    by Lut99
//
//  Created:
//    17 Oct 2026, 14:02:17
//  Last edited:
//    19 Oct 2026, 15:51:40
//  Auto updated?
//    Yes
//
//  Description:
//!   Entrypoint to the `session-remote-auth` binary.
//

use std::net::SocketAddr;
use std::path::PathBuf;

use auth_resolver::Authenticator;
use clap::Parser;
use error_trace::{trace, ErrorTrace as _};
use humanlog::{DebugMode, HumanLogger};
use log::{debug, error, info};
use serde::Serialize;
use session_remote_auth::auth::StaticAuthenticator;
use session_remote_auth::config::{AuthenticatorKind, Config};
use session_remote_auth::remote::RemoteAuthenticator;
use session_remote_auth::session::MemorySessionStore;
use srv::{Routes, Srv};
use warp::reply::Reply;
use warp::Filter;


/***** ARGUMENTS *****/
/// Defines the arguments for the `session-remote-auth` server.
#[derive(Debug, Parser)]
struct Arguments {
    /// Whether to enable full debugging
    #[clap(long, global = true, help = "If given, enables more verbose debugging.")]
    trace: bool,

    /// The address on which to bind ourselves.
    #[clap(short, long, env, default_value = "127.0.0.1:8080", help = "The address on which to bind the server.")]
    address: SocketAddr,
    /// The configuration file.
    #[clap(short, long, env, default_value = "./config.yml", help = "The YAML file with the authentication settings.")]
    config: PathBuf,
    /// Overrides the redirect URL from the config file.
    #[clap(long, env, help = "If given, redirects successful POST logins to this URL instead of returning the user packet.")]
    post_redirect_url: Option<String>,
}





/***** APPLICATION *****/
/// What `GET /ping` answers.
#[derive(Serialize)]
struct PingReply {
    success: bool,
    ping:    &'static str,
}

/// The routes of the application we're guarding.
fn app() -> Routes {
    warp::get()
        .and(warp::path!("ping"))
        .map(|| -> Box<dyn Reply> { Box::new(warp::reply::json(&PingReply { success: true, ping: "pong" })) })
        .boxed()
}

/// Serves the application with the given authenticator.
async fn run_app<A>(args: Arguments, config: Config, authenticator: A)
where
    A: 'static + Authenticator + Send + Sync,
{
    let sessions = MemorySessionStore::new(config.session_cookie_name.clone(), config.session_timeout());
    let server = Srv::new(args.address, config.auth_types.clone(), authenticator, sessions);

    // The CLI wins from the file
    let redirect: Option<String> = args.post_redirect_url.or(config.post_redirect_url);
    if redirect.is_some() {
        server.set_post_redirect_url(redirect).await;
    }

    server.run(app()).await;
}





/***** ENTRYPOINT *****/
#[tokio::main]
async fn main() {
    if dotenvy::dotenv().is_err() {
        eprintln!("Could not load or find .env file. Assuming all necessary environment variables are set");
    }

    // Parse arguments
    let args: Arguments = Arguments::parse();

    // Setup a logger
    if let Err(err) = HumanLogger::terminal(if args.trace { DebugMode::Full } else { DebugMode::Debug }).init() {
        eprintln!("WARNING: Failed to setup logger: {err} (no logging for this session)");
    }
    info!("{} - v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    // Load the config
    let config: Config = match Config::from_path(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err.trace());
            std::process::exit(1);
        },
    };
    debug!("Using {:?} authenticator", config.authenticator);

    match config.authenticator {
        AuthenticatorKind::Remote => {
            // Validated to be there
            let url: String = config.authentication_server_url.clone().unwrap_or_default();
            let authenticator: RemoteAuthenticator = match RemoteAuthenticator::new(&url, config.authentication_timeout()) {
                Ok(authenticator) => authenticator,
                Err(err) => {
                    error!("{}", trace!(("Failed to create remote authenticator"), err));
                    std::process::exit(1);
                },
            };
            info!("Authenticating against '{}'", authenticator.endpoint());
            run_app(args, config, authenticator).await;
        },
        AuthenticatorKind::Static => {
            let authenticator = StaticAuthenticator::new(config.static_users.clone());
            info!("Authenticating against {} static user(s)", authenticator.len());
            run_app(args, config, authenticator).await;
        },
    }
}
