//  LIB.rs
//    by Lut99
//
//  Created:
//    17 Oct 2026, 13:44:02
//  Last edited:
//    19 Oct 2026, 15:38:51
//  Auto updated?
//    Yes
//
//  Description:
//!   The concrete plugins of the `session-remote-auth` server: the
//!   authenticators, the session store and the configuration.
//

// Declare modules
pub mod auth;
pub mod config;
pub mod remote;
pub mod session;
