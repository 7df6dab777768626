//! Courier Core Library
//!
//! A blocking HTTP client execution engine: cookies, redirects and
//! challenge-response authentication are handled above a pluggable
//! transport so call sites only describe the request.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`cookie`] - Cookie values, `Set-Cookie` parsing and the domain-indexed jar
//! - [`auth`] - Authentication strategies (Digest, Basic) and the scope registry
//! - [`http`] - Request descriptor, execution pipeline, typed responses
//! - [`config`] - Client-wide defaults and shared state
//!
//! # Example
//!
//! ```no_run
//! use courier_core::{ClientConfig, Request};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::builder().build()?;
//! let mut response = Request::get("https://example.com/").build()?.execute(&config)?;
//! println!("{} {}", response.status(), response.text()?);
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod cookie;
pub mod http;

// Re-export commonly used types
pub use auth::{
    AuthError, AuthScope, Authentication, AuthenticationManager, BasicAuthentication,
    DigestAuthentication, SecretString, SharedAuthentication,
};
pub use config::{ClientConfig, ClientConfigBuilder, ConfigError};
pub use cookie::{Cookie, CookieError, CookieJar};
pub use http::{
    AuthenticatingRequest, ConnectionObserver, ExecuteError, InterceptorTable, Request,
    RequestBuilder, Response, ResponseHandler, ResponseKind, StatusInterceptor, Transport,
    TransportError,
};
