//! Cookie parsing and storage.
//!
//! - [`Cookie`] parses a single `Set-Cookie` line against the request URL and
//!   answers expiry and URL-matching questions.
//! - [`CookieJar`] stores cookies by domain and is safe to share between
//!   threads issuing requests concurrently.

mod error;
mod item;
mod jar;

pub use error::CookieError;
pub use item::{Cookie, SESSION_MAX_AGE};
pub use jar::{CookieJar, domain_candidates};

pub(crate) use jar::{merge_cookies, render_cookie_header};
