//! Request execution: transport seam, request descriptor, typed responses,
//! status interception and the authentication retry loop.

mod authenticating;
mod error;
mod executor;
mod hooks;
mod intercept;
mod request;
mod reqwest_transport;
mod response;
pub(crate) mod transport;

pub use authenticating::{AuthenticatingRequest, DEFAULT_AUTH_RETRIES};
pub use error::{ExecuteError, TransportError};
pub use hooks::{ConnectionObserver, ResponseHandler};
pub use intercept::{InterceptorTable, RedirectInterceptor, StatusInterceptor};
pub use request::{Request, RequestBuilder};
pub use reqwest_transport::ReqwestTransport;
pub use response::{Response, ResponseBody, ResponseKind, classify};
pub use transport::{Exchange, PreparedRequest, Transport, TransportFailure};
