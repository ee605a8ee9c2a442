//! Single-transaction HTTP client with retries and diagnostic logs.
//!
//! ```no_run
//! use restcall_client::{Client, Method, Request};
//!
//! # fn main() -> Result<(), restcall_client::ConfigurationError> {
//! let mut client = Client::with_parameters("http://localhost:52101/Service1", "TestPost")?;
//! let mut request = Request::json(Method::Post);
//! request.set_body(r#"{"Name":"Tom Hanks"}"#);
//!
//! let response = client.send(request)?;
//! match response.log().fault() {
//!     Some(fault) => eprintln!("failed after {} attempts: {fault}", response.attempts()),
//!     None => println!("{}", response.raw_response()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod delivery;
pub mod request;
pub mod response;
pub mod retry;
pub mod transport;

pub use client::{compose_uri, AbortHandle, Client, ConfigurationError};
pub use delivery::{ChannelContext, ContextPump, DeliveryContext, InlineContext, ProgressHooks};
pub use request::{Method, Request, RequestBuilder, ValidationError};
pub use response::Response;
pub use retry::RetryPolicy;
pub use transport::{ReqwestTransport, Transport, TransportConfig};

pub use reqwest::StatusCode;
pub use restcall_common_core::{Category, Fault, FaultKind, Log, TextEncoding};
