//! Request descriptors and their builder.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use restcall_common_config::RequestDefaults;
use restcall_common_core::{content_type, to_json, Log, SerializationFault, TextEncoding};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u8 = 5;

/// Common header names.
pub mod headers {
    pub const AUTHORIZATION: &str = "Authorization";
}

/// HTTP verb of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    /// Wire name of the verb.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// The fetch verb needs neither content type nor encoding.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Get)
    }

    /// Verbs whose body is written to the wire.
    pub fn carries_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "" => Err(ValidationError::MissingMethod),
            other => Err(ValidationError::UnknownMethod(other.to_string())),
        }
    }
}

/// Why a request descriptor could not be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("WebMethod is not defined.")]
    MissingMethod,

    #[error("ContentType is not defined.")]
    MissingContentType,

    #[error("Encoding is not defined.")]
    MissingEncoding,

    #[error("Timeout must be zero or larger.")]
    NegativeTimeout,

    #[error("unknown HTTP method: {0}")]
    UnknownMethod(String),

    #[error("unknown text encoding: {0}")]
    UnknownEncoding(String),
}

/// An immutable-policy request descriptor.
///
/// Method, content type, encoding and retry policy are fixed at build time.
/// The body and headers stay mutable so one descriptor can be reused.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    content_type: Option<String>,
    body: Option<String>,
    encoding: Option<TextEncoding>,
    timeout: Duration,
    max_retries: u8,
    retry_delay: Duration,
    headers: HashMap<String, String>,
    log: Log,
}

impl Request {
    /// Start building a request.
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    /// Validate and build a request in one call.
    ///
    /// A blank `content_type` counts as absent.
    pub fn new(
        method: Method,
        content_type: impl Into<String>,
        body: impl Into<String>,
        encoding: Option<TextEncoding>,
        timeout: Duration,
        max_retries: u8,
    ) -> Result<Self, ValidationError> {
        let mut builder = RequestBuilder::new()
            .method(method)
            .content_type(content_type)
            .body(body)
            .timeout(timeout)
            .max_retries(max_retries);
        if let Some(encoding) = encoding {
            builder = builder.encoding(encoding);
        }
        builder.build()
    }

    /// A fetch request with default policy.
    pub fn get() -> Self {
        Self::from_parts(Method::Get, None, None)
    }

    /// A request carrying JSON in UTF-8.
    pub fn json(method: Method) -> Self {
        Self::from_parts(
            method,
            Some(content_type::APPLICATION_JSON.to_string()),
            Some(TextEncoding::Utf8),
        )
    }

    fn from_parts(
        method: Method,
        content_type: Option<String>,
        encoding: Option<TextEncoding>,
    ) -> Self {
        Self {
            method,
            content_type,
            body: None,
            encoding,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::ZERO,
            headers: HashMap::new(),
            log: Log::new(),
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Replace the body text.
    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = Some(body.into());
    }

    /// Remove the body.
    pub fn clear_body(&mut self) {
        self.body = None;
    }

    pub fn encoding(&self) -> Option<TextEncoding> {
        self.encoding
    }

    /// Encoding used for the body and for reading responses.
    pub fn body_encoding(&self) -> TextEncoding {
        self.encoding.unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u8 {
        self.max_retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Attempt budget and pacing derived from this descriptor.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.headers
    }

    /// Set a header, replacing any previous value for the same key.
    pub fn insert_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Diagnostics recorded while preparing this request.
    pub fn log(&self) -> &Log {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut Log {
        &mut self.log
    }

    /// Serialize a payload to JSON text.
    pub fn serialize<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String, SerializationFault> {
        to_json(payload)
    }

    /// Serialize a payload, capturing any failure in this request's log.
    pub fn try_serialize<T: Serialize + ?Sized>(&mut self, payload: &T) -> Option<String> {
        match self.serialize(payload) {
            Ok(text) => Some(text),
            Err(fault) => {
                self.log.capture_fault(fault);
                None
            }
        }
    }

    /// Serialize a payload straight into the body.
    ///
    /// Returns `false` and leaves the body untouched when serialization fails.
    pub fn attach_json<T: Serialize + ?Sized>(&mut self, payload: &T) -> bool {
        match self.try_serialize(payload) {
            Some(text) => {
                self.body = Some(text);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
enum Given<T> {
    Known(T),
    Unknown(String),
}

/// Builder that validates a [`Request`] once, in [`RequestBuilder::build`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Option<Given<Method>>,
    content_type: Option<String>,
    body: Option<String>,
    encoding: Option<Given<TextEncoding>>,
    timeout_ms: i64,
    max_retries: u8,
    retry_delay: Duration,
    headers: HashMap<String, String>,
}

impl RequestBuilder {
    /// Create a builder with default policy and no method.
    pub fn new() -> Self {
        Self {
            method: None,
            content_type: None,
            body: None,
            encoding: None,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as i64,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::ZERO,
            headers: HashMap::new(),
        }
    }

    /// Seed a builder from configured defaults.
    pub fn from_defaults(defaults: &RequestDefaults) -> Self {
        let mut builder = Self::new()
            .method_name(&defaults.method)
            .timeout_secs(defaults.timeout_secs)
            .max_retries(defaults.max_retries)
            .retry_delay(Duration::from_millis(defaults.retry_delay_ms));

        if let Some(content_type) = &defaults.content_type {
            builder = builder.content_type(content_type);
        }
        if let Some(label) = &defaults.encoding {
            builder = builder.encoding_label(label);
        }
        for (name, value) in &defaults.headers {
            builder = builder.header(name, value);
        }
        builder
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(Given::Known(method));
        self
    }

    /// Set the method by name; unknown names fail at build time.
    pub fn method_name(mut self, name: &str) -> Self {
        self.method = match name.parse::<Method>() {
            Ok(method) => Some(Given::Known(method)),
            Err(ValidationError::MissingMethod) => None,
            Err(_) => Some(Given::Unknown(name.to_string())),
        };
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set content type to JSON in UTF-8.
    pub fn json_content(self) -> Self {
        self.content_type(content_type::APPLICATION_JSON)
            .encoding(TextEncoding::Utf8)
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = Some(Given::Known(encoding));
        self
    }

    /// Set the encoding by label; unknown labels fail at build time.
    pub fn encoding_label(mut self, label: &str) -> Self {
        self.encoding = match TextEncoding::from_label(label) {
            Some(encoding) => Some(Given::Known(encoding)),
            None if label.trim().is_empty() => None,
            None => Some(Given::Unknown(label.to_string())),
        };
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        self
    }

    /// Set the timeout in whole seconds. Negative values fail at build time.
    pub fn timeout_secs(mut self, secs: i64) -> Self {
        self.timeout_ms = secs.saturating_mul(1000);
        self
    }

    pub fn max_retries(mut self, max_retries: u8) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add bearer token authorization.
    pub fn bearer_auth(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.header(headers::AUTHORIZATION, value)
    }

    /// Validate and produce the descriptor.
    ///
    /// Checks run in order: method, content type, encoding, timeout. The
    /// fetch verb skips the content type and encoding checks.
    pub fn build(self) -> Result<Request, ValidationError> {
        let method = match self.method {
            None => return Err(ValidationError::MissingMethod),
            Some(Given::Unknown(name)) => return Err(ValidationError::UnknownMethod(name)),
            Some(Given::Known(method)) => method,
        };

        let content_type = self.content_type.filter(|ct| !ct.trim().is_empty());
        let encoding = match self.encoding {
            Some(Given::Unknown(label)) => return Err(ValidationError::UnknownEncoding(label)),
            Some(Given::Known(encoding)) => Some(encoding),
            None => None,
        };

        if !method.is_fetch() {
            if content_type.is_none() {
                return Err(ValidationError::MissingContentType);
            }
            if encoding.is_none() {
                return Err(ValidationError::MissingEncoding);
            }
        }

        if self.timeout_ms < 0 {
            return Err(ValidationError::NegativeTimeout);
        }

        Ok(Request {
            method,
            content_type,
            body: self.body,
            encoding,
            timeout: Duration::from_millis(self.timeout_ms as u64),
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            headers: self.headers,
            log: Log::new(),
        })
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restcall_common_core::FaultKind;
    use serde::ser::Error as _;
    use serde::Serializer;

    #[test]
    fn test_defaults() {
        let request = Request::builder().method(Method::Get).build().unwrap();
        assert_eq!(request.timeout(), Duration::from_secs(30));
        assert_eq!(request.max_retries(), 5);
        assert_eq!(request.retry_delay(), Duration::ZERO);
        assert_eq!(request.body_encoding(), TextEncoding::Utf8);
        assert!(request.headers().is_empty());
        assert!(request.log().is_empty());
    }

    #[test]
    fn test_new_validates() {
        let request = Request::new(
            Method::Post,
            "application/json",
            "{}",
            Some(TextEncoding::Utf8),
            Duration::from_secs(5),
            2,
        )
        .unwrap();
        assert_eq!(request.body(), Some("{}"));
        assert_eq!(request.timeout(), Duration::from_secs(5));
        assert_eq!(request.max_retries(), 2);

        let err = Request::new(Method::Post, "", "{}", None, DEFAULT_TIMEOUT, 0).unwrap_err();
        assert_eq!(err, ValidationError::MissingContentType);

        let fetch = Request::new(Method::Get, "", "", None, DEFAULT_TIMEOUT, 0).unwrap();
        assert_eq!(fetch.content_type(), None);
    }

    #[test]
    fn test_validation_order() {
        assert_eq!(
            Request::builder().timeout_secs(-1).build().unwrap_err(),
            ValidationError::MissingMethod
        );
        assert_eq!(
            Request::builder().method(Method::Post).timeout_secs(-1).build().unwrap_err(),
            ValidationError::MissingContentType
        );
        assert_eq!(
            Request::builder()
                .method(Method::Post)
                .content_type("application/json")
                .timeout_secs(-1)
                .build()
                .unwrap_err(),
            ValidationError::MissingEncoding
        );
        assert_eq!(
            Request::builder()
                .method(Method::Post)
                .json_content()
                .timeout_secs(-1)
                .build()
                .unwrap_err(),
            ValidationError::NegativeTimeout
        );
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(ValidationError::MissingMethod.to_string(), "WebMethod is not defined.");
        assert_eq!(
            ValidationError::MissingContentType.to_string(),
            "ContentType is not defined."
        );
        assert_eq!(ValidationError::MissingEncoding.to_string(), "Encoding is not defined.");
        assert_eq!(
            ValidationError::NegativeTimeout.to_string(),
            "Timeout must be zero or larger."
        );
    }

    #[test]
    fn test_fetch_needs_no_content_type_or_encoding() {
        let request = Request::builder().method(Method::Get).timeout_secs(0).build().unwrap();
        assert_eq!(request.content_type(), None);
        assert_eq!(request.encoding(), None);
        assert_eq!(request.timeout(), Duration::ZERO);
    }

    #[test]
    fn test_blank_content_type_counts_as_missing() {
        let err = Request::builder()
            .method(Method::Put)
            .content_type("   ")
            .encoding(TextEncoding::Utf8)
            .build()
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingContentType);
    }

    #[test]
    fn test_method_names() {
        assert_eq!("post".parse::<Method>().unwrap(), Method::Post);
        assert_eq!(" Patch ".parse::<Method>().unwrap(), Method::Patch);
        assert_eq!("".parse::<Method>().unwrap_err(), ValidationError::MissingMethod);
        assert!(matches!(
            "BREW".parse::<Method>(),
            Err(ValidationError::UnknownMethod(_))
        ));
        assert!(Method::Post.carries_body());
        assert!(Method::Patch.carries_body());
        assert!(!Method::Delete.carries_body());
        assert!(!Method::Get.carries_body());
    }

    #[test]
    fn test_unknown_names_fail_at_build() {
        let err = Request::builder().method_name("brew").build().unwrap_err();
        assert_eq!(err, ValidationError::UnknownMethod("brew".to_string()));

        let err = Request::builder()
            .method(Method::Post)
            .content_type("text/plain")
            .encoding_label("klingon")
            .build()
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownEncoding("klingon".to_string()));
    }

    #[test]
    fn test_from_defaults() {
        let mut defaults = RequestDefaults::default();
        defaults.method = "post".to_string();
        defaults.timeout_secs = 4;
        defaults.max_retries = 1;
        defaults.retry_delay_ms = 20;
        defaults.headers.insert("X-Trace".to_string(), "abc".to_string());

        let request = RequestBuilder::from_defaults(&defaults).build().unwrap();
        assert_eq!(request.method(), Method::Post);
        assert_eq!(request.content_type(), Some("application/json"));
        assert_eq!(request.encoding(), Some(TextEncoding::Utf8));
        assert_eq!(request.timeout(), Duration::from_secs(4));
        assert_eq!(request.max_retries(), 1);
        assert_eq!(request.retry_delay(), Duration::from_millis(20));
        assert_eq!(request.headers().get("X-Trace").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_headers_replace_by_key() {
        let mut request = Request::builder()
            .method(Method::Get)
            .bearer_auth("t0k3n")
            .build()
            .unwrap();
        request.insert_header("Authorization", "Bearer other");
        request.headers_mut().insert("X-Empty".to_string(), String::new());

        assert_eq!(request.headers().len(), 2);
        assert_eq!(request.headers()["Authorization"], "Bearer other");
    }

    #[test]
    fn test_attach_json_sets_body() {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Contact<'a> {
            name: &'a str,
        }

        let mut request = Request::json(Method::Post);
        assert!(request.attach_json(&Contact { name: "Tom Hanks" }));
        assert_eq!(request.body(), Some(r#"{"Name":"Tom Hanks"}"#));
        assert!(!request.log().has_errors());
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refusing to serialize"))
        }
    }

    #[test]
    fn test_try_serialize_captures_fault() {
        let mut request = Request::json(Method::Post);
        request.set_body("keep me");

        assert!(request.serialize(&Unserializable).is_err());
        assert_eq!(request.try_serialize(&Unserializable), None);
        assert!(!request.attach_json(&Unserializable));

        assert_eq!(request.body(), Some("keep me"));
        let fault = request.log().fault().unwrap();
        assert_eq!(fault.kind(), FaultKind::Serialization);
        assert!(fault.message().contains("refusing to serialize"));
    }
}
