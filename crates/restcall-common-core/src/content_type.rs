//! Standard MIME content types.

use crate::encoding::TextEncoding;

pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_JSON: &str = "text/json";
pub const TEXT_HTML: &str = "text/html";
pub const TEXT_XML: &str = "text/xml";
pub const APPLICATION_XML: &str = "application/xml";
pub const APPLICATION_SOAP_XML: &str = "application/soap+xml";
pub const PLAIN_TEXT: &str = "text/plain";

/// Content-type parameter for UTF-8 bodies.
pub const CHARSET_UTF8: &str = "charset=UTF-8";

/// Append a charset parameter to a content type, unless it already has one.
pub fn with_charset(content_type: &str, encoding: TextEncoding) -> String {
    if crate::encoding::charset_from_content_type(content_type).is_some() {
        return content_type.to_string();
    }
    format!("{}; charset={}", content_type.trim_end_matches(';'), encoding.label())
}
