//! Decides which decoder a response body goes to.
//!
//! An explicitly configured format always wins. Otherwise the current header
//! block's `content_type` is matched against the format pattern and the second
//! capture group (the media subtype) is the format: `application/json;
//! charset=utf-8` resolves to `json`.

use log::debug;
use regex::Regex;

use crate::error::RestError;
use crate::headers::HeaderChain;

/// Default content-type pattern; group 2 is the subtype.
pub const DEFAULT_FORMAT_PATTERN: &str = r"(\w+)/(\w+)(;[.+])?";

/// Compile a format pattern, rejecting patterns without a subtype group.
pub fn compile_format_regex(pattern: &str) -> Result<Regex, RestError> {
    let regex = Regex::new(pattern)?;
    // captures_len counts the implicit whole-match group.
    if regex.captures_len() < 3 {
        return Err(RestError::InvalidFormatRegex(format!(
            "{pattern:?} needs at least two capture groups"
        )));
    }
    Ok(regex)
}

/// Resolve the format identifier for a parsed response.
///
/// `body` is `None` until a response has been parsed.
pub fn resolve_format(
    headers: &HeaderChain,
    body: Option<&str>,
    explicit: Option<&str>,
    format_regex: &Regex,
) -> Result<String, RestError> {
    if body.is_none() {
        return Err(RestError::ResponseMissing);
    }

    if let Some(format) = explicit.filter(|f| !f.is_empty()) {
        debug!("using configured format {format:?}");
        return Ok(format.to_string());
    }

    let subtype = headers
        .content_type()
        .and_then(|ct| format_regex.captures(ct))
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string());

    match subtype {
        Some(format) => {
            debug!("resolved format {format:?} from content type");
            Ok(format)
        }
        None => Err(RestError::FormatUndetermined {
            headers: Box::new(headers.clone()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_response;

    fn regex() -> Regex {
        compile_format_regex(DEFAULT_FORMAT_PATTERN).unwrap()
    }

    fn headers(content_type: &str) -> HeaderChain {
        parse_response(&format!("HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\n\r\n")).headers
    }

    #[test]
    fn content_type_with_charset_resolves_subtype() {
        let h = headers("application/json; charset=utf-8");
        assert_eq!(resolve_format(&h, Some("{}"), None, &regex()).unwrap(), "json");
    }

    #[test]
    fn explicit_format_wins() {
        let h = headers("application/json");
        assert_eq!(resolve_format(&h, Some("{}"), Some("php"), &regex()).unwrap(), "php");
    }

    #[test]
    fn empty_explicit_format_falls_back_to_content_type() {
        let h = headers("text/xml");
        assert_eq!(resolve_format(&h, Some(""), Some(""), &regex()).unwrap(), "xml");
    }

    #[test]
    fn missing_content_type_is_undetermined() {
        let h = parse_response("HTTP/1.1 200 OK\r\nServer: x\r\n\r\nbody").headers;
        let err = resolve_format(&h, Some("body"), None, &regex()).unwrap_err();
        match err {
            RestError::FormatUndetermined { headers } => {
                assert_eq!(headers.http_code(), "HTTP/1.1 200 OK");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unmatched_content_type_is_undetermined() {
        let h = headers("json");
        let err = resolve_format(&h, Some("{}"), None, &regex()).unwrap_err();
        assert!(matches!(err, RestError::FormatUndetermined { .. }));
    }

    #[test]
    fn no_body_means_no_response() {
        let h = headers("application/json");
        let err = resolve_format(&h, None, Some("json"), &regex()).unwrap_err();
        assert!(matches!(err, RestError::ResponseMissing));
    }

    #[test]
    fn custom_pattern() {
        let custom = compile_format_regex(r"(\w+)/(?:vnd\.\w+\+)?(\w+)").unwrap();
        let h = headers("application/vnd.api+json");
        assert_eq!(resolve_format(&h, Some("{}"), None, &custom).unwrap(), "json");
    }

    #[test]
    fn pattern_needs_two_groups() {
        assert!(matches!(
            compile_format_regex(r"(\w+)/\w+"),
            Err(RestError::InvalidFormatRegex(_))
        ));
        assert!(matches!(
            compile_format_regex(r"(unclosed"),
            Err(RestError::InvalidFormatRegex(_))
        ));
    }
}
