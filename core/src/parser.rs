//! Splits a raw transport buffer into a header chain and a body.
//!
//! The transport hands back status lines, headers and body in one string, the
//! way a client configured to include headers in its output does. When it
//! followed redirects, the buffer starts with one header block per hop:
//!
//! ```text
//! HTTP/1.1 302 Found\r\n...\r\n\r\nHTTP/1.1 200 OK\r\n...\r\n\r\n<body>
//! ```
//!
//! The buffer is split on the blank-line separator and every segment is
//! classified on its own: a segment starting with `http` (any case) is a
//! header block, anything else is body text. Header blocks are chained in
//! order; the last non-header segment becomes the body.

use log::trace;

use crate::headers::HeaderChain;

/// Separator between a header block and whatever follows it.
pub const SEPARATOR: &str = "\r\n\r\n";

/// Result of parsing one raw response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub headers: HeaderChain,
    pub body: String,
}

fn is_header_segment(segment: &str) -> bool {
    segment
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("http"))
}

/// Parse a raw response buffer.
///
/// Never fails: a buffer without any header block yields an empty header
/// chain, and a buffer without any body segment yields an empty body.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let mut headers = HeaderChain::default();
    let mut body = "";

    for (index, segment) in raw.split(SEPARATOR).enumerate() {
        if is_header_segment(segment) {
            trace!("segment {index} is a header block ({} bytes)", segment.len());
            parse_block(&mut headers, segment);
        } else {
            trace!("segment {index} is body ({} bytes)", segment.len());
            body = segment;
        }
    }

    ParsedResponse {
        headers,
        body: body.to_string(),
    }
}

fn parse_block(headers: &mut HeaderChain, segment: &str) {
    let mut lines = segment.split('\n');
    let status_line = lines.next().unwrap_or_default();
    let block = headers.begin_block(status_line);

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        match line.split_once(':') {
            Some((name, value)) => block.insert(name, value),
            None => trace!("skipping header line without a colon: {line:?}"),
        }
    }
}
