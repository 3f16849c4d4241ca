use crate::http::request::{Token, TokenList};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// A token ran into the end of the buffer with no room for its terminator.
    Oversized,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Oversized => write!(f, "request header does not fit the buffer"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Returns the offset of the `\r\n\r\n` that ends a header block.
pub fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn is_lws(b: u8) -> bool {
    matches!(b, b' ' | b'\r' | b'\n' | b'\t')
}

/// Splits the first `received` bytes of `buf` into whitespace-delimited tokens.
///
/// Each token is terminated in place by overwriting the whitespace byte that
/// follows it with `\0`, so the buffer is mutated and the tokens are only
/// valid until it is reused. The caller keeps `buf[received]` as a `\0`
/// sentinel; a `\0` where a token would start, or right after a terminator,
/// ends the scan.
///
/// Stops once `tokens` is full. Returns the number of tokens found.
pub fn tokenize(
    buf: &mut [u8],
    received: usize,
    tokens: &mut TokenList,
) -> Result<usize, ParseError> {
    tokens.clear();

    let capacity = buf.len();
    let end = received.min(capacity);
    let mut pos = 0;

    while pos < end && !tokens.is_full() {
        while pos < end && is_lws(buf[pos]) {
            pos += 1;
        }
        if pos >= end || buf[pos] == 0 {
            break;
        }

        let start = pos;
        while pos < end && buf[pos] != 0 && !is_lws(buf[pos]) {
            pos += 1;
        }
        if pos >= capacity {
            return Err(ParseError::Oversized);
        }

        buf[pos] = 0;
        tokens.push(Token {
            start,
            len: pos - start,
        });

        if pos + 1 >= capacity || buf[pos + 1] == 0 {
            break;
        }
        pos += 1;
    }

    Ok(tokens.len())
}
