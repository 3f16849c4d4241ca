use httpc::http::parser::{ParseError, find_headers_end, tokenize};
use httpc::http::request::TokenList;

/// Copies `req` into a zeroed buffer of `capacity` bytes, as a connection
/// slot would hold it.
fn slot_buffer(req: &[u8], capacity: usize) -> Vec<u8> {
    let mut buf = vec![0u8; capacity];
    buf[..req.len()].copy_from_slice(req);
    buf
}

fn words<'a>(buf: &'a [u8], tokens: &TokenList) -> Vec<&'a [u8]> {
    tokens.as_slice().iter().map(|t| t.slice(buf)).collect()
}

#[test]
fn test_find_headers_end() {
    assert_eq!(find_headers_end(b"GET / HTTP/1.1\r\n\r\n"), Some(14));
    assert_eq!(find_headers_end(b"GET / HTTP/1.1\r\nHost: a\r\n"), None);
    assert_eq!(find_headers_end(b"\r\n\r"), None);
    assert_eq!(find_headers_end(b""), None);
}

#[test]
fn test_tokenize_request_with_headers() {
    let req = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nConnection: close\r\n\r\n";
    let mut buf = slot_buffer(req, 256);
    let mut tokens = TokenList::with_capacity(16);

    let n = tokenize(&mut buf, req.len(), &mut tokens).unwrap();

    assert_eq!(n, 7);
    assert_eq!(
        words(&buf, &tokens),
        vec![
            &b"GET"[..],
            b"/index.html",
            b"HTTP/1.1",
            b"Host:",
            b"example.com",
            b"Connection:",
            b"close"
        ]
    );
}

#[test]
fn test_tokenize_terminates_tokens_in_place() {
    let req = b"HEAD /a HTTP/1.0\r\n\r\n";
    let mut buf = slot_buffer(req, 64);
    let mut tokens = TokenList::with_capacity(8);

    tokenize(&mut buf, req.len(), &mut tokens).unwrap();

    for token in tokens.as_slice() {
        assert_eq!(buf[token.start + token.len], 0);
    }
}

#[test]
fn test_tokenize_mixed_whitespace() {
    let req = b"  GET\t\t/x \t HTTP/1.1\r\n\r\n";
    let mut buf = slot_buffer(req, 64);
    let mut tokens = TokenList::with_capacity(8);

    tokenize(&mut buf, req.len(), &mut tokens).unwrap();

    assert_eq!(words(&buf, &tokens), vec![&b"GET"[..], b"/x", b"HTTP/1.1"]);
}

#[test]
fn test_tokenize_is_idempotent() {
    let req = b"GET /path HTTP/1.1\r\nUser-Agent: test  client\r\nAccept: */*\r\n\r\n";
    let mut buf = slot_buffer(req, 128);
    let mut tokens = TokenList::with_capacity(16);

    let first_count = tokenize(&mut buf, req.len(), &mut tokens).unwrap();
    let first: Vec<_> = tokens.as_slice().to_vec();

    let second_count = tokenize(&mut buf, req.len(), &mut tokens).unwrap();
    let second: Vec<_> = tokens.as_slice().to_vec();

    assert_eq!(first_count, second_count);
    assert_eq!(first, second);
}

#[test]
fn test_tokenize_stops_at_token_capacity() {
    let req = b"GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\n\r\n";
    let mut buf = slot_buffer(req, 64);
    let mut tokens = TokenList::with_capacity(4);

    let n = tokenize(&mut buf, req.len(), &mut tokens).unwrap();

    assert_eq!(n, 4);
    assert!(tokens.is_full());
    assert_eq!(words(&buf, &tokens)[3], b"A:");
}

#[test]
fn test_tokenize_stops_at_nul() {
    let req = b"GET / HTTP/1.1\r\n\0Host: ignored\r\n\r\n";
    let mut buf = slot_buffer(req, 64);
    let mut tokens = TokenList::with_capacity(8);

    let n = tokenize(&mut buf, req.len(), &mut tokens).unwrap();

    assert_eq!(n, 3);
}

#[test]
fn test_tokenize_empty_buffer() {
    let mut buf = vec![0u8; 16];
    let mut tokens = TokenList::with_capacity(8);

    assert_eq!(tokenize(&mut buf, 0, &mut tokens).unwrap(), 0);
    assert!(tokens.is_empty());
}

#[test]
fn test_tokenize_only_whitespace() {
    let req = b" \r\n\t \r\n";
    let mut buf = slot_buffer(req, 16);
    let mut tokens = TokenList::with_capacity(8);

    assert_eq!(tokenize(&mut buf, req.len(), &mut tokens).unwrap(), 0);
}

#[test]
fn test_tokenize_token_reaching_capacity_fails() {
    // No room is left for the terminator of the last token.
    let mut buf = b"GET /aaaa".to_vec();
    let len = buf.len();
    let mut tokens = TokenList::with_capacity(8);

    let result = tokenize(&mut buf, len, &mut tokens);

    assert_eq!(result, Err(ParseError::Oversized));
}

#[test]
fn test_tokenize_clears_previous_tokens() {
    let mut tokens = TokenList::with_capacity(8);

    let req = b"GET / HTTP/1.1\r\nA: b\r\n\r\n";
    let mut buf = slot_buffer(req, 64);
    tokenize(&mut buf, req.len(), &mut tokens).unwrap();
    assert_eq!(tokens.len(), 5);

    let req = b"GET /\r\n\r\n";
    let mut buf = slot_buffer(req, 64);
    tokenize(&mut buf, req.len(), &mut tokens).unwrap();
    assert_eq!(tokens.len(), 2);
}
