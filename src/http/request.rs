use std::ops::Range;

/// HTTP request methods the server answers.
///
/// Anything else is answered with `501 Not Implemented`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// HEAD - Like GET but without the response body
    HEAD,
}

impl Method {
    /// Recognizes a method token.
    ///
    /// The comparison is exact and case-sensitive.
    ///
    /// # Example
    ///
    /// ```
    /// # use httpc::http::request::Method;
    /// assert_eq!(Method::from_token(b"GET"), Some(Method::GET));
    /// assert_eq!(Method::from_token(b"get"), None);
    /// assert_eq!(Method::from_token(b"GE"), None);
    /// ```
    pub fn from_token(token: &[u8]) -> Option<Self> {
        match token {
            b"GET" => Some(Method::GET),
            b"HEAD" => Some(Method::HEAD),
            _ => None,
        }
    }
}

/// A view into a connection's request buffer.
///
/// Tokens are plain offsets: they do not own or borrow the buffer, and are
/// meaningless once the buffer is reused for the next request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Token {
    pub start: usize,
    pub len: usize,
}

impl Token {
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }

    pub fn slice<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.range()]
    }
}

/// Fixed-capacity list of tokens, allocated once per connection slot.
#[derive(Debug)]
pub struct TokenList {
    tokens: Box<[Token]>,
    len: usize,
}

impl TokenList {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tokens: vec![Token::default(); capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.tokens.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.tokens.len()
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Appends a token, returning `false` if the list is already full.
    pub fn push(&mut self, token: Token) -> bool {
        if self.is_full() {
            return false;
        }
        self.tokens[self.len] = token;
        self.len += 1;
        true
    }

    pub fn as_slice(&self) -> &[Token] {
        &self.tokens[..self.len]
    }
}

/// A tokenized request, borrowed from a connection for one handling call.
///
/// Token 0 is the method, token 1 the target, token 2 the version; the rest
/// are header names and values in the order they were received.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    buf: &'a [u8],
    tokens: &'a [Token],
}

impl<'a> Request<'a> {
    pub fn new(buf: &'a [u8], tokens: &'a [Token]) -> Self {
        Self { buf, tokens }
    }

    /// Number of tokens in the request.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn token(&self, index: usize) -> Option<&'a [u8]> {
        self.tokens.get(index).map(|t| t.slice(self.buf))
    }

    pub fn method(&self) -> Option<Method> {
        self.token(0).and_then(Method::from_token)
    }

    pub fn target(&self) -> Option<&'a [u8]> {
        self.token(1)
    }

    pub fn version(&self) -> Option<&'a [u8]> {
        self.token(2)
    }

    /// Determines whether the connection should remain open after the response.
    ///
    /// `http/1.0` defaults to close, any other version to keep-alive. A
    /// `Connection:` header overrides the default with exactly `close` or
    /// `Keep-Alive`; the last occurrence wins.
    pub fn keep_alive(&self) -> bool {
        let mut keep_alive = !self
            .version()
            .is_some_and(|v| v.eq_ignore_ascii_case(b"http/1.0"));

        let mut i = 3;
        while i < self.len() {
            if self
                .token(i)
                .is_some_and(|t| t.eq_ignore_ascii_case(b"Connection:"))
            {
                i += 1;
                match self.token(i) {
                    Some(b"close") => keep_alive = false,
                    Some(b"Keep-Alive") => keep_alive = true,
                    _ => {}
                }
            }
            i += 1;
        }

        keep_alive
    }
}
