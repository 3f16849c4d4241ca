/// HTTP status codes the server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 204 No Content
    NoContent,
    /// 403 Forbidden
    Forbidden,
    /// 404 File Not Found
    NotFound,
    /// 501 Not Implemented
    NotImplemented,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use httpc::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::NoContent => 204,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::NotImplemented => 501,
        }
    }

    /// Returns the reason phrase written on the status line.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::NoContent => "No Content",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "File Not Found",
            StatusCode::NotImplemented => "Not Implemented",
        }
    }
}

/// Fixed-capacity buffer a response header is built into and sent from.
///
/// Appends never allocate. Anything that does not fit is dropped and the
/// buffer is marked truncated; the header that goes out is then cut short.
#[derive(Debug)]
pub struct ResponseBuffer {
    buf: Box<[u8]>,
    len: usize,
    sent: usize,
    truncated: bool,
}

impl ResponseBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
            sent: 0,
            truncated: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes built so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes already handed to the socket.
    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.sent = 0;
        self.truncated = false;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The part of the response still waiting to be sent.
    pub fn remaining(&self) -> &[u8] {
        &self.buf[self.sent..self.len]
    }

    pub fn is_complete(&self) -> bool {
        self.sent == self.len
    }

    pub fn advance(&mut self, n: usize) {
        self.sent = (self.sent + n).min(self.len);
    }

    pub fn append(&mut self, bytes: &[u8]) {
        let room = self.buf.len() - self.len;
        let n = bytes.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
        if n < bytes.len() {
            self.truncated = true;
        }
    }

    pub fn append_str(&mut self, s: &str) {
        self.append(s.as_bytes());
    }

    /// Appends `n` in decimal.
    pub fn append_uint(&mut self, mut n: u64) {
        let mut digits = [0u8; 20];
        let mut count = 0;
        loop {
            digits[count] = b'0' + (n % 10) as u8;
            n /= 10;
            count += 1;
            if n == 0 {
                break;
            }
        }
        digits[..count].reverse();
        self.append(&digits[..count]);
    }

    /// Appends `n` in decimal, left-padded with zeros to `width` digits.
    pub fn append_uint_padded(&mut self, n: u64, width: usize) {
        let mut digits = 1;
        let mut rest = n / 10;
        while rest > 0 {
            digits += 1;
            rest /= 10;
        }
        for _ in digits..width {
            self.append(b"0");
        }
        self.append_uint(n);
    }

    /// Appends `HTTP/1.1 <code> <reason>\r\n`.
    pub fn append_status_line(&mut self, status: StatusCode) {
        self.append_str("HTTP/1.1 ");
        self.append_uint(u64::from(status.as_u16()));
        self.append_str(" ");
        self.append_str(status.reason_phrase());
        self.append_str("\r\n");
    }
}
