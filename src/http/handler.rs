//! Request handling: decides the status, builds the response header and
//! opens the file whose body follows it.

use std::ffi::OsStr;
use std::fs::{File, Metadata, OpenOptions};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::config::StaticFilesConfig;
use crate::http::date::append_http_date;
use crate::http::request::{Method, Request};
use crate::http::response::{ResponseBuffer, StatusCode};

/// An opened file to be sent after the response header.
#[derive(Debug)]
pub struct FileBody {
    pub file: File,
    pub len: u64,
}

/// What the connection does once the response header is built.
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub keep_alive: bool,
    pub body: Option<FileBody>,
}

enum Outcome {
    NotImplemented,
    NotFound,
    Forbidden,
    Empty(Metadata),
    Head(Metadata),
    Get(Metadata, File),
}

impl Outcome {
    fn status(&self) -> StatusCode {
        match self {
            Outcome::NotImplemented => StatusCode::NotImplemented,
            Outcome::NotFound => StatusCode::NotFound,
            Outcome::Forbidden => StatusCode::Forbidden,
            Outcome::Empty(_) => StatusCode::NoContent,
            Outcome::Head(_) | Outcome::Get(..) => StatusCode::Ok,
        }
    }
}

/// Resolves `target` under `root` into `path`, reusing its allocation.
///
/// Returns `false` for targets that try to climb out of `root`.
pub fn resolve_target(root: &Path, target: &[u8], path: &mut PathBuf) -> bool {
    path.clear();
    path.push(root);
    for component in Path::new(OsStr::from_bytes(target)).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => return false,
        }
    }
    true
}

fn probe(method: Method, path: &Path) -> Outcome {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(_) => return Outcome::NotFound,
    };

    if !meta.is_file() {
        return Outcome::Forbidden;
    }

    if meta.len() == 0 {
        return Outcome::Empty(meta);
    }

    if method == Method::HEAD {
        return Outcome::Head(meta);
    }

    match OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
    {
        Ok(file) => Outcome::Get(meta, file),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "open failed");
            Outcome::Forbidden
        }
    }
}

/// Builds the response header for `request` into `response`.
///
/// A request needs at least a method, target and version; anything shorter
/// is answered `501` and closed. `path` is scratch space for the resolved
/// file name.
pub fn respond(
    request: &Request<'_>,
    files: &StaticFilesConfig,
    path: &mut PathBuf,
    response: &mut ResponseBuffer,
) -> Reply {
    response.clear();

    let (outcome, keep_alive) = if request.len() < 3 {
        (Outcome::NotImplemented, false)
    } else {
        let keep_alive = request.keep_alive();
        let outcome = match (request.method(), request.target()) {
            (Some(method), Some(target)) => {
                if resolve_target(&files.root, target, path) {
                    probe(method, path)
                } else {
                    Outcome::NotFound
                }
            }
            _ => Outcome::NotImplemented,
        };
        (outcome, keep_alive)
    };

    let status = outcome.status();
    response.append_status_line(status);

    let body = match outcome {
        Outcome::Empty(meta) => {
            append_last_modified(response, &meta);
            None
        }
        Outcome::Head(meta) => {
            append_last_modified(response, &meta);
            append_content_length(response, meta.len());
            None
        }
        Outcome::Get(meta, file) => {
            append_last_modified(response, &meta);
            append_content_length(response, meta.len());
            Some(FileBody {
                file,
                len: meta.len(),
            })
        }
        Outcome::NotImplemented | Outcome::NotFound | Outcome::Forbidden => None,
    };

    response.append_str("Server: ");
    response.append_str(&files.server_name);
    response.append_str("\r\n");
    if keep_alive {
        response.append_str("Connection: Keep-Alive\r\n\r\n");
    } else {
        response.append_str("Connection: close\r\n\r\n");
    }

    if response.is_truncated() {
        warn!(
            capacity = response.capacity(),
            status = status.as_u16(),
            "response header truncated"
        );
    }

    debug!(
        method = %String::from_utf8_lossy(request.token(0).unwrap_or_default()),
        target = %String::from_utf8_lossy(request.target().unwrap_or_default()),
        status = status.as_u16(),
        keep_alive,
        "request handled"
    );

    Reply {
        status,
        keep_alive,
        body,
    }
}

fn append_last_modified(response: &mut ResponseBuffer, meta: &Metadata) {
    response.append_str("Last-Modified: ");
    append_http_date(response, meta.mtime());
    response.append_str("\r\n");
}

fn append_content_length(response: &mut ResponseBuffer, len: u64) {
    response.append_str("Content-Length: ");
    response.append_uint(len);
    response.append_str("\r\n");
}
