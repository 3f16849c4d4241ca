//! Descriptor exhaustion at accept time. Kept in its own test binary since
//! it lowers the process-wide descriptor limit.

use std::fs::File;
use std::io::Read;
use std::net::TcpStream;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use httpc::server::listener::{self, SpareFd};

fn nofile_limit() -> libc::rlimit {
    let mut rlim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    assert_eq!(unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rlim) }, 0);
    rlim
}

fn set_soft_limit(soft: libc::rlim_t) {
    let mut rlim = nofile_limit();
    rlim.rlim_cur = soft;
    assert_eq!(unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &rlim) }, 0);
}

#[test]
fn test_spare_fd_sheds_queued_connections_when_out_of_descriptors() {
    let listener = listener::bind("127.0.0.1:0".parse().unwrap(), 16).unwrap();
    let addr = listener.local_addr().unwrap();
    let mut spare = SpareFd::open().unwrap();

    let mut clients: Vec<TcpStream> = (0..2)
        .map(|_| {
            let c = TcpStream::connect(addr).unwrap();
            c.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
            c
        })
        .collect();

    // The lowest free descriptor becomes the limit, so every new one fails.
    let lowest_free = File::open("/dev/null").unwrap().as_raw_fd();
    let original = nofile_limit().rlim_cur;
    set_soft_limit(lowest_free as libc::rlim_t);

    let err = listener::accept(&listener).unwrap_err();
    let first = spare.shed(&listener);
    let second = spare.shed(&listener);
    let drained = spare.shed(&listener);

    set_soft_limit(original);

    assert!(listener::is_fd_exhaustion(&err), "{err}");
    assert!(first.unwrap().is_some());
    assert!(second.unwrap().is_some());
    assert!(drained.unwrap().is_none());
    assert!(spare.is_held());

    for client in &mut clients {
        let mut buf = [0u8; 1];
        match client.read(&mut buf) {
            Ok(n) => assert_eq!(n, 0),
            Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset),
        }
    }
}
