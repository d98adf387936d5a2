use std::io::{self, BufRead, BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::log::LoggerHandle;
use crate::server::auth::AuthBackend;
use crate::server::handler::{CommandHandler, Response};
use crate::store::Store;
use crate::{log_info, log_warn, session_info, session_warn};

/// How long accept/read calls block before re-checking the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lines longer than this are rejected and the connection is closed.
const MAX_LINE_LEN: usize = 64 * 1024;

/// Cloneable trigger that stops a running [`KvServer`].
#[derive(Clone, Debug)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Thread-per-connection key-value server.
///
/// Each accepted connection gets the session id `conn-<n>` (starting at 1)
/// and every record it logs is tagged with it. A `SHUTDOWN` command (or
/// [`ShutdownHandle::trigger`]) stops accepting; open connections notice
/// within one poll interval and close, and [`run`](Self::run) returns once
/// they are all joined.
pub struct KvServer {
    listener: TcpListener,
    handler: Arc<CommandHandler>,
    shutdown: Arc<AtomicBool>,
}

impl KvServer {
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        store: Store,
        auth: Box<dyn AuthBackend>,
        log: LoggerHandle,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let handler = CommandHandler::new(Arc::new(store), auth, log, shutdown.clone());

        Ok(Self {
            listener,
            handler: Arc::new(handler),
            shutdown,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown.clone())
    }

    /// Blocking accept loop.
    pub fn run(self) -> io::Result<()> {
        let Self {
            listener,
            handler,
            shutdown,
        } = self;
        let log = handler.log().clone();

        log_info!(log, "keyforge listening on {}", listener.local_addr()?);

        let mut next_conn: u64 = 1;
        let mut clients: Vec<JoinHandle<()>> = Vec::new();

        while !shutdown.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    let session_id = format!("conn-{next_conn}");
                    next_conn += 1;
                    session_info!(log, session_id, "accepted connection from {}", peer);

                    let handler = handler.clone();
                    let shutdown = shutdown.clone();
                    let spawned = thread::Builder::new()
                        .name(format!("keyforge-{session_id}"))
                        .spawn(move || serve_connection(stream, session_id, &handler, &shutdown));
                    match spawned {
                        Ok(h) => clients.push(h),
                        Err(e) => log_warn!(log, "failed to spawn connection thread: {}", e),
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    log_warn!(log, "incoming TCP accept failed: {} (continuing to accept)", e);
                    thread::sleep(POLL_INTERVAL);
                }
            }
            clients.retain(|h| !h.is_finished());
        }

        log_info!(log, "shutdown: waiting for {} open connection(s)", clients.len());
        for h in clients {
            let _ = h.join();
        }
        log_info!(log, "server stopped");
        Ok(())
    }
}

fn serve_connection(
    stream: TcpStream,
    session_id: String,
    handler: &CommandHandler,
    shutdown: &AtomicBool,
) {
    let log = handler.log();
    if let Err(e) = connection_loop(stream, &session_id, handler, shutdown) {
        session_warn!(log, session_id, "connection error: {}", e);
    }
    session_info!(log, session_id, "connection closed");
}

fn connection_loop(
    stream: TcpStream,
    session_id: &str,
    handler: &CommandHandler,
    shutdown: &AtomicBool,
) -> io::Result<()> {
    // Accepted sockets may inherit the listener's non-blocking mode.
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(POLL_INTERVAL))?;

    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);
    let mut session = handler.open_session(session_id.to_owned());
    let mut buf: Vec<u8> = Vec::new();

    while !shutdown.load(Ordering::SeqCst) {
        match reader.read_until(b'\n', &mut buf) {
            Ok(n) => {
                // No trailing newline means EOF: run what we have, then stop.
                let eof = n == 0 || buf.last() != Some(&b'\n');
                if buf.is_empty() {
                    break;
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                buf.clear();
                let response = handler.handle_line(&mut session, &line);
                response.write_to(&mut writer)?;
                if eof || response.closes_connection() {
                    break;
                }
            }
            // Timed out waiting: partial input stays in `buf`.
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(e),
        }

        if buf.len() > MAX_LINE_LEN {
            Response::Line("ERROR: line too long".to_owned()).write_to(&mut writer)?;
            break;
        }
    }
    Ok(())
}
