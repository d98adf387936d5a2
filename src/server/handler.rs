use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::log::LoggerHandle;
use crate::log::format::format_plain;
use crate::server::auth::AuthBackend;
use crate::server::command::{ClearTarget, Command};
use crate::store::Store;
use crate::{session_debug, session_error, session_info, session_warn};

/// What a connection writes back for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Line(String),
    /// Several lines followed by an `END` terminator.
    Block(Vec<String>),
    /// `BYE`, then the connection closes.
    Bye,
}

impl Response {
    fn error(reason: impl std::fmt::Display) -> Self {
        Self::Line(format!("ERROR: {reason}"))
    }

    fn ok() -> Self {
        Self::Line("OK".to_owned())
    }

    #[must_use]
    pub fn closes_connection(&self) -> bool {
        matches!(self, Self::Bye)
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match self {
            Self::Line(l) => writeln!(out, "{l}")?,
            Self::Block(lines) => {
                for l in lines {
                    writeln!(out, "{l}")?;
                }
                writeln!(out, "END")?;
            }
            Self::Bye => writeln!(out, "BYE")?,
        }
        out.flush()
    }
}

/// Per-connection state.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub authenticated: bool,
}

/// Executes parsed commands against the shared store and logger.
///
/// One handler is shared by every connection; per-connection state lives in
/// [`Session`].
pub struct CommandHandler {
    store: Arc<Store>,
    auth: Box<dyn AuthBackend>,
    log: LoggerHandle,
    shutdown: Arc<AtomicBool>,
}

impl CommandHandler {
    pub fn new(
        store: Arc<Store>,
        auth: Box<dyn AuthBackend>,
        log: LoggerHandle,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            store,
            auth,
            log,
            shutdown,
        }
    }

    #[must_use]
    pub fn log(&self) -> &LoggerHandle {
        &self.log
    }

    /// A fresh session; pre-authenticated when the backend requires nothing.
    #[must_use]
    pub fn open_session(&self, id: String) -> Session {
        Session {
            id,
            authenticated: !self.auth.is_required(),
        }
    }

    /// Parses and executes one protocol line.
    pub fn handle_line(&self, session: &mut Session, line: &str) -> Response {
        match line.parse::<Command>() {
            Ok(cmd) => self.execute(session, cmd),
            Err(e) => {
                session_warn!(self.log, session.id, "rejected command: {}", e);
                Response::error(e)
            }
        }
    }

    pub fn execute(&self, session: &mut Session, cmd: Command) -> Response {
        if !session.authenticated && !cmd.allowed_before_auth() {
            session_warn!(self.log, session.id, "{} before AUTH refused", cmd.name());
            return Response::error("authentication required");
        }

        match cmd {
            Command::Auth { token } => match self.auth.verify(&token) {
                Ok(()) => {
                    session.authenticated = true;
                    session_info!(self.log, session.id, "authenticated");
                    Response::ok()
                }
                Err(e) => {
                    session_warn!(self.log, session.id, "authentication failed");
                    Response::error(e)
                }
            },

            Command::Put { key, value } => match self.store.put(&key, &value) {
                Ok(()) => {
                    session_info!(self.log, session.id, "PUT {}", key);
                    Response::ok()
                }
                Err(e) => self.store_failure(session, "PUT", &e),
            },

            Command::Get { key } => match self.store.get(&key) {
                Ok(Some(v)) => {
                    session_debug!(self.log, session.id, "GET {} hit", key);
                    Response::Line(v)
                }
                Ok(None) => {
                    session_debug!(self.log, session.id, "GET {} miss", key);
                    Response::Line("NOT_FOUND".to_owned())
                }
                Err(e) => self.store_failure(session, "GET", &e),
            },

            Command::Delete { key } => match self.store.remove(&key) {
                Ok(true) => {
                    session_info!(self.log, session.id, "DELETE {}", key);
                    Response::Line("DELETED".to_owned())
                }
                Ok(false) => Response::Line("NOT_FOUND".to_owned()),
                Err(e) => self.store_failure(session, "DELETE", &e),
            },

            Command::Update { key, value } => match self.store.update(&key, &value) {
                Ok(true) => {
                    session_info!(self.log, session.id, "UPDATE {}", key);
                    Response::Line("UPDATED".to_owned())
                }
                Ok(false) => Response::Line("NOT_FOUND".to_owned()),
                Err(e) => self.store_failure(session, "UPDATE", &e),
            },

            Command::Level(None) => Response::Line(self.log.level().name().to_owned()),
            Command::Level(Some(level)) => {
                self.log.set_level(level);
                session_info!(self.log, session.id, "threshold set to {}", level);
                Response::ok()
            }

            Command::Logs { n } => Response::Block(
                self.log
                    .recent_global(n)
                    .iter()
                    .map(format_plain)
                    .collect(),
            ),
            Command::SessionLogs { session: sid, n } => Response::Block(
                self.log
                    .recent_for_session(&sid, n)
                    .iter()
                    .map(format_plain)
                    .collect(),
            ),
            Command::Export { session: sid } => Response::Block(
                self.log
                    .export_session(&sid)
                    .lines()
                    .map(str::to_owned)
                    .collect(),
            ),

            Command::Clear(ClearTarget::All) => {
                self.log.clear_all();
                session_info!(self.log, session.id, "cleared all in-memory logs");
                Response::ok()
            }
            Command::Clear(ClearTarget::Session(sid)) => {
                self.log.clear_session(&sid);
                session_info!(self.log, session.id, "cleared session {}", sid);
                Response::ok()
            }

            Command::Shutdown => {
                session_warn!(self.log, session.id, "shutdown requested");
                self.shutdown.store(true, Ordering::SeqCst);
                Response::Bye
            }
            Command::Quit => Response::Bye,
        }
    }

    fn store_failure(
        &self,
        session: &Session,
        op: &str,
        e: &crate::store::StoreError,
    ) -> Response {
        session_error!(self.log, session.id, "{} failed: {}", op, e);
        Response::error(e)
    }
}
