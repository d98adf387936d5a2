pub mod auth;
pub mod command;
pub mod handler;
pub mod kv_server;
pub mod server_config;

pub use command::{ClearTarget, Command, CommandError};
pub use handler::{CommandHandler, Response, Session};
pub use kv_server::{KvServer, ShutdownHandle};
pub use server_config::ServerConfig;
