#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use keyforge::log::{Logger, LoggerConfig};
use keyforge::server::auth::{AllowAll, AuthBackend, TokenAuth};
use keyforge::server::KvServer;
use keyforge::store::Store;
use rand::RngCore;

fn unique_temp_path(tag: &str) -> PathBuf {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    let suffix = u64::from_le_bytes(bytes);
    std::env::temp_dir().join(format!("keyforge_{tag}_{suffix}.db"))
}

fn quiet_logger() -> Logger {
    Logger::start(&LoggerConfig {
        console: None,
        ..LoggerConfig::default()
    })
}

fn spawn_server(
    store: Store,
    auth: Box<dyn AuthBackend>,
    logger: &Logger,
) -> (SocketAddr, JoinHandle<std::io::Result<()>>) {
    let server = KvServer::bind("127.0.0.1:0", store, auth, logger.handle()).unwrap();
    let addr = server.local_addr().unwrap();
    (addr, thread::spawn(move || server.run()))
}

struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        Self {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
        }
    }

    fn line(&mut self) -> String {
        let mut s = String::new();
        self.reader.read_line(&mut s).unwrap();
        s.trim_end().to_owned()
    }

    fn send(&mut self, cmd: &str) -> String {
        writeln!(self.writer, "{cmd}").unwrap();
        self.line()
    }

    /// Reads a block response up to (not including) `END`.
    fn send_block(&mut self, cmd: &str) -> Vec<String> {
        writeln!(self.writer, "{cmd}").unwrap();
        let mut out = Vec::new();
        loop {
            let l = self.line();
            if l == "END" {
                return out;
            }
            out.push(l);
        }
    }
}

#[test]
fn crud_over_tcp_and_shutdown() {
    let logger = quiet_logger();
    let (addr, server) = spawn_server(Store::in_memory(), Box::new(AllowAll), &logger);

    let mut c = Client::connect(addr);
    assert_eq!(c.send("PUT lang Rust and more"), "OK");
    assert_eq!(c.send("GET lang"), "Rust and more");
    assert_eq!(c.send("UPDATE lang C++"), "UPDATED");
    assert_eq!(c.send("GET lang"), "C++");
    assert_eq!(c.send("DELETE lang"), "DELETED");
    assert_eq!(c.send("GET lang"), "NOT_FOUND");
    assert!(c.send("NONSENSE").starts_with("ERROR: "));

    // A second client stays open across the shutdown and is closed by it.
    let mut idle = Client::connect(addr);
    assert_eq!(idle.send("LEVEL"), "INFO");

    assert_eq!(c.send("SHUTDOWN"), "BYE");
    server.join().unwrap().unwrap();
    assert_eq!(idle.line(), "");
}

#[test]
fn connections_log_under_their_own_session() {
    let logger = quiet_logger();
    let (addr, server) = spawn_server(Store::in_memory(), Box::new(AllowAll), &logger);

    let mut first = Client::connect(addr);
    assert_eq!(first.send("PUT a 1"), "OK");
    let mut second = Client::connect(addr);
    assert_eq!(second.send("PUT b 2"), "OK");

    // Records are dispatched asynchronously; poll until both show up.
    let mut conn1 = Vec::new();
    for _ in 0..100 {
        conn1 = second.send_block("SESSION_LOGS conn-1 50");
        if conn1.iter().any(|l| l.contains("PUT a")) {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    assert!(conn1.iter().all(|l| l.contains("<conn-1>")));
    assert!(conn1.iter().any(|l| l.contains("PUT a")));
    assert!(!conn1.iter().any(|l| l.contains("PUT b")));

    let export = second.send_block("EXPORT conn-1");
    assert!(export.iter().any(|l| l.ends_with("PUT a")));

    assert_eq!(second.send("CLEAR conn-1"), "OK");
    assert!(second.send_block("SESSION_LOGS conn-1 50").is_empty());

    assert_eq!(first.send("QUIT"), "BYE");
    assert_eq!(second.send("SHUTDOWN"), "BYE");
    server.join().unwrap().unwrap();
}

#[test]
fn token_auth_gates_commands() {
    let logger = quiet_logger();
    let auth = TokenAuth::from_tokens(["opensesame"]);
    let (addr, server) = spawn_server(Store::in_memory(), Box::new(auth), &logger);

    let mut c = Client::connect(addr);
    assert_eq!(c.send("PUT k v"), "ERROR: authentication required");
    assert_eq!(c.send("SHUTDOWN"), "ERROR: authentication required");
    assert_eq!(c.send("AUTH nope"), "ERROR: invalid token");
    assert_eq!(c.send("AUTH opensesame"), "OK");
    assert_eq!(c.send("PUT k v"), "OK");

    // Authentication is per connection.
    let mut other = Client::connect(addr);
    assert_eq!(other.send("GET k"), "ERROR: authentication required");
    assert_eq!(other.send("QUIT"), "BYE");

    assert_eq!(c.send("SHUTDOWN"), "BYE");
    server.join().unwrap().unwrap();
}

#[test]
fn data_survives_a_restart() {
    let path = unique_temp_path("restart");
    let logger = quiet_logger();

    {
        let (addr, server) = spawn_server(Store::open(&path).unwrap(), Box::new(AllowAll), &logger);
        let mut c = Client::connect(addr);
        assert_eq!(c.send("PUT greeting hello there"), "OK");
        assert_eq!(c.send("PUT temp x"), "OK");
        assert_eq!(c.send("DELETE temp"), "DELETED");
        assert_eq!(c.send("SHUTDOWN"), "BYE");
        server.join().unwrap().unwrap();
    }

    let (addr, server) = spawn_server(Store::open(&path).unwrap(), Box::new(AllowAll), &logger);
    let mut c = Client::connect(addr);
    assert_eq!(c.send("GET greeting"), "hello there");
    assert_eq!(c.send("GET temp"), "NOT_FOUND");
    assert_eq!(c.send("SHUTDOWN"), "BYE");
    server.join().unwrap().unwrap();

    let _ = fs::remove_file(&path);
}
