use std::{env, process};

use keyforge::config::Config;
use keyforge::log::{Logger, LoggerConfig, install_global};
use keyforge::server::auth::TokenAuth;
use keyforge::server::{KvServer, ServerConfig};
use keyforge::{log_error, log_info};

const DEFAULT_CONFIG_PATH: &str = "keyforge.conf";

fn main() {
    // --- Parse CLI args ----------------------------------------------------
    //
    // Supported:
    //   keyforge_server                 -> reads ./keyforge.conf if present
    //   keyforge_server path/to.conf    -> reads that file
    //   keyforge_server --gen-token     -> prints a new token and its digest

    let args: Vec<String> = env::args().collect();

    let config_path = match args.len() {
        1 => DEFAULT_CONFIG_PATH.to_owned(),
        2 if args[1] == "--gen-token" => {
            let token = TokenAuth::generate_token();
            println!("token:  {token}");
            println!("digest: {}", TokenAuth::digest_hex(&token));
            return;
        }
        2 => args[1].clone(),
        _ => {
            eprintln!("Usage:");
            eprintln!("  {}                # use ./{}", args[0], DEFAULT_CONFIG_PATH);
            eprintln!("  {} [CONFIG]       # e.g. /etc/keyforge.conf", args[0]);
            eprintln!("  {} --gen-token    # print a new auth token", args[0]);
            process::exit(1);
        }
    };

    // --- Configuration -----------------------------------------------------
    let config = Config::load(&config_path).unwrap_or_else(|e| {
        eprintln!("[keyforge_server] {e}; using defaults");
        Config::empty()
    });

    let logger_cfg = LoggerConfig::from_config(&config).unwrap_or_else(|e| {
        eprintln!("[keyforge_server] {e}; using default logging settings");
        LoggerConfig::default()
    });
    let server_cfg = ServerConfig::from_config(&config);

    // --- Start process logger ----------------------------------------------
    let logger = Logger::start(&logger_cfg);
    let log = logger.handle();
    install_global(log.clone());

    if let Err(code) = run(&server_cfg, &log) {
        logger.shutdown();
        process::exit(code);
    }
}

fn run(cfg: &ServerConfig, log: &keyforge::log::LoggerHandle) -> Result<(), i32> {
    let auth = cfg.build_auth().map_err(|e| {
        log_error!(log, "failed to load auth tokens: {}", e);
        2
    })?;
    let store = cfg.open_store().map_err(|e| {
        log_error!(log, "failed to open store: {}", e);
        2
    })?;

    log_info!(
        log,
        "starting keyforge on {} (data: {:?}, {} keys loaded, auth: {})",
        cfg.bind,
        store.path(),
        store.len().unwrap_or(0),
        if auth.is_required() { "tokens" } else { "off" }
    );

    // --- Run server (blocks) -----------------------------------------------
    let server = KvServer::bind(&cfg.bind, store, auth, log.clone()).map_err(|e| {
        log_error!(log, "failed to bind {}: {}", cfg.bind, e);
        1
    })?;
    server.run().map_err(|e| {
        log_error!(log, "server error: {}", e);
        1
    })
}
