//! Binary entry point for distrim.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tokio::signal;

use distrim::config::Config;
use distrim::crypto::RsaCryptoPrimitive;
use distrim::Node;

#[derive(Debug, Clone)]
struct Cli {
    config_path: Option<PathBuf>,
    listen_port: Option<u16>,
    advertise_addr: String,
    bootstrap: Option<(String, u16)>,
    send: Option<(String, String)>,
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config_path: None,
            listen_port: None,
            advertise_addr: "127.0.0.1".to_string(),
            bootstrap: None,
            send: None,
        }
    }
}

impl Cli {
    fn from_env_args() -> Self {
        let mut cli = Self::default();
        let mut args = env::args().skip(1);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => cli.config_path = args.next().map(PathBuf::from),
                "--listen-port" => match args.next().and_then(|v| u16::from_str(&v).ok()) {
                    Some(port) => cli.listen_port = Some(port),
                    None => {
                        eprintln!("Invalid or missing value after --listen-port");
                        print_help_and_exit();
                    }
                },
                "--advertise-addr" => match args.next() {
                    Some(addr) => cli.advertise_addr = addr,
                    None => {
                        eprintln!("Missing value after --advertise-addr");
                        print_help_and_exit();
                    }
                },
                "--bootstrap" => match args.next() {
                    Some(value) => match parse_host_port(&value) {
                        Some(pair) => cli.bootstrap = Some(pair),
                        None => {
                            eprintln!("Invalid --bootstrap value '{value}', expected addr:port");
                            print_help_and_exit();
                        }
                    },
                    None => {
                        eprintln!("Missing value after --bootstrap");
                        print_help_and_exit();
                    }
                },
                "--send" => {
                    let ident = args.next();
                    let text = args.next();
                    match (ident, text) {
                        (Some(ident), Some(text)) => cli.send = Some((ident, text)),
                        _ => {
                            eprintln!("Usage: --send <ident> <text>");
                            print_help_and_exit();
                        }
                    }
                }
                "--help" | "-h" => print_help_and_exit(),
                other => {
                    eprintln!("Unknown argument: {other}");
                    print_help_and_exit();
                }
            }
        }

        cli
    }
}

fn parse_host_port(value: &str) -> Option<(String, u16)> {
    let (addr, port) = value.rsplit_once(':')?;
    Some((addr.to_string(), u16::from_str(port).ok()?))
}

fn print_help_and_exit() -> ! {
    eprintln!(
        "\
distrim

USAGE:
  distrim [FLAGS]

FLAGS:
  --config <path>             Load settings from a TOML file (default built-in)
  --listen-port <u16>         Listening port, overrides the config value
  --advertise-addr <ip>       IPv4 address to advertise to peers (default 127.0.0.1)
  --bootstrap <addr:port>     Rendezvous with an existing node on startup
  --send <ident> <text>       Send one message then continue running
  -h, --help                  Show this help and exit
"
    );
    std::process::exit(0);
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let _ = env_logger::builder().try_init();

    let cli = Cli::from_env_args();
    let mut config = match &cli.config_path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(port) = cli.listen_port {
        config.listening_port = port;
    }

    let node = Node::new(config, RsaCryptoPrimitive, &cli.advertise_addr)?;
    log::info!(
        "node ident {} listening on {}:{}",
        node.finger().ident,
        cli.advertise_addr,
        node.finger().port
    );

    node.start().await?;

    if let Some((addr, port)) = cli.bootstrap {
        log::info!("bootstrapping via {addr}:{port}");
        node.bootstrap(&addr, port).await?;
    }

    if let Some((ident, text)) = cli.send {
        log::info!("sending message to {ident}");
        node.send_message(&ident, &text).await?;
    }

    log::info!("node running. Press Ctrl+C to stop.");
    signal::ctrl_c().await?;
    log::info!("shutdown signal received, notifying peers and exiting");
    node.stop().await;
    Ok(())
}
