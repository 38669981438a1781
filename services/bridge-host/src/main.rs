use bridge_host::config;
use clap::{Arg, Command};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let matches = Command::new("Extension Host Bridge")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Reliable IPC/RPC bridge between the host process and an out-of-process extension host")
        .arg(
            Arg::new("config")
                .help("Path to bridge-host.toml")
                .short('c')
                .long("config")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("log_level")
                .help("Overrides RUST_LOG when set")
                .short('l')
                .long("log-level"),
        )
        .get_matches();

    let filter = match matches.get_one::<String>("log_level") {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = config::load_config(matches.get_one::<PathBuf>("config").map(std::path::PathBuf::as_path))
        .unwrap_or_else(|e| {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        });

    info!(version = env!("CARGO_PKG_VERSION"), "bridge-host starting");

    tokio::select! {
        result = run(cfg) => {
            if let Err(e) = result {
                error!(error = %e, "bridge-host exited with an error");
                std::process::exit(1);
            }
        }
        () = shutdown_signal() => {
            info!("shutting down");
        }
    }
}

#[cfg(unix)]
async fn run(cfg: config::BridgeConfig) -> std::io::Result<()> {
    use eh_wire::UnixSocket;
    use tokio::net::UnixListener;

    let path = &cfg.listen.unix_path;
    let _ = std::fs::remove_file(path);
    let listener = UnixListener::bind(path)?;
    info!(path, "listening on unix socket");

    let (stream, _) = listener.accept().await?;
    let socket = UnixSocket::new(stream);
    let rpc = bridge_host::bootstrap_session(socket, cfg.keep_alive_enabled);
    info!("extension host connected");

    let mut events = rpc.protocol().subscribe();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let Ok((stream, _)) = accepted else { continue };
                let socket = UnixSocket::new(stream);
                warn!("splicing in reconnected extension host");
                rpc.protocol().begin_accept_reconnection(socket, bytes::Bytes::new());
                if let Err(e) = rpc.protocol().end_accept_reconnection() {
                    error!(error = %e, "failed to resume after reconnection");
                }
            }
            event = events.recv() => {
                match event {
                    Ok(eh_protocol::ProtocolEvent::Dispose) => {
                        info!("session disposed, awaiting a fresh extension host connection");
                    }
                    Ok(eh_protocol::ProtocolEvent::SocketClose(reason)) => {
                        warn!(?reason, "extension host socket closed, awaiting reconnection");
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        }
    }
    Ok(())
}

#[cfg(windows)]
async fn run(cfg: config::BridgeConfig) -> std::io::Result<()> {
    use eh_wire::TcpSocket;
    use tokio::net::TcpListener;

    let addr = format!("127.0.0.1:{}", cfg.listen.tcp_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr, "listening on loopback tcp");

    let (stream, _) = listener.accept().await?;
    let socket = TcpSocket::new(stream);
    let rpc = bridge_host::bootstrap_session(socket, cfg.keep_alive_enabled);
    info!("extension host connected");

    let mut events = rpc.protocol().subscribe();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let Ok((stream, _)) = accepted else { continue };
                let socket = TcpSocket::new(stream);
                warn!("splicing in reconnected extension host");
                rpc.protocol().begin_accept_reconnection(socket, bytes::Bytes::new());
                if let Err(e) = rpc.protocol().end_accept_reconnection() {
                    error!(error = %e, "failed to resume after reconnection");
                }
            }
            event = events.recv() => {
                match event {
                    Ok(eh_protocol::ProtocolEvent::Dispose) => {
                        info!("session disposed, awaiting a fresh extension host connection");
                    }
                    Ok(eh_protocol::ProtocolEvent::SocketClose(reason)) => {
                        warn!(?reason, "extension host socket closed, awaiting reconnection");
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C"); }
        _ = terminate => { info!("received SIGTERM"); }
    }
}
