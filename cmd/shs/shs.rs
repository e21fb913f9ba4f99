use std::net::SocketAddr;
use std::str::FromStr as _;

use clap::ArgMatches;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use shs_net::NetworkKey;
use tracing::{error, info};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cli;

#[tokio::main]
async fn main() {
    let matches = cli::cli().get_matches();

    let log_level = matches
        .get_one::<String>("log.level")
        .expect("log.level has a default value");
    let log_filter = EnvFilter::builder()
        .with_default_directive(
            Directive::from_str(log_level).expect("not a supported log level"),
        )
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    match matches.subcommand() {
        Some(("server", matches)) => run_server(matches).await,
        Some(("client", matches)) => run_client(matches).await,
        _ => unreachable!("a subcommand is required"),
    }
}

async fn run_server(matches: &ArgMatches) {
    let addr = socket_addr(matches);
    let local_key = local_key(matches);
    let network_key = network_key(matches);
    info!(
        "Server identity: {}",
        hex::encode(local_key.verifying_key())
    );

    let result = shs_net::listen(addr, local_key, network_key, |mut connection| async move {
        info!("Peer {} connected", hex::encode(connection.peer_key()));
        loop {
            match connection.recv().await {
                Ok(Some(message)) => {
                    info!("Echoing {} bytes", message.len());
                    if let Err(err) = connection.send(&message).await {
                        error!("Send failed: {err}");
                        return;
                    }
                }
                Ok(None) => {
                    info!("Peer closed the stream");
                    let _ = connection.close().await;
                    return;
                }
                Err(err) => {
                    error!("Receive failed: {err}");
                    return;
                }
            }
        }
    })
    .await;
    if let Err(err) = result {
        error!("Server terminated: {err}");
    }
}

async fn run_client(matches: &ArgMatches) {
    let addr = socket_addr(matches);
    let local_key = local_key(matches);
    let network_key = network_key(matches);
    let server_key = matches
        .get_one::<String>("server-key")
        .expect("server-key is required");
    let server_key = VerifyingKey::from_bytes(&decode_key(server_key))
        .expect("server-key is not a valid Ed25519 public key");
    let message = matches
        .get_one::<String>("message")
        .expect("message has a default value");

    let mut connection = shs_net::connect(addr, local_key, server_key, network_key)
        .await
        .expect("connection failed");
    connection
        .send(message.as_bytes())
        .await
        .expect("send failed");
    match connection.recv().await.expect("receive failed") {
        Some(echo) => info!("Server echoed: {}", String::from_utf8_lossy(&echo)),
        None => info!("Server closed the stream"),
    }
    connection.close().await.expect("close failed");
}

fn socket_addr(matches: &ArgMatches) -> SocketAddr {
    let addr = matches.get_one::<String>("addr").expect("addr has a default");
    let port = matches.get_one::<String>("port").expect("port has a default");
    format!("{addr}:{port}")
        .parse()
        .expect("not a valid socket address")
}

fn local_key(matches: &ArgMatches) -> SigningKey {
    match matches.get_one::<String>("secret") {
        Some(seed) => SigningKey::from_bytes(&decode_key(seed)),
        None => SigningKey::generate(&mut OsRng),
    }
}

fn network_key(matches: &ArgMatches) -> NetworkKey {
    matches
        .get_one::<String>("network-key")
        .map(|key| NetworkKey(decode_key(key)))
        .unwrap_or_default()
}

fn decode_key(hex_str: &str) -> [u8; 32] {
    hex::decode(hex_str)
        .expect("key material must be hex")
        .try_into()
        .expect("key material must be 32 bytes")
}
