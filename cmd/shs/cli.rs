use clap::{Arg, ArgAction, Command};
use tracing::Level;

pub fn cli() -> Command {
    Command::new("shs")
        .about("Secret Handshake demo peer")
        .arg(
            Arg::new("log.level")
                .long("log.level")
                .default_value(Level::INFO.as_str())
                .value_name("LOG_LEVEL")
                .action(ArgAction::Set)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("server")
                .about("Accept authenticated peers and echo their messages back")
                .arg(
                    Arg::new("addr")
                        .long("addr")
                        .default_value("127.0.0.1")
                        .value_name("ADDRESS")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("port")
                        .long("port")
                        .default_value("8008")
                        .value_name("PORT")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("secret")
                        .long("secret")
                        .value_name("HEX_SEED")
                        .help("32-byte Ed25519 seed; generated when omitted")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("network-key")
                        .long("network-key")
                        .value_name("HEX_KEY")
                        .help("32-byte network capability; main net when omitted")
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            Command::new("client")
                .about("Connect to a server, send a message, print the echo")
                .arg(
                    Arg::new("addr")
                        .long("addr")
                        .default_value("127.0.0.1")
                        .value_name("ADDRESS")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("port")
                        .long("port")
                        .default_value("8008")
                        .value_name("PORT")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("secret")
                        .long("secret")
                        .value_name("HEX_SEED")
                        .help("32-byte Ed25519 seed; generated when omitted")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("server-key")
                        .long("server-key")
                        .value_name("HEX_PUBKEY")
                        .help("the server's long-term Ed25519 public key")
                        .required(true)
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("network-key")
                        .long("network-key")
                        .value_name("HEX_KEY")
                        .help("32-byte network capability; main net when omitted")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("message")
                        .long("message")
                        .default_value("hello world")
                        .value_name("TEXT")
                        .action(ArgAction::Set),
                ),
        )
}
