// src/main.rs

//! Weft node binary entry point.

use std::net::IpAddr;
use std::sync::Arc;
use weft_node::{cli, NodeConfig, WeftNode, NODE_VERSION};
use weft_crypto::KeyPair;

fn main() {
    tracing_subscriber::fmt::init();

    tracing::info!("Weft tangle node v{}", NODE_VERSION);

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 2 {
        eprintln!("Usage: {} [<target ip>]", args[0]);
        std::process::exit(1);
    }

    let config = NodeConfig::default();

    // Load the configured key file, or start with a fresh account
    let personal = match &config.key_file {
        Some(path) => match weft_wallet::load_key_file(path) {
            Ok(keys) => {
                tracing::info!("Loaded account stored in {}", path.display());
                keys
            }
            Err(e) => {
                tracing::warn!("Could not load key file ({}), generating a new account", e);
                KeyPair::generate()
            }
        },
        None => {
            tracing::info!("Generated new account");
            KeyPair::generate()
        }
    };

    let node = if args.len() == 2 {
        let target: IpAddr = match args[1].parse() {
            Ok(target) => target,
            Err(_) => {
                eprintln!("Usage: {} [<target ip>]", args[0]);
                std::process::exit(1);
            }
        };
        tracing::info!("Attempting to automatically connect to the network...");
        match WeftNode::join(config, personal, target) {
            Ok(node) => node,
            Err(e) => {
                eprintln!("Failed to connect to the network: {}", e);
                std::process::exit(2);
            }
        }
    } else {
        match WeftNode::host(config, personal) {
            Ok(node) => node,
            Err(e) => {
                eprintln!("Failed to establish a network: {}", e);
                std::process::exit(2);
            }
        }
    };

    // A forced shutdown runs the same routine the `q` command does
    {
        let node = Arc::clone(&node);
        if let Err(e) = ctrlc::set_handler(move || {
            node.shutdown();
            std::process::exit(130);
        }) {
            tracing::warn!("Could not install the signal handler: {}", e);
        }
    }

    if let Err(e) = cli::run(&node) {
        eprintln!("{}", e);
    }

    node.shutdown();
}
