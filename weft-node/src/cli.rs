// src/cli.rs

//! The interactive single-character command loop.
//!
//! Commands: `t` transact, `b` balance, `d` debug dump, `r` random-walk
//! demo, `s`/`l` save/load tangle, `k` key management, `p` toggle
//! auto-ping, `w` force weight update, `c` clear screen, `q` quit.

use crate::errors::Result;
use crate::node::WeftNode;
use std::io::{self, BufRead, Write};
use weft_core::types::hex_to_hash;

/// Runs the command loop until `q` or end of input
pub fn run(node: &WeftNode) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let command = match line.trim().chars().next() {
            Some(c) => c.to_ascii_lowercase(),
            None => continue,
        };

        match command {
            'q' => break,
            'c' => print!("\x1b[2J\x1b[H"),

            't' => {
                let mut account = prompt(&mut lines, "Enter account to transfer to ('r' for random): ")?;
                if account == "r" {
                    match node.random_account() {
                        Some(random) => account = random,
                        None => {
                            // Nobody else known yet; send to ourselves
                            match node.account_hash() {
                                Some(own) => account = own,
                                None => {
                                    eprintln!("No personal keypair is set");
                                    continue;
                                }
                            }
                        }
                    }
                }
                let amount: f64 = match prompt(&mut lines, "Enter amount to transfer: ")?.parse() {
                    Ok(amount) => amount,
                    Err(_) => {
                        eprintln!("Not a number");
                        continue;
                    }
                };
                let difficulty: u8 =
                    match prompt(&mut lines, "Select mining difficulty (1-5): ")?.parse() {
                        Ok(difficulty) => difficulty,
                        Err(_) => node.config().default_difficulty,
                    };

                println!("Sending {} money to {}", amount, account);
                match node.transact(&account, amount, difficulty) {
                    Ok(hash) => {
                        println!("Added transaction `{}`", weft_core::types::hash_to_hex(&hash))
                    }
                    Err(e) => eprintln!("{} Discarding transaction!", e),
                }
            }

            'b' => match (node.account_hash(), node.balances()) {
                (Some(account), Ok((any, half, confirmed))) => println!(
                    "Our ({}) balance is: {}(0%) {}(50%) {}(95%)",
                    account, any, half, confirmed
                ),
                (_, Err(e)) => eprintln!("{}", e),
                (None, _) => eprintln!("No personal keypair is set"),
            },

            'd' => {
                println!("{}", node.debug_dump()?);
                let hash = prompt(&mut lines, "Enter transaction hash (blank = skip): ")?;
                if !hash.is_empty() {
                    match hex_to_hash(&hash) {
                        Ok(hash) => match node.dump_transaction(&hash)? {
                            Some(dump) => println!("{}", dump),
                            None => eprintln!("No such transaction"),
                        },
                        Err(_) => eprintln!("Not a transaction hash"),
                    }
                }
            }

            'r' => match node.random_walk_demo() {
                Ok((tips, found, approves)) => {
                    println!("{} tips to find", tips);
                    println!("found: {}", weft_core::types::hash_to_hex(&found));
                    println!("{}", approves);
                }
                Err(e) => eprintln!("{}", e),
            },

            's' => {
                let path = prompt(&mut lines, "Enter relative path to save tangle to: ")?;
                match node.save_tangle(&path) {
                    Ok(()) => println!("Tangle saved to {}", path),
                    Err(e) => eprintln!("Invalid path `{}`: {}", path, e),
                }
            }

            'l' => {
                let path = prompt(&mut lines, "Enter relative path to load tangle from: ")?;
                match node.load_tangle(&path) {
                    Ok(()) => println!("Successfully loaded tangle from {}", path),
                    Err(e) => eprintln!("Invalid path `{}`: {}", path, e),
                }
            }

            'k' => {
                let sub = prompt(&mut lines, "(l)oad, (s)ave, (g)enerate: ")?;
                match sub.chars().next().map(|c| c.to_ascii_lowercase()) {
                    Some('g') => match node.generate_keys() {
                        Ok(account) => println!("Generated new account {}", account),
                        Err(e) => eprintln!("{}", e),
                    },
                    Some('s') => {
                        let path = prompt(&mut lines, "Relative path: ")?;
                        match node.save_keys(&path) {
                            Ok(()) => println!("Keys saved to {}", path),
                            Err(e) => eprintln!("Invalid path `{}`: {}", path, e),
                        }
                    }
                    Some('l') => {
                        let path = prompt(&mut lines, "Relative path: ")?;
                        match node.load_keys(&path) {
                            Ok(account) => println!("Loaded account {}", account),
                            Err(e) => eprintln!("Invalid path `{}`: {}", path, e),
                        }
                    }
                    _ => eprintln!("Unknown key command"),
                }
            }

            'p' => {
                if node.toggle_auto_ping() {
                    println!("Started pinging transactions");
                } else {
                    println!("Stopped pinging transactions");
                }
            }

            'w' => match node.force_weight_update() {
                Ok(()) => println!("Updated weights"),
                Err(e) => eprintln!("{}", e),
            },

            _ => {}
        }
    }

    Ok(())
}

fn prompt<B: BufRead>(lines: &mut io::Lines<B>, text: &str) -> Result<String> {
    print!("{}", text);
    io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(line?.trim().to_string()),
        None => Ok(String::new()),
    }
}
