//! bookvault CLI Client
//!
//! Minimal client for poking a running node: encodes requests with the
//! client side of the codec and prints the decoded response.

use std::net::TcpStream;

use bytes::Bytes;
use clap::{Parser, Subcommand};

use bookvault::protocol::{
    decode_response, encode_request, read_frame, write_frame, ErrorCode, Request,
};

/// bookvault CLI
#[derive(Parser, Debug)]
#[command(name = "bookvault-cli")]
#[command(about = "CLI client for a bookvault node")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:3181")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Append one entry to a ledger
    Add {
        /// Ledger id
        ledger: i64,

        /// Entry id
        entry: i64,

        /// Entry payload (UTF-8)
        payload: String,
    },

    /// Read one entry from a ledger
    Read {
        /// Ledger id
        ledger: i64,

        /// Entry id
        entry: i64,
    },
}

fn main() {
    let args = Args::parse();

    let request = match &args.command {
        Commands::Add {
            ledger,
            entry,
            payload,
        } => Request::add_entry(*ledger, *entry, Bytes::from(payload.clone().into_bytes())),
        Commands::Read { ledger, entry } => Request::read_entry(*ledger, *entry, 0),
    };

    if let Err(e) = run(&args.server, request) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(server: &str, request: Request) -> bookvault::Result<()> {
    let mut stream = TcpStream::connect(server)?;

    write_frame(&mut stream, &encode_request(&request))?;
    let frame = read_frame(&mut stream)?;
    let response = decode_response(frame)?;

    match response.error {
        ErrorCode::Ok => {
            println!(
                "OK {}:{}{}",
                response.ledger_id,
                response.entry_id,
                if response.payload.is_empty() {
                    String::new()
                } else {
                    format!(" -> {}", String::from_utf8_lossy(&response.payload))
                }
            );
        }
        error => {
            println!(
                "{:?} {}:{}",
                error, response.ledger_id, response.entry_id
            );
        }
    }

    Ok(())
}
