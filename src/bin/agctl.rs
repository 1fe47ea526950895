//! Control CLI for a running `agd` (§6): sends one event over its UNIX
//! control socket and exits.

use ag::control::{self, EventType};
use clap::{Parser, Subcommand};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "agctl", about = "Control client for the Acquisition Gateway daemon")]
struct Cli {
    /// Path to the target daemon's control socket.
    #[arg(short = 'e', long = "events", value_name = "PATH")]
    events_socket: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask the daemon to shut down cleanly.
    Terminate,
    /// Ask the daemon to re-fetch and apply its specfile.
    Reconf,
    /// Ask the daemon to republish its current namespace shape to the MS.
    Republish,
    /// Pass an opaque payload through to a driver's ioctl handler.
    Ioctl {
        /// Query-type naming the driver pool to route to.
        query_type: String,
        /// Opaque bytes to forward, as UTF-8 text.
        opaque: String,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("agctl: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = UnixStream::connect(&cli.events_socket)?;

    let (event_type, payload) = match cli.command {
        Command::Terminate => (EventType::Terminate, Vec::new()),
        Command::Reconf => (EventType::Reconf, Vec::new()),
        Command::Republish => (EventType::Republish, Vec::new()),
        Command::Ioctl { query_type, opaque } => {
            let mut payload = query_type.into_bytes();
            payload.push(b':');
            payload.extend_from_slice(opaque.as_bytes());
            (EventType::DriverIoctl, payload)
        }
    };

    control::send_message(&mut stream, event_type, &payload)?;
    Ok(())
}
