//! A minimal driver worker speaking the framed handshake/request protocol
//! (§4.1), used as the `DriverSpec::exec_path` target in integration
//! tests. Not part of the gateway proper: no production code path spawns
//! this binary.
//!
//! Content is derived deterministically from the request so tests can
//! assert on it without a real backing store. Set `FAKE_DRIVER_DIE_AFTER`
//! to make the process exit after serving that many requests, to exercise
//! the worker-death path.

use ag::framing::{read_chunk, write_chunk};
use ag::wire::{self, DriverReply, DriverRequest, DriverRequestType, PubInfo};
use std::io::{stdin, stdout, BufReader, Write};

fn block_payload(file_id: u64, block_id: u64, block_version: i64) -> Vec<u8> {
    format!("file={file_id} block={block_id} version={block_version}").repeat(4).into_bytes()
}

fn main() {
    let mut input = BufReader::new(stdin());
    let mut output = stdout();

    if read_chunk(&mut input).is_err() {
        return;
    }
    if read_chunk(&mut input).is_err() {
        return;
    }
    if read_chunk(&mut input).is_err() {
        return;
    }
    if output.write_all(b"0\n").is_err() {
        return;
    }
    let _ = output.flush();

    let die_after: Option<u64> =
        std::env::var("FAKE_DRIVER_DIE_AFTER").ok().and_then(|s| s.parse().ok());
    let stat_size: u64 =
        std::env::var("FAKE_DRIVER_SIZE").ok().and_then(|s| s.parse().ok()).unwrap_or(256);
    let mut served: u64 = 0;

    loop {
        let frame = match read_chunk(&mut input) {
            Ok(f) => f,
            Err(_) => break,
        };
        let req: DriverRequest = match wire::decode(&frame) {
            Ok(r) => r,
            Err(_) => break,
        };

        served += 1;
        if let Some(limit) = die_after {
            if served > limit {
                std::process::exit(1);
            }
        }

        let reply = match req.request_type {
            DriverRequestType::Block => {
                DriverReply::ok(block_payload(req.file_id, req.block_id, req.block_version))
            }
            DriverRequestType::Stat => {
                let pub_info = PubInfo { size: stat_size, mtime_sec: 1_700_000_000, mtime_nsec: 0 };
                match wire::encode(&pub_info) {
                    Ok(bytes) => DriverReply::ok(bytes),
                    Err(_) => DriverReply::err(),
                }
            }
            DriverRequestType::Reversion => DriverReply::ok(Vec::new()),
            DriverRequestType::Ioctl => DriverReply::ok(req.query_string.clone().into_bytes()),
        };

        let encoded = match wire::encode(&reply) {
            Ok(bytes) => bytes,
            Err(_) => break,
        };
        if write_chunk(&mut output, &encoded).is_err() {
            break;
        }
    }
}
