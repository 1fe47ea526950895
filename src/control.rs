//! Control socket (§6): a UNIX domain stream socket carrying fixed-size
//! `[i32 event_type][4096-byte payload]` messages, so the fixed total
//! length stands in for `std`'s lack of `SOCK_SEQPACKET` support. `agctl`
//! is the intended client; the message shape is independent of the
//! `agctl` binary's own CLI surface.

use crate::error::{AgError, AgResult};
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const PAYLOAD_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Terminate = 0,
    Reconf = 1,
    Republish = 2,
    DriverIoctl = 3,
}

impl EventType {
    fn from_i32(v: i32) -> AgResult<Self> {
        match v {
            0 => Ok(EventType::Terminate),
            1 => Ok(EventType::Reconf),
            2 => Ok(EventType::Republish),
            3 => Ok(EventType::DriverIoctl),
            other => Err(AgError::BadRequest(format!("unknown control event type {other}"))),
        }
    }
}

pub struct ControlMessage {
    pub event_type: EventType,
    pub payload: Vec<u8>,
}

/// Reads one `[i32 BE][4096 bytes]` frame off `stream`.
pub fn read_message(stream: &mut UnixStream) -> AgResult<ControlMessage> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header)?;
    let event_type = EventType::from_i32(i32::from_be_bytes(header))?;

    let mut payload = vec![0u8; PAYLOAD_LEN];
    stream.read_exact(&mut payload)?;
    let end = payload.iter().position(|&b| b == 0).unwrap_or(PAYLOAD_LEN);
    payload.truncate(end);

    Ok(ControlMessage { event_type, payload })
}

pub fn send_message(stream: &mut UnixStream, event_type: EventType, payload: &[u8]) -> AgResult<()> {
    if payload.len() >= PAYLOAD_LEN {
        return Err(AgError::BadRequest("control payload exceeds 4096 bytes".to_string()));
    }
    let mut buf = Vec::with_capacity(4 + PAYLOAD_LEN);
    buf.extend_from_slice(&(event_type as i32).to_be_bytes());
    buf.extend_from_slice(payload);
    buf.resize(4 + PAYLOAD_LEN, 0);
    stream.write_all(&buf)?;
    Ok(())
}

/// What a received control message asked the daemon to do, decoupled
/// from the socket plumbing so `agd`'s main loop can match on it.
pub enum ControlAction {
    Terminate,
    Reload,
    Republish,
    DriverIoctl { query_type: String, opaque: Vec<u8> },
}

pub fn interpret(msg: ControlMessage) -> AgResult<ControlAction> {
    match msg.event_type {
        EventType::Terminate => Ok(ControlAction::Terminate),
        EventType::Reconf => Ok(ControlAction::Reload),
        EventType::Republish => Ok(ControlAction::Republish),
        EventType::DriverIoctl => {
            let colon = memchr::memchr(b':', &msg.payload).ok_or_else(|| {
                AgError::BadRequest("DRIVER_IOCTL payload missing ':' separator".to_string())
            })?;
            let (qt, rest) = msg.payload.split_at(colon);
            let query_type = String::from_utf8_lossy(qt).into_owned();
            Ok(ControlAction::DriverIoctl { query_type, opaque: rest[1..].to_vec() })
        }
    }
}

/// Accepts control connections on `socket_path` until `shutdown` is set,
/// handing each decoded [`ControlAction`] to `on_action`.
pub fn serve<F>(socket_path: &Path, shutdown: Arc<AtomicBool>, on_action: F) -> AgResult<()>
where
    F: Fn(ControlAction) + Send + Sync + 'static,
{
    let _ = std::fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path)?;
    listener.set_nonblocking(true)?;

    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((mut stream, _)) => match read_message(&mut stream) {
                Ok(msg) => {
                    if let Ok(action) = interpret(msg) {
                        on_action(action);
                    }
                }
                Err(_) => continue,
            },
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            Err(_) => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_ioctl_splits_on_first_colon_not_nul() {
        let msg = ControlMessage {
            event_type: EventType::DriverIoctl,
            payload: b"query:opaque:with:colons".to_vec(),
        };
        let action = interpret(msg).unwrap();
        match action {
            ControlAction::DriverIoctl { query_type, opaque } => {
                assert_eq!(query_type, "query");
                assert_eq!(opaque, b"opaque:with:colons");
            }
            _ => panic!("wrong action"),
        }
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        assert!(EventType::from_i32(99).is_err());
    }
}
