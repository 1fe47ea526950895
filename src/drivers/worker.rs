//! A single driver worker process and the framed protocol it speaks on
//! its stdin/stdout (§4.1). stderr is inherited so worker logs mix into
//! the AG's own log stream.

use crate::error::AgError;
use crate::framing::{read_chunk, write_chunk};
use crate::wire::{DriverReply, DriverRequest};
use std::io::BufReader;
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Handshake reply tokens a freshly spawned worker writes to stdout.
const HANDSHAKE_READY: &[u8] = b"0\n";
const HANDSHAKE_UNIMPLEMENTED: &[u8] = b"2\n";

/// Whether a driver bundle's handshake declares the operation implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeOutcome {
    Ready,
    Unimplemented,
}

pub struct Worker {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    pid: u32,
    dead: AtomicBool,
}

impl Worker {
    /// Spawns a child (via the sandbox executable, if configured) and runs
    /// the handshake: config, secrets, and driver code/artifact, each as
    /// one chunk, followed by a two-byte ready token.
    ///
    /// # Errors
    /// Returns [`AgError::WorkerDead`] if the child exits or replies with
    /// anything other than the ready/unimplemented tokens during the
    /// handshake.
    pub fn spawn(
        sandbox_path: Option<&Path>,
        exec_path: &Path,
        exec_arg: &str,
        env: &[(String, String)],
        config: &[u8],
        secrets: &[u8],
        driver_code: &[u8],
    ) -> Result<(Worker, HandshakeOutcome), AgError> {
        let mut cmd = match sandbox_path {
            Some(sandbox) => {
                let mut c = Command::new(sandbox);
                c.arg(exec_path);
                c
            }
            None => Command::new(exec_path),
        };
        cmd.arg(exec_arg);
        for (k, v) in env {
            cmd.env(k, v);
        }
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::inherit());

        let mut child = cmd.spawn()?;
        let pid = child.id();
        let mut stdin = child.stdin.take().ok_or(AgError::WorkerDead)?;
        let stdout = child.stdout.take().ok_or(AgError::WorkerDead)?;
        let mut stdout = BufReader::new(stdout);

        write_chunk(&mut stdin, config).map_err(|_| AgError::WorkerDead)?;
        write_chunk(&mut stdin, secrets).map_err(|_| AgError::WorkerDead)?;
        write_chunk(&mut stdin, driver_code).map_err(|_| AgError::WorkerDead)?;

        let mut token = [0u8; 2];
        std::io::Read::read_exact(&mut stdout, &mut token)
            .map_err(|_| AgError::WorkerDead)?;

        let outcome = if token == HANDSHAKE_READY {
            HandshakeOutcome::Ready
        } else if token == HANDSHAKE_UNIMPLEMENTED {
            HandshakeOutcome::Unimplemented
        } else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(AgError::WorkerDead);
        };

        Ok((Worker { child, stdin, stdout, pid, dead: AtomicBool::new(false) }, outcome))
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    fn mark_dead(&self) {
        self.dead.store(true, Ordering::Release);
    }

    /// Sends one `DriverRequest` and waits for one `DriverReply`. Only one
    /// request may be in flight per worker (§4.1: single-threaded
    /// dispatcher per worker) — callers must hold exclusive access to this
    /// `Worker` for the duration of the call.
    ///
    /// # Errors
    /// Returns [`AgError::WorkerDead`] on `SIGPIPE`-style write failure,
    /// short read, or EOF; returns [`AgError::FrameError`] on a malformed
    /// reply frame.
    pub fn request(&mut self, req: &DriverRequest) -> Result<DriverReply, AgError> {
        if self.dead.load(Ordering::Acquire) {
            return Err(AgError::WorkerDead);
        }
        let encoded = crate::wire::encode(req)?;
        if write_chunk(&mut self.stdin, &encoded).is_err() {
            self.mark_dead();
            return Err(AgError::WorkerDead);
        }
        let frame = match read_chunk(&mut self.stdout) {
            Ok(f) => f,
            Err(_) => {
                self.mark_dead();
                return Err(AgError::WorkerDead);
            }
        };
        crate::wire::decode::<DriverReply>(&frame).map_err(|e| {
            self.mark_dead();
            AgError::FrameError(e.to_string())
        })
    }

    /// Gracefully stops the worker: `SIGINT`, wait up to `timeout`, then
    /// `SIGKILL` and a blocking `waitpid` (§4.2 reload, §4.2 shutdown).
    pub fn stop(&mut self, timeout: Duration) {
        self.signal(nix::sys::signal::Signal::SIGINT);
        let deadline = Instant::now() + timeout;
        loop {
            if self.tryjoin() {
                return;
            }
            if Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        self.signal(nix::sys::signal::Signal::SIGKILL);
        let _ = self.child.wait();
        self.mark_dead();
    }

    fn signal(&self, sig: nix::sys::signal::Signal) {
        let pid = nix::unistd::Pid::from_raw(self.pid as i32);
        let _ = nix::sys::signal::kill(pid, sig);
    }

    /// Non-blocking `waitpid`; returns `true` if the child has exited.
    fn tryjoin(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(_)) => {
                self.mark_dead();
                true
            }
            Ok(None) => false,
            Err(_) => {
                self.mark_dead();
                true
            }
        }
    }

    /// Non-blocking reap of an already-dead worker; used by the dispatcher
    /// after a `SIGPIPE`/short-read detection (§4.1 failure model).
    pub fn reap_if_dead(&mut self, grace: Duration) {
        if !self.dead.load(Ordering::Acquire) {
            return;
        }
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if self.tryjoin() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        self.signal(nix::sys::signal::Signal::SIGKILL);
        let _ = self.child.wait();
    }
}
