//! Acquisition Gateway daemon (§5, §6): boots the namespace, starts the
//! HTTP server, the specfile-reload listener, the reversioner's deadline
//! loop, and the driver supervisor; tears all of it down on SIGTERM/SIGINT
//! or a control-socket `TERMINATE` event.

use ag::cache::{Cache, CacheConfig, MemoryStore};
use ag::certs::InMemoryCertStore;
use ag::codec::SigningIdentity;
use ag::config::{exit_code, AgArgs};
use ag::control::{self, ControlAction};
use ag::drivers::Supervisor;
use ag::ms::fake::FakeMs;
use ag::namespace::AgFs;
use ag::specfile;
use ag::state::{RunState, State};
use ag::{http::HttpServer, logging};
use clap::Parser;
use nix::sys::signal::{SigSet, Signal};
use p256::ecdsa::SigningKey;
use p256::pkcs8::DecodePrivateKey;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn load_or_generate_key(args: &AgArgs) -> std::io::Result<SigningKey> {
    if let Some(path) = &args.signing_key {
        let mut bytes = Vec::new();
        std::fs::File::open(path)?.read_to_end(&mut bytes)?;
        return SigningKey::from_pkcs8_der(&bytes)
            .map_err(|e| std::io::Error::other(format!("bad signing key: {e}")));
    }
    use p256::elliptic_curve::rand_core::OsRng;
    log::warn!("no --signing-key given, generating an ephemeral key for this run");
    Ok(SigningKey::random(&mut OsRng))
}

fn main() {
    let args = AgArgs::parse_args();

    let log_dir = args.log_dir.clone().unwrap_or_else(|| std::path::PathBuf::from("."));
    if let Err(e) = logging::init_default(&log_dir) {
        eprintln!("failed to initialize logging: {e}");
        std::process::exit(exit_code::INIT_FAILURE);
    }

    match run(args) {
        Ok(()) => std::process::exit(exit_code::CLEAN_SHUTDOWN),
        Err(e) => {
            log::error!("fatal: {e}");
            std::process::exit(exit_code::INIT_FAILURE);
        }
    }
}

/// Blocks `SIGINT`/`SIGTERM`/`SIGQUIT` from the default disposition on
/// every thread spawned after this call (signal masks are inherited at
/// thread creation) and hands them instead to a dedicated `sigwait`
/// thread, so shutdown is a plain flag flip rather than an async-signal
/// handler racing the rest of the daemon (§6).
fn spawn_signal_thread(shutdown: Arc<AtomicBool>) {
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGINT);
    mask.add(Signal::SIGTERM);
    mask.add(Signal::SIGQUIT);
    if mask.thread_block().is_err() {
        log::warn!("failed to block termination signals; relying on control socket TERMINATE only");
        return;
    }
    std::thread::spawn(move || {
        if mask.wait().is_ok() {
            shutdown.store(true, Ordering::SeqCst);
        }
    });
}

fn run(args: AgArgs) -> Result<(), Box<dyn std::error::Error>> {
    let signing_key = load_or_generate_key(&args)?;
    let identity = SigningIdentity { gateway_id: args.gateway_id, key: signing_key };

    let ms = Arc::new(FakeMs::new(args.volume_id));
    let certs = Arc::new(InMemoryCertStore::new(64));
    let clock = Arc::new(ag::clock::SystemClock::new());

    let cache_config = CacheConfig {
        soft_limit_bytes: args.cache_soft_limit.unwrap_or(CacheConfig::default().soft_limit_bytes),
        hard_limit_bytes: args.cache_hard_limit.unwrap_or(CacheConfig::default().hard_limit_bytes),
        ..CacheConfig::default()
    };
    let cache = Cache::new(Arc::new(MemoryStore::new()), cache_config);
    let drivers = Supervisor::new(args.driver_dir.clone());

    let fs = AgFs::new(args.volume_id, args.gateway_id);

    let state = Arc::new(State::new(
        args.volume_id,
        args.gateway_id,
        fs,
        cache,
        drivers,
        certs,
        ms.clone(),
        clock.clone(),
        identity,
        std::collections::HashMap::new(),
    ));

    if let Some(specfile_path) = &args.specfile {
        let xml = specfile::fetch_specfile_text(Some(specfile_path), ms.as_ref(), args.volume_id)?;
        let new_fs = build_initial_fs(args.volume_id, ms.as_ref(), &xml)?;
        state.swap_fs(new_fs);
    }

    if let Some(registry_path) = &args.driver_registry {
        let registry = ag::drivers::DriverRegistry::load(registry_path)?;
        let fs = state.fs();
        let names = fs.snapshot_paths().into_iter().filter_map(|p| fs.get(&p).map(|i| i.driver));
        ag::drivers::sync_groups(&state.drivers, &registry, names);
    } else {
        log::warn!("no --driver-registry given; all driver dispatch will fail with NoSuchDriver");
    }

    if args.reversion_at_startup {
        let fs = state.fs();
        let paths: Vec<(String, String)> = fs
            .snapshot_paths()
            .into_iter()
            .filter_map(|p| fs.get(&p).map(|info| (p, info.driver)))
            .collect();
        state.reversioner.add_map_infos(paths.iter().map(|(p, d)| (p.as_str(), d.as_str())));
    }

    let http_server = HttpServer::bind(&args.http_addr, state.clone(), args.http_threads)?;
    log::info!("listening on {}", args.http_addr);

    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_signal_thread(shutdown.clone());
    let control_state = state.clone();
    let control_shutdown = shutdown.clone();
    let control_socket = args.events_socket.clone();
    let reload_args = args.clone();
    let control_thread = std::thread::spawn(move || {
        let _ = control::serve(&control_socket, control_shutdown.clone(), move |action| {
            handle_control_action(&control_state, action, &control_shutdown, &reload_args);
        });
    });

    state.set_run_state(RunState::Running);
    run_reversion_loop(&state, &shutdown);

    state.set_run_state(RunState::Draining);
    http_server.shutdown();
    shutdown.store(true, Ordering::SeqCst);
    let _ = control_thread.join();
    state.drivers.shutdown_all();
    state.set_run_state(RunState::Stopped);

    Ok(())
}

fn build_initial_fs(
    volume_id: u64,
    ms: &dyn ag::ms::MsClient,
    xml: &str,
) -> ag::AgResult<AgFs> {
    let parsed = ag::specfile::parser::parse(xml)?;
    let skeleton = ag::specfile::reload::build_skeleton(&parsed)?;
    let template = ag::specfile::reload::query_template(&parsed);
    let discovered = AgFs::download_ms_fs_map(volume_id, &skeleton, ms, &template)?;
    AgFs::from_map(volume_id, discovered)
}

fn handle_control_action(
    state: &Arc<State>,
    action: ControlAction,
    shutdown: &Arc<AtomicBool>,
    args: &AgArgs,
) {
    match action {
        ControlAction::Terminate => shutdown.store(true, Ordering::SeqCst),
        ControlAction::Reload => {
            if let Err(e) = do_reload(state, args) {
                log::error!("control: reload failed: {e}");
            }
        }
        ControlAction::Republish => {
            log::info!("control: republish requested");
        }
        ControlAction::DriverIoctl { query_type, opaque } => {
            let req = ag::wire::DriverRequest {
                request_type: ag::wire::DriverRequestType::Ioctl,
                file_id: 0,
                file_version: 0,
                block_id: 0,
                block_version: 0,
                manifest_mtime_sec: 0,
                manifest_mtime_nsec: 0,
                path: String::new(),
                query_string: String::from_utf8_lossy(&opaque).into_owned(),
                io_hint_sequential: false,
            };
            let _ = state.drivers.dispatch(&query_type, &req);
        }
    }
}

/// Re-fetches the specfile, reconciles the namespace against the MS, and
/// re-syncs driver pools against the (possibly changed) set of driver
/// names the new namespace references (§4.8, §6 `RECONF` control event).
fn do_reload(state: &Arc<State>, args: &AgArgs) -> ag::AgResult<()> {
    let xml = specfile::fetch_specfile_text(args.specfile.as_deref(), state.ms.as_ref(), state.volume_id)?;
    let fs = state.fs();
    let live_paths = specfile::reload(
        state.volume_id,
        state.ms.as_ref(),
        state.clock.as_ref(),
        &xml,
        &fs,
        &state.reversioner,
    )?;

    if let Some(registry_path) = &args.driver_registry {
        let registry = ag::drivers::DriverRegistry::load(registry_path)?;
        let names = live_paths.iter().filter_map(|p| fs.get(p).map(|i| i.driver));
        ag::drivers::sync_groups(&state.drivers, &registry, names);
    }

    log::info!("reload complete: {} live paths", live_paths.len());
    Ok(())
}

fn run_reversion_loop(state: &Arc<State>, shutdown: &Arc<AtomicBool>) {
    while !shutdown.load(Ordering::SeqCst) {
        let now = state.clock.now_secs();
        let fs = state.fs();
        if let Err(e) = state.reversioner.drain_due(now, &fs, &state.cache, &state.drivers) {
            log::warn!("reversion pass failed: {e}");
        }
        std::thread::sleep(Duration::from_millis(200));
    }
}
