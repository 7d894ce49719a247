//! tessella entry point.
//!
//! Brings up the compositor core, the IPC socket for the scripting host,
//! and the event loop. Without a wire-protocol backend attached, virtual
//! outputs can be seeded through `TESSELLA_OUTPUTS`, e.g.
//! `TESSELLA_OUTPUTS=HDMI-A-1:1920x1080@60`.

use std::time::Duration;

use anyhow::Context;
use calloop::EventLoop;
use clap::error::ErrorKind;
use clap::Parser;
use tracing::{info, warn};

use tessella::config::Config;
use tessella::ipc::{setup_ipc_listener, LoopData};
use tessella::layout::master::fullscreen_strategy;
use tessella::output::OutputDesc;
use tessella::{spawn_with_shell, Server};

#[derive(Parser, Debug)]
#[command(name = "tessella", version, about = "dynamic tiling compositor")]
struct Cli {
    /// Configuration file handed to the scripting host
    #[arg(short, long)]
    config: Option<String>,

    /// Startup command
    #[arg(short, long)]
    startup: Option<String>,

    /// Library directory search path, ';' separated, repeatable
    #[arg(short = 'l', long)]
    library: Vec<String>,

    /// Increase debug verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,
}

fn log_level(debug: u8) -> tracing::Level {
    match debug.min(3) {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

fn seed_outputs(server: &mut Server) {
    let Ok(spec) = std::env::var("TESSELLA_OUTPUTS") else {
        return;
    };
    for part in spec.split(',').filter(|s| !s.is_empty()) {
        let Some(desc) = parse_output_spec(part) else {
            warn!("ignoring malformed output spec: {part}");
            continue;
        };
        server.handle_new_output(desc);
    }
}

/// `name:WxH[@Hz]`
fn parse_output_spec(spec: &str) -> Option<OutputDesc> {
    let (name, rest) = spec.split_once(':')?;
    let (mode, refresh) = match rest.split_once('@') {
        Some((mode, hz)) => (mode, hz.parse::<i32>().ok()? * 1000),
        None => (rest, 0),
    };
    let (width, height) = mode.split_once('x')?;
    Some(OutputDesc {
        name: name.to_string(),
        width: width.parse().ok()?,
        height: height.parse().ok()?,
        refresh,
        phys_width: 0,
        phys_height: 0,
        make: String::new(),
        model: String::new(),
        non_desktop: false,
    })
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut server = Server::new(Config::default());

    if let Some(config) = &cli.config {
        info!("configuration file: {config}");
        std::env::set_var("TESSELLA_CONFIG", config);
    }
    if !cli.library.is_empty() {
        let joined = cli
            .library
            .iter()
            .flat_map(|part| part.split(';'))
            .collect::<Vec<_>>()
            .join(";");
        info!("library search path: {joined}");
        std::env::set_var("TESSELLA_LIBRARY_PATH", joined);
    }

    server.master_register_strategy(fullscreen_strategy());
    server.init_environment();
    seed_outputs(&mut server);

    let mut event_loop: EventLoop<LoopData> =
        EventLoop::try_new().context("initializing event loop")?;
    let signal = event_loop.get_signal();
    setup_ipc_listener(&event_loop.handle()).context("binding ipc socket")?;

    if let Some(startup) = &cli.startup {
        spawn_with_shell(startup);
    }

    let mut data = LoopData {
        server,
        host: None,
        signal,
    };

    info!("compositor core running");
    event_loop
        .run(Duration::from_millis(500), &mut data, |data| {
            data.drain_requests();
            data.flush_events();
        })
        .context("event loop")?;

    Ok(())
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level(cli.debug))
        .init();

    if let Err(err) = run(cli) {
        eprintln!("fatal: {err:#}");
        std::process::exit(1);
    }
}
