//! tessella - dynamic tiling compositor core
//!
//! The window-management core of a Wayland compositor: containers, tags,
//! tiling engines, input routing and the scene graph that drives the
//! renderer. The wire-protocol server, renderer and scripting host are
//! external collaborators reached through `shell` events and requests and
//! the `ipc` seam.
//!
//! # Design Invariants
//!
//! 1. **Single thread**: everything runs on the wire-protocol event loop.
//!    Every handler runs to completion; signal callbacks execute inline, in
//!    registration order, native side before script side.
//!
//! 2. **Container membership**: every managed container of an output appears
//!    in exactly one primary list (`containers`) plus possibly the
//!    `focus_stack` and `minimized` secondaries. Unmanaged containers join
//!    none of them.
//!
//! 3. **State exclusivity**: Fullscreen and Maximized are mutually
//!    exclusive; setting one clears the other before any geometry moves.
//!
//! 4. **Emission points are terminal**: operations emit their signal last,
//!    so callbacks observing the bus see settled state. Callbacks holding
//!    entity ids revalidate them on re-entry.
//!
//! 5. **Output state outlives its output**: on disconnect the per-output
//!    state is parked in a name-keyed cache that never evicts, and rebinds
//!    when a display with the same name returns.

pub mod border;
pub mod config;
pub mod container;
pub mod input;
pub mod ipc;
pub mod layout;
pub mod output;
pub mod scene;
pub mod shell;
pub mod signal;
pub mod utils;

// Testing module is always compiled but only used by tests
#[doc(hidden)]
pub mod testing;

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use config::Config;
use container::{Container, ContainerId};
use input::{ConstraintMap, Seat};
use layout::bsp::{BspNode, BspNodeId};
use layout::master::MasterStrategy;
use output::{Output, OutputId, OutputState};
use scene::{Scene, SceneLayers};
use shell::toplevel::Popup;
use shell::{LayerId, LayerSurface, PopupId, SessionLockManager, ShellRequest, Toplevel, ToplevelId};
use signal::SignalBus;

/// Max workspace/tag count; the tag bitfield spends one bit per workspace.
pub const MAX_WORKSPACE: usize = 30;

/// Hard lower bound on surface width and height.
pub const MIN_WIDTH: i32 = 20;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("event loop error: {0}")]
    EventLoop(String),
}

/// The compositor context, threaded explicitly through every handler.
pub struct Server {
    pub config: Config,
    pub scene: Scene,
    pub layers: SceneLayers,

    // entities
    pub outputs: HashMap<OutputId, Output>,
    pub output_order: Vec<OutputId>,
    pub toplevels: HashMap<ToplevelId, Toplevel>,
    /// Newest first.
    pub toplevel_order: Vec<ToplevelId>,
    pub containers: HashMap<ContainerId, Container>,
    /// Newest first.
    pub container_order: Vec<ContainerId>,
    pub layer_surfaces: HashMap<LayerId, LayerSurface>,
    pub layer_order: Vec<LayerId>,
    pub popups: HashMap<PopupId, Popup>,
    pub bsp_nodes: HashMap<BspNodeId, BspNode>,

    /// Parked output state, keyed by output name. Never evicts.
    pub output_state_cache: HashMap<String, OutputState>,

    pub signals: SignalBus,
    pub keybinds: input::keyboard::KeybindMap,
    pub mouse_binds: input::keyboard::KeybindMap,
    pub seat: Seat,
    pub constraints: ConstraintMap,
    pub session_lock: SessionLockManager,
    pub master_registry: Vec<MasterStrategy>,

    /// The container that receives the next mapped toplevel, if any.
    /// Cleared when its target dies.
    pub insert_marked: Option<ContainerId>,
    pub focused_output: Option<OutputId>,

    /// Outbox toward clients and the backend, drained every dispatch.
    pub requests: Vec<ShellRequest>,
    /// Queued payloads for the scripting host.
    pub script_events: VecDeque<serde_json::Value>,

    pub socket_name: String,
    next_id: u64,
    start: Instant,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let mut scene = Scene::new();
        let layers = scene.create_layers();

        let mut server = Self {
            config,
            scene,
            layers,
            outputs: HashMap::new(),
            output_order: Vec::new(),
            toplevels: HashMap::new(),
            toplevel_order: Vec::new(),
            containers: HashMap::new(),
            container_order: Vec::new(),
            layer_surfaces: HashMap::new(),
            layer_order: Vec::new(),
            popups: HashMap::new(),
            bsp_nodes: HashMap::new(),
            output_state_cache: HashMap::new(),
            signals: SignalBus::new(),
            keybinds: HashMap::new(),
            mouse_binds: HashMap::new(),
            seat: Seat::new(),
            constraints: HashMap::new(),
            session_lock: SessionLockManager::default(),
            master_registry: layout::master::builtin_strategies(),
            insert_marked: None,
            focused_output: None,
            requests: Vec::new(),
            script_events: VecDeque::new(),
            socket_name: "wayland-1".to_string(),
            next_id: 1,
            start: Instant::now(),
        };
        server.keybind_register_common_key();
        server
    }

    pub(crate) fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Monotonic milliseconds since startup.
    pub fn now_msec(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub(crate) fn push_request(&mut self, request: ShellRequest) {
        self.requests.push(request);
    }

    /// Take the accumulated client/backend requests.
    pub fn drain_requests(&mut self) -> Vec<ShellRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Mark a container to adopt the next mapped toplevel.
    pub fn set_insert_marked(&mut self, container: Option<ContainerId>) {
        self.insert_marked = container.filter(|c| self.containers.contains_key(c));
    }

    /// Export the environment clients and the scripting host expect.
    pub fn init_environment(&self) {
        std::env::set_var("WAYLAND_DISPLAY", &self.socket_name);
        std::env::set_var("XCURSOR_SIZE", self.config.cursor_size.to_string());
        info!("WAYLAND_DISPLAY={}", self.socket_name);
    }

    /// The legacy-X11 bridge came up under this display name.
    pub fn set_legacy_display_name(&mut self, name: &str) {
        std::env::set_var("DISPLAY", name);
        info!("DISPLAY={name}");
    }

    /// Compact state dump for the scripting host.
    pub fn state_snapshot(&self) -> serde_json::Value {
        let outputs: Vec<_> = self
            .output_order
            .iter()
            .filter_map(|id| self.outputs.get(id))
            .map(|o| {
                json!({
                    "id": o.id.0,
                    "name": o.name,
                    "width": o.width,
                    "height": o.height,
                    "usable_area": o.usable_area,
                    "active_tag": o.state.active_tag,
                    "active_workspace": o.state.active_workspace,
                    "max_general_workspace": o.state.max_general_workspace,
                    "restored": o.restored,
                })
            })
            .collect();
        let toplevels: Vec<_> = self
            .toplevel_order
            .iter()
            .filter_map(|id| self.toplevels.get(id))
            .map(|t| {
                json!({
                    "id": t.id.0,
                    "app_id": t.app_id,
                    "title": t.title,
                    "mapped": t.mapped,
                    "container": t.container.map(|c| c.0),
                })
            })
            .collect();
        let containers: Vec<_> = self
            .container_order
            .iter()
            .filter_map(|id| self.containers.get(id))
            .map(|c| {
                json!({
                    "id": c.id.0,
                    "box": self.container_box(c.id),
                    "tag": c.tag,
                    "workspace": c.workspace,
                    "state": c.state.bits(),
                    "opacity": c.opacity,
                })
            })
            .collect();
        json!({
            "outputs": outputs,
            "toplevels": toplevels,
            "containers": containers,
        })
    }
}

/// Fork off a command, detached from the compositor's lifetime.
pub fn spawn(argv: &[String]) {
    let Some((program, args)) = argv.split_first() else {
        return;
    };
    match std::process::Command::new(program).args(args).spawn() {
        Ok(child) => info!("spawned {program} (pid {})", child.id()),
        Err(err) => warn!("failed to spawn {program}: {err}"),
    }
}

/// Run a command line through the shell.
pub fn spawn_with_shell(command: &str) {
    match std::process::Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .spawn()
    {
        Ok(child) => info!("spawned shell command (pid {})", child.id()),
        Err(err) => warn!("failed to spawn {command}: {err}"),
    }
}
