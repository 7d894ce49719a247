//! IPC socket setup and command handling.
//!
//! The scripting host lives out of process and talks newline-delimited JSON
//! over a Unix socket: commands in, events out. Signal subscriptions made
//! here are the "script listeners" of the signal bus; their payloads are
//! queued by `emit_signal` and flushed once per dispatch.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;

use calloop::generic::Generic;
use calloop::{Interest, LoopHandle, LoopSignal, Mode, PostAction};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::config::Config;
use crate::container::ContainerId;
use crate::input::keyboard::{KeybindInfo, Modifiers};
use crate::layout::LayoutMode;
use crate::shell::{ShellRequest, ToplevelId};
use crate::{Server, ServerError};

/// Socket filename.
const IPC_SOCKET_NAME: &str = "tessella.sock";

/// The IPC socket path, under XDG_RUNTIME_DIR if available.
pub fn ipc_socket_path() -> String {
    match std::env::var("XDG_RUNTIME_DIR") {
        Ok(dir) => format!("{}/{}", dir, IPC_SOCKET_NAME),
        Err(_) => format!("/tmp/{}", IPC_SOCKET_NAME),
    }
}

/// Everything the event loop hands to callbacks.
pub struct LoopData {
    pub server: Server,
    /// The connected scripting host, if any.
    pub host: Option<UnixStream>,
    pub signal: LoopSignal,
}

/// Commands the scripting host may send.
#[derive(Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum Command {
    Subscribe { signal: String },
    Unsubscribe { signal: String },
    ViewOnly { index: usize },
    ToggleTag { index: usize },
    SetLayoutMode { mode: LayoutMode },
    SetStrategyIdx { step: i32 },
    SetMwfact { value: f64 },
    SetUselessGaps { width: i32 },
    SetMaxGeneralWorkspace { max: usize },
    Focus { id: u64 },
    FocusIdx { id: u64, step: i32 },
    Close { id: u64 },
    Kill { id: u64 },
    SetFloating { id: u64, set: bool },
    SetFullscreen { id: u64, set: bool },
    SetMaximized { id: u64, set: bool },
    SetMinimized { id: u64, set: bool },
    SetSticky { id: u64, set: bool },
    SetOpacity { id: u64, value: f32 },
    MoveToTag { id: u64, index: usize },
    Swap { id: u64, other: u64 },
    InsertMark { id: Option<u64> },
    Bind {
        modifiers: u32,
        keysym: u32,
        press_id: Option<u64>,
        release_id: Option<u64>,
        group: Option<String>,
        description: Option<String>,
    },
    ClearBinds {
        #[serde(default)]
        clear_common_key: bool,
    },
    DumpKeybinds,
    SetConfig { config: Config },
    GetState,
    Quit,
}

impl LoopData {
    /// Flush queued signal payloads and replies to the host.
    pub fn flush_events(&mut self) {
        if self.host.is_none() {
            self.server.script_events.clear();
            return;
        }
        let mut failed = false;
        if let Some(stream) = self.host.as_mut() {
            while let Some(event) = self.server.script_events.pop_front() {
                let line = event.to_string();
                if writeln!(stream, "{line}").is_err() {
                    failed = true;
                    break;
                }
            }
            if !failed {
                let _ = stream.flush();
            }
        }
        if failed {
            warn!("scripting host went away, disconnecting");
            self.host = None;
            self.server.script_events.clear();
        }
    }

    /// Drain compositor requests. With the wire server out of process the
    /// loop only accounts for them here; a real backend executes them.
    pub fn drain_requests(&mut self) {
        for request in self.server.drain_requests() {
            tracing::trace!("shell request: {:?}", request);
            if let ShellRequest::SwitchVt { vt } = request {
                info!("vt switch to {vt} requested");
            }
        }
    }

    /// Returns false once the peer hung up.
    pub fn process_commands_from_stream(&mut self, stream: &mut UnixStream) -> bool {
        let Ok(cloned) = stream.try_clone() else {
            return false;
        };
        let mut reader = BufReader::new(cloned);
        let mut line = String::new();
        let mut connected = true;
        loop {
            match reader.read_line(&mut line) {
                Ok(0) => {
                    connected = false;
                    break;
                }
                Ok(_) => match serde_json::from_str::<Command>(&line) {
                    Ok(command) => self.handle_command(command),
                    Err(err) => {
                        self.server
                            .report_script_error("ipc", &format!("bad command: {err}"));
                    }
                },
                Err(_) => break,
            }
            line.clear();
        }
        self.flush_events();
        connected
    }

    fn focused_output_or_first(&self) -> Option<crate::output::OutputId> {
        self.server
            .focused_output
            .or_else(|| self.server.output_order.first().copied())
    }

    fn handle_command(&mut self, command: Command) {
        let focused = self.focused_output_or_first();
        let server = &mut self.server;
        match command {
            Command::Subscribe { signal } => server.signals.subscribe_script(&signal),
            Command::Unsubscribe { signal } => server.signals.unsubscribe_script(&signal),
            Command::ViewOnly { index } => {
                if let Some(output) = focused {
                    server.output_set_view_only(output, index);
                }
            }
            Command::ToggleTag { index } => {
                if let Some(output) = focused {
                    server.output_toggle_tag(output, index);
                }
            }
            Command::SetLayoutMode { mode } => {
                if let Some(output) = focused {
                    server.output_set_layout_mode(output, mode);
                }
            }
            Command::SetStrategyIdx { step } => {
                if let Some(output) = focused {
                    server.output_set_strategy_idx(output, step);
                }
            }
            Command::SetMwfact { value } => {
                if let Some(output) = focused {
                    server.output_set_mwfact(output, 0, value);
                }
            }
            Command::SetUselessGaps { width } => {
                if let Some(output) = focused {
                    server.output_set_useless_gaps(output, 0, width);
                }
            }
            Command::SetMaxGeneralWorkspace { max } => {
                if let Some(output) = focused {
                    server.output_set_max_general_workspace(output, max);
                }
            }
            Command::Focus { id } => server.focus_toplevel(Some(ToplevelId(id)), true),
            Command::FocusIdx { id, step } => {
                if let Some(container) =
                    server.toplevel(ToplevelId(id)).and_then(|t| t.container)
                {
                    server.container_focusidx(container, step);
                }
            }
            Command::Close { id } => server.toplevel_send_close(ToplevelId(id)),
            Command::Kill { id } => server.toplevel_kill(ToplevelId(id)),
            Command::SetFloating { id, set } => server.toplevel_set_floating(ToplevelId(id), set),
            Command::SetFullscreen { id, set } => {
                server.toplevel_set_fullscreen(ToplevelId(id), set)
            }
            Command::SetMaximized { id, set } => {
                server.toplevel_set_maximized(ToplevelId(id), set)
            }
            Command::SetMinimized { id, set } => {
                server.toplevel_set_minimized(ToplevelId(id), set)
            }
            Command::SetSticky { id, set } => server.toplevel_set_sticky(ToplevelId(id), set),
            Command::SetOpacity { id, value } => {
                if let Some(container) =
                    server.toplevel(ToplevelId(id)).and_then(|t| t.container)
                {
                    server.container_set_opacity(container, value);
                }
            }
            Command::MoveToTag { id, index } => {
                server.toplevel_move_to_tag(ToplevelId(id), index)
            }
            Command::Swap { id, other } => {
                server.toplevel_swap(ToplevelId(id), ToplevelId(other))
            }
            Command::InsertMark { id } => {
                let container = id
                    .map(ContainerId)
                    .filter(|c| server.containers.contains_key(c));
                server.insert_marked = container;
            }
            Command::Bind {
                modifiers,
                keysym,
                press_id,
                release_id,
                group,
                description,
            } => {
                let make = |callback_id: u64| {
                    std::rc::Rc::new(move |server: &mut Server| {
                        server
                            .script_events
                            .push_back(json!({ "event": "keybind", "id": callback_id }));
                    }) as std::rc::Rc<dyn Fn(&mut Server)>
                };
                let info = KeybindInfo {
                    on_press: press_id.map(make),
                    on_release: release_id.map(make),
                    group,
                    description,
                };
                server.keybind_kbd_register(
                    Modifiers::from_bits_truncate(modifiers),
                    xkeysym::Keysym::new(keysym),
                    info,
                );
            }
            Command::ClearBinds { clear_common_key } => {
                server.keybind_kbd_clear(clear_common_key)
            }
            Command::DumpKeybinds => {
                let dump = server.dump_keybinds_info();
                server
                    .script_events
                    .push_back(json!({ "event": "keybinds", "text": dump }));
            }
            Command::SetConfig { config } => server.commit_config(config),
            Command::GetState => {
                let state = server.state_snapshot();
                server
                    .script_events
                    .push_back(json!({ "event": "state", "state": state }));
            }
            Command::Quit => {
                info!("quit requested over ipc");
                self.signal.stop();
            }
        }
        self.drain_requests();
    }
}

/// Bind the IPC socket and register it with the event loop.
pub fn setup_ipc_listener(event_loop: &LoopHandle<'static, LoopData>) -> Result<(), ServerError> {
    let socket_path = ipc_socket_path();
    let ipc_path = Path::new(&socket_path);

    if ipc_path.exists() {
        std::fs::remove_file(ipc_path)?;
    }

    let ipc_listener = UnixListener::bind(ipc_path)?;
    ipc_listener.set_nonblocking(true)?;
    info!("IPC socket: {}", socket_path);

    let loop_handle = event_loop.clone();
    event_loop
        .insert_source(
            Generic::new(ipc_listener, Interest::READ, Mode::Level),
            move |_, listener, data: &mut LoopData| {
                if let Ok((stream, _)) = listener.accept() {
                    info!("scripting host connected");
                    stream.set_nonblocking(true).ok();

                    let write_stream = stream.try_clone().expect("clone ipc stream");
                    data.host = Some(write_stream);

                    loop_handle
                        .insert_source(
                            Generic::new(stream, Interest::READ, Mode::Level),
                            |_, source, data: &mut LoopData| {
                                // SAFETY: inside the loop callback the source
                                // is valid and not re-registered
                                let stream = unsafe { source.get_mut() };
                                if data.process_commands_from_stream(stream) {
                                    Ok(PostAction::Continue)
                                } else {
                                    info!("scripting host disconnected");
                                    data.host = None;
                                    Ok(PostAction::Remove)
                                }
                            },
                        )
                        .expect("failed to register ipc stream");
                }
                Ok(PostAction::Continue)
            },
        )
        .map_err(|e| ServerError::EventLoop(e.to_string()))?;

    Ok(())
}
