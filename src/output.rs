//! Output and the tag/workspace system.
//!
//! Each output owns thirty workspaces, a focus stack, and the lists backing
//! the minimized and managed container sets. Output state survives its
//! output: on disconnect it is parked in a name-keyed cache and rebound when
//! a display with the same name comes back, so a dock unplug doesn't shred
//! the session.

use tracing::info;

use crate::container::ContainerId;
use crate::layout::bsp::BspNodeId;
use crate::layout::LayoutMode;
use crate::scene::NodeKind;
use crate::shell::ToplevelId;
use crate::signal::SignalArg;
use crate::utils::{clamp_f64, clamp_i32, Rect};
use crate::{Server, MAX_WORKSPACE};

/// Handle to an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(pub(crate) u64);

/// Master/stack parameters of one workspace.
#[derive(Debug, Clone, Copy)]
pub struct MasterState {
    pub master_count: i32,
    pub column_count: i32,
    pub mwfact: f64,
    /// Index into the registered strategy list.
    pub strategy: usize,
}

/// BSP root of one workspace. `root == None` means the tree is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct BspRootEntry {
    pub root: Option<BspNodeId>,
    pub last_focused: Option<ContainerId>,
}

/// Per-workspace layout configuration.
#[derive(Debug, Clone)]
pub struct ViewInfo {
    pub label: Option<String>,
    pub layout_mode: LayoutMode,
    pub useless_gaps: i32,
    pub bsp: BspRootEntry,
    pub master: MasterState,
}

impl ViewInfo {
    fn new(useless_gaps: i32) -> Self {
        Self {
            label: None,
            layout_mode: LayoutMode::Floating,
            useless_gaps,
            bsp: BspRootEntry::default(),
            master: MasterState {
                master_count: 1,
                column_count: 1,
                mwfact: 0.5,
                strategy: 0,
            },
        }
    }
}

/// Restorable output state, parked in the cache on disconnect.
#[derive(Debug)]
pub struct OutputState {
    /// Newest first.
    pub toplevels: Vec<ToplevelId>,
    /// Most recently focused first.
    pub focus_stack: Vec<ContainerId>,
    /// Newest first.
    pub containers: Vec<ContainerId>,
    /// Newest minimized first.
    pub minimized: Vec<ContainerId>,

    pub old_output: Option<OutputId>,

    pub active_tag: u32,
    /// Zero means "view none".
    pub active_workspace: usize,
    /// Workspace count shown in the bar.
    pub max_general_workspace: usize,

    /// Indexed by workspace, slot zero unused.
    pub view_info: Vec<ViewInfo>,
}

impl OutputState {
    pub fn new(useless_gaps: i32) -> Self {
        Self {
            toplevels: Vec::new(),
            focus_stack: Vec::new(),
            containers: Vec::new(),
            minimized: Vec::new(),
            old_output: None,
            active_tag: 1,
            active_workspace: 1,
            max_general_workspace: 9,
            view_info: (0..=MAX_WORKSPACE).map(|_| ViewInfo::new(useless_gaps)).collect(),
        }
    }
}

/// Description of a display handed over by the backend.
#[derive(Debug, Clone)]
pub struct OutputDesc {
    pub name: String,
    pub width: i32,
    pub height: i32,
    /// mHz, may be zero when unknown.
    pub refresh: i32,
    pub phys_width: i32,
    pub phys_height: i32,
    pub make: String,
    pub model: String,
    pub non_desktop: bool,
}

#[derive(Debug)]
pub struct Output {
    pub id: OutputId,
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub refresh: i32,
    pub phys_width: i32,
    pub phys_height: i32,
    pub make: String,
    pub model: String,
    /// Layout position, assigned left to right.
    pub x: i32,
    pub y: i32,
    pub usable_area: Rect,
    pub state: OutputState,
    pub restored: bool,
    pub enabled: bool,
}

impl Server {
    pub fn output(&self, id: OutputId) -> Option<&Output> {
        self.outputs.get(&id)
    }

    pub fn output_is_exist(&self, id: OutputId) -> bool {
        self.outputs.contains_key(&id)
    }

    pub fn output_get_focused(&self) -> Option<OutputId> {
        self.focused_output
    }

    pub fn output_at(&self, x: f64, y: f64) -> Option<OutputId> {
        self.output_order
            .iter()
            .copied()
            .find(|id| {
                self.outputs
                    .get(id)
                    .map(|o| Rect::new(o.x, o.y, o.width, o.height).contains(x, y))
                    .unwrap_or(false)
            })
    }

    /// View info of the active workspace.
    pub fn output_current_view_info(&self, id: OutputId) -> Option<&ViewInfo> {
        let output = self.outputs.get(&id)?;
        output.state.view_info.get(output.state.active_workspace)
    }

    pub fn output_current_gaps(&self, id: OutputId) -> i32 {
        self.output_current_view_info(id)
            .map(|info| info.useless_gaps)
            .unwrap_or(0)
    }

    pub fn output_is_current_layout_bsp(&self, id: OutputId) -> bool {
        self.output_current_view_info(id)
            .map(|info| info.layout_mode == LayoutMode::Bsp)
            .unwrap_or(false)
    }

    // ===================== lifecycle =====================

    /// A new display appeared. Additional heads are ignored for now, same as
    /// non-desktop ones.
    pub fn handle_new_output(&mut self, desc: OutputDesc) -> Option<OutputId> {
        if !self.output_order.is_empty() || desc.non_desktop {
            info!("ignoring extra output {}", desc.name);
            return None;
        }

        let id = OutputId(self.alloc_id());
        let mut restored = false;
        let state = match self.output_state_cache.remove(&desc.name) {
            Some(state) => {
                restored = true;
                state
            }
            None => OutputState::new(self.config.useless_gaps),
        };

        let output = Output {
            id,
            name: desc.name.clone(),
            width: desc.width,
            height: desc.height,
            refresh: desc.refresh,
            phys_width: desc.phys_width,
            phys_height: desc.phys_height,
            make: desc.make,
            model: desc.model,
            x: 0,
            y: 0,
            usable_area: Rect::new(0, 0, desc.width, desc.height),
            state,
            restored,
            enabled: true,
        };
        let old_output = output.state.old_output;
        self.outputs.insert(id, output);
        self.output_order.push(id);
        self.focused_output = Some(id);

        if restored {
            // re-point everything that referenced the old output
            if let Some(old) = old_output {
                let containers: Vec<ContainerId> = self.container_order.clone();
                for c in containers {
                    if let Some(container) = self.containers.get_mut(&c) {
                        if container.output == old {
                            container.output = id;
                        }
                    }
                }
                let layers: Vec<_> = self.layer_order.clone();
                for l in layers {
                    if let Some(surface) = self.layer_surfaces.get_mut(&l) {
                        if surface.output == old {
                            surface.output = id;
                        }
                    }
                }
            }
            info!("restored output state for {}", self.outputs[&id].name);
        }

        info!(
            "created output ({}): {:?}",
            self.outputs[&id].name, id
        );

        self.arrange_layers(id);
        self.emit_signal_simple("screen::new", SignalArg::Output(id));
        Some(id)
    }

    /// A display went away; park its state for an opportunistic restore.
    /// The cache never evicts.
    pub fn handle_output_destroyed(&mut self, id: OutputId) {
        let Some(output) = self.outputs.get_mut(&id) else {
            return;
        };
        output.state.old_output = Some(id);
        let name = output.name.clone();

        self.emit_signal_simple("screen::destroy", SignalArg::Output(id));

        info!("destroying output ({}): {:?}", name, id);

        let output = self.outputs.remove(&id).unwrap();
        self.output_state_cache.insert(name, output.state);
        self.output_order.retain(|&o| o != id);
        if self.focused_output == Some(id) {
            self.focused_output = self.output_order.first().copied();
        }
    }

    /// The backend changed the output mode; re-arrange everything that
    /// depends on its resolution.
    pub fn handle_output_request_state(&mut self, id: OutputId, width: i32, height: i32) {
        let Some(output) = self.outputs.get_mut(&id) else {
            return;
        };
        output.width = width;
        output.height = height;
        self.arrange_layers(id);
    }

    // ===================== visibility and focus =====================

    pub fn output_update_visible(&mut self, id: OutputId) {
        let containers: Vec<ContainerId> = self
            .outputs
            .get(&id)
            .map(|o| o.state.containers.clone())
            .unwrap_or_default();
        for c in containers {
            let visible = self.container_is_visible(c);
            self.container_set_enabled(c, visible);
        }
        self.output_focus_newest_focus_visible_toplevel(id);
    }

    pub fn output_visible_containers(&self, id: OutputId) -> Vec<ContainerId> {
        self.outputs
            .get(&id)
            .map(|o| o.state.containers.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|&c| self.container_is_visible(c))
            .collect()
    }

    /// First toplevel down the focus stack whose container qualifies,
    /// skipping unmanaged ones.
    pub fn output_get_newest_focus_toplevel(
        &self,
        id: OutputId,
        visible: bool,
    ) -> Option<ToplevelId> {
        let output = self.outputs.get(&id)?;
        for &container in &output.state.focus_stack {
            let Some(front) = self.container_front_toplevel(container) else {
                continue;
            };
            if self
                .toplevels
                .get(&front)
                .map(|t| t.is_unmanaged())
                .unwrap_or(true)
            {
                continue;
            }
            if visible && !self.container_is_visible(container) {
                continue;
            }
            return Some(front);
        }
        None
    }

    /// Refocus after e.g. returning from a session lock.
    pub fn output_focus_newest_focus_visible_toplevel(&mut self, id: OutputId) {
        match self.output_get_newest_focus_toplevel(id, true) {
            Some(toplevel) => self.focus_toplevel(Some(toplevel), false),
            None => {
                self.seat.pointer_focus = None;
                self.clear_keyboard_focus();
            }
        }
    }

    // ===================== tags operation =====================

    /// Switch to workspace `view`, resetting all tag bits.
    pub fn output_set_view_only(&mut self, id: OutputId, view: usize) {
        let Some(output) = self.outputs.get_mut(&id) else {
            return;
        };
        let view = view.min(MAX_WORKSPACE);
        output.state.active_tag = if view == 0 { 0 } else { 1 << (view - 1) };
        output.state.active_workspace = view;

        self.output_tiling_layout_update(id, 0);
        self.output_update_visible(id);
    }

    /// XOR one tag bit into the view; the active workspace stays.
    pub fn output_toggle_tag(&mut self, id: OutputId, idx: usize) {
        if idx == 0 || idx > MAX_WORKSPACE {
            return;
        }
        let Some(output) = self.outputs.get_mut(&id) else {
            return;
        };
        output.state.active_tag ^= 1 << (idx - 1);
        self.output_update_visible(id);
        self.output_tiling_layout_update(id, 0);
    }

    fn insert_tiled_containers_to_bsp_tree(&mut self, id: OutputId, view: usize) {
        let containers: Vec<ContainerId> = self
            .outputs
            .get(&id)
            .map(|o| o.state.containers.clone())
            .unwrap_or_default();
        for c in containers {
            if !self.container_is_visible_in_workspace(c, view)
                || self.container_is_floating(c)
                || self.containers.get(&c).and_then(|x| x.bsp_node).is_some()
            {
                continue;
            }
            self.bsp_insert_container(c, view);
            let disable = self
                .containers
                .get(&c)
                .map(|x| x.is_maximized() || x.is_fullscreen())
                .unwrap_or(false);
            if disable {
                if let Some(node) = self.containers.get(&c).and_then(|x| x.bsp_node) {
                    self.bsp_node_disable(node);
                }
            }
        }
    }

    fn restore_floating_box_for_all(&mut self, id: OutputId) {
        let containers: Vec<ContainerId> = self
            .outputs
            .get(&id)
            .map(|o| o.state.containers.clone())
            .unwrap_or_default();
        for c in containers {
            let allowed = self
                .containers
                .get(&c)
                .map(|x| x.is_configure_allowed())
                .unwrap_or(false);
            if self.container_is_floating(c) && self.container_is_visible(c) && allowed {
                self.container_restore_floating_box(c);
            }
        }
    }

    pub fn output_set_layout_mode(&mut self, id: OutputId, mode: LayoutMode) {
        let active = match self.outputs.get_mut(&id) {
            Some(output) => {
                let active = output.state.active_workspace;
                output.state.view_info[active].layout_mode = mode;
                active
            }
            None => return,
        };

        match mode {
            LayoutMode::Bsp => self.insert_tiled_containers_to_bsp_tree(id, active),
            LayoutMode::Floating => self.restore_floating_box_for_all(id),
            LayoutMode::Master => {}
        }

        self.output_tiling_layout_update(id, 0);
    }

    /// Advance the master strategy cursor through the registered list.
    pub fn output_set_strategy_idx(&mut self, id: OutputId, idx: i32) {
        let len = self.master_registry.len() as i64;
        if len == 0 {
            return;
        }
        let Some(output) = self.outputs.get_mut(&id) else {
            return;
        };
        let active = output.state.active_workspace;
        let info = &mut output.state.view_info[active];
        if info.layout_mode != LayoutMode::Master {
            return;
        }
        let cursor = info.master.strategy as i64;
        info.master.strategy = (cursor + idx as i64).rem_euclid(len) as usize;
        self.master_arrange_update(id);
    }

    pub fn output_set_useless_gaps(&mut self, id: OutputId, workspace: usize, gap_width: i32) {
        let Some(output) = self.outputs.get_mut(&id) else {
            return;
        };
        let workspace = if workspace == 0 {
            output.state.active_workspace
        } else {
            workspace
        };
        let workspace = clamp_i32(workspace as i32, 1, MAX_WORKSPACE as i32) as usize;
        output.state.view_info[workspace].useless_gaps = gap_width.max(0);
        self.output_tiling_layout_update(id, workspace);
    }

    pub fn output_set_mwfact(&mut self, id: OutputId, workspace: usize, factor: f64) {
        let Some(output) = self.outputs.get_mut(&id) else {
            return;
        };
        let workspace = if workspace == 0 {
            output.state.active_workspace
        } else {
            workspace
        };
        let workspace = clamp_i32(workspace as i32, 1, MAX_WORKSPACE as i32) as usize;
        output.state.view_info[workspace].master.mwfact = clamp_f64(factor, 0.1, 0.9);
        self.output_tiling_layout_update(id, workspace);
    }

    pub fn output_set_max_general_workspace(&mut self, id: OutputId, max: usize) {
        let Some(output) = self.outputs.get_mut(&id) else {
            return;
        };
        output.state.max_general_workspace =
            clamp_i32(max as i32, 1, MAX_WORKSPACE as i32) as usize;
    }

    pub fn output_tiling_layout_update_all_general_workspace(&mut self, id: OutputId) {
        let max = match self.outputs.get(&id) {
            Some(o) => o.state.max_general_workspace,
            None => return,
        };
        for workspace in 1..max {
            self.output_tiling_layout_update(id, workspace);
        }
    }

    // ===================== repaint =====================

    /// Resolve effective buffer opacities for a renderer commit. Children
    /// inherit their container's opacity, multiplied by the client's
    /// alpha-modifier multiplier on each buffer.
    pub fn output_repaint(&mut self, _id: OutputId) {
        let mut resolved: Vec<(crate::scene::NodeId, f32)> = Vec::new();
        let mut stack = vec![(self.scene.root(), 1.0f32)];
        while let Some((node, mut opacity)) = stack.pop() {
            let data = self.scene.get(node);
            if let crate::scene::SceneOwner::Container(c) = data.owner {
                if let Some(container) = self.containers.get(&c) {
                    opacity = container.opacity;
                }
            }
            match &data.kind {
                NodeKind::Tree => {
                    for &child in &data.children {
                        stack.push((child, opacity));
                    }
                }
                NodeKind::Buffer {
                    alpha_multiplier, ..
                } => {
                    resolved.push((node, opacity * alpha_multiplier));
                }
            }
        }
        for (node, opacity) in resolved {
            self.scene.set_buffer_opacity(node, opacity);
        }
    }
}
