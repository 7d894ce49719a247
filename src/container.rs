//! Container management.
//!
//! A container is the unit of tiling: one rectangle on screen holding one or
//! more toplevels stacked front-to-back (a tabbed group), decorated with a
//! border. The layout engines arrange containers, never toplevels.

use bitflags::bitflags;
use tracing::{debug, warn};

use crate::border::Border;
use crate::layout::LayoutMode;
use crate::output::OutputId;
use crate::scene::{NodeId, SceneOwner};
use crate::shell::ToplevelId;
use crate::signal::{SignalArg, SignalArgs};
use crate::utils::{clamp_f64, Rect};
use crate::{Server, MIN_WIDTH};

/// Handle to a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub(crate) u64);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ContainerState: u32 {
        const UNMANAGED = 1 << 0;
        /// Unset means tiled.
        const FLOATING = 1 << 1;
        const MINIMIZED = 1 << 2;
        const MAXIMIZED = 1 << 3;
        const FULLSCREEN = 1 << 4;
        const STICKY = 1 << 5;
    }
}

#[derive(Debug)]
pub struct Container {
    pub id: ContainerId,
    pub tree: NodeId,
    /// Popups and anything else that stays above the toplevels.
    pub popup_tree: NodeId,
    pub border: Border,
    pub width: i32,
    pub height: i32,

    /// Saved geometry, authoritative while the container is free.
    pub floating_box: Rect,
    pub state: ContainerState,

    pub output: OutputId,
    pub tag: u32,
    pub workspace: usize,
    pub bsp_node: Option<crate::layout::bsp::BspNodeId>,
    pub opacity: f32,

    /// Newest first. Scene order decides which one is in front.
    pub toplevels: Vec<ToplevelId>,
}

impl Container {
    pub fn is_unmanaged(&self) -> bool {
        self.state.contains(ContainerState::UNMANAGED)
    }

    pub fn is_minimized(&self) -> bool {
        self.state.contains(ContainerState::MINIMIZED)
    }

    pub fn is_maximized(&self) -> bool {
        self.state.contains(ContainerState::MAXIMIZED)
    }

    pub fn is_fullscreen(&self) -> bool {
        self.state.contains(ContainerState::FULLSCREEN)
    }

    pub fn is_sticky(&self) -> bool {
        self.state.contains(ContainerState::STICKY)
    }

    pub fn is_configure_allowed(&self) -> bool {
        !self.is_fullscreen() && !self.is_maximized()
    }
}

impl Server {
    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        self.containers.get(&id)
    }

    /// Container rectangle in layout coordinates.
    pub fn container_box(&self, id: ContainerId) -> Rect {
        let Some(c) = self.containers.get(&id) else {
            return Rect::default();
        };
        let node = self.scene.get(c.tree);
        Rect::new(node.x, node.y, c.width, c.height)
    }

    /// `state.Floating` set, or the whole workspace floats.
    pub fn container_is_floating(&self, id: ContainerId) -> bool {
        let Some(c) = self.containers.get(&id) else {
            return false;
        };
        if c.state.contains(ContainerState::FLOATING) {
            return true;
        }
        self.output_current_view_info(c.output)
            .map(|info| info.layout_mode == LayoutMode::Floating)
            .unwrap_or(false)
    }

    pub fn container_is_visible(&self, id: ContainerId) -> bool {
        let Some(c) = self.containers.get(&id) else {
            return false;
        };
        if c.is_sticky() {
            return true;
        }
        let Some(output) = self.outputs.get(&c.output) else {
            return false;
        };
        if output.state.active_workspace == 0
            || output.state.active_tag == 0
            || c.is_minimized()
        {
            return false;
        }
        output.state.active_workspace == c.workspace || (output.state.active_tag & c.tag) != 0
    }

    pub fn container_is_visible_in_workspace(&self, id: ContainerId, workspace: usize) -> bool {
        let Some(c) = self.containers.get(&id) else {
            return false;
        };
        let Some(output) = self.outputs.get(&c.output) else {
            return false;
        };
        if output.state.active_workspace == 0
            || output.state.active_tag == 0
            || c.is_minimized()
        {
            return false;
        }
        workspace == c.workspace
    }

    fn container_should_save_floating_box(&self, id: ContainerId) -> bool {
        let Some(c) = self.containers.get(&id) else {
            return false;
        };
        self.container_is_floating(id) && !c.is_fullscreen() && !c.is_maximized()
    }

    /// Toplevels of the container in scene order, front last.
    pub fn container_toplevels_bottom_to_top(&self, id: ContainerId) -> Vec<ToplevelId> {
        let Some(c) = self.containers.get(&id) else {
            return Vec::new();
        };
        self.scene
            .children(c.tree)
            .iter()
            .filter_map(|&node| self.scene.get(node).owner.toplevel())
            .collect()
    }

    pub fn container_front_toplevel(&self, id: ContainerId) -> Option<ToplevelId> {
        self.container_toplevels_bottom_to_top(id).last().copied()
    }

    // ===================== lifecycle =====================

    /// Create a container for a freshly mapped toplevel.
    pub fn container_create(&mut self, toplevel: ToplevelId, border_w: i32) -> ContainerId {
        let id = ContainerId(self.alloc_id());
        let tree = self.scene.create_tree(self.layers.toplevel, SceneOwner::Container(id));
        let popup_tree = self.scene.create_tree(tree, SceneOwner::Container(id));
        self.scene.set_position(popup_tree, border_w, border_w);
        self.scene.raise_to_top(popup_tree);

        let geom = self.toplevel_geometry(toplevel);
        let width = geom.width + border_w * 2;
        let height = geom.height + border_w * 2;

        let output = self
            .focused_output
            .or_else(|| self.output_order.first().copied())
            .unwrap_or(OutputId(0));
        let (mut tag, mut workspace) = self
            .outputs
            .get(&output)
            .map(|o| (o.state.active_tag, o.state.active_workspace))
            .unwrap_or((1, 1));
        // a zero tag would make the toplevel invisible
        if tag == 0 {
            tag = 1;
        }
        if workspace == 0 {
            workspace = 1;
        }

        let mut border = Border::new(
            self.config.border_color_normal.clone(),
            width,
            height,
            border_w,
            self.config.border_color_rotation_degree,
        );
        border.attach_to_scene(&mut self.scene, tree, id);

        let container = Container {
            id,
            tree,
            popup_tree,
            border,
            width,
            height,
            floating_box: Rect::new(0, 0, width, height),
            state: ContainerState::empty(),
            output,
            tag,
            workspace,
            bsp_node: None,
            opacity: 1.0,
            toplevels: Vec::new(),
        };
        self.containers.insert(id, container);
        self.container_order.insert(0, id);

        // toplevel initialization
        if let Some(t) = self.toplevels.get_mut(&toplevel) {
            t.container = Some(id);
        }
        self.containers.get_mut(&id).unwrap().toplevels.insert(0, toplevel);
        self.toplevel_init_surf_tree(toplevel, id);
        if let Some(surf_tree) = self.toplevels.get(&toplevel).and_then(|t| t.surf_tree) {
            self.scene.set_position(surf_tree, border_w, border_w);
        }

        let unmanaged = self
            .toplevels
            .get(&toplevel)
            .map(|t| t.is_unmanaged())
            .unwrap_or(false);
        if unmanaged {
            self.containers.get_mut(&id).unwrap().state |= ContainerState::UNMANAGED;
        } else {
            if let Some(o) = self.outputs.get_mut(&output) {
                o.state.containers.insert(0, id);
                o.state.focus_stack.insert(0, id);
            }
            self.decide_should_tiled(toplevel, id);
        }

        debug!("created container for toplevel {:?}: {:?}", toplevel, id);
        self.emit_signal("container::new", SignalArgs::one(SignalArg::Toplevel(toplevel)));
        id
    }

    fn decide_should_tiled(&mut self, toplevel: ToplevelId, container: ContainerId) {
        let requested = self
            .toplevels
            .get(&toplevel)
            .map(|t| t.requested)
            .unwrap_or_default();

        if requested.fullscreen {
            self.container_set_fullscreen(container, true);
            return;
        }
        if requested.maximized {
            self.container_set_maximized(container, true);
            return;
        }
        if requested.minimized {
            self.container_set_minimized(container, true);
            return;
        }
        if self.toplevel_should_float(toplevel) {
            self.container_set_floating(container, true);
            self.container_to_center(container);
            return;
        }

        let (output, workspace) = match self.containers.get(&container) {
            Some(c) => (c.output, c.workspace),
            None => return,
        };
        let mode = self
            .outputs
            .get(&output)
            .map(|o| o.state.view_info[workspace].layout_mode)
            .unwrap_or(LayoutMode::Floating);
        match mode {
            LayoutMode::Floating => return,
            LayoutMode::Master => self.master_arrange_update(output),
            LayoutMode::Bsp => self.bsp_insert_container(container, workspace),
        }

        if let Some(c) = self.containers.get_mut(&container) {
            c.state &= !ContainerState::FLOATING;
        }
    }

    /// Insert a toplevel into an existing container. Unmanaged containers or
    /// toplevels are not accepted.
    pub fn container_insert_toplevel(&mut self, container: ContainerId, toplevel: ToplevelId) {
        let container_unmanaged = self
            .containers
            .get(&container)
            .map(|c| c.is_unmanaged())
            .unwrap_or(true);
        let toplevel_unmanaged = self
            .toplevels
            .get(&toplevel)
            .map(|t| t.is_unmanaged())
            .unwrap_or(true);
        if container_unmanaged || toplevel_unmanaged {
            return;
        }

        if let Some(t) = self.toplevels.get_mut(&toplevel) {
            t.container = Some(container);
        }
        self.containers
            .get_mut(&container)
            .unwrap()
            .toplevels
            .insert(0, toplevel);

        let (tree, popup_tree) = {
            let c = &self.containers[&container];
            (c.tree, c.popup_tree)
        };
        match self.toplevels.get(&toplevel).and_then(|t| t.surf_tree) {
            None => self.toplevel_init_surf_tree(toplevel, container),
            Some(surf_tree) => {
                self.scene.reparent(surf_tree, tree);
                self.scene.place_below(surf_tree, popup_tree);
            }
        }

        let bw = self.containers[&container].border.thickness();
        if let Some(surf_tree) = self.toplevels.get(&toplevel).and_then(|t| t.surf_tree) {
            self.scene.set_position(surf_tree, bw, bw);
        }

        let (w, h) = {
            let c = &self.containers[&container];
            (c.width, c.height)
        };
        self.container_set_size(container, w, h);
        self.emit_signal(
            "container::insert",
            SignalArgs::one(SignalArg::Container(container)),
        );
    }

    fn container_destroy(&mut self, id: ContainerId) {
        if self.insert_marked == Some(id) {
            self.insert_marked = None;
        }

        let Some(c) = self.containers.get(&id) else {
            return;
        };
        let output = c.output;
        let workspace = c.workspace;
        let unmanaged = c.is_unmanaged();
        let tree = c.tree;
        let popup_tree = c.popup_tree;
        let has_bsp = c.bsp_node.is_some();

        if !unmanaged {
            if let Some(o) = self.outputs.get_mut(&output) {
                o.state.containers.retain(|&x| x != id);
                o.state.focus_stack.retain(|&x| x != id);
            }
        }

        if has_bsp {
            self.bsp_remove_container(id);
        }

        let is_master = self
            .outputs
            .get(&output)
            .map(|o| o.state.view_info[workspace].layout_mode == LayoutMode::Master)
            .unwrap_or(false);
        if is_master {
            self.output_tiling_layout_update(output, workspace);
        }

        if let Some(o) = self.outputs.get_mut(&output) {
            o.state.minimized.retain(|&x| x != id);
        }

        self.emit_signal(
            "container::destroy",
            SignalArgs::one(SignalArg::Container(id)),
        );

        let mut c = self.containers.remove(&id).unwrap();
        c.border.destroy(&mut self.scene);
        self.scene.destroy(popup_tree);
        self.scene.destroy(tree);
        self.container_order.retain(|&x| x != id);
    }

    fn clear_container_stuff_in_toplevel(&mut self, toplevel: ToplevelId) {
        let Some(container) = self.toplevels.get(&toplevel).and_then(|t| t.container) else {
            return;
        };
        self.emit_signal(
            "container::remove",
            SignalArgs::one(SignalArg::Container(container)),
        );

        // park the surface tree; a reinsert will pull it back
        if let Some(surf_tree) = self.toplevels.get(&toplevel).and_then(|t| t.surf_tree) {
            self.scene.reparent(surf_tree, self.layers.bottom);
        }

        self.container_refresh(container);

        if let Some(c) = self.containers.get_mut(&container) {
            c.toplevels.retain(|&t| t != toplevel);
        }
        if let Some(t) = self.toplevels.get_mut(&toplevel) {
            t.container = None;
        }
    }

    /// Remove a toplevel; destroys the container when it becomes empty.
    pub fn container_remove_toplevel(&mut self, toplevel: ToplevelId) {
        let Some(container) = self.toplevels.get(&toplevel).and_then(|t| t.container) else {
            return;
        };
        self.clear_container_stuff_in_toplevel(toplevel);
        let empty = self
            .containers
            .get(&container)
            .map(|c| c.toplevels.is_empty())
            .unwrap_or(false);
        if empty {
            self.container_destroy(container);
        }
    }

    /// Non-destroying removal variant, used while swapping populations.
    pub fn container_remove_toplevel_keep_empty(&mut self, toplevel: ToplevelId) {
        self.clear_container_stuff_in_toplevel(toplevel);
    }

    // ===================== stacking =====================

    /// Promote a toplevel above its siblings and suspend the rest.
    /// Idempotent.
    pub fn container_set_front_toplevel(&mut self, toplevel: ToplevelId) {
        let Some(container) = self.toplevels.get(&toplevel).and_then(|t| t.container) else {
            return;
        };
        if let Some(surf_tree) = self.toplevels.get(&toplevel).and_then(|t| t.surf_tree) {
            self.scene.set_enabled(surf_tree, true);
        }
        self.toplevel_client_set_minimized(toplevel, false);

        let (w, h, popup_tree) = {
            let c = &self.containers[&container];
            (c.width, c.height, c.popup_tree)
        };
        self.container_set_size(container, w, h);
        if let Some(surf_tree) = self.toplevels.get(&toplevel).and_then(|t| t.surf_tree) {
            self.scene.place_below(surf_tree, popup_tree);
        }

        let siblings: Vec<ToplevelId> = self.containers[&container]
            .toplevels
            .iter()
            .copied()
            .filter(|&t| t != toplevel)
            .collect();
        for sibling in siblings {
            if let Some(surf_tree) = self.toplevels.get(&sibling).and_then(|t| t.surf_tree) {
                self.scene.set_enabled(surf_tree, false);
            }
            self.toplevel_client_set_minimized(sibling, true);
        }
    }

    /// Re-assert the current front toplevel.
    pub fn container_refresh(&mut self, id: ContainerId) {
        if let Some(front) = self.container_front_toplevel(id) {
            self.container_set_front_toplevel(front);
        }
    }

    /// Cyclically advance the front toplevel by `idx` and focus it.
    pub fn container_focusidx(&mut self, id: ContainerId, idx: i32) {
        if idx == 0 {
            return;
        }
        let stack = self.container_toplevels_bottom_to_top(id);
        if stack.len() < 2 {
            return;
        }
        let front = stack.len() as i32 - 1;
        let target = stack[(front + idx).rem_euclid(stack.len() as i32) as usize];
        self.container_set_front_toplevel(target);
        self.focus_toplevel(Some(target), false);
    }

    /// Exchange the toplevel populations of two containers, keeping each
    /// container's identity, geometry and workspace.
    pub fn container_swap(&mut self, source: ContainerId, target: ContainerId) {
        if source == target {
            return;
        }
        let source_front = self.container_front_toplevel(source);
        let target_front = self.container_front_toplevel(target);

        let source_toplevels: Vec<ToplevelId> = self
            .containers
            .get(&source)
            .map(|c| c.toplevels.clone())
            .unwrap_or_default();
        let target_toplevels: Vec<ToplevelId> = self
            .containers
            .get(&target)
            .map(|c| c.toplevels.clone())
            .unwrap_or_default();

        for &t in &source_toplevels {
            self.container_remove_toplevel_keep_empty(t);
        }
        for &t in &target_toplevels {
            self.container_remove_toplevel_keep_empty(t);
        }
        for &t in &source_toplevels {
            self.container_insert_toplevel(target, t);
        }
        for &t in &target_toplevels {
            self.container_insert_toplevel(source, t);
        }

        if let Some(front) = source_front {
            self.container_set_front_toplevel(front);
        }
        if let Some(front) = target_front {
            self.container_set_front_toplevel(front);
        }

        self.emit_signal(
            "container::swap",
            SignalArgs(vec![
                SignalArg::Container(source),
                SignalArg::Container(target),
            ]),
        );
    }

    pub fn container_raise(&mut self, id: ContainerId) {
        let Some(c) = self.containers.get(&id) else {
            return;
        };
        self.scene.raise_to_top(c.tree);
        if let Some(front) = self.container_front_toplevel(id) {
            self.emit_signal_simple("client::raised", SignalArg::Toplevel(front));
        }
    }

    pub fn container_lower(&mut self, id: ContainerId) {
        let Some(c) = self.containers.get(&id) else {
            return;
        };
        self.scene.lower_to_bottom(c.tree);
        if let Some(front) = self.container_front_toplevel(id) {
            self.emit_signal_simple("client::lowered", SignalArg::Toplevel(front));
        }
    }

    /// Show or hide the whole container subtree.
    pub fn container_set_enabled(&mut self, id: ContainerId, set: bool) {
        let Some(c) = self.containers.get(&id) else {
            return;
        };
        self.scene.set_enabled(c.tree, set);
        if set {
            self.container_refresh(id);
        } else {
            let toplevels = self.containers[&id].toplevels.clone();
            for t in toplevels {
                self.toplevel_client_set_minimized(t, false);
            }
        }
    }

    // ===================== geometry =====================

    pub fn container_set_size(&mut self, id: ContainerId, w: i32, h: i32) {
        let Some(c) = self.containers.get(&id) else {
            return;
        };
        let output = c.output;
        let bw = c.border.thickness();
        let gaps = self.output_current_gaps(output);
        let outside_width = (bw + gaps) * 2;

        let surface_w = (w - outside_width).max(MIN_WIDTH);
        let surface_h = (h - outside_width).max(MIN_WIDTH);

        let mut rect_w = surface_w;
        let mut rect_h = surface_h;
        for t in self.container_toplevels_bottom_to_top(id) {
            let (tw, th) = self.toplevel_apply_size_and_clip(t, rect_w, rect_h);
            rect_w = tw;
            rect_h = th;
        }

        let save = self.container_should_save_floating_box(id);
        let c = self.containers.get_mut(&id).unwrap();
        c.border
            .resize(&mut self.scene, rect_w + bw * 2, rect_h + bw * 2, id);
        if save {
            c.floating_box.width = w;
            c.floating_box.height = h;
        }
        c.width = w;
        c.height = h;
    }

    pub fn container_set_position(&mut self, id: ContainerId, x: i32, y: i32) {
        let Some(c) = self.containers.get(&id) else {
            return;
        };
        self.scene.set_position(c.tree, x, y);

        let toplevels = self.containers[&id].toplevels.clone();
        for t in toplevels {
            self.toplevel_sync_legacy_position(t);
        }

        if self.container_should_save_floating_box(id) {
            let c = self.containers.get_mut(&id).unwrap();
            c.floating_box.x = x;
            c.floating_box.y = y;
        }
    }

    /// Position offset by the workspace gap width.
    pub fn container_set_position_gap(&mut self, id: ContainerId, x: i32, y: i32) {
        let gaps = self
            .containers
            .get(&id)
            .map(|c| self.output_current_gaps(c.output))
            .unwrap_or(0);
        self.container_set_position(id, x + gaps, y + gaps);
    }

    pub fn container_restore_floating_box(&mut self, id: ContainerId) {
        let Some(float_box) = self.containers.get(&id).map(|c| c.floating_box) else {
            return;
        };
        self.container_set_position(id, float_box.x, float_box.y);
        self.container_set_size(id, float_box.width, float_box.height);
    }

    /// Corrected set_geometry: position then the box dimensions.
    pub fn container_set_geometry(&mut self, id: ContainerId, geometry: Rect) {
        self.container_set_position(id, geometry.x, geometry.y);
        self.container_set_size(id, geometry.width, geometry.height);
    }

    pub fn container_to_center(&mut self, id: ContainerId) {
        let Some(c) = self.containers.get(&id) else {
            return;
        };
        if !c.is_configure_allowed() {
            return;
        }
        let Some(usable_area) = self.outputs.get(&c.output).map(|o| o.usable_area) else {
            return;
        };
        let mut x = usable_area.width / 2 - c.width / 2;
        let mut y = usable_area.height / 2 - c.height / 2;
        x = x.max(usable_area.x);
        y = y.max(usable_area.y);
        self.container_set_position(id, x, y);
    }

    // ===================== state machine =====================

    pub fn container_set_floating(&mut self, id: ContainerId, set: bool) {
        let Some(c) = self.containers.get(&id) else {
            return;
        };
        // don't change the floating state when maximized or fullscreen, the
        // behavior is confusing
        if !c.is_configure_allowed() {
            return;
        }
        let output = c.output;
        let workspace = c.workspace;
        let bsp_node = c.bsp_node;

        if set {
            self.container_restore_floating_box(id);
            if let Some(node) = bsp_node {
                self.bsp_node_disable(node);
            }
            self.containers.get_mut(&id).unwrap().state |= ContainerState::FLOATING;
            self.output_tiling_layout_update(output, workspace);
        } else if self.container_is_floating(id) {
            self.containers.get_mut(&id).unwrap().state &= !ContainerState::FLOATING;
            if let Some(node) = bsp_node {
                self.bsp_node_enable(node);
            } else if self.output_is_current_layout_bsp(output) {
                self.bsp_insert_container(id, workspace);
            }
            self.output_tiling_layout_update(output, workspace);
        }

        self.emit_property_signal("floating", id);
    }

    pub fn container_set_sticky(&mut self, id: ContainerId, set: bool) {
        let Some(c) = self.containers.get_mut(&id) else {
            return;
        };
        if set {
            c.state |= ContainerState::STICKY;
            return;
        }
        c.state &= !ContainerState::STICKY;
        let output = c.output;
        self.output_update_visible(output);
    }

    pub fn container_set_fullscreen(&mut self, id: ContainerId, set: bool) {
        let Some(c) = self.containers.get(&id) else {
            return;
        };
        let output = c.output;
        let bsp_node = c.bsp_node;

        if set {
            // set first so set_size doesn't record the fullscreen dimension
            // as the floating box
            let c = self.containers.get_mut(&id).unwrap();
            c.state |= ContainerState::FULLSCREEN;
            c.state &= !ContainerState::MAXIMIZED;
            if let Some(node) = bsp_node {
                self.bsp_node_disable(node);
            }
        } else {
            // clear first so the bsp node is allowed to configure again
            self.containers.get_mut(&id).unwrap().state &= !ContainerState::FULLSCREEN;
            if self.container_is_floating(id) {
                self.container_restore_floating_box(id);
            } else if let Some(node) = bsp_node {
                self.bsp_node_enable(node);
            }
        }

        let output_size = self
            .outputs
            .get(&output)
            .map(|o| (o.width, o.height))
            .unwrap_or((0, 0));
        let toplevels = self.containers[&id].toplevels.clone();
        for t in toplevels {
            if set {
                self.toplevel_set_size_surface(t, output_size.0, output_size.1);
                self.toplevel_set_position(t, 0, 0);
                self.toplevel_set_clip(t, None);
            }
            self.toplevel_client_set_fullscreen(t, set);
        }

        let (w, h) = {
            let c = self.containers.get_mut(&id).unwrap();
            c.border.set_enabled(&mut self.scene, !set);
            (c.width, c.height)
        };
        let c = self.containers.get_mut(&id).unwrap();
        c.border.resize(&mut self.scene, w, h, id);
        self.master_arrange_update(output);

        self.emit_property_signal("fullscreen", id);
    }

    pub fn container_set_maximized(&mut self, id: ContainerId, set: bool) {
        let Some(c) = self.containers.get(&id) else {
            return;
        };
        let output = c.output;
        let bsp_node = c.bsp_node;

        if set {
            let c = self.containers.get_mut(&id).unwrap();
            c.state |= ContainerState::MAXIMIZED;
            c.state &= !ContainerState::FULLSCREEN;
            if let Some(node) = bsp_node {
                self.bsp_node_disable(node);
            }
        } else {
            self.containers.get_mut(&id).unwrap().state &= !ContainerState::MAXIMIZED;
            if self.container_is_floating(id) {
                self.container_restore_floating_box(id);
            } else if let Some(node) = bsp_node {
                self.bsp_node_enable(node);
            }
        }

        let usable_area = self
            .outputs
            .get(&output)
            .map(|o| o.usable_area)
            .unwrap_or_default();
        let toplevels = self.containers[&id].toplevels.clone();
        for t in toplevels {
            self.toplevel_client_set_maximized(t, set);
            if set {
                self.toplevel_set_size_surface(t, usable_area.width, usable_area.height);
                self.toplevel_set_position(t, usable_area.x, usable_area.y);
                self.toplevel_set_clip(t, None);
            }
        }

        let (w, h) = {
            let c = self.containers.get_mut(&id).unwrap();
            c.border.set_enabled(&mut self.scene, !set);
            (c.width, c.height)
        };
        let c = self.containers.get_mut(&id).unwrap();
        c.border.resize(&mut self.scene, w, h, id);
        self.master_arrange_update(output);

        self.emit_property_signal("maximized", id);
    }

    pub fn container_set_minimized(&mut self, id: ContainerId, set: bool) {
        let Some(c) = self.containers.get(&id) else {
            return;
        };
        let output = c.output;
        let bsp_node = c.bsp_node;
        self.scene.set_enabled(c.tree, !set);

        if set {
            if let Some(o) = self.outputs.get_mut(&output) {
                o.state.minimized.insert(0, id);
            }
            if let Some(node) = bsp_node {
                self.bsp_node_disable(node);
            }
            self.containers.get_mut(&id).unwrap().state |= ContainerState::MINIMIZED;
            self.output_focus_newest_focus_visible_toplevel(output);
        } else {
            self.containers.get_mut(&id).unwrap().state &= !ContainerState::MINIMIZED;
            if let Some(o) = self.outputs.get_mut(&output) {
                o.state.minimized.retain(|&x| x != id);
            }
            if let Some(node) = bsp_node {
                self.bsp_node_enable(node);
            }
            // a minimized window returns "here, now", not to where it was
            if let Some((tag, workspace)) = self
                .outputs
                .get(&output)
                .map(|o| (o.state.active_tag, o.state.active_workspace))
            {
                let c = self.containers.get_mut(&id).unwrap();
                c.tag = tag;
                c.workspace = workspace;
            }
        }

        let toplevels = self.containers[&id].toplevels.clone();
        for t in toplevels {
            self.toplevel_client_set_minimized(t, set);
        }

        self.master_arrange_update(output);
        self.emit_property_signal("minimized", id);
    }

    /// Re-home the container onto workspace `tagidx`.
    pub fn container_move_to_tag(&mut self, id: ContainerId, tagidx: usize) {
        if tagidx == 0 || tagidx > crate::MAX_WORKSPACE {
            return;
        }
        let Some(c) = self.containers.get(&id) else {
            return;
        };
        if c.workspace == tagidx && c.tag == 1 << (tagidx - 1) {
            return;
        }
        let output = c.output;
        if c.bsp_node.is_some() {
            self.bsp_remove_container(id);
        }

        let c = self.containers.get_mut(&id).unwrap();
        c.tag = 1 << (tagidx - 1);
        c.workspace = tagidx;

        let is_bsp = self
            .outputs
            .get(&output)
            .map(|o| o.state.view_info[tagidx].layout_mode == LayoutMode::Bsp)
            .unwrap_or(false);
        if is_bsp {
            self.bsp_insert_container(id, tagidx);
        }

        self.output_tiling_layout_update(output, tagidx);
        self.output_update_visible(output);
    }

    pub fn container_set_opacity(&mut self, id: ContainerId, opacity: f32) {
        let Some(c) = self.containers.get_mut(&id) else {
            return;
        };
        c.opacity = clamp_f64(opacity as f64, 0.0, 1.0) as f32;
    }

    fn emit_property_signal(&mut self, property: &str, container: ContainerId) {
        let name = format!("client::property::{property}");
        match self.container_front_toplevel(container) {
            Some(front) => self.emit_signal(&name, SignalArgs::one(SignalArg::Toplevel(front))),
            None => {
                warn!("property signal {name} for container without toplevel");
                self.emit_signal(&name, SignalArgs::none());
            }
        }
    }
}
