//! Toplevel lifecycle and actions.
//!
//! A toplevel is one client window, native or legacy-X11, discriminated by
//! [`ToplevelKind`]. Semantic operations forward to its container; what is
//! left here is the protocol lifecycle (new → map → unmap → destroy), the
//! client-facing forwards, and popup plumbing.

use tracing::debug;

use crate::container::ContainerId;
use crate::scene::{NodeId, SceneOwner};
use crate::shell::{DecorationMode, Edges, PopupId, ShellRequest, ToplevelDesc, ToplevelId};
use crate::signal::{SignalArg, SignalArgs};
use crate::utils::Rect;
use crate::Server;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToplevelKind {
    Native,
    Legacy {
        override_redirect: bool,
        modal: bool,
    },
}

/// Client intent; the compositor decides the actual state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestedState {
    pub fullscreen: bool,
    pub maximized: bool,
    pub minimized: bool,
}

#[derive(Debug)]
pub struct Toplevel {
    pub id: ToplevelId,
    pub kind: ToplevelKind,
    pub app_id: String,
    pub title: String,

    pub container: Option<ContainerId>,
    pub mapped: bool,

    pub surf_tree: Option<NodeId>,
    pub surface_buffer: Option<NodeId>,

    /// Client geometry box: visible extent plus shadow offset.
    pub geometry: Rect,
    /// Committed surface extent.
    pub surface_size: (i32, i32),
    pub clip: Option<Rect>,

    pub requested: RequestedState,
    pub parent: Option<ToplevelId>,
    pub min_size: (i32, i32),
    pub max_size: (i32, i32),
    pub decoration: Option<DecorationMode>,
    pub resizing: bool,
    pub initial_commit_done: bool,

    /// Size configures sent to this client.
    pub configures: u32,
}

impl Toplevel {
    pub fn is_legacy(&self) -> bool {
        matches!(self.kind, ToplevelKind::Legacy { .. })
    }

    /// Override-redirect legacy surfaces bypass management entirely.
    pub fn is_unmanaged(&self) -> bool {
        matches!(
            self.kind,
            ToplevelKind::Legacy {
                override_redirect: true,
                ..
            }
        )
    }
}

/// What an XDG popup hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupParent {
    Toplevel(ToplevelId),
    Layer(crate::shell::LayerId),
    Popup(PopupId),
}

#[derive(Debug)]
pub struct Popup {
    pub id: PopupId,
    pub parent: PopupParent,
    pub scene_tree: Option<NodeId>,
}

/// Movement directions for the focus queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Server {
    pub fn toplevel(&self, id: ToplevelId) -> Option<&Toplevel> {
        self.toplevels.get(&id)
    }

    // ===================== lifecycle =====================

    /// A client created a toplevel resource; it is usable after map.
    pub fn handle_new_toplevel(&mut self, desc: ToplevelDesc) -> ToplevelId {
        let id = ToplevelId(self.alloc_id());
        let toplevel = Toplevel {
            id,
            kind: desc.kind,
            app_id: desc.app_id,
            title: desc.title,
            container: None,
            mapped: false,
            surf_tree: None,
            surface_buffer: None,
            geometry: Rect::default(),
            surface_size: (0, 0),
            clip: None,
            requested: RequestedState::default(),
            parent: desc.parent,
            min_size: desc.min_size,
            max_size: desc.max_size,
            decoration: None,
            resizing: false,
            initial_commit_done: false,
            configures: 0,
        };
        debug!("new toplevel ({}): {:?}", toplevel.title, id);
        self.toplevels.insert(id, toplevel);
        self.toplevel_order.insert(0, id);
        self.emit_signal_simple("client::new", SignalArg::Toplevel(id));
        id
    }

    /// First commit: advertise capabilities with a zero-sized configure so
    /// the client picks its own size.
    pub fn handle_toplevel_initial_commit(&mut self, id: ToplevelId) {
        let Some(t) = self.toplevels.get_mut(&id) else {
            return;
        };
        if t.initial_commit_done {
            return;
        }
        t.initial_commit_done = true;
        let has_decoration = t.decoration.is_some();
        self.push_request(ShellRequest::Configure {
            toplevel: id,
            width: 0,
            height: 0,
        });
        if has_decoration {
            self.push_request(ShellRequest::SetDecorationMode {
                toplevel: id,
                server_side: true,
            });
        }
    }

    pub fn handle_toplevel_map(&mut self, id: ToplevelId) {
        let Some(t) = self.toplevels.get_mut(&id) else {
            return;
        };
        t.mapped = true;
        let unmanaged = t.is_unmanaged();
        debug!("mapping toplevel ({}): {:?}", t.title, id);

        if !unmanaged {
            if let Some(output) = self.focused_output {
                if let Some(o) = self.outputs.get_mut(&output) {
                    o.state.toplevels.insert(0, id);
                }
            }
            self.toplevel_set_tiled(id, Edges::ALL);
        }

        let marked = self
            .insert_marked
            .filter(|m| self.containers.contains_key(m));
        if let (Some(marked), false) = (marked, unmanaged) {
            self.container_insert_toplevel(marked, id);
        } else {
            let border_w = if unmanaged {
                0
            } else {
                self.config.border_width
            };
            self.container_create(id, border_w);
        }

        self.emit_signal_simple("client::map", SignalArg::Toplevel(id));
    }

    pub fn handle_toplevel_unmap(&mut self, id: ToplevelId) {
        let Some(t) = self.toplevels.get(&id) else {
            return;
        };
        debug!("unmapping toplevel ({}): {:?}", t.title, id);

        // the grab must not outlive the grabbed toplevel
        if self.seat.cursor.grabbed_toplevel == Some(id) {
            self.stop_interactive();
        }

        if !self.toplevels[&id].is_unmanaged() {
            let outputs: Vec<_> = self.output_order.clone();
            for output in outputs {
                if let Some(o) = self.outputs.get_mut(&output) {
                    o.state.toplevels.retain(|&t| t != id);
                }
            }
        }

        self.toplevels.get_mut(&id).unwrap().mapped = false;
        self.emit_signal_simple("client::unmap", SignalArg::Toplevel(id));

        // container state backs most client properties, clear it last
        self.container_remove_toplevel(id);
    }

    pub fn handle_toplevel_destroy(&mut self, id: ToplevelId) {
        let Some(t) = self.toplevels.get(&id) else {
            return;
        };
        debug!("destroying toplevel ({}): {:?}", t.title, id);
        self.emit_signal_simple("client::destroy", SignalArg::Toplevel(id));

        if self.toplevels[&id].container.is_some() {
            self.container_remove_toplevel(id);
        }
        if let Some(surf_tree) = self.toplevels[&id].surf_tree {
            self.scene.destroy(surf_tree);
        }
        self.toplevels.remove(&id);
        self.toplevel_order.retain(|&t| t != id);
    }

    /// Post-initial commit: new geometry arrived.
    pub fn handle_toplevel_commit(&mut self, id: ToplevelId, geometry: Rect) {
        let Some(t) = self.toplevels.get_mut(&id) else {
            return;
        };
        t.geometry = geometry;
        t.surface_size = (geometry.width, geometry.height);
        if t.clip.is_none() {
            if let Some(buffer) = t.surface_buffer {
                self.scene.set_buffer_size(buffer, geometry.width, geometry.height);
            }
        }

        let t = &self.toplevels[&id];
        if t.container.is_none() || t.resizing || !t.mapped {
            return;
        }
        if !self.toplevel_is_floating(id) {
            return;
        }
        let container = t.container.unwrap();
        if self.container_front_toplevel(container) != Some(id) {
            return;
        }

        // track the client-chosen size while floating
        self.toplevel_set_clip(id, Some(geometry));
        let thickness = self.containers[&container].border.thickness();
        let c = self.containers.get_mut(&container).unwrap();
        c.border.resize(
            &mut self.scene,
            geometry.width + thickness * 2,
            geometry.height + thickness * 2,
            container,
        );
    }

    // ===================== client requests =====================

    pub fn handle_toplevel_request_fullscreen(&mut self, id: ToplevelId, set: bool) {
        let Some(t) = self.toplevels.get_mut(&id) else {
            return;
        };
        t.requested.fullscreen = set;
        if !t.mapped {
            return;
        }
        self.toplevel_set_fullscreen(id, set);
    }

    pub fn handle_toplevel_request_maximize(&mut self, id: ToplevelId, set: bool) {
        let Some(t) = self.toplevels.get_mut(&id) else {
            return;
        };
        t.requested.maximized = set;
        if !t.mapped {
            return;
        }
        self.toplevel_set_maximized(id, set);
    }

    /// Internal state still updates and `client::property::minimized` fires;
    /// only the legacy client-side notification is withheld.
    pub fn handle_toplevel_request_minimize(&mut self, id: ToplevelId, set: bool) {
        let Some(t) = self.toplevels.get_mut(&id) else {
            return;
        };
        t.requested.minimized = set;
        if !t.mapped {
            return;
        }
        self.toplevel_set_minimized(id, set);
    }

    pub fn handle_toplevel_request_move(&mut self, id: ToplevelId) {
        self.focus_toplevel(Some(id), true);
        self.start_interactive_move(Some(id));
    }

    pub fn handle_toplevel_request_resize(&mut self, id: ToplevelId, edges: Edges) {
        self.focus_toplevel(Some(id), true);
        self.start_interactive_resize(Some(id), edges);
    }

    pub fn handle_toplevel_set_title(&mut self, id: ToplevelId, title: String) {
        if let Some(t) = self.toplevels.get_mut(&id) {
            t.title = title;
        }
    }

    pub fn handle_toplevel_set_app_id(&mut self, id: ToplevelId, app_id: String) {
        if let Some(t) = self.toplevels.get_mut(&id) {
            t.app_id = app_id;
        }
    }

    /// Decoration negotiation always lands on server-side.
    pub fn handle_decoration_request_mode(&mut self, id: ToplevelId) {
        let Some(t) = self.toplevels.get_mut(&id) else {
            return;
        };
        t.decoration = Some(DecorationMode::ServerSide);
        if t.initial_commit_done {
            self.push_request(ShellRequest::SetDecorationMode {
                toplevel: id,
                server_side: true,
            });
        }
    }

    // ===================== scene plumbing =====================

    pub(crate) fn toplevel_init_surf_tree(&mut self, id: ToplevelId, container: ContainerId) {
        let Some(c) = self.containers.get(&container) else {
            return;
        };
        let tree_parent = c.tree;
        let popup_tree = c.popup_tree;
        let is_legacy = self.toplevels.get(&id).map(|t| t.is_legacy()).unwrap_or(false);
        let owner = if is_legacy {
            SceneOwner::Xwayland(id)
        } else {
            SceneOwner::XdgShell(id)
        };

        let surf_tree = self.scene.create_tree(tree_parent, owner);
        let (w, h) = self
            .toplevels
            .get(&id)
            .map(|t| t.surface_size)
            .unwrap_or((0, 0));
        let buffer = self.scene.create_buffer(surf_tree, w, h, owner);
        self.scene.place_below(surf_tree, popup_tree);

        if let Some(t) = self.toplevels.get_mut(&id) {
            t.surf_tree = Some(surf_tree);
            t.surface_buffer = Some(buffer);
        }
    }

    pub fn toplevel_geometry(&self, id: ToplevelId) -> Rect {
        self.toplevels
            .get(&id)
            .map(|t| t.geometry)
            .unwrap_or_default()
    }

    /// Geometry box positioned in layout coordinates.
    pub fn toplevel_box(&self, id: ToplevelId) -> Rect {
        let mut geometry = self.toplevel_geometry(id);
        if let Some(surf_tree) = self.toplevels.get(&id).and_then(|t| t.surf_tree) {
            let (x, y) = self.scene.coords(surf_tree);
            geometry.x = x;
            geometry.y = y;
        }
        geometry
    }

    pub(crate) fn toplevel_set_clip(&mut self, id: ToplevelId, clip: Option<Rect>) {
        let Some(t) = self.toplevels.get_mut(&id) else {
            return;
        };
        t.clip = clip;
        let (w, h) = match clip {
            Some(c) => (c.width, c.height),
            None => t.surface_size,
        };
        if let Some(buffer) = t.surface_buffer {
            self.scene.set_buffer_size(buffer, w.max(0), h.max(0));
        }
    }

    // ===================== client forwards =====================

    /// Ask the client surface to resize itself.
    pub fn toplevel_set_size(&mut self, id: ToplevelId, w: i32, h: i32) {
        let is_legacy = match self.toplevels.get_mut(&id) {
            Some(t) => {
                t.configures += 1;
                t.is_legacy()
            }
            None => return,
        };
        if is_legacy {
            let rect = self.toplevel_box(id);
            self.push_request(ShellRequest::LegacyConfigure {
                toplevel: id,
                x: rect.x,
                y: rect.y,
                width: w,
                height: h,
            });
        } else {
            self.push_request(ShellRequest::Configure {
                toplevel: id,
                width: w,
                height: h,
            });
        }
    }

    /// Resize so the surface itself ends up `w`×`h` inside border and gaps.
    pub fn toplevel_set_size_surface(&mut self, id: ToplevelId, w: i32, h: i32) {
        let Some(container) = self.toplevels.get(&id).and_then(|t| t.container) else {
            return;
        };
        let gaps = self
            .containers
            .get(&container)
            .map(|c| self.output_current_gaps(c.output))
            .unwrap_or(0);
        let bw = self
            .containers
            .get(&container)
            .map(|c| c.border.thickness())
            .unwrap_or(0);
        let outside_width = (bw + gaps) * 2;
        self.container_set_size(container, w + outside_width, h + outside_width);
    }

    /// Move so the surface lands at `x`/`y`; the container origin is offset
    /// by the border.
    pub fn toplevel_set_position(&mut self, id: ToplevelId, x: i32, y: i32) {
        let Some(container) = self.toplevels.get(&id).and_then(|t| t.container) else {
            return;
        };
        let bw = self
            .containers
            .get(&container)
            .map(|c| c.border.thickness())
            .unwrap_or(0);
        self.container_set_position(container, x - bw, y - bw);
    }

    pub(crate) fn toplevel_apply_size_and_clip(
        &mut self,
        id: ToplevelId,
        w: i32,
        h: i32,
    ) -> (i32, i32) {
        let Some(t) = self.toplevels.get(&id) else {
            return (w, h);
        };
        let geometry = t.geometry;
        let is_legacy = t.is_legacy();
        let min_size = t.min_size;

        let mut surf_w = w;
        let mut surf_h = h;
        let mut clip = Rect::new(0, 0, surf_w, surf_h);

        if !is_legacy {
            // when floating we respect the min size
            if self.toplevel_is_floating(id) {
                surf_w = surf_w.max(min_size.0);
                surf_h = surf_h.max(min_size.1);
                clip.width = surf_w;
                clip.height = surf_h;
            }
            clip.x = geometry.x;
            clip.y = geometry.y;
        }

        self.toplevel_set_size(id, surf_w, surf_h);
        self.toplevel_set_clip(id, Some(clip));
        (surf_w, surf_h)
    }

    pub(crate) fn toplevel_sync_legacy_position(&mut self, id: ToplevelId) {
        let Some(t) = self.toplevels.get(&id) else {
            return;
        };
        if !t.is_legacy() {
            return;
        }
        let Some(container) = t.container else {
            return;
        };
        let Some(tree) = self.containers.get(&container).map(|c| c.tree) else {
            return;
        };
        let (lx, ly) = self.scene.coords(tree);
        let (w, h) = self.toplevels[&id].surface_size;
        self.push_request(ShellRequest::LegacyConfigure {
            toplevel: id,
            x: lx,
            y: ly,
            width: w,
            height: h,
        });
    }

    pub(crate) fn toplevel_client_set_fullscreen(&mut self, id: ToplevelId, set: bool) {
        self.push_request(ShellRequest::SetFullscreen { toplevel: id, set });
    }

    pub(crate) fn toplevel_client_set_maximized(&mut self, id: ToplevelId, set: bool) {
        self.push_request(ShellRequest::SetMaximized { toplevel: id, set });
    }

    pub(crate) fn toplevel_client_set_minimized(&mut self, id: ToplevelId, set: bool) {
        let Some(t) = self.toplevels.get(&id) else {
            return;
        };
        // the legacy forward is withheld, it crashed clients in the wild
        if t.is_legacy() {
            return;
        }
        self.push_request(ShellRequest::SetSuspended { toplevel: id, set });
    }

    pub(crate) fn toplevel_set_activated(&mut self, id: ToplevelId, activated: bool) {
        self.push_request(ShellRequest::SetActivated {
            toplevel: id,
            activated,
        });
    }

    pub fn toplevel_set_tiled(&mut self, id: ToplevelId, edges: Edges) {
        self.push_request(ShellRequest::SetTiled {
            toplevel: id,
            edges,
        });
    }

    pub fn toplevel_send_close(&mut self, id: ToplevelId) {
        self.push_request(ShellRequest::Close { toplevel: id });
    }

    pub fn toplevel_kill(&mut self, id: ToplevelId) {
        self.push_request(ShellRequest::Kill { toplevel: id });
    }

    // ===================== predicates =====================

    pub fn toplevel_is_floating(&self, id: ToplevelId) -> bool {
        self.toplevels
            .get(&id)
            .and_then(|t| t.container)
            .map(|c| self.container_is_floating(c))
            .unwrap_or(false)
    }

    pub fn toplevel_is_visible(&self, id: ToplevelId) -> bool {
        let Some(container) = self.toplevels.get(&id).and_then(|t| t.container) else {
            return false;
        };
        self.container_is_visible(container) && self.container_front_toplevel(container) == Some(id)
    }

    pub fn toplevel_is_tileable(&self, id: ToplevelId) -> bool {
        let Some(t) = self.toplevels.get(&id) else {
            return false;
        };
        let Some(container) = t.container.and_then(|c| self.containers.get(&c)) else {
            return false;
        };
        self.toplevel_is_visible(id)
            && !self.toplevel_is_floating(id)
            && !container.is_fullscreen()
            && !container.is_maximized()
            && !t.is_unmanaged()
    }

    /// Interactive move/resize is floating-only.
    pub fn toplevel_can_enter_interactive(&self, id: ToplevelId) -> bool {
        let Some(t) = self.toplevels.get(&id) else {
            return false;
        };
        let Some(container) = t.container.and_then(|c| self.containers.get(&c)) else {
            return false;
        };
        if !self.toplevel_is_floating(id) {
            return false;
        }
        !container.is_fullscreen() && !container.is_maximized() && !t.is_unmanaged()
    }

    /// Heuristic for windows that have no business being tiled.
    pub fn toplevel_should_float(&self, id: ToplevelId) -> bool {
        let Some(t) = self.toplevels.get(&id) else {
            return false;
        };
        match t.kind {
            ToplevelKind::Legacy { modal, .. } => {
                if modal {
                    return true;
                }
                t.min_size.0 > 0
                    && t.min_size.1 > 0
                    && (t.max_size.0 == t.min_size.0 || t.max_size.1 == t.min_size.1)
            }
            ToplevelKind::Native => {
                t.parent.is_some()
                    || (t.min_size.0 != 0
                        && t.min_size.1 != 0
                        && (t.min_size.0 == t.max_size.0 || t.min_size.1 == t.max_size.1))
            }
        }
    }

    // ===================== container forwards =====================

    pub fn toplevel_set_floating(&mut self, id: ToplevelId, set: bool) {
        if let Some(container) = self.toplevels.get(&id).and_then(|t| t.container) {
            self.container_set_floating(container, set);
        }
    }

    pub fn toplevel_set_fullscreen(&mut self, id: ToplevelId, set: bool) {
        if let Some(container) = self.toplevels.get(&id).and_then(|t| t.container) {
            self.container_set_fullscreen(container, set);
        }
    }

    pub fn toplevel_set_maximized(&mut self, id: ToplevelId, set: bool) {
        if let Some(container) = self.toplevels.get(&id).and_then(|t| t.container) {
            self.container_set_maximized(container, set);
        }
    }

    pub fn toplevel_set_minimized(&mut self, id: ToplevelId, set: bool) {
        if let Some(container) = self.toplevels.get(&id).and_then(|t| t.container) {
            self.container_set_minimized(container, set);
        }
    }

    pub fn toplevel_set_sticky(&mut self, id: ToplevelId, set: bool) {
        if let Some(container) = self.toplevels.get(&id).and_then(|t| t.container) {
            self.container_set_sticky(container, set);
        }
    }

    pub fn toplevel_move_to_tag(&mut self, id: ToplevelId, tagidx: usize) {
        if let Some(container) = self.toplevels.get(&id).and_then(|t| t.container) {
            self.container_move_to_tag(container, tagidx);
        }
    }

    pub fn toplevel_to_center(&mut self, id: ToplevelId) {
        if let Some(container) = self.toplevels.get(&id).and_then(|t| t.container) {
            self.container_to_center(container);
        }
    }

    // ===================== stacking across layers =====================

    fn toplevel_reparent_layer(&mut self, id: ToplevelId, layer: NodeId, set: bool) {
        let Some(tree) = self
            .toplevels
            .get(&id)
            .and_then(|t| t.container)
            .and_then(|c| self.containers.get(&c))
            .map(|c| c.tree)
        else {
            return;
        };
        let target = if set { layer } else { self.layers.toplevel };
        self.scene.reparent(tree, target);
    }

    fn toplevel_is_in_layer(&self, id: ToplevelId, layer: NodeId) -> bool {
        self.toplevels
            .get(&id)
            .and_then(|t| t.container)
            .and_then(|c| self.containers.get(&c))
            .map(|c| self.scene.get(c.tree).parent == Some(layer))
            .unwrap_or(false)
    }

    pub fn toplevel_set_ontop(&mut self, id: ToplevelId, set: bool) {
        self.toplevel_reparent_layer(id, self.layers.top, set);
    }

    pub fn toplevel_is_ontop(&self, id: ToplevelId) -> bool {
        self.toplevel_is_in_layer(id, self.layers.top)
    }

    pub fn toplevel_set_above(&mut self, id: ToplevelId, set: bool) {
        self.toplevel_reparent_layer(id, self.layers.above, set);
    }

    pub fn toplevel_is_above(&self, id: ToplevelId) -> bool {
        self.toplevel_is_in_layer(id, self.layers.above)
    }

    pub fn toplevel_set_below(&mut self, id: ToplevelId, set: bool) {
        self.toplevel_reparent_layer(id, self.layers.below, set);
    }

    pub fn toplevel_is_below(&self, id: ToplevelId) -> bool {
        self.toplevel_is_in_layer(id, self.layers.below)
    }

    // ===================== queries =====================

    /// Toplevel under a layout point, by direct surface hit.
    pub fn toplevel_at(&self, lx: f64, ly: f64) -> Option<(ToplevelId, f64, f64)> {
        let (node, sx, sy) = self.scene.node_at(lx, ly)?;
        let toplevel = self.scene.get(node).owner.toplevel()?;
        Some((toplevel, sx, sy))
    }

    /// Toplevel under a layout point, resolving border hits to the front
    /// toplevel of the container they decorate.
    pub fn toplevel_at_deep(&self, lx: f64, ly: f64) -> Option<(ToplevelId, f64, f64)> {
        let (node, _, _) = self.scene.node_at(lx, ly)?;
        let container_node = self.scene.find_ancestor(node, |owner| {
            matches!(owner, SceneOwner::Container(_))
        })?;
        let SceneOwner::Container(container) = self.scene.get(container_node).owner else {
            return None;
        };
        let front = self.container_front_toplevel(container)?;
        let (cx, cy) = self.scene.coords(container_node);
        Some((front, lx - cx as f64, ly - cy as f64))
    }

    /// Shortest visible toplevel within a 90 degree field of view.
    pub fn toplevel_get_nearest_by_direction(
        &self,
        id: ToplevelId,
        dir: Direction,
    ) -> Option<ToplevelId> {
        let container = self.toplevels.get(&id)?.container?;
        let output = self.containers.get(&container)?.output;
        let (fx, fy) = self.scene.coords(self.containers.get(&container)?.tree);

        let mut nearest: Option<(f64, ToplevelId)> = None;
        for candidate_container in self.output_visible_containers(output) {
            let Some(candidate) = self.container_front_toplevel(candidate_container) else {
                continue;
            };
            if candidate == id {
                continue;
            }
            let (lx, ly) = self
                .containers
                .get(&candidate_container)
                .map(|c| self.scene.coords(c.tree))
                .unwrap_or((0, 0));
            let dx = (lx - fx) as f64;
            let dy = (ly - fy) as f64;
            if dx == 0.0 && dy == 0.0 {
                continue;
            }

            let angle = dy.atan2(dx).to_degrees();
            let in_fov = match dir {
                Direction::Up => (-135.0..=-45.0).contains(&angle),
                Direction::Right => angle > -45.0 && angle < 45.0,
                Direction::Down => (45.0..=135.0).contains(&angle),
                Direction::Left => angle >= 135.0 || angle <= -135.0,
            };
            if !in_fov {
                continue;
            }

            let distance = (dx * dx + dy * dy).sqrt();
            if nearest.map(|(d, _)| distance < d).unwrap_or(true) {
                nearest = Some((distance, candidate));
            }
        }

        nearest.map(|(_, t)| t)
    }

    /// Exchange two toplevels between their containers.
    pub fn toplevel_swap(&mut self, source: ToplevelId, target: ToplevelId) {
        if source == target {
            return;
        }
        let Some(source_container) = self.toplevels.get(&source).and_then(|t| t.container) else {
            return;
        };
        let Some(target_container) = self.toplevels.get(&target).and_then(|t| t.container) else {
            return;
        };
        if source_container == target_container {
            return;
        }

        self.container_remove_toplevel_keep_empty(source);
        self.container_remove_toplevel_keep_empty(target);
        self.container_insert_toplevel(source_container, target);
        self.container_insert_toplevel(target_container, source);

        let outputs: Vec<_> = self.output_order.clone();
        for output in outputs {
            if let Some(o) = self.outputs.get_mut(&output) {
                let a = o.state.toplevels.iter().position(|&t| t == source);
                let b = o.state.toplevels.iter().position(|&t| t == target);
                match (a, b) {
                    (Some(a), Some(b)) => o.state.toplevels.swap(a, b),
                    (Some(a), None) => o.state.toplevels[a] = target,
                    (None, Some(b)) => o.state.toplevels[b] = source,
                    (None, None) => {}
                }
            }
        }
        if let (Some(a), Some(b)) = (
            self.toplevel_order.iter().position(|&t| t == source),
            self.toplevel_order.iter().position(|&t| t == target),
        ) {
            self.toplevel_order.swap(a, b);
        }

        self.container_refresh(source_container);
        self.container_refresh(target_container);

        self.emit_signal(
            "client::swap",
            SignalArgs(vec![
                SignalArg::Toplevel(source),
                SignalArg::Toplevel(target),
            ]),
        );
    }

    // ===================== popups =====================

    /// A popup without a resolvable parent is client misuse; the resource is
    /// destroyed and the event dropped.
    pub fn handle_new_popup(&mut self, parent: Option<PopupParent>) -> Option<PopupId> {
        let Some(parent) = parent else {
            debug!("popup without parent, destroying resource");
            self.push_request(ShellRequest::DestroyResource {
                description: "popup without parent",
            });
            return None;
        };
        let id = PopupId(self.alloc_id());
        self.popups.insert(
            id,
            Popup {
                id,
                parent,
                scene_tree: None,
            },
        );
        debug!("new popup for parent {:?}: {:?}", parent, id);
        Some(id)
    }

    /// Initial popup commit: attach to the scene and unconstrain it against
    /// the parent chain's output box.
    pub fn handle_popup_initial_commit(&mut self, id: PopupId) {
        let Some(popup) = self.popups.get(&id) else {
            return;
        };
        if popup.scene_tree.is_some() {
            return;
        }

        let (parent_tree, unconstrain) = match popup.parent {
            PopupParent::Popup(parent) => {
                let tree = self.popups.get(&parent).and_then(|p| p.scene_tree);
                let Some(tree) = tree else {
                    return;
                };
                (tree, None)
            }
            PopupParent::Toplevel(toplevel) => {
                let Some(container) = self.toplevels.get(&toplevel).and_then(|t| t.container)
                else {
                    return;
                };
                let Some(c) = self.containers.get(&container) else {
                    return;
                };
                let mut unconstrain = self
                    .outputs
                    .get(&c.output)
                    .map(|o| o.usable_area)
                    .unwrap_or_default();
                let (nx, ny) = self.scene.coords(c.tree);
                unconstrain.x -= nx;
                unconstrain.y -= ny;
                (c.popup_tree, Some(unconstrain))
            }
            PopupParent::Layer(layer) => {
                let Some(surface) = self.layer_surfaces.get(&layer) else {
                    return;
                };
                let mut unconstrain = self
                    .outputs
                    .get(&surface.output)
                    .map(|o| Rect::new(0, 0, o.width, o.height))
                    .unwrap_or_default();
                let (nx, ny) = self.scene.coords(surface.tree);
                unconstrain.x -= nx;
                unconstrain.y -= ny;
                (self.layers.top, Some(unconstrain))
            }
        };

        let tree = self.scene.create_tree(parent_tree, SceneOwner::Popup(id));
        self.scene.raise_to_top(tree);
        self.popups.get_mut(&id).unwrap().scene_tree = Some(tree);

        if let Some(unconstrain) = unconstrain {
            self.push_request(ShellRequest::PopupConfigure {
                popup: id,
                unconstrain,
            });
        }
    }

    pub fn handle_popup_destroy(&mut self, id: PopupId) {
        if let Some(popup) = self.popups.remove(&id) {
            if let Some(tree) = popup.scene_tree {
                self.scene.destroy(tree);
            }
            debug!("destroyed popup {:?}", id);
        }
    }
}
