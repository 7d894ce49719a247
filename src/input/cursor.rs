//! Cursor and pointer processing.
//!
//! The cursor is a three-state machine: normal hover, interactive move, and
//! interactive resize. Resizing is rate limited to one configure per
//! monitor refresh so a flood of motion events cannot drown a client in
//! configures; the final pending rectangle is flushed when the grab ends.

use tracing::debug;

use crate::input::{ConstraintKind, FocusTarget, PointerFocus};
use crate::scene::SceneOwner;
use crate::shell::{Edges, ShellRequest, ToplevelId};
use crate::signal::SignalArg;
use crate::utils::{surface_coord_to_normdevice_coord, Rect};
use crate::Server;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorState {
    #[default]
    Normal,
    Move,
    Resize,
}

#[derive(Debug)]
pub struct Cursor {
    pub x: f64,
    pub y: f64,
    pub state: CursorState,
    pub shape: String,

    // interactive grab
    pub resize_edges: Edges,
    pub grab_x: f64,
    pub grab_y: f64,
    pub grab_geobox: Rect,
    pub grabbed_toplevel: Option<ToplevelId>,
    pub(crate) name_before_interactive: Option<String>,

    // resize scheduling
    pub last_resize_time_msec: u64,
    pub pending_box: Option<Rect>,

    pub active_constraint: Option<crate::shell::ConstraintId>,
    pub dont_emit_signal: bool,
}

impl Cursor {
    pub fn new() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            state: CursorState::Normal,
            shape: "default".to_string(),
            resize_edges: Edges::empty(),
            grab_x: 0.0,
            grab_y: 0.0,
            grab_geobox: Rect::default(),
            grabbed_toplevel: None,
            name_before_interactive: None,
            last_resize_time_msec: 0,
            pending_box: None,
            active_constraint: None,
            dont_emit_signal: false,
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Resize edges inferred from where the pointer sits inside the toplevel's
/// geometry box, in normalized-device coordinates.
fn decide_which_edge_to_resize(sx: f64, sy: f64, geo_box: Rect) -> Edges {
    let (nx, ny) = surface_coord_to_normdevice_coord(geo_box, sx, sy);

    // exclusive single edge check
    if (-0.3..=0.3).contains(&nx) {
        if ny <= -0.4 {
            return Edges::TOP;
        } else if ny >= 0.6 {
            return Edges::BOTTOM;
        }
    } else if (-0.3..=0.3).contains(&ny) {
        if nx <= -0.4 {
            return Edges::LEFT;
        } else if nx >= 0.6 {
            return Edges::RIGHT;
        }
    }

    // corner check
    let mut edges = Edges::empty();
    if nx >= -0.05 {
        edges |= Edges::RIGHT;
    } else {
        edges |= Edges::LEFT;
    }
    if ny >= -0.05 {
        edges |= Edges::BOTTOM;
    } else {
        edges |= Edges::TOP;
    }
    edges
}

fn resize_shape_name(edges: Edges) -> &'static str {
    match (
        edges.contains(Edges::TOP),
        edges.contains(Edges::BOTTOM),
        edges.contains(Edges::LEFT),
        edges.contains(Edges::RIGHT),
    ) {
        (true, _, true, _) => "nw-resize",
        (true, _, _, true) => "ne-resize",
        (_, true, true, _) => "sw-resize",
        (_, true, _, true) => "se-resize",
        (true, ..) => "n-resize",
        (_, true, ..) => "s-resize",
        (_, _, true, _) => "w-resize",
        _ => "e-resize",
    }
}

impl Server {
    /// Change the cursor image; the themed lookup happens outside.
    pub fn cursor_set_image_by_name(&mut self, name: &str) {
        if self.seat.cursor.shape == name {
            return;
        }
        self.seat.cursor.shape = name.to_string();
        self.push_request(ShellRequest::SetCursorShape {
            name: name.to_string(),
        });
    }

    /// cursor-shape protocol request from a client.
    pub fn handle_cursor_shape_request(&mut self, name: &str) {
        self.cursor_set_image_by_name(name);
    }

    // ===================== interactive grab =====================

    /// `None` grabs the toplevel under the cursor.
    pub fn start_interactive_move(&mut self, toplevel: Option<ToplevelId>) {
        let (cx, cy) = (self.seat.cursor.x, self.seat.cursor.y);
        let toplevel = toplevel.or_else(|| self.toplevel_at_deep(cx, cy).map(|(t, _, _)| t));
        let Some(toplevel) = toplevel else {
            return;
        };
        if !self.toplevel_can_enter_interactive(toplevel) {
            return;
        }

        let Some(tree) = self
            .toplevels
            .get(&toplevel)
            .and_then(|t| t.container)
            .and_then(|c| self.containers.get(&c))
            .map(|c| c.tree)
        else {
            return;
        };
        let (node_x, node_y) = self.scene.coords(tree);

        let cursor = &mut self.seat.cursor;
        cursor.grab_x = cx - node_x as f64;
        cursor.grab_y = cy - node_y as f64;
        cursor.grabbed_toplevel = Some(toplevel);
        cursor.name_before_interactive = Some(cursor.shape.clone());

        // set the image before flipping state so it isn't treated as hover
        self.cursor_set_image_by_name("grabbing");
        self.seat.cursor.state = CursorState::Move;
        debug!("interactive move started for {:?}", toplevel);
    }

    pub fn start_interactive_resize(&mut self, toplevel: Option<ToplevelId>, edges: Edges) {
        let (cx, cy) = (self.seat.cursor.x, self.seat.cursor.y);
        let hit = self.toplevel_at_deep(cx, cy);
        let toplevel = toplevel.or_else(|| hit.map(|(t, _, _)| t));
        let Some(toplevel) = toplevel else {
            return;
        };
        if !self.toplevel_can_enter_interactive(toplevel) {
            return;
        }

        let is_legacy = self
            .toplevels
            .get(&toplevel)
            .map(|t| t.is_legacy())
            .unwrap_or(false);
        if !is_legacy {
            self.push_request(ShellRequest::SetResizing {
                toplevel,
                set: true,
            });
            if let Some(t) = self.toplevels.get_mut(&toplevel) {
                t.resizing = true;
            }
        }

        let geo_box = self.toplevel_geometry(toplevel);
        let edges = if edges.is_empty() {
            let surface_box = self.toplevel_box(toplevel);
            let sx = cx - surface_box.x as f64;
            let sy = cy - surface_box.y as f64;
            decide_which_edge_to_resize(sx, sy, geo_box)
        } else {
            edges
        };

        let Some(tree) = self
            .toplevels
            .get(&toplevel)
            .and_then(|t| t.container)
            .and_then(|c| self.containers.get(&c))
            .map(|c| c.tree)
        else {
            return;
        };
        let (node_x, node_y) = self.scene.coords(tree);

        let border_x = (node_x + geo_box.x) as f64
            + if edges.contains(Edges::RIGHT) {
                geo_box.width as f64
            } else {
                0.0
            };
        let border_y = (node_y + geo_box.y) as f64
            + if edges.contains(Edges::BOTTOM) {
                geo_box.height as f64
            } else {
                0.0
            };

        let now = self.now_msec();
        let cursor = &mut self.seat.cursor;
        cursor.grabbed_toplevel = Some(toplevel);
        cursor.name_before_interactive = Some(cursor.shape.clone());
        cursor.grab_x = cx - border_x;
        cursor.grab_y = cy - border_y;
        cursor.grab_geobox = Rect::new(
            geo_box.x + node_x,
            geo_box.y + node_y,
            geo_box.width,
            geo_box.height,
        );
        cursor.resize_edges = edges;
        cursor.last_resize_time_msec = now;
        cursor.pending_box = None;

        self.cursor_set_image_by_name(resize_shape_name(edges));
        self.seat.cursor.state = CursorState::Resize;
        debug!("interactive resize started for {:?} edges {:?}", toplevel, edges);
    }

    /// End an interactive grab; a pending scheduled rectangle is applied.
    pub fn stop_interactive(&mut self) {
        if self.seat.cursor.state == CursorState::Normal {
            return;
        }

        if self.seat.cursor.state == CursorState::Resize {
            if let (Some(pending), Some(grabbed)) = (
                self.seat.cursor.pending_box.take(),
                self.seat.cursor.grabbed_toplevel,
            ) {
                if let Some(container) = self.toplevels.get(&grabbed).and_then(|t| t.container) {
                    self.container_set_position(container, pending.x, pending.y);
                }
                self.toplevel_set_size_surface(grabbed, pending.width, pending.height);
            }
        }

        self.seat.cursor.state = CursorState::Normal;
        let fallback = self
            .seat
            .cursor
            .name_before_interactive
            .take()
            .unwrap_or_else(|| "default".to_string());
        self.cursor_set_image_by_name(&fallback);

        if let Some(grabbed) = self.seat.cursor.grabbed_toplevel.take() {
            let is_legacy = self
                .toplevels
                .get(&grabbed)
                .map(|t| t.is_legacy())
                .unwrap_or(true);
            if !is_legacy {
                self.push_request(ShellRequest::SetResizing {
                    toplevel: grabbed,
                    set: false,
                });
                if let Some(t) = self.toplevels.get_mut(&grabbed) {
                    t.resizing = false;
                }
            }
        }
    }

    // ===================== motion =====================

    fn process_cursor_move(&mut self) {
        let Some(grabbed) = self.seat.cursor.grabbed_toplevel else {
            return;
        };
        let new_x = self.seat.cursor.x - self.seat.cursor.grab_x;
        let new_y = self.seat.cursor.y - self.seat.cursor.grab_y;
        if let Some(container) = self.toplevels.get(&grabbed).and_then(|t| t.container) {
            self.container_set_position(container, new_x as i32, new_y as i32);
        }
    }

    /// Configure flood control: at most one client resize per refresh
    /// interval, everything between lands in `pending_box`.
    fn schedule_resize(&mut self, toplevel: ToplevelId, time_msec: u64, new_box: Rect) {
        let refresh = self
            .toplevels
            .get(&toplevel)
            .and_then(|t| t.container)
            .and_then(|c| self.containers.get(&c))
            .and_then(|c| self.outputs.get(&c.output))
            .map(|o| o.refresh)
            .unwrap_or(0);
        // default to 120hz
        let mut interval_msec = 8u64;
        if refresh != 0 {
            let hz = (refresh / 1000).max(1);
            interval_msec = (1000.0 / hz as f64) as u64;
        }

        let delta = time_msec.saturating_sub(self.seat.cursor.last_resize_time_msec);
        if delta > interval_msec {
            // position straight through the scene: a full container move
            // here would double-configure and flicker
            if let Some(tree) = self
                .toplevels
                .get(&toplevel)
                .and_then(|t| t.container)
                .and_then(|c| self.containers.get(&c))
                .map(|c| c.tree)
            {
                self.scene.set_position(tree, new_box.x, new_box.y);
            }
            self.toplevel_set_size_surface(toplevel, new_box.width, new_box.height);
            self.seat.cursor.last_resize_time_msec = time_msec;
        }

        self.seat.cursor.pending_box = Some(new_box);
    }

    fn process_cursor_resize(&mut self, time_msec: u64) {
        let Some(toplevel) = self.seat.cursor.grabbed_toplevel else {
            return;
        };
        let cursor = &self.seat.cursor;
        let border_x = cursor.x - cursor.grab_x;
        let border_y = cursor.y - cursor.grab_y;
        let mut new_left = cursor.grab_geobox.x;
        let mut new_right = cursor.grab_geobox.x + cursor.grab_geobox.width;
        let mut new_top = cursor.grab_geobox.y;
        let mut new_bottom = cursor.grab_geobox.y + cursor.grab_geobox.height;
        let edges = cursor.resize_edges;

        if edges.contains(Edges::TOP) {
            new_top = border_y as i32;
            if new_top >= new_bottom {
                new_top = new_bottom - 1;
            }
        } else if edges.contains(Edges::BOTTOM) {
            new_bottom = border_y as i32;
            if new_bottom <= new_top {
                new_bottom = new_top + 1;
            }
        }
        if edges.contains(Edges::LEFT) {
            new_left = border_x as i32;
            if new_left >= new_right {
                new_left = new_right - 1;
            }
        } else if edges.contains(Edges::RIGHT) {
            new_right = border_x as i32;
            if new_right <= new_left {
                new_right = new_left + 1;
            }
        }

        let geo_box = self.toplevel_geometry(toplevel);
        let new_box = Rect::new(
            new_left - geo_box.x,
            new_top - geo_box.y,
            new_right - new_left,
            new_bottom - new_top,
        );
        self.schedule_resize(toplevel, time_msec, new_box);
    }

    /// Surface under the cursor as a focus target.
    fn surface_under_cursor(&self) -> Option<PointerFocus> {
        let (node, sx, sy) = self.scene.node_at(self.seat.cursor.x, self.seat.cursor.y)?;
        let target = match self.scene.get(node).owner {
            SceneOwner::XdgShell(t) | SceneOwner::Xwayland(t) => FocusTarget::Toplevel(t),
            SceneOwner::LayerShell(l) => FocusTarget::Layer(l),
            _ => return None,
        };
        Some(PointerFocus { target, sx, sy })
    }

    fn emit_pointer_crossing(&mut self, old: Option<FocusTarget>, new: Option<FocusTarget>) {
        if self.seat.cursor.dont_emit_signal {
            return;
        }
        if let Some(t) = old.and_then(|f| f.toplevel()) {
            if self.toplevels.get(&t).map(|x| x.mapped).unwrap_or(false) {
                self.emit_signal_simple("client::mouse_leave", SignalArg::Toplevel(t));
            }
        }
        if let Some(t) = new.and_then(|f| f.toplevel()) {
            if self.toplevels.get(&t).map(|x| x.mapped).unwrap_or(false) {
                self.emit_signal_simple("client::mouse_enter", SignalArg::Toplevel(t));
            }
        }
    }

    /// Relative pointer motion. `has_device` is false for the synthetic
    /// no-motion pass the focus code runs.
    pub fn process_cursor_motion(
        &mut self,
        time_msec: u32,
        mut dx: f64,
        mut dy: f64,
        has_device: bool,
    ) {
        match self.seat.cursor.state {
            CursorState::Move => {
                self.seat.cursor.x += dx;
                self.seat.cursor.y += dy;
                self.process_cursor_move();
                return;
            }
            CursorState::Resize => {
                self.seat.cursor.x += dx;
                self.seat.cursor.y += dy;
                let time = if time_msec == 0 {
                    self.now_msec()
                } else {
                    time_msec as u64
                };
                self.process_cursor_resize(time);
                return;
            }
            CursorState::Normal => {}
        }

        if has_device {
            self.push_request(ShellRequest::NotifyIdleActivity);
        }

        let under = self.surface_under_cursor();

        // pointer constraint arithmetic, only for real devices
        if let (Some(active), true) = (self.seat.cursor.active_constraint, has_device) {
            if let Some(constraint) = self.constraints.get(&active) {
                let under_toplevel = under.and_then(|f| f.target.toplevel());
                if under_toplevel != Some(constraint.toplevel) {
                    return;
                }
                let focus = under.unwrap();
                let Some((confined_x, confined_y)) =
                    constraint
                        .region
                        .confine(focus.sx, focus.sy, focus.sx + dx, focus.sy + dy)
                else {
                    return;
                };
                if constraint.kind == ConstraintKind::Locked {
                    return;
                }
                dx = confined_x - focus.sx;
                dy = confined_y - focus.sy;
            }
        }

        let old_target = self.seat.pointer_focus.map(|f| f.target);
        let new_target = under.map(|f| f.target);
        if old_target != new_target {
            // leaving a constrained surface deactivates its constraint
            if let Some(old_toplevel) = old_target.and_then(|f| f.toplevel()) {
                if let Some(constraint) = self.constraint_for_toplevel(old_toplevel) {
                    if self.seat.cursor.active_constraint == Some(constraint) {
                        self.seat.cursor.active_constraint = None;
                    }
                }
            }
            if let Some(new_toplevel) = new_target.and_then(|f| f.toplevel()) {
                if let Some(constraint) = self.constraint_for_toplevel(new_toplevel) {
                    self.seat.cursor.active_constraint = Some(constraint);
                }
            }
            self.emit_pointer_crossing(old_target, new_target);
        }

        match under {
            Some(focus) => {
                self.seat.pointer_focus = Some(focus);
            }
            None => {
                self.cursor_set_image_by_name("default");
                self.seat.pointer_focus = None;
            }
        }

        self.seat.cursor.x += dx;
        self.seat.cursor.y += dy;
        self.seat.cursor.dont_emit_signal = false;
    }

    pub fn handle_pointer_motion(&mut self, time_msec: u32, dx: f64, dy: f64) {
        self.process_cursor_motion(time_msec, dx, dy, true);
    }

    pub fn handle_pointer_motion_absolute(&mut self, time_msec: u32, x: f64, y: f64) {
        let dx = x - self.seat.cursor.x;
        let dy = y - self.seat.cursor.y;
        self.process_cursor_motion(time_msec, dx, dy, true);
    }

    pub fn handle_pointer_axis(&mut self, _time_msec: u32, horizontal: bool, delta: f64) {
        self.push_request(ShellRequest::NotifyIdleActivity);
        self.push_request(ShellRequest::ForwardAxis { horizontal, delta });
    }

    /// Pointer button press/release; any release ends an interactive grab.
    pub fn handle_pointer_button(&mut self, _time_msec: u32, button: u32, pressed: bool) {
        let (cx, cy) = (self.seat.cursor.x, self.seat.cursor.y);
        let hit = self.toplevel_at(cx, cy).map(|(t, _, _)| t);

        self.push_request(ShellRequest::NotifyIdleActivity);

        let modifiers = self.seat.modifiers;
        let mut handled = false;
        if pressed {
            if let Some(output) = self.output_at(cx, cy) {
                self.focused_output = Some(output);
            }
            if let Some(toplevel) = hit {
                self.focus_toplevel(Some(toplevel), false);
            }
            handled |= self.keybind_mouse_execute(modifiers, button, true);
        } else {
            self.stop_interactive();
            // like keyboard bindings, the release always reaches the client
            self.keybind_mouse_execute(modifiers, button, false);
        }

        if !handled {
            self.push_request(ShellRequest::ForwardButton { button, pressed });
        }
    }
}
