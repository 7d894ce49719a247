//! Seat state, focus policy and pointer constraints.
//!
//! One seat. Keyboard focus is a small sum over the surface roles that can
//! hold it; the session lock and exclusive layer surfaces override whatever
//! the focus policy would otherwise pick.

pub mod cursor;
pub mod keyboard;

use std::collections::HashMap;

pub use cursor::{Cursor, CursorState};
pub use keyboard::{KeybindInfo, Modifiers};

use crate::shell::{ConstraintId, LayerId, ToplevelId};
use crate::signal::SignalArg;
use crate::utils::Rect;
use crate::Server;

/// A surface that can hold keyboard or pointer focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusTarget {
    Toplevel(ToplevelId),
    Layer(LayerId),
    Lock,
}

impl FocusTarget {
    pub fn toplevel(&self) -> Option<ToplevelId> {
        match self {
            FocusTarget::Toplevel(id) => Some(*id),
            _ => None,
        }
    }
}

/// Pointer focus: the surface under the cursor plus surface-local coords.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerFocus {
    pub target: FocusTarget,
    pub sx: f64,
    pub sy: f64,
}

#[derive(Debug)]
pub struct Seat {
    pub cursor: Cursor,
    pub keyboard_focus: Option<FocusTarget>,
    pub pointer_focus: Option<PointerFocus>,
    /// Layer surface holding exclusive keyboard interactivity, if any.
    pub exclusive_kbd_interactive: Option<LayerId>,
    /// Modifier state from the last keyboard modifiers event.
    pub modifiers: Modifiers,
}

impl Seat {
    pub fn new() -> Self {
        Self {
            cursor: Cursor::new(),
            keyboard_focus: None,
            pointer_focus: None,
            exclusive_kbd_interactive: None,
            modifiers: Modifiers::empty(),
        }
    }
}

impl Default for Seat {
    fn default() -> Self {
        Self::new()
    }
}

// ===================== pointer constraints =====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Confined,
    Locked,
}

/// Constraint region: union of rectangles in surface coordinates. Empty
/// means the whole surface.
#[derive(Debug, Clone, Default)]
pub struct Region(pub Vec<Rect>);

impl Region {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.0.is_empty() || self.0.iter().any(|r| r.contains(x, y))
    }

    /// Clip a motion target into the region, keyed on where it started.
    /// Returns `None` when the starting point is already outside.
    pub fn confine(&self, from_x: f64, from_y: f64, to_x: f64, to_y: f64) -> Option<(f64, f64)> {
        if self.0.is_empty() {
            return Some((to_x, to_y));
        }
        if self.contains(to_x, to_y) {
            return Some((to_x, to_y));
        }
        let home = self.0.iter().find(|r| r.contains(from_x, from_y))?;
        let clamped_x = to_x
            .max(home.x as f64)
            .min((home.x + home.width) as f64 - 1.0);
        let clamped_y = to_y
            .max(home.y as f64)
            .min((home.y + home.height) as f64 - 1.0);
        Some((clamped_x, clamped_y))
    }
}

#[derive(Debug)]
pub struct PointerConstraint {
    pub id: ConstraintId,
    pub toplevel: ToplevelId,
    pub kind: ConstraintKind,
    pub region: Region,
}

impl Server {
    pub fn handle_new_pointer_constraint(
        &mut self,
        toplevel: ToplevelId,
        kind: ConstraintKind,
        region: Region,
    ) -> ConstraintId {
        let id = ConstraintId(self.alloc_id());
        self.constraints.insert(
            id,
            PointerConstraint {
                id,
                toplevel,
                kind,
                region,
            },
        );
        // activate right away when the pointer already rests on the surface
        let under = self
            .seat
            .pointer_focus
            .and_then(|f| f.target.toplevel());
        if under == Some(toplevel) {
            self.seat.cursor.active_constraint = Some(id);
        }
        id
    }

    pub fn handle_pointer_constraint_destroy(&mut self, id: ConstraintId) {
        self.constraints.remove(&id);
        if self.seat.cursor.active_constraint == Some(id) {
            self.seat.cursor.active_constraint = None;
        }
    }

    pub(crate) fn constraint_for_toplevel(&self, toplevel: ToplevelId) -> Option<ConstraintId> {
        self.constraints
            .values()
            .find(|c| c.toplevel == toplevel)
            .map(|c| c.id)
    }
}

// ===================== focus policy =====================

impl Server {
    /// Focus a toplevel. `None` clears keyboard focus.
    pub fn focus_toplevel(&mut self, toplevel: Option<ToplevelId>, raise: bool) {
        let Some(toplevel) = toplevel else {
            self.clear_keyboard_focus();
            return;
        };
        if !self.toplevels.contains_key(&toplevel) {
            return;
        }
        if self.seat.keyboard_focus == Some(FocusTarget::Toplevel(toplevel)) {
            return;
        }

        let container = self.toplevels[&toplevel].container;
        let unmanaged = self.toplevels[&toplevel].is_unmanaged();
        if !unmanaged {
            if let Some(container) = container {
                if let Some(output) = self.containers.get(&container).map(|c| c.output) {
                    if let Some(o) = self.outputs.get_mut(&output) {
                        o.state.focus_stack.retain(|&c| c != container);
                        o.state.focus_stack.insert(0, container);
                    }
                }
            }
        }

        // a cursor update here would race the activate with hover-enter
        // signals, so suppress them for this one pass
        self.seat.cursor.dont_emit_signal = true;
        self.toplevel_set_activated(toplevel, true);
        self.process_cursor_motion(0, 0.0, 0.0, false);
        self.set_keyboard_focus(Some(FocusTarget::Toplevel(toplevel)));

        if raise {
            if let Some(tree) = container.and_then(|c| self.containers.get(&c)).map(|c| c.tree) {
                self.scene.raise_to_top(tree);
            }
        }
    }

    pub fn focused_toplevel(&self) -> Option<ToplevelId> {
        self.seat.keyboard_focus.and_then(|f| f.toplevel())
    }

    pub fn clear_keyboard_focus(&mut self) {
        self.set_keyboard_focus(None);
    }

    pub(crate) fn keyboard_focus_layer(&mut self, layer: LayerId) {
        self.set_keyboard_focus(Some(FocusTarget::Layer(layer)));
    }

    pub(crate) fn keyboard_focus_lock_surface(&mut self) {
        self.set_keyboard_focus(Some(FocusTarget::Lock));
    }

    /// Apply a keyboard focus change, honoring the exclusive overrides.
    fn set_keyboard_focus(&mut self, target: Option<FocusTarget>) {
        let target = if self.session_lock.locked {
            Some(FocusTarget::Lock)
        } else if let Some(layer) = self.seat.exclusive_kbd_interactive {
            Some(FocusTarget::Layer(layer))
        } else {
            target
        };

        let old = self.seat.keyboard_focus;
        if old == target {
            return;
        }
        self.seat.keyboard_focus = target;
        self.notify_focus_change(old, target);
    }

    fn notify_focus_change(&mut self, old: Option<FocusTarget>, new: Option<FocusTarget>) {
        let new_toplevel = new.and_then(|f| f.toplevel());
        if let Some(new_toplevel) = new_toplevel {
            if let Some(container) = self.toplevels.get(&new_toplevel).and_then(|t| t.container) {
                if self
                    .containers
                    .get(&container)
                    .map(|c| c.bsp_node.is_some())
                    .unwrap_or(false)
                {
                    self.bsp_last_focused_update(container);
                }
            }
            if self
                .toplevels
                .get(&new_toplevel)
                .map(|t| t.is_unmanaged())
                .unwrap_or(true)
            {
                return;
            }
        }

        // only announce mapped, managed surfaces
        if let Some(old_toplevel) = old.and_then(|f| f.toplevel()) {
            if let Some(t) = self.toplevels.get(&old_toplevel) {
                if t.mapped {
                    if t.is_unmanaged() {
                        return;
                    }
                    self.toplevel_set_activated(old_toplevel, false);
                    self.emit_signal_simple("client::unfocus", SignalArg::Toplevel(old_toplevel));
                }
            }
        }

        if let Some(new_toplevel) = new_toplevel {
            if self
                .toplevels
                .get(&new_toplevel)
                .map(|t| t.mapped)
                .unwrap_or(false)
            {
                self.emit_signal_simple("client::focus", SignalArg::Toplevel(new_toplevel));
            }
        }
    }
}

pub(crate) type ConstraintMap = HashMap<ConstraintId, PointerConstraint>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_confine_clamps_into_home_rect() {
        let region = Region(vec![Rect::new(0, 0, 100, 100)]);
        assert_eq!(region.confine(50.0, 50.0, 60.0, 60.0), Some((60.0, 60.0)));
        let (x, y) = region.confine(50.0, 50.0, 150.0, 40.0).unwrap();
        assert_eq!((x, y), (99.0, 40.0));
        // outside start point cannot be confined
        assert!(region.confine(150.0, 150.0, 10.0, 160.0).is_none());
    }

    #[test]
    fn empty_region_means_whole_surface() {
        let region = Region::default();
        assert_eq!(region.confine(5.0, 5.0, -10.0, 400.0), Some((-10.0, 400.0)));
        assert!(region.contains(123.0, 456.0));
    }
}
