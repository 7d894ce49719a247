//! Layer-shell surfaces and the usable-area arranger.
//!
//! Shell layers arrange in two passes per output, exclusive-zone surfaces
//! first, walking overlay, top, bottom, background. Whatever area the
//! exclusive surfaces reserve is subtracted from the output's usable area;
//! a change there re-runs tiling and re-applies maximized geometry.

use bitflags::bitflags;
use tracing::debug;

use crate::container::ContainerId;
use crate::output::OutputId;
use crate::scene::{NodeId, SceneOwner};
use crate::shell::{LayerId, ShellRequest};
use crate::utils::Rect;
use crate::Server;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Background,
    Bottom,
    Top,
    Overlay,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Anchor: u32 {
        const TOP = 1 << 0;
        const BOTTOM = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyboardInteractivity {
    #[default]
    None,
    Exclusive,
    OnDemand,
}

/// Committed layer-surface state.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayerSurfaceState {
    pub anchor: Anchor,
    /// Zero on an axis means "stretch between the anchors".
    pub desired_size: (i32, i32),
    pub exclusive_zone: i32,
    /// Top, right, bottom, left.
    pub margin: (i32, i32, i32, i32),
    pub keyboard_interactivity: KeyboardInteractivity,
}

#[derive(Debug)]
pub struct LayerSurface {
    pub id: LayerId,
    pub output: OutputId,
    pub layer: Layer,
    pub tree: NodeId,
    pub buffer: NodeId,
    pub state: LayerSurfaceState,
    pub mapped: bool,
    pub initialized: bool,
    last_configure: Option<(i32, i32)>,
}

impl Server {
    fn layer_scene_tree(&self, layer: Layer) -> NodeId {
        match layer {
            Layer::Background => self.layers.background,
            Layer::Bottom => self.layers.bottom,
            Layer::Top => self.layers.top,
            Layer::Overlay => self.layers.overlay,
        }
    }

    /// A client bound a new layer surface. An absent output binds to the
    /// focused one.
    pub fn handle_new_layer_surface(
        &mut self,
        output: Option<OutputId>,
        layer: Layer,
    ) -> LayerId {
        let id = LayerId(self.alloc_id());
        let parent = self.layer_scene_tree(layer);
        let tree = self.scene.create_tree(parent, SceneOwner::LayerShell(id));
        let buffer = self.scene.create_buffer(tree, 0, 0, SceneOwner::LayerShell(id));

        let output = output
            .or(self.focused_output)
            .or_else(|| self.output_order.first().copied())
            .unwrap_or(OutputId(0));

        let surface = LayerSurface {
            id,
            output,
            layer,
            tree,
            buffer,
            state: LayerSurfaceState::default(),
            mapped: false,
            initialized: false,
            last_configure: None,
        };
        debug!("created layer surface for output {:?}: {:?}", output, id);
        self.layer_surfaces.insert(id, surface);
        self.layer_order.push(id);
        id
    }

    /// Commit: adopt the pending state, moving the surface across layers
    /// when asked, then re-arrange the output.
    pub fn handle_layer_commit(
        &mut self,
        id: LayerId,
        layer: Layer,
        state: LayerSurfaceState,
        mapped: bool,
    ) {
        let Some(surface) = self.layer_surfaces.get_mut(&id) else {
            return;
        };
        let output = surface.output;
        let layer_changed = surface.layer != layer;
        surface.layer = layer;
        surface.state = state;
        surface.initialized = true;
        surface.mapped = mapped;
        let tree = surface.tree;

        if layer_changed {
            let parent = self.layer_scene_tree(layer);
            self.scene.reparent(tree, parent);
        }

        self.arrange_layers(output);
    }

    pub fn handle_layer_map(&mut self, id: LayerId) {
        let Some(surface) = self.layer_surfaces.get_mut(&id) else {
            return;
        };
        surface.mapped = true;
        let output = surface.output;
        let wants_keyboard = surface.state.keyboard_interactivity
            != KeyboardInteractivity::None
            && matches!(surface.layer, Layer::Top | Layer::Overlay);

        if wants_keyboard {
            self.keyboard_focus_layer(id);
            self.arrange_layers(output);
        }
    }

    pub fn handle_layer_unmap(&mut self, id: LayerId) {
        let Some(surface) = self.layer_surfaces.get_mut(&id) else {
            return;
        };
        surface.mapped = false;
        let output = surface.output;

        if self.seat.exclusive_kbd_interactive == Some(id) {
            self.seat.exclusive_kbd_interactive = None;
            self.output_focus_newest_focus_visible_toplevel(output);
        }
    }

    pub fn handle_layer_destroy(&mut self, id: LayerId) {
        let Some(surface) = self.layer_surfaces.remove(&id) else {
            return;
        };
        debug!(
            "destroying layer surface at output {:?}: {:?}",
            surface.output, id
        );
        self.layer_order.retain(|&l| l != id);
        if self.seat.exclusive_kbd_interactive == Some(id) {
            self.seat.exclusive_kbd_interactive = None;
        }
        self.scene.destroy(surface.tree);
        self.arrange_layers(surface.output);
    }

    // ===================== arrangement =====================

    fn layer_surfaces_on(&self, output: OutputId, layer: Layer) -> Vec<LayerId> {
        self.layer_order
            .iter()
            .copied()
            .filter(|id| {
                self.layer_surfaces
                    .get(id)
                    .map(|s| s.output == output && s.layer == layer)
                    .unwrap_or(false)
            })
            .collect()
    }

    fn arrange_surface(
        &mut self,
        id: LayerId,
        full_area: Rect,
        usable_area: &mut Rect,
        exclusive: bool,
    ) {
        let Some(surface) = self.layer_surfaces.get(&id) else {
            return;
        };
        if !surface.initialized {
            return;
        }
        let state = surface.state;
        if (state.exclusive_zone > 0) != exclusive {
            return;
        }

        let bounds = if state.exclusive_zone == -1 {
            full_area
        } else {
            *usable_area
        };
        let (margin_top, margin_right, margin_bottom, margin_left) = state.margin;

        let mut width = state.desired_size.0;
        if width == 0 {
            width = bounds.width - margin_left - margin_right;
        }
        let mut height = state.desired_size.1;
        if height == 0 {
            height = bounds.height - margin_top - margin_bottom;
        }
        width = width.max(1);
        height = height.max(1);

        let anchor = state.anchor;
        let x = if anchor.contains(Anchor::LEFT) && anchor.contains(Anchor::RIGHT) {
            bounds.x + (bounds.width - width) / 2
        } else if anchor.contains(Anchor::LEFT) {
            bounds.x + margin_left
        } else if anchor.contains(Anchor::RIGHT) {
            bounds.x + bounds.width - width - margin_right
        } else {
            bounds.x + (bounds.width - width) / 2
        };
        let y = if anchor.contains(Anchor::TOP) && anchor.contains(Anchor::BOTTOM) {
            bounds.y + (bounds.height - height) / 2
        } else if anchor.contains(Anchor::TOP) {
            bounds.y + margin_top
        } else if anchor.contains(Anchor::BOTTOM) {
            bounds.y + bounds.height - height - margin_bottom
        } else {
            bounds.y + (bounds.height - height) / 2
        };

        // reserve the exclusive zone on the anchored edge
        if state.exclusive_zone > 0 {
            let zone = state.exclusive_zone;
            if anchor.contains(Anchor::TOP) && !anchor.contains(Anchor::BOTTOM) {
                usable_area.y += zone + margin_top;
                usable_area.height -= zone + margin_top;
            } else if anchor.contains(Anchor::BOTTOM) && !anchor.contains(Anchor::TOP) {
                usable_area.height -= zone + margin_bottom;
            } else if anchor.contains(Anchor::LEFT) && !anchor.contains(Anchor::RIGHT) {
                usable_area.x += zone + margin_left;
                usable_area.width -= zone + margin_left;
            } else if anchor.contains(Anchor::RIGHT) && !anchor.contains(Anchor::LEFT) {
                usable_area.width -= zone + margin_right;
            }
        }

        let (tree, buffer) = {
            let s = &self.layer_surfaces[&id];
            (s.tree, s.buffer)
        };
        self.scene.set_position(tree, x, y);
        self.scene.set_buffer_size(buffer, width, height);

        let surface = self.layer_surfaces.get_mut(&id).unwrap();
        if surface.last_configure != Some((width, height)) {
            surface.last_configure = Some((width, height));
            self.push_request(ShellRequest::LayerConfigure {
                layer: id,
                width,
                height,
            });
        }
    }

    /// Arrange every layer surface of an output and recompute the usable
    /// area. Guarded against outputs that died mid-flight.
    pub fn arrange_layers(&mut self, output: OutputId) {
        if !self.output_is_exist(output) {
            return;
        }
        let full_area = {
            let o = &self.outputs[&output];
            Rect::new(0, 0, o.width, o.height)
        };
        let mut usable_area = full_area;

        for exclusive in [true, false] {
            for layer in [Layer::Overlay, Layer::Top, Layer::Bottom, Layer::Background] {
                for id in self.layer_surfaces_on(output, layer) {
                    self.arrange_surface(id, full_area, &mut usable_area, exclusive);
                }
            }
        }

        let changed = self.outputs[&output].usable_area != usable_area;
        if changed {
            self.outputs.get_mut(&output).unwrap().usable_area = usable_area;
            self.output_tiling_layout_update(output, 0);
            self.output_maximized_toplevel_update(output);
        }

        // lazy implementation: just focus the newest exclusive surface
        let exclusive = self.layer_order.iter().copied().find(|id| {
            self.layer_surfaces
                .get(id)
                .map(|s| {
                    s.mapped
                        && s.state.keyboard_interactivity == KeyboardInteractivity::Exclusive
                })
                .unwrap_or(false)
        });
        if let Some(id) = exclusive {
            self.keyboard_focus_layer(id);
            self.seat.exclusive_kbd_interactive = Some(id);
        }
    }

    /// Re-apply maximized geometry after the usable area moved.
    fn output_maximized_toplevel_update(&mut self, output: OutputId) {
        let containers: Vec<ContainerId> = self
            .outputs
            .get(&output)
            .map(|o| o.state.containers.clone())
            .unwrap_or_default();
        for c in containers {
            let maximized = self
                .containers
                .get(&c)
                .map(|x| x.is_maximized())
                .unwrap_or(false);
            if maximized {
                self.container_set_maximized(c, true);
            }
        }
    }
}
