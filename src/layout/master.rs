//! Master/stack layout strategies.
//!
//! Strategies are registered in a plain indexed list; each workspace keeps a
//! cursor into it. Strategies arrange the front toplevels of the currently
//! tileable containers and must go through `container_set_size` /
//! `container_set_position_gap`, never edit toplevel surfaces directly.

use tracing::debug;

use crate::output::{MasterState, OutputId};
use crate::shell::ToplevelId;
use crate::Server;

pub type ArrangeFn = fn(&mut Server, &[ToplevelId], OutputId, MasterState);

pub struct MasterStrategy {
    pub name: &'static str,
    pub arrange: ArrangeFn,
}

/// The built-in strategy list; `tile` is the default.
pub fn builtin_strategies() -> Vec<MasterStrategy> {
    vec![
        MasterStrategy {
            name: "tile",
            arrange: arrange_tile,
        },
        MasterStrategy {
            name: "monocle",
            arrange: arrange_monocle,
        },
    ]
}

/// Monocle without gaps, positioned at the output origin instead of the
/// usable area. Registered as an extra strategy at startup.
pub fn fullscreen_strategy() -> MasterStrategy {
    MasterStrategy {
        name: "fullscreen",
        arrange: arrange_fullscreen,
    }
}

fn arrange_tile(
    server: &mut Server,
    toplevels: &[ToplevelId],
    output: OutputId,
    state: MasterState,
) {
    let Some(usable_area) = server.outputs.get(&output).map(|o| o.usable_area) else {
        return;
    };
    let containers: Vec<_> = toplevels
        .iter()
        .filter_map(|t| server.toplevels.get(t).and_then(|x| x.container))
        .collect();
    let len = containers.len();
    if len == 0 {
        return;
    }

    if len == 1 {
        server.container_set_size(containers[0], usable_area.width, usable_area.height);
        server.container_set_position_gap(containers[0], usable_area.x, usable_area.y);
        return;
    }

    // TODO: account master count and column count
    let master_width = (usable_area.width as f64 * state.mwfact) as i32;
    let sec_width = usable_area.width - master_width;

    server.container_set_size(containers[0], master_width, usable_area.height);
    server.container_set_position_gap(containers[0], usable_area.x, usable_area.y);

    let sec_count = (len as i32 - state.master_count).max(1);
    let sec_height = usable_area.height / sec_count;

    let mut height_used = 0;
    for &container in containers.iter().take(len - 1).skip(1) {
        server.container_set_size(container, sec_width, sec_height);
        server.container_set_position_gap(container, master_width, height_used + usable_area.y);
        height_used += sec_height;
    }

    // the last row absorbs the rounding remainder
    server.container_set_size(
        containers[len - 1],
        sec_width,
        usable_area.height - height_used,
    );
    server.container_set_position_gap(
        containers[len - 1],
        master_width,
        height_used + usable_area.y,
    );
}

fn arrange_monocle(
    server: &mut Server,
    toplevels: &[ToplevelId],
    output: OutputId,
    _state: MasterState,
) {
    let Some(usable_area) = server.outputs.get(&output).map(|o| o.usable_area) else {
        return;
    };
    for t in toplevels {
        let Some(container) = server.toplevels.get(t).and_then(|x| x.container) else {
            continue;
        };
        server.container_set_position_gap(container, usable_area.x, usable_area.y);
        server.container_set_size(container, usable_area.width, usable_area.height);
    }
}

fn arrange_fullscreen(
    server: &mut Server,
    toplevels: &[ToplevelId],
    output: OutputId,
    _state: MasterState,
) {
    let Some((width, height)) = server.outputs.get(&output).map(|o| (o.width, o.height)) else {
        return;
    };
    for &t in toplevels {
        server.toplevel_set_position(t, 0, 0);
        server.toplevel_set_size_surface(t, width, height);
    }
}

impl Server {
    pub fn master_register_strategy(&mut self, strategy: MasterStrategy) {
        debug!("registering master strategy {}", strategy.name);
        self.master_registry.push(strategy);
    }

    /// Unregister by name; workspace cursors pointing past the end are
    /// clamped at arrange time.
    pub fn master_unregister_strategy(&mut self, name: &str) {
        self.master_registry.retain(|s| s.name != name);
    }

    /// Arrange the current workspace if it is in master mode.
    pub fn master_arrange_update(&mut self, output: OutputId) {
        let Some(info) = self.output_current_view_info(output) else {
            return;
        };
        if info.layout_mode != crate::layout::LayoutMode::Master {
            return;
        }
        let mut state = info.master;

        let containers: Vec<_> = self
            .outputs
            .get(&output)
            .map(|o| o.state.containers.clone())
            .unwrap_or_default();
        let mut tiled_visible: Vec<ToplevelId> = Vec::new();
        for container in containers {
            if let Some(front) = self.container_front_toplevel(container) {
                if self.toplevel_is_tileable(front) {
                    tiled_visible.push(front);
                }
            }
        }
        if tiled_visible.is_empty() {
            return;
        }

        if state.strategy >= self.master_registry.len() {
            state.strategy = 0;
        }
        let Some(strategy) = self.master_registry.get(state.strategy) else {
            return;
        };
        (strategy.arrange)(self, &tiled_visible, output, state);
    }

    /// The master is the first tileable toplevel in the output order.
    pub fn master_get_master(&self, output: OutputId) -> Option<ToplevelId> {
        let toplevels = self.outputs.get(&output)?.state.toplevels.clone();
        toplevels
            .into_iter()
            .find(|&t| self.toplevel_is_tileable(t))
    }

    /// Promote a toplevel to the head of the tiling order.
    pub fn master_set_master(&mut self, toplevel: ToplevelId) {
        let Some(output) = self
            .toplevels
            .get(&toplevel)
            .and_then(|t| t.container)
            .and_then(|c| self.containers.get(&c))
            .map(|c| c.output)
        else {
            return;
        };
        let Some(master) = self.master_get_master(output) else {
            return;
        };
        if master == toplevel {
            return;
        }

        if let Some(o) = self.outputs.get_mut(&output) {
            let a = o.state.toplevels.iter().position(|&t| t == toplevel);
            let b = o.state.toplevels.iter().position(|&t| t == master);
            if let (Some(a), Some(b)) = (a, b) {
                o.state.toplevels.swap(a, b);
            }
        }

        self.master_arrange_update(output);
    }
}
