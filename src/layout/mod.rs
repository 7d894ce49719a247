//! Layout engines and dispatch.
//!
//! A workspace is either free-floating, master/stack arranged, or governed
//! by a binary space partition. The dispatcher below runs after anything
//! that can change what is tileable: map/unmap, move-to-tag, state changes,
//! mwfact/gap writes, strategy changes, usable-area changes and view
//! switches.

pub mod bsp;
pub mod master;

use serde::{Deserialize, Serialize};

use crate::output::OutputId;
use crate::Server;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    Floating,
    Master,
    Bsp,
}

impl Server {
    /// Run the active layout engine. `view == 0` targets the current
    /// workspace.
    pub fn output_tiling_layout_update(&mut self, output: OutputId, view: usize) {
        let Some(info) = self.output_current_view_info(output) else {
            return;
        };
        let mode = info.layout_mode;

        let view = if view == 0 {
            self.outputs
                .get(&output)
                .map(|o| o.state.active_workspace)
                .unwrap_or(0)
        } else {
            view
        };

        match mode {
            LayoutMode::Bsp => self.bsp_update_root(output, view),
            LayoutMode::Master => self.master_arrange_update(output),
            LayoutMode::Floating => {}
        }
    }
}
