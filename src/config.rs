//! Runtime configuration.
//!
//! The scripting host owns the configuration surface; what lands here is the
//! committed value set. A commit diffs against the previous values and pokes
//! the subsystems that care, the same way the per-subsystem commit listeners
//! did in the predecessor design.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::border::Pattern;
use crate::Server;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // client
    pub border_width: i32,
    pub border_color_rotation_degree: i32,
    pub border_color_focus: Pattern,
    pub border_color_normal: Pattern,

    // screen
    pub useless_gaps: i32,

    // pointer
    pub cursor_size: u32,

    // keyboard
    pub repeat_rate: i32,
    pub repeat_delay: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            border_width: 1,
            border_color_rotation_degree: 0,
            border_color_focus: Pattern::solid([0.0, 0.5, 1.0, 1.0]),
            border_color_normal: Pattern::solid([0.27, 0.28, 0.35, 1.0]),
            useless_gaps: 0,
            cursor_size: 24,
            repeat_rate: 25,
            repeat_delay: 200,
        }
    }
}

impl Server {
    /// Commit a new configuration, reacting to what changed.
    pub fn commit_config(&mut self, new: Config) {
        let old = std::mem::replace(&mut self.config, new);

        if old.useless_gaps != self.config.useless_gaps {
            debug!(
                "useless_gaps changed {} -> {}",
                old.useless_gaps, self.config.useless_gaps
            );
            let outputs: Vec<_> = self.output_order.clone();
            for output in outputs {
                self.output_tiling_layout_update_all_general_workspace(output);
            }
        }

        if old.cursor_size != self.config.cursor_size {
            std::env::set_var("XCURSOR_SIZE", self.config.cursor_size.to_string());
        }

        if old.repeat_rate != self.config.repeat_rate
            || old.repeat_delay != self.config.repeat_delay
        {
            self.push_request(crate::shell::ShellRequest::SetRepeatInfo {
                rate: self.config.repeat_rate,
                delay: self.config.repeat_delay,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::shell::ShellRequest;
    use crate::testing::Fixture;

    #[test]
    fn repeat_info_change_is_forwarded() {
        let mut fixture = Fixture::new();
        let mut config = fixture.server.config.clone();
        config.repeat_rate = 40;
        fixture.server.commit_config(config);
        let forwarded = fixture
            .drain_requests()
            .into_iter()
            .any(|r| matches!(r, ShellRequest::SetRepeatInfo { rate: 40, .. }));
        assert!(forwarded);
    }

    #[test]
    fn identical_commit_is_quiet() {
        let mut fixture = Fixture::new();
        let config = fixture.server.config.clone();
        fixture.drain_requests();
        fixture.server.commit_config(config);
        assert!(fixture.drain_requests().is_empty());
    }
}
