//! Test fixture.
//!
//! Stands in for the wire-protocol server: it feeds the compositor typed
//! events the way a backend would and drains the request outbox. The same
//! `Server` type runs in production, only the edges are synthetic.

use crate::config::Config;
use crate::container::ContainerId;
use crate::output::{OutputDesc, OutputId};
use crate::shell::{ShellRequest, ToplevelDesc, ToplevelId};
use crate::utils::Rect;
use crate::Server;

/// A complete compositor environment for tests.
///
/// Starts with no outputs; use [`Fixture::add_output`] to plug virtual
/// displays. The default config has no border and no gaps so geometry
/// assertions read straight off the layout math.
pub struct Fixture {
    pub server: Server,
}

impl Fixture {
    pub fn new() -> Self {
        let config = Config {
            border_width: 0,
            useless_gaps: 0,
            ..Config::default()
        };
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            server: Server::new(config),
        }
    }

    /// Plug a virtual display. Refresh is in mHz; zero means unknown.
    pub fn add_output_with_refresh(&mut self, name: &str, width: i32, height: i32, refresh: i32) -> OutputId {
        self.server
            .handle_new_output(OutputDesc {
                name: name.to_string(),
                width,
                height,
                refresh,
                phys_width: 600,
                phys_height: 340,
                make: "Test".to_string(),
                model: "Virtual".to_string(),
                non_desktop: false,
            })
            .expect("fixture output refused")
    }

    pub fn add_output(&mut self, name: &str, width: i32, height: i32) -> OutputId {
        self.add_output_with_refresh(name, width, height, 60_000)
    }

    pub fn output(&self) -> OutputId {
        self.server.output_order[0]
    }

    /// Run a toplevel through new → initial commit → commit → map.
    pub fn map_toplevel(&mut self, app_id: &str) -> ToplevelId {
        self.map_toplevel_with(ToplevelDesc {
            app_id: app_id.to_string(),
            title: app_id.to_string(),
            ..ToplevelDesc::default()
        })
    }

    pub fn map_toplevel_with(&mut self, desc: ToplevelDesc) -> ToplevelId {
        let id = self.server.handle_new_toplevel(desc);
        self.server.handle_toplevel_initial_commit(id);
        self.server
            .handle_toplevel_commit(id, Rect::new(0, 0, 640, 480));
        self.server.handle_toplevel_map(id);
        id
    }

    pub fn commit(&mut self, toplevel: ToplevelId, width: i32, height: i32) {
        self.server
            .handle_toplevel_commit(toplevel, Rect::new(0, 0, width, height));
    }

    pub fn container_of(&self, toplevel: ToplevelId) -> ContainerId {
        self.server
            .toplevel(toplevel)
            .and_then(|t| t.container)
            .expect("toplevel without container")
    }

    pub fn container_box_of(&self, toplevel: ToplevelId) -> Rect {
        self.server.container_box(self.container_of(toplevel))
    }

    pub fn drain_requests(&mut self) -> Vec<ShellRequest> {
        self.server.drain_requests()
    }

    /// Size configures sent to one toplevel among the drained requests.
    pub fn count_configures(requests: &[ShellRequest], toplevel: ToplevelId) -> usize {
        requests
            .iter()
            .filter(|r| {
                matches!(
                    r,
                    ShellRequest::Configure { toplevel: t, .. }
                    | ShellRequest::LegacyConfigure { toplevel: t, .. } if *t == toplevel
                )
            })
            .count()
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_creation() {
        let fixture = Fixture::new();
        assert!(fixture.server.output_order.is_empty());
    }

    #[test]
    fn add_output() {
        let mut fixture = Fixture::new();
        fixture.add_output("Virtual-1", 1920, 1080);
        assert_eq!(fixture.server.output_order.len(), 1);
        let output = fixture.output();
        assert_eq!(
            fixture.server.output(output).unwrap().usable_area,
            Rect::new(0, 0, 1920, 1080)
        );
    }

    #[test]
    fn extra_outputs_are_ignored() {
        let mut fixture = Fixture::new();
        fixture.add_output("Virtual-1", 1920, 1080);
        let refused = fixture.server.handle_new_output(OutputDesc {
            name: "Virtual-2".to_string(),
            width: 1280,
            height: 720,
            refresh: 0,
            phys_width: 0,
            phys_height: 0,
            make: String::new(),
            model: String::new(),
            non_desktop: false,
        });
        assert!(refused.is_none());
        assert_eq!(fixture.server.output_order.len(), 1);
    }

    #[test]
    fn map_toplevel_creates_container() {
        let mut fixture = Fixture::new();
        fixture.add_output("Virtual-1", 1920, 1080);
        let toplevel = fixture.map_toplevel("foot");
        let container = fixture.container_of(toplevel);
        let output = fixture.output();
        let state = &fixture.server.output(output).unwrap().state;
        assert!(state.containers.contains(&container));
        assert!(state.focus_stack.contains(&container));
        assert!(state.toplevels.contains(&toplevel));
    }
}
