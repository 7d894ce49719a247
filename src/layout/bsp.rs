//! Binary space partition layout.
//!
//! One tree per workspace. Internal nodes split their rectangle vertically
//! or horizontally by `left_wfact`; leaves hold a container. Disabled nodes
//! (floating, minimized, fullscreen members) lend their area to the enabled
//! sibling until they come back.

use tracing::warn;

use crate::container::{ContainerId, ContainerState};
use crate::output::OutputId;
use crate::utils::Rect;
use crate::Server;

/// Handle to a BSP node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BspNodeId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BspSplit {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy)]
pub enum BspNodeKind {
    Internal {
        split: BspSplit,
        /// Area factor of the left child, in (0, 1).
        left_wfact: f64,
        left: BspNodeId,
        right: BspNodeId,
    },
    Leaf {
        container: ContainerId,
    },
}

#[derive(Debug)]
pub struct BspNode {
    /// `None` indicates the root.
    pub parent: Option<BspNodeId>,
    pub kind: BspNodeKind,
    pub enabled: bool,
    /// Area occupied by this node, in local layout coordinates.
    pub rect: Rect,
}

impl BspNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, BspNodeKind::Leaf { .. })
    }

    pub fn leaf_container(&self) -> Option<ContainerId> {
        match self.kind {
            BspNodeKind::Leaf { container } => Some(container),
            _ => None,
        }
    }
}

impl Server {
    fn bsp_alloc(&mut self, node: BspNode) -> BspNodeId {
        let id = BspNodeId(self.alloc_id());
        self.bsp_nodes.insert(id, node);
        id
    }

    pub fn bsp_get_root(&self, node: BspNodeId) -> BspNodeId {
        match self.bsp_nodes[&node].parent {
            Some(parent) => self.bsp_get_root(parent),
            None => node,
        }
    }

    fn bsp_node_sibling(&self, parent: BspNodeId, me: BspNodeId) -> Option<BspNodeId> {
        match self.bsp_nodes[&parent].kind {
            BspNodeKind::Internal { left, right, .. } => {
                Some(if left == me { right } else { left })
            }
            BspNodeKind::Leaf { .. } => None,
        }
    }

    /// Descend to a leaf, leftmost or rightmost.
    fn bsp_node_leaf_get(&self, node: BspNodeId, to_left: bool) -> BspNodeId {
        match self.bsp_nodes[&node].kind {
            BspNodeKind::Leaf { .. } => node,
            BspNodeKind::Internal { left, right, .. } => {
                self.bsp_node_leaf_get(if to_left { left } else { right }, to_left)
            }
        }
    }

    /// The leaf the removed node's area falls back to.
    fn bsp_find_closest_leaf_sibling(&self, me: BspNodeId) -> Option<BspNodeId> {
        let parent = self.bsp_nodes[&me].parent?;
        match self.bsp_nodes[&parent].kind {
            BspNodeKind::Internal { left, right, .. } => Some(if right == me {
                self.bsp_node_leaf_get(left, false)
            } else {
                self.bsp_node_leaf_get(right, true)
            }),
            BspNodeKind::Leaf { .. } => None,
        }
    }

    fn bsp_node_leaf_configure(&mut self, node: BspNodeId, x: i32, y: i32, w: i32, h: i32) {
        let Some(container) = self.bsp_nodes[&node].leaf_container() else {
            return;
        };
        let allowed = self
            .containers
            .get(&container)
            .map(|c| c.is_configure_allowed())
            .unwrap_or(false);
        if !allowed {
            return;
        }

        // size first so the floating box doesn't record the new position
        if !self.container_is_floating(container) {
            self.container_set_size(container, w, h);
            self.container_set_position_gap(container, x, y);
        }

        self.bsp_nodes.get_mut(&node).unwrap().rect = Rect::new(x, y, w, h);
    }

    /// Recursive rectangle assignment below an internal node.
    pub fn bsp_update_node(&mut self, parent: BspNodeId) {
        let parent_rect = self.bsp_nodes[&parent].rect;
        let (split, left_wfact, left, right) = match self.bsp_nodes[&parent].kind {
            BspNodeKind::Internal {
                split,
                left_wfact,
                left,
                right,
            } => (split, left_wfact, left, right),
            BspNodeKind::Leaf { .. } => return,
        };

        let (px, py, pw, ph) = (
            parent_rect.x,
            parent_rect.y,
            parent_rect.width,
            parent_rect.height,
        );

        let (mut lw, mut lh, mut rx, mut ry, mut rw, mut rh);
        match split {
            BspSplit::Vertical => {
                lw = (pw as f64 * left_wfact) as i32;
                lh = ph;
                rw = pw - lw;
                rh = ph;
                rx = px + lw;
                ry = py;
            }
            BspSplit::Horizontal => {
                lw = pw;
                lh = (ph as f64 * left_wfact) as i32;
                rw = pw;
                rh = ph - lh;
                rx = px;
                ry = py + lh;
            }
        }

        let left_enabled = self.bsp_nodes[&left].enabled;
        let right_enabled = self.bsp_nodes[&right].enabled;

        if !right_enabled {
            lw = pw;
            lh = ph;
        }

        if left_enabled {
            if self.bsp_nodes[&left].is_leaf() {
                self.bsp_node_leaf_configure(left, px, py, lw, lh);
            } else {
                self.bsp_nodes.get_mut(&left).unwrap().rect = Rect::new(px, py, lw, lh);
                self.bsp_update_node(left);
            }
        } else {
            rx = px;
            ry = py;
            rw = pw;
            rh = ph;
        }

        if right_enabled {
            if self.bsp_nodes[&right].is_leaf() {
                self.bsp_node_leaf_configure(right, rx, ry, rw, rh);
            } else {
                self.bsp_nodes.get_mut(&right).unwrap().rect = Rect::new(rx, ry, rw, rh);
                self.bsp_update_node(right);
            }
        }
    }

    /// Reassign the whole workspace tree from the output's usable area.
    pub fn bsp_update_root(&mut self, output: OutputId, workspace: usize) {
        let Some(root) = self
            .outputs
            .get(&output)
            .and_then(|o| o.state.view_info.get(workspace))
            .and_then(|info| info.bsp.root)
        else {
            return;
        };
        let Some(usable_area) = self.outputs.get(&output).map(|o| o.usable_area) else {
            return;
        };

        if self.bsp_nodes[&root].is_leaf() {
            self.bsp_node_leaf_configure(
                root,
                usable_area.x,
                usable_area.y,
                usable_area.width,
                usable_area.height,
            );
            return;
        }

        self.bsp_nodes.get_mut(&root).unwrap().rect = usable_area;
        self.bsp_update_node(root);
    }

    fn bsp_output_of(&self, node: BspNodeId) -> Option<OutputId> {
        let root = self.bsp_get_root(node);
        let leaf = self.bsp_node_leaf_get(root, true);
        let container = self.bsp_nodes[&leaf].leaf_container()?;
        self.containers.get(&container).map(|c| c.output)
    }

    /// Enable a node and every ancestor, then re-arrange from the root.
    pub fn bsp_node_enable(&mut self, node: BspNodeId) {
        let mut cursor = node;
        loop {
            self.bsp_nodes.get_mut(&cursor).unwrap().enabled = true;
            match self.bsp_nodes[&cursor].parent {
                Some(parent) => cursor = parent,
                None => break,
            }
        }

        let root = cursor;
        if self.bsp_nodes[&root].is_leaf() {
            if let Some(output) = self.bsp_output_of(root) {
                let workspace = self
                    .outputs
                    .get(&output)
                    .map(|o| o.state.active_workspace)
                    .unwrap_or(0);
                self.bsp_update_root(output, workspace);
            }
        } else {
            self.bsp_update_node(root);
        }
    }

    /// Disable a node, cascading upward while a parent has no enabled child,
    /// then re-arrange the nearest still-enabled ancestor.
    pub fn bsp_node_disable(&mut self, node: BspNodeId) {
        let mut last = node;
        loop {
            self.bsp_nodes.get_mut(&last).unwrap().enabled = false;
            let Some(parent) = self.bsp_nodes[&last].parent else {
                break;
            };
            let any_enabled = match self.bsp_nodes[&parent].kind {
                BspNodeKind::Internal { left, right, .. } => {
                    self.bsp_nodes[&left].enabled || self.bsp_nodes[&right].enabled
                }
                BspNodeKind::Leaf { .. } => false,
            };
            if any_enabled {
                break;
            }
            last = parent;
        }

        if !self.bsp_nodes[&last].is_leaf() {
            if let Some(parent) = self.bsp_nodes[&last].parent {
                self.bsp_update_node(parent);
            }
        } else if let Some(output) = self.bsp_output_of(last) {
            let workspace = self
                .outputs
                .get(&output)
                .map(|o| o.state.active_workspace)
                .unwrap_or(0);
            self.bsp_update_root(output, workspace);
        }
    }

    /// Remember which leaf receives the next insertion split.
    pub fn bsp_last_focused_update(&mut self, container: ContainerId) {
        let Some((output, workspace)) = self
            .containers
            .get(&container)
            .map(|c| (c.output, c.workspace))
        else {
            return;
        };
        let Some(o) = self.outputs.get_mut(&output) else {
            return;
        };
        let Some(info) = o.state.view_info.get_mut(workspace) else {
            return;
        };
        if info.bsp.root.is_some() {
            info.bsp.last_focused = Some(container);
        }
    }

    /// Split the last-focused leaf to make room for a new container.
    pub fn bsp_insert_container(&mut self, new: ContainerId, workspace: usize) {
        let Some(c) = self.containers.get(&new) else {
            return;
        };
        debug_assert!(c.bsp_node.is_none(), "container already has a bsp node");
        let output = c.output;
        self.containers.get_mut(&new).unwrap().state &= !ContainerState::FLOATING;

        let root = self
            .outputs
            .get(&output)
            .and_then(|o| o.state.view_info.get(workspace))
            .and_then(|info| info.bsp.root);

        match root {
            None => {
                let leaf = self.bsp_alloc(BspNode {
                    parent: None,
                    kind: BspNodeKind::Leaf { container: new },
                    enabled: true,
                    rect: Rect::default(),
                });
                self.containers.get_mut(&new).unwrap().bsp_node = Some(leaf);
                if let Some(info) = self
                    .outputs
                    .get_mut(&output)
                    .and_then(|o| o.state.view_info.get_mut(workspace))
                {
                    info.bsp.root = Some(leaf);
                }
                self.bsp_update_root(output, workspace);
            }
            Some(root) => {
                let sibling = self
                    .outputs
                    .get(&output)
                    .and_then(|o| o.state.view_info.get(workspace))
                    .and_then(|info| info.bsp.last_focused)
                    .and_then(|c| self.containers.get(&c).and_then(|x| x.bsp_node))
                    .unwrap_or_else(|| self.bsp_node_leaf_get(root, false));
                self.bsp_insert_beside(output, workspace, sibling, new);
            }
        }

        if let Some(info) = self
            .outputs
            .get_mut(&output)
            .and_then(|o| o.state.view_info.get_mut(workspace))
        {
            info.bsp.last_focused = Some(new);
        }
    }

    fn bsp_insert_beside(
        &mut self,
        output: OutputId,
        workspace: usize,
        left: BspNodeId,
        new: ContainerId,
    ) {
        let old_geom = self.bsp_nodes[&left].rect;
        let split = if old_geom.width >= old_geom.height {
            BspSplit::Vertical
        } else {
            BspSplit::Horizontal
        };

        let old_parent = self.bsp_nodes[&left].parent;
        let is_root = self
            .outputs
            .get(&output)
            .and_then(|o| o.state.view_info.get(workspace))
            .and_then(|info| info.bsp.root)
            == Some(left);

        let right = self.bsp_alloc(BspNode {
            parent: None,
            kind: BspNodeKind::Leaf { container: new },
            enabled: true,
            rect: Rect::default(),
        });
        let parent_rect = if is_root {
            self.outputs
                .get(&output)
                .map(|o| o.usable_area)
                .unwrap_or(old_geom)
        } else {
            old_geom
        };
        let parent_node = self.bsp_alloc(BspNode {
            parent: old_parent,
            kind: BspNodeKind::Internal {
                split,
                left_wfact: 0.5,
                left,
                right,
            },
            enabled: true,
            rect: parent_rect,
        });

        self.bsp_nodes.get_mut(&right).unwrap().parent = Some(parent_node);
        self.bsp_nodes.get_mut(&left).unwrap().parent = Some(parent_node);
        self.containers.get_mut(&new).unwrap().bsp_node = Some(right);

        if is_root {
            if let Some(info) = self
                .outputs
                .get_mut(&output)
                .and_then(|o| o.state.view_info.get_mut(workspace))
            {
                info.bsp.root = Some(parent_node);
            }
        } else if let Some(grandparent) = old_parent {
            match &mut self.bsp_nodes.get_mut(&grandparent).unwrap().kind {
                BspNodeKind::Internal {
                    left: gl,
                    right: gr,
                    ..
                } => {
                    if *gl == left {
                        *gl = parent_node;
                    } else if *gr == left {
                        *gr = parent_node;
                    } else {
                        warn!("bsp grandparent does not reference the split sibling");
                    }
                }
                BspNodeKind::Leaf { .. } => warn!("bsp grandparent is a leaf"),
            }
        }

        self.bsp_node_enable(right);
    }

    /// Detach a container's leaf and hand its area to the sibling.
    pub fn bsp_remove_container(&mut self, container: ContainerId) {
        let Some((output, workspace, node)) = self
            .containers
            .get(&container)
            .and_then(|c| c.bsp_node.map(|n| (c.output, c.workspace, n)))
        else {
            return;
        };

        let root = self
            .outputs
            .get(&output)
            .and_then(|o| o.state.view_info.get(workspace))
            .and_then(|info| info.bsp.root);

        // the whole workspace collapses when the root leaf goes
        if Some(node) == root {
            if let Some(info) = self
                .outputs
                .get_mut(&output)
                .and_then(|o| o.state.view_info.get_mut(workspace))
            {
                info.bsp.root = None;
                info.bsp.last_focused = None;
            }
            self.bsp_nodes.remove(&node);
            self.containers.get_mut(&container).unwrap().bsp_node = None;
            self.bsp_update_root(output, workspace);
            return;
        }

        let Some(parent) = self.bsp_nodes[&node].parent else {
            return;
        };
        let Some(sibling) = self.bsp_node_sibling(parent, node) else {
            return;
        };

        let last_focused = self
            .outputs
            .get(&output)
            .and_then(|o| o.state.view_info.get(workspace))
            .and_then(|info| info.bsp.last_focused);
        if last_focused == Some(container) {
            let fallback = self
                .bsp_find_closest_leaf_sibling(node)
                .and_then(|leaf| self.bsp_nodes[&leaf].leaf_container());
            if let Some(info) = self
                .outputs
                .get_mut(&output)
                .and_then(|o| o.state.view_info.get_mut(workspace))
            {
                info.bsp.last_focused = fallback;
            }
        }

        let grandparent = self.bsp_nodes[&parent].parent;
        if Some(parent) == root {
            self.bsp_nodes.get_mut(&sibling).unwrap().parent = None;
            if let Some(info) = self
                .outputs
                .get_mut(&output)
                .and_then(|o| o.state.view_info.get_mut(workspace))
            {
                info.bsp.root = Some(sibling);
            }
        } else if let Some(grandparent) = grandparent {
            match &mut self.bsp_nodes.get_mut(&grandparent).unwrap().kind {
                BspNodeKind::Internal {
                    left: gl,
                    right: gr,
                    ..
                } => {
                    if *gl == parent {
                        *gl = sibling;
                    } else if *gr == parent {
                        *gr = sibling;
                    } else {
                        warn!("bsp grandparent does not reference the removed parent");
                    }
                }
                BspNodeKind::Leaf { .. } => warn!("bsp grandparent is a leaf"),
            }
            self.bsp_nodes.get_mut(&sibling).unwrap().parent = Some(grandparent);
        }

        self.bsp_nodes.remove(&parent);
        self.bsp_nodes.remove(&node);
        self.containers.get_mut(&container).unwrap().bsp_node = None;

        match grandparent {
            Some(grandparent) => self.bsp_update_node(grandparent),
            None => self.bsp_update_root(output, workspace),
        }
    }

    /// Flip the split direction of the leaf's parent.
    pub fn bsp_toggle_split(&mut self, node: BspNodeId) {
        let node = if self.bsp_nodes[&node].is_leaf() {
            match self.bsp_nodes[&node].parent {
                Some(parent) => parent,
                None => return,
            }
        } else {
            node
        };

        if let BspNodeKind::Internal { split, .. } = &mut self.bsp_nodes.get_mut(&node).unwrap().kind
        {
            *split = match *split {
                BspSplit::Vertical => BspSplit::Horizontal,
                BspSplit::Horizontal => BspSplit::Vertical,
            };
        }
        self.bsp_update_node(node);
    }

    /// Debug dump of a workspace tree, one node per line.
    pub fn bsp_dump(&self, output: OutputId, workspace: usize) -> String {
        let root = self
            .outputs
            .get(&output)
            .and_then(|o| o.state.view_info.get(workspace))
            .and_then(|info| info.bsp.root);
        let mut out = String::new();
        if let Some(root) = root {
            self.bsp_dump_node(root, 0, &mut out);
        }
        out
    }

    fn bsp_dump_node(&self, node: BspNodeId, depth: usize, out: &mut String) {
        use std::fmt::Write;
        let data = &self.bsp_nodes[&node];
        let indent = "  ".repeat(depth);
        match data.kind {
            BspNodeKind::Internal {
                split, left_wfact, ..
            } => {
                let dir = match split {
                    BspSplit::Vertical => "vertical",
                    BspSplit::Horizontal => "horizontal",
                };
                let _ = writeln!(
                    out,
                    "{indent}{dir} {:.2} ({}, {}, {}, {})",
                    left_wfact, data.rect.x, data.rect.y, data.rect.width, data.rect.height
                );
            }
            BspNodeKind::Leaf { .. } => {
                let _ = writeln!(
                    out,
                    "{indent}leaf ({}, {}, {}, {})",
                    data.rect.x, data.rect.y, data.rect.width, data.rect.height
                );
            }
        }
        if let BspNodeKind::Internal { left, right, .. } = data.kind {
            self.bsp_dump_node(left, depth + 1, out);
            self.bsp_dump_node(right, depth + 1, out);
        }
    }
}
