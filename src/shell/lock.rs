//! Session lock.
//!
//! One locker at a time. While locked, keyboard focus is pinned to the lock
//! surface and keybinding dispatch is suppressed; unlocking refocuses the
//! most recently focused visible toplevel on the output that carried the
//! lock surface.

use tracing::debug;

use crate::output::OutputId;
use crate::scene::{NodeId, SceneOwner};
use crate::shell::ShellRequest;
use crate::Server;

#[derive(Debug)]
pub struct Locker {
    pub output: OutputId,
    pub surface_tree: NodeId,
}

#[derive(Debug, Default)]
pub struct SessionLockManager {
    pub locked: bool,
    pub locker: Option<Locker>,
}

impl Server {
    /// A client asked for a session lock. A second lock while one is held is
    /// protocol misuse and gets its resource destroyed.
    pub fn handle_new_lock(&mut self) -> bool {
        if self.session_lock.locked {
            debug!("refusing second session lock");
            self.push_request(ShellRequest::DestroyResource {
                description: "session lock already held",
            });
            return false;
        }
        true
    }

    /// The locker committed its lock surface for an output.
    pub fn handle_lock_new_surface(&mut self, output: OutputId) {
        if self.session_lock.locked {
            self.push_request(ShellRequest::DestroyResource {
                description: "lock surface on an already locked session",
            });
            return;
        }

        let tree = self
            .scene
            .create_tree(self.layers.session_lock, SceneOwner::Empty);
        let (width, height) = self
            .outputs
            .get(&output)
            .map(|o| (o.width, o.height))
            .unwrap_or((0, 0));
        self.push_request(ShellRequest::LockConfigure { width, height });

        self.session_lock.locked = true;
        self.session_lock.locker = Some(Locker {
            output,
            surface_tree: tree,
        });
        self.push_request(ShellRequest::LockSendLocked);
        self.keyboard_focus_lock_surface();
        debug!("session locked on output {:?}", output);
    }

    pub fn handle_unlock(&mut self) {
        if !self.session_lock.locked {
            return;
        }
        self.session_lock.locked = false;
        let locker = self.session_lock.locker.take();
        let output = locker
            .as_ref()
            .map(|l| l.output)
            .or(self.focused_output);
        if let Some(locker) = locker {
            self.scene.destroy(locker.surface_tree);
        }
        debug!("session unlocked");
        if let Some(output) = output {
            self.output_focus_newest_focus_visible_toplevel(output);
        }
    }
}
