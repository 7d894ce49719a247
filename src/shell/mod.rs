//! The wire-protocol boundary.
//!
//! The protocol server itself is an external collaborator: it decodes the
//! wire, owns client resources, and calls into the compositor with typed
//! events. The compositor answers through [`ShellRequest`] records drained
//! from an outbox each dispatch. All cross-boundary identity is carried by
//! small id handles; nothing here holds a client resource.

pub mod layer;
pub mod lock;
pub mod toplevel;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub use layer::{KeyboardInteractivity, Layer, LayerSurface};
pub use lock::SessionLockManager;
pub use toplevel::{Popup, RequestedState, Toplevel, ToplevelKind};

use crate::utils::Rect;

/// Handle to a client toplevel surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToplevelId(pub(crate) u64);

/// Handle to a layer-shell surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub(crate) u64);

/// Handle to an XDG popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PopupId(pub(crate) u64);

/// Handle to a pointer constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(pub(crate) u64);

bitflags! {
    /// Resize / tiling edges.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Edges: u32 {
        const TOP = 1 << 0;
        const BOTTOM = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
    }
}

impl Edges {
    pub const ALL: Edges = Edges::TOP
        .union(Edges::BOTTOM)
        .union(Edges::LEFT)
        .union(Edges::RIGHT);
}

/// Server-side decoration policy answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationMode {
    ClientSide,
    ServerSide,
}

/// What the compositor asks of clients and the backend.
///
/// Requests accumulate in the server outbox; the embedder drains and
/// executes them after every handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellRequest {
    /// Ask a toplevel to take a new surface size.
    Configure {
        toplevel: ToplevelId,
        width: i32,
        height: i32,
    },
    /// Position + size configure for legacy-X11 surfaces.
    LegacyConfigure {
        toplevel: ToplevelId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    SetActivated {
        toplevel: ToplevelId,
        activated: bool,
    },
    SetFullscreen {
        toplevel: ToplevelId,
        set: bool,
    },
    SetMaximized {
        toplevel: ToplevelId,
        set: bool,
    },
    SetSuspended {
        toplevel: ToplevelId,
        set: bool,
    },
    SetTiled {
        toplevel: ToplevelId,
        edges: Edges,
    },
    SetResizing {
        toplevel: ToplevelId,
        set: bool,
    },
    SetDecorationMode {
        toplevel: ToplevelId,
        server_side: bool,
    },
    Close {
        toplevel: ToplevelId,
    },
    /// Forcibly disconnect the owning client.
    Kill {
        toplevel: ToplevelId,
    },
    /// Destroy a protocol resource after client misuse.
    DestroyResource {
        description: &'static str,
    },
    LayerConfigure {
        layer: LayerId,
        width: i32,
        height: i32,
    },
    LockConfigure {
        width: i32,
        height: i32,
    },
    LockSendLocked,
    PopupConfigure {
        popup: PopupId,
        unconstrain: Rect,
    },
    ForwardKey {
        keycode: u32,
        pressed: bool,
    },
    ForwardButton {
        button: u32,
        pressed: bool,
    },
    ForwardAxis {
        horizontal: bool,
        delta: f64,
    },
    SetCursorShape {
        name: String,
    },
    SetRepeatInfo {
        rate: i32,
        delay: i32,
    },
    SwitchVt {
        vt: u32,
    },
    NotifyIdleActivity,
}

/// Description of a freshly created toplevel resource.
#[derive(Debug, Clone)]
pub struct ToplevelDesc {
    pub kind: ToplevelKind,
    pub app_id: String,
    pub title: String,
    pub parent: Option<ToplevelId>,
    pub min_size: (i32, i32),
    pub max_size: (i32, i32),
}

impl Default for ToplevelDesc {
    fn default() -> Self {
        Self {
            kind: ToplevelKind::Native,
            app_id: String::new(),
            title: String::new(),
            parent: None,
            min_size: (0, 0),
            max_size: (0, 0),
        }
    }
}
