use egui::Rect;

/// X11 window id.
pub type Window = u32;

/// X11 atom id.
pub type Atom = u32;

/// X11 cursor id.
pub type Cursor = u32;

/// X11 server timestamp.
pub type Timestamp = u32;

/// Identifies a view (widget) of the host application's own widget tree.
pub type ViewId = u64;

/// Bytes of one retrieved drop payload.
pub type Payload = Vec<u8>;

/// The X11 `None` resource / atom.
pub const NONE: u32 = 0;

/// A format-32 `ClientMessage` as seen on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientMessage {
    /// Window the message is addressed to.
    pub window: Window,

    /// Message type atom (`XdndEnter`, `XdndStatus`, ...).
    pub kind: Atom,

    pub data: [u32; 5],
}

/// Geometry and map state of a window, in root coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowFrame {
    pub rect: Rect,
    pub viewable: bool,
}

/// The peer window is gone (liveness check or delivery failed).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct PeerVanished;
