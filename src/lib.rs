#![forbid(unsafe_code)]

//! An XDND (X Drag-and-Drop) protocol engine.
//!
//! [`XdndScreen`] drives both sides of a drag on one X screen. The X connection sits behind
//! [`Backend`]; the `x11` feature provides [`X11Backend`] on top of `x11rb`.

pub mod xdnd;

pub use xdnd::{
    Atom, Backend, ClientMessage, Cursor, DestinationState, DragDestination, DragSource,
    DragViews, NONE, Operation, OperationItem, Payload, SourceState, Timestamp, ViewId, Window,
    WindowFrame, XDND_VERSION, XdndAtoms, XdndOptions, XdndScreen, action_to_operation,
    operation_to_action,
};

#[cfg(feature = "x11")]
pub use xdnd::{X11Backend, X11BackendError};
