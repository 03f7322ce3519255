//! Typed views of the six XDND client messages.
//!
//! `data[0]` is always the sender's window; the remaining four words depend on the kind.

use egui::{Pos2, Rect};

use super::atoms::XdndAtoms;
use super::geometry::{pack_point, pack_size, unpack_point, unpack_rect};
use super::types::{Atom, ClientMessage, NONE, Timestamp, Window};

const ENTER_HAS_TYPE_LIST: u32 = 1 << 0;
const STATUS_ACCEPT: u32 = 1 << 0;
const STATUS_ALWAYS_SEND_POSITION: u32 = 1 << 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct EnterMessage {
    pub(super) source: Window,
    pub(super) version: u8,
    pub(super) has_type_list: bool,
    pub(super) types: [Atom; 3],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct PositionMessage {
    pub(super) source: Window,
    pub(super) point: Pos2,
    pub(super) timestamp: Timestamp,
    pub(super) action: Atom,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct StatusMessage {
    pub(super) destination: Window,
    pub(super) accept: bool,

    /// `None` asks the source to send a position on every move.
    pub(super) no_position_zone: Option<Rect>,
    pub(super) action: Atom,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) enum XdndMessage {
    Enter(EnterMessage),
    Position(PositionMessage),
    Status(StatusMessage),
    Leave { source: Window },
    Drop { source: Window, timestamp: Timestamp },
    Finished { destination: Window },
}

impl XdndMessage {
    /// `None` for client messages that are not part of XDND.
    pub(super) fn decode(atoms: &XdndAtoms, message: &ClientMessage) -> Option<Self> {
        let [sender, d1, d2, d3, d4] = message.data;
        let kind = message.kind;
        if kind == NONE {
            return None;
        }

        let decoded = if kind == atoms.enter {
            Self::Enter(EnterMessage {
                source: sender,
                version: (d1 >> 24) as u8,
                has_type_list: d1 & ENTER_HAS_TYPE_LIST != 0,
                types: [d2, d3, d4],
            })
        } else if kind == atoms.position {
            Self::Position(PositionMessage {
                source: sender,
                point: unpack_point(d2),
                timestamp: d3,
                action: d4,
            })
        } else if kind == atoms.status {
            Self::Status(StatusMessage {
                destination: sender,
                accept: d1 & STATUS_ACCEPT != 0,
                no_position_zone: (d1 & STATUS_ALWAYS_SEND_POSITION == 0)
                    .then(|| unpack_rect(d2, d3)),
                action: d4,
            })
        } else if kind == atoms.leave {
            Self::Leave { source: sender }
        } else if kind == atoms.drop {
            Self::Drop {
                source: sender,
                timestamp: d2,
            }
        } else if kind == atoms.finished {
            Self::Finished {
                destination: sender,
            }
        } else {
            return None;
        };
        Some(decoded)
    }

    /// Message type, sender window and `data[1..5]`.
    pub(super) fn encode(&self, atoms: &XdndAtoms) -> (Atom, Window, [u32; 4]) {
        match *self {
            Self::Enter(enter) => {
                let flags = if enter.has_type_list {
                    ENTER_HAS_TYPE_LIST
                } else {
                    0
                };
                let [t0, t1, t2] = enter.types;
                (
                    atoms.enter,
                    enter.source,
                    [(u32::from(enter.version) << 24) | flags, t0, t1, t2],
                )
            }
            Self::Position(position) => (
                atoms.position,
                position.source,
                [0, pack_point(position.point), position.timestamp, position.action],
            ),
            Self::Status(status) => {
                let mut flags = 0;
                if status.accept {
                    flags |= STATUS_ACCEPT;
                }
                let (position, size) = if let Some(zone) = status.no_position_zone {
                    (pack_point(zone.min), pack_size(zone.size()))
                } else {
                    flags |= STATUS_ALWAYS_SEND_POSITION;
                    (0, 0)
                };
                (
                    atoms.status,
                    status.destination,
                    [flags, position, size, status.action],
                )
            }
            Self::Leave { source } => (atoms.leave, source, [0; 4]),
            Self::Drop { source, timestamp } => (atoms.drop, source, [0, timestamp, 0, 0]),
            Self::Finished { destination } => (atoms.finished, destination, [0; 4]),
        }
    }

    pub(super) fn name(&self) -> &'static str {
        match self {
            Self::Enter(_) => "XdndEnter",
            Self::Position(_) => "XdndPosition",
            Self::Status(_) => "XdndStatus",
            Self::Leave { .. } => "XdndLeave",
            Self::Drop { .. } => "XdndDrop",
            Self::Finished { .. } => "XdndFinished",
        }
    }
}
