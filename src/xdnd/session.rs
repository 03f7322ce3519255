use egui::{Pos2, Rect, Vec2};

use super::types::{Atom, Cursor, NONE, Payload, Timestamp, ViewId, Window};

/// Where the destination side of a session stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DestinationState {
    Idle,
    WaitEnter,
    InspectDropData,
    DropAllowed,
    DropNotAllowed,
    WaitForDropData,
}

/// Where the source side of a session stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceState {
    Idle,
    DropAllowed,
    FinishDrop,
}

/// Per-screen drag state. At most one drag is outgoing and one incoming at a time.
#[derive(Debug)]
pub(super) struct DragSession {
    pub(super) protocol_version: u8,
    pub(super) timestamp: Timestamp,
    pub(super) source_action: Atom,
    pub(super) destination_action: Atom,
    pub(super) source: Option<SourceInfo>,
    pub(super) dest: Option<DestInfo>,
    next_id: u64,
}

impl Default for DragSession {
    fn default() -> Self {
        Self {
            protocol_version: 0,
            timestamp: 0,
            source_action: NONE,
            destination_action: NONE,
            source: None,
            dest: None,
            next_id: 1,
        }
    }
}

impl DragSession {
    pub(super) fn next_session_id(&mut self) -> u64 {
        let id = self.next_id.max(1);
        self.next_id = id.saturating_add(1);
        id
    }
}

/// An outgoing drag, from the press that may start it until it ends.
#[derive(Debug)]
pub(super) struct SourceInfo {
    pub(super) id: u64,
    pub(super) view: ViewId,
    pub(super) press_point: Pos2,
    pub(super) started: bool,
    pub(super) state: SourceState,

    /// Current target window, if the pointer is over an XDND-aware window.
    pub(super) destination: Option<Window>,
    pub(super) no_position_zone: Option<Rect>,
    pub(super) first_types: [Atom; 3],

    pub(super) icon: Option<Window>,
    pub(super) icon_pos: Pos2,
    pub(super) pointer_offset: Vec2,
    pub(super) cursor: Option<Cursor>,
}

impl SourceInfo {
    pub(super) fn new(id: u64, view: ViewId, press_point: Pos2) -> Self {
        Self {
            id,
            view,
            press_point,
            started: false,
            state: SourceState::Idle,
            destination: None,
            no_position_zone: None,
            first_types: [NONE; 3],
            icon: None,
            icon_pos: press_point,
            pointer_offset: Vec2::ZERO,
            cursor: None,
        }
    }
}

/// An incoming drag, from the first `XdndEnter`/`XdndPosition` until the session ends.
#[derive(Debug)]
pub(super) struct DestInfo {
    pub(super) id: u64,
    pub(super) state: DestinationState,

    /// View under the pointer.
    pub(super) view: ViewId,

    /// Top-level view that received the messages; its window is the one that answers.
    pub(super) aware_view: ViewId,
    pub(super) source_window: Window,
    pub(super) source_action_changed: bool,
    pub(super) source_types: Option<Vec<String>>,

    /// The source flagged more than three types in `XdndEnter`; not yet fetched.
    pub(super) type_list_available: bool,
    pub(super) required_types: Option<Vec<String>>,
    pub(super) drop_data: Option<DropSlots>,
    pub(super) last_position: Option<Pos2>,

    /// Our last status to the source accepted the drop.
    pub(super) allow_outstanding: bool,
}

impl DestInfo {
    pub(super) fn new(id: u64, view: ViewId, aware_view: ViewId, source_window: Window) -> Self {
        Self {
            id,
            state: DestinationState::Idle,
            view,
            aware_view,
            source_window,
            source_action_changed: false,
            source_types: None,
            type_list_available: false,
            required_types: None,
            drop_data: None,
            last_position: None,
            allow_outstanding: false,
        }
    }

    pub(super) fn forget_negotiated_data(&mut self) {
        self.required_types = None;
        self.drop_data = None;
    }
}

/// One slot per required type, filled in order as selection answers arrive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(super) struct DropSlots {
    payloads: Vec<Option<Payload>>,
    next: usize,
}

impl DropSlots {
    pub(super) fn sized(len: usize) -> Self {
        Self {
            payloads: vec![None; len],
            next: 0,
        }
    }

    /// Index of the next type still to be requested or awaited.
    pub(super) fn next_pending(&self) -> Option<usize> {
        (self.next < self.payloads.len()).then_some(self.next)
    }

    /// Fills the pending slot. `false` if every slot is already settled.
    pub(super) fn store(&mut self, payload: Option<Payload>) -> bool {
        let Some(slot) = self.payloads.get_mut(self.next) else {
            return false;
        };
        *slot = payload;
        self.next += 1;
        true
    }

    pub(super) fn skip(&mut self) {
        if self.next < self.payloads.len() {
            self.next += 1;
        }
    }

    pub(super) fn payloads(&self) -> &[Option<Payload>] {
        &self.payloads
    }
}
