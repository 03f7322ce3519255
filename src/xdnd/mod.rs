//! XDND (X Drag-and-Drop, protocol version 3) for one X screen.
//!
//! [`XdndScreen`] plays both roles of the protocol: it is the *source* for drags started from the
//! application's own views, and the *destination* for drags arriving from other clients.
//! The engine never blocks. It is fed X events (client messages, selection answers, pointer input)
//! and the current [`Instant`], and it calls back into the application through [`DragViews`].
//!
//! A waiting side arms a watchdog; the host event loop should wake up no later than
//! [`XdndScreen::next_deadline`] and call [`XdndScreen::poll_timeouts`].

use std::collections::VecDeque;
use std::time::Instant;

mod atoms;
mod backend;
mod debug;
mod destination;
mod geometry;
mod message;
mod negotiate;
mod operation;
mod options;
mod session;
mod source;
mod transport;
mod types;
mod watchdog;

#[cfg(feature = "x11")]
mod x11;

#[cfg(test)]
mod testing;


pub use atoms::XdndAtoms;
pub use backend::{Backend, DragDestination, DragSource, DragViews};
pub use operation::{Operation, OperationItem, action_to_operation, operation_to_action};
pub use options::{XDND_VERSION, XdndOptions};
pub use session::{DestinationState, SourceState};
pub use types::{Atom, ClientMessage, Cursor, NONE, Payload, Timestamp, ViewId, Window, WindowFrame};

#[cfg(feature = "x11")]
pub use x11::{X11Backend, X11BackendError};

use message::XdndMessage;
use session::DragSession;
use watchdog::Watchdog;

/// Everything a protocol step may touch outside the engine itself.
pub(crate) struct Cx<'a> {
    pub(crate) backend: &'a mut dyn Backend,
    pub(crate) views: &'a mut dyn DragViews,
    pub(crate) now: Instant,
}

impl<'a> Cx<'a> {
    fn new(backend: &'a mut dyn Backend, views: &'a mut dyn DragViews, now: Instant) -> Self {
        Self {
            backend,
            views,
            now,
        }
    }
}

/// The XDND engine of one screen.
pub struct XdndScreen {
    pub options: XdndOptions,

    atoms: XdndAtoms,
    session: DragSession,
    destination_watchdog: Watchdog,
    source_watchdog: Watchdog,

    debug_log: VecDeque<String>,
    debug_log_seq: u64,
}

impl XdndScreen {
    /// Interns the XDND atoms on `backend`.
    pub fn new(backend: &mut dyn Backend, options: XdndOptions) -> Self {
        let atoms = XdndAtoms::intern(backend);
        Self {
            destination_watchdog: Watchdog::default(),
            source_watchdog: Watchdog::default(),
            options,
            atoms,
            session: DragSession::default(),
            debug_log: VecDeque::new(),
            debug_log_seq: 0,
        }
    }

    pub fn atoms(&self) -> &XdndAtoms {
        &self.atoms
    }

    /// Advertises XDND support on a top-level window by writing its `XdndAware` property.
    pub fn register_aware_window(&self, backend: &mut dyn Backend, window: Window) {
        let version = u32::from(self.options.own_version());
        backend.write_atom_list(window, self.atoms.aware, &[version]);
    }

    /// Routes a client message received by the top-level view `toplevel`.
    ///
    /// Returns `false` if the message is not an XDND message.
    pub fn handle_client_message(
        &mut self,
        backend: &mut dyn Backend,
        views: &mut dyn DragViews,
        toplevel: ViewId,
        message: &ClientMessage,
        now: Instant,
    ) -> bool {
        let Some(decoded) = XdndMessage::decode(&self.atoms, message) else {
            return false;
        };
        log::trace!("received {} for view {toplevel}", decoded.name());

        let mut cx = Cx::new(backend, views, now);
        match decoded {
            XdndMessage::Enter(enter) => self.destination_enter(&mut cx, toplevel, &enter),
            XdndMessage::Position(position) => {
                self.destination_position(&mut cx, toplevel, &position);
            }
            XdndMessage::Drop { timestamp, .. } => self.destination_drop(&mut cx, timestamp),
            XdndMessage::Leave { source } => self.destination_leave(&mut cx, source),
            XdndMessage::Status(status) => self.source_status(&mut cx, &status),
            XdndMessage::Finished { destination } => self.source_finished(&mut cx, destination),
        }
        true
    }

    /// Fires whichever watchdogs are due at `now`.
    pub fn poll_timeouts(
        &mut self,
        backend: &mut dyn Backend,
        views: &mut dyn DragViews,
        now: Instant,
    ) {
        let mut cx = Cx::new(backend, views, now);
        if self.destination_watchdog.expire(now) {
            self.destination_timed_out(&mut cx);
        }
        if self.source_watchdog.expire(now) {
            self.source_timed_out(&mut cx);
        }
    }

    /// The earliest pending watchdog deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (
            self.destination_watchdog.deadline(),
            self.source_watchdog.deadline(),
        ) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn destination_state(&self) -> Option<DestinationState> {
        self.session.dest.as_ref().map(|dest| dest.state)
    }

    pub fn source_state(&self) -> Option<SourceState> {
        self.session
            .source
            .as_ref()
            .filter(|source| source.started)
            .map(|source| source.state)
    }

    /// The protocol version negotiated for the current drag.
    pub fn protocol_version(&self) -> u8 {
        self.session.protocol_version
    }
}
