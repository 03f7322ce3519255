use egui::Pos2;

use super::message::{EnterMessage, PositionMessage, StatusMessage, XdndMessage};
use super::negotiate;
use super::operation::{Operation, action_to_operation, operation_to_action};
use super::options::MIN_PEER_VERSION;
use super::session::{DestInfo, DestinationState, DropSlots};
use super::transport;
use super::types::{Atom, NONE, Payload, PeerVanished, Timestamp, ViewId, Window};
use super::{Backend, Cx, DragViews, XdndScreen};

use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DestEvent {
    Enter,
    Position,
    Drop,
    DataArrived,
}

enum Flow {
    Next(DestinationState),

    /// `XdndFinished` has been sent; the session is over.
    Finish,
}

type Step = Result<Flow, PeerVanished>;

impl XdndScreen {
    fn begin_destination(&mut self, view: ViewId, aware_view: ViewId, source: Window) -> DestInfo {
        let id = self.session.next_session_id();
        self.debug_log_event(format!(
            "destination START id={id} view={view} source={source}"
        ));
        DestInfo::new(id, view, aware_view, source)
    }

    /// Ends the incoming session: the watchdog goes first, then the view is told.
    fn end_destination(&mut self, cx: &mut Cx<'_>, dest: &DestInfo, reason: &str) {
        self.destination_watchdog.disarm();
        self.session.dest = None;
        if let Some(handler) = cx.views.destination(dest.view) {
            handler.conclude();
        }
        self.debug_log_event(format!("destination END id={} reason={reason}", dest.id));
    }

    pub(super) fn destination_enter(
        &mut self,
        cx: &mut Cx<'_>,
        toplevel: ViewId,
        enter: &EnterMessage,
    ) {
        self.destination_watchdog.disarm();
        let position_seen = self
            .session
            .dest
            .as_ref()
            .is_some_and(|dest| dest.last_position.is_some());

        let mut dest = match self.session.dest.take() {
            Some(dest) => dest,
            None => self.begin_destination(toplevel, toplevel, enter.source),
        };
        dest.aware_view = toplevel;
        dest.source_window = enter.source;
        dest.source_types = Some(negotiate::inline_types(cx.backend, &enter.types));
        dest.type_list_available = enter.has_type_list;
        // A repeated enter after the evaluation keeps what was negotiated for the drop.
        if matches!(
            dest.state,
            DestinationState::Idle | DestinationState::WaitEnter
        ) {
            dest.forget_negotiated_data();
        }
        self.session.protocol_version = enter.version;

        if enter.version < MIN_PEER_VERSION {
            log::warn!("unsupported version {} for XDND enter message", enter.version);
            if self.send_status(cx, &mut dest, NONE).is_err() {
                log::debug!("could not refuse drag from window {}", enter.source);
            }
            self.end_destination(cx, &dest, "unsupported version");
            return;
        }

        self.session.dest = Some(dest);
        if position_seen {
            self.destination_step(cx, DestEvent::Enter);
        }
    }

    pub(super) fn destination_position(
        &mut self,
        cx: &mut Cx<'_>,
        toplevel: ViewId,
        position: &PositionMessage,
    ) {
        self.destination_watchdog.disarm();
        let view = cx.views.view_at(toplevel, position.point);

        let mut dest = match self.session.dest.take() {
            Some(mut dest) if dest.view != view => {
                dest.view = view;
                dest.source_action_changed = false;
                dest.forget_negotiated_data();
                if dest.state != DestinationState::WaitEnter {
                    dest.state = DestinationState::Idle;
                }
                dest
            }
            Some(mut dest) => {
                dest.source_action_changed = self.session.source_action != position.action;
                dest
            }
            None => self.begin_destination(view, toplevel, position.source),
        };
        dest.aware_view = toplevel;
        dest.source_window = position.source;
        dest.last_position = Some(position.point);
        self.session.source_action = position.action;
        self.session.timestamp = position.timestamp;
        self.session.dest = Some(dest);

        self.destination_step(cx, DestEvent::Position);
    }

    pub(super) fn destination_drop(&mut self, cx: &mut Cx<'_>, timestamp: Timestamp) {
        self.destination_watchdog.disarm();
        if self.session.dest.is_none() {
            log::warn!("received XdndDrop without a drag in progress");
            return;
        }
        self.session.timestamp = timestamp;
        self.destination_step(cx, DestEvent::Drop);
    }

    pub(super) fn destination_leave(&mut self, cx: &mut Cx<'_>, source: Window) {
        self.destination_watchdog.disarm();
        let Some(dest) = self.session.dest.take() else {
            return;
        };
        if dest.source_window != source {
            log::debug!("ignoring XdndLeave from window {source}");
            self.session.dest = Some(dest);
            return;
        }
        self.end_destination(cx, &dest, "leave");
    }

    /// Feeds the answer to the outstanding selection request of an incoming drop.
    ///
    /// `None` means the conversion failed; the type's slot stays empty.
    pub fn drop_data_arrived(
        &mut self,
        backend: &mut dyn Backend,
        views: &mut dyn DragViews,
        payload: Option<Payload>,
        now: Instant,
    ) {
        let Some(slots) = self
            .session
            .dest
            .as_mut()
            .and_then(|dest| dest.drop_data.as_mut())
        else {
            log::debug!("ignoring selection data without a pending drop");
            return;
        };
        if !slots.store(payload) {
            log::debug!("ignoring selection data beyond the required types");
            return;
        }

        self.destination_watchdog.disarm();
        let mut cx = Cx::new(backend, views, now);
        self.destination_step(&mut cx, DestEvent::DataArrived);
    }

    pub(super) fn destination_timed_out(&mut self, cx: &mut Cx<'_>) {
        self.destination_watchdog.disarm();
        let Some(mut dest) = self.session.dest.take() else {
            return;
        };
        log::warn!("delay for drag source response expired");
        if dest.allow_outstanding && self.send_status(cx, &mut dest, NONE).is_err() {
            log::debug!("could not withdraw drop permission");
        }
        self.end_destination(cx, &dest, "timeout");
    }

    fn destination_step(&mut self, cx: &mut Cx<'_>, event: DestEvent) {
        let Some(mut dest) = self.session.dest.take() else {
            return;
        };

        let from = dest.state;
        let step = match from {
            DestinationState::Idle => self.dest_idle(cx, &mut dest, event),
            DestinationState::WaitEnter => self.dest_wait_enter(cx, &mut dest, event),
            DestinationState::InspectDropData => self.dest_inspect_drop_data(cx, &mut dest, event),
            DestinationState::DropAllowed => self.dest_drop_allowed(cx, &mut dest, event),
            DestinationState::DropNotAllowed => self.dest_drop_not_allowed(cx, &mut dest, event),
            DestinationState::WaitForDropData => {
                self.dest_wait_for_drop_data(cx, &mut dest, event)
            }
        };

        match step {
            Ok(Flow::Next(to)) => {
                if from != to {
                    self.debug_log_event(format!(
                        "destination id={} {from:?} -> {to:?} on {event:?}",
                        dest.id
                    ));
                }
                dest.state = to;
                self.session.dest = Some(dest);
                if to == DestinationState::Idle {
                    self.destination_watchdog.disarm();
                } else {
                    let delay = self.options.destination_response_timeout;
                    self.destination_watchdog.arm(cx.now, delay);
                }
            }
            Ok(Flow::Finish) => self.end_destination(cx, &dest, "drop finished"),
            Err(PeerVanished) => {
                log::warn!("XDND drag source {} vanished", dest.source_window);
                self.end_destination(cx, &dest, "source vanished");
            }
        }
    }

    fn dest_idle(&mut self, cx: &mut Cx<'_>, dest: &mut DestInfo, event: DestEvent) -> Step {
        if event == DestEvent::Position {
            if let Some(handler) = cx.views.destination(dest.view) {
                handler.prepare();
                if dest.source_types.is_some() {
                    return self.check_drop_allowed(cx, dest);
                }
                return Ok(Flow::Next(DestinationState::WaitEnter));
            }
        }

        self.suspend_drop_authorization(cx, dest)?;
        Ok(Flow::Next(DestinationState::Idle))
    }

    fn dest_wait_enter(&mut self, cx: &mut Cx<'_>, dest: &mut DestInfo, event: DestEvent) -> Step {
        if event == DestEvent::Enter {
            return self.check_drop_allowed(cx, dest);
        }
        Ok(Flow::Next(DestinationState::WaitEnter))
    }

    fn dest_inspect_drop_data(
        &mut self,
        cx: &mut Cx<'_>,
        dest: &mut DestInfo,
        event: DestEvent,
    ) -> Step {
        if event != DestEvent::DataArrived || self.request_drop_data(cx, dest) {
            return Ok(Flow::Next(DestinationState::InspectDropData));
        }
        self.finish_inspection(cx, dest)
    }

    fn dest_drop_allowed(&mut self, cx: &mut Cx<'_>, dest: &mut DestInfo, event: DestEvent) -> Step {
        match event {
            DestEvent::Drop => {
                if dest.drop_data.is_none() {
                    dest.drop_data = Some(DropSlots::sized(required_len(dest)));
                    if self.request_drop_data(cx, dest) {
                        return Ok(Flow::Next(DestinationState::WaitForDropData));
                    }
                }
                self.perform_drop(cx, dest);
                self.finish_drop(cx, dest);
                Ok(Flow::Finish)
            }
            DestEvent::Position if dest.source_action_changed => self.check_drop_allowed(cx, dest),
            DestEvent::Position => {
                let action = self.session.destination_action;
                self.send_status(cx, dest, action)?;
                Ok(Flow::Next(DestinationState::DropAllowed))
            }
            DestEvent::Enter | DestEvent::DataArrived => Ok(Flow::Next(DestinationState::DropAllowed)),
        }
    }

    fn dest_drop_not_allowed(
        &mut self,
        cx: &mut Cx<'_>,
        dest: &mut DestInfo,
        event: DestEvent,
    ) -> Step {
        match event {
            DestEvent::Drop => {
                self.finish_drop(cx, dest);
                Ok(Flow::Finish)
            }
            DestEvent::Position if dest.source_action_changed => self.check_drop_allowed(cx, dest),
            DestEvent::Position => {
                self.send_status(cx, dest, NONE)?;
                Ok(Flow::Next(DestinationState::DropNotAllowed))
            }
            DestEvent::Enter | DestEvent::DataArrived => Ok(Flow::Next(DestinationState::DropNotAllowed)),
        }
    }

    fn dest_wait_for_drop_data(
        &mut self,
        cx: &mut Cx<'_>,
        dest: &mut DestInfo,
        event: DestEvent,
    ) -> Step {
        if event != DestEvent::DataArrived || self.request_drop_data(cx, dest) {
            return Ok(Flow::Next(DestinationState::WaitForDropData));
        }
        self.perform_drop(cx, dest);
        self.finish_drop(cx, dest);
        Ok(Flow::Finish)
    }

    fn requested_operation(&self) -> Operation {
        action_to_operation(&self.atoms, self.session.source_action)
    }

    fn check_drop_allowed(&mut self, cx: &mut Cx<'_>, dest: &mut DestInfo) -> Step {
        let operation = self.requested_operation();
        match cx.views.destination(dest.view) {
            Some(handler) => {
                negotiate::store_required_types(cx.backend, &self.atoms, handler, operation, dest);
            }
            None => dest.required_types = None,
        }

        let inspects = cx
            .views
            .destination(dest.view)
            .is_some_and(|handler| handler.inspects_drop_data());
        if !inspects {
            return self.check_action_allowed(cx, dest);
        }

        dest.drop_data = Some(DropSlots::sized(required_len(dest)));
        if self.request_drop_data(cx, dest) {
            return Ok(Flow::Next(DestinationState::InspectDropData));
        }
        self.finish_inspection(cx, dest)
    }

    fn finish_inspection(&mut self, cx: &mut Cx<'_>, dest: &mut DestInfo) -> Step {
        let payloads = dest.drop_data.as_ref().map_or(&[][..], DropSlots::payloads);
        let accepted = cx
            .views
            .destination(dest.view)
            .is_some_and(|handler| handler.inspect_drop_data(payloads));

        if accepted {
            return self.check_action_allowed(cx, dest);
        }
        self.suspend_drop_authorization(cx, dest)?;
        Ok(Flow::Next(DestinationState::DropNotAllowed))
    }

    fn check_action_allowed(&mut self, cx: &mut Cx<'_>, dest: &mut DestInfo) -> Step {
        let requested = self.requested_operation();
        let allowed = match (cx.views.destination(dest.view), dest.source_types.as_deref()) {
            (Some(handler), Some(offered)) => handler.allowed_operation(requested, offered),
            _ => Operation::None,
        };

        let action = operation_to_action(&self.atoms, allowed);
        self.session.destination_action = action;
        if action == NONE {
            self.suspend_drop_authorization(cx, dest)?;
            return Ok(Flow::Next(DestinationState::DropNotAllowed));
        }

        self.send_status(cx, dest, action)?;
        Ok(Flow::Next(DestinationState::DropAllowed))
    }

    /// Refuses the drop and drops everything negotiated so far.
    fn suspend_drop_authorization(
        &mut self,
        cx: &mut Cx<'_>,
        dest: &mut DestInfo,
    ) -> Result<(), PeerVanished> {
        dest.forget_negotiated_data();
        self.send_status(cx, dest, NONE)
    }

    fn send_status(
        &self,
        cx: &mut Cx<'_>,
        dest: &mut DestInfo,
        action: Atom,
    ) -> Result<(), PeerVanished> {
        // A view with children needs a position on every move to tell them apart.
        let no_position_zone =
            (!cx.views.has_children(dest.view)).then(|| cx.views.root_rect(dest.view));
        let status = XdndMessage::Status(StatusMessage {
            destination: cx.views.window_of(dest.aware_view),
            accept: action != NONE,
            no_position_zone,
            action,
        });

        dest.allow_outstanding = action != NONE;
        if transport::send_message(cx.backend, &self.atoms, dest.source_window, &status) {
            Ok(())
        } else {
            Err(PeerVanished)
        }
    }

    fn request_drop_data(&self, cx: &mut Cx<'_>, dest: &mut DestInfo) -> bool {
        let requestor = cx.views.window_of(dest.aware_view);
        let (Some(required), Some(slots)) = (dest.required_types.as_deref(), dest.drop_data.as_mut())
        else {
            return false;
        };
        negotiate::request_next_drop_data(
            cx.backend,
            &self.atoms,
            requestor,
            required,
            slots,
            self.session.timestamp,
        )
    }

    fn perform_drop(&self, cx: &mut Cx<'_>, dest: &DestInfo) {
        let asked = if self.session.source_action == self.atoms.action_ask {
            negotiate::read_ask_operations(cx.backend, &self.atoms, dest.source_window)
        } else {
            None
        };
        let origin = cx.views.root_rect(dest.view).min;
        let point = dest
            .last_position
            .map_or(Pos2::ZERO, |position| (position - origin).to_pos2());
        let payloads = dest.drop_data.as_ref().map_or(&[][..], DropSlots::payloads);

        if let Some(handler) = cx.views.destination(dest.view) {
            handler.perform_drag_operation(payloads, asked.as_deref(), point);
        }
    }

    fn finish_drop(&self, cx: &mut Cx<'_>, dest: &DestInfo) {
        let finished = XdndMessage::Finished {
            destination: cx.views.window_of(dest.aware_view),
        };
        if !transport::send_message(cx.backend, &self.atoms, dest.source_window, &finished) {
            log::debug!("drag source {} did not get XdndFinished", dest.source_window);
        }
    }
}

fn required_len(dest: &DestInfo) -> usize {
    dest.required_types.as_ref().map_or(0, Vec::len)
}
