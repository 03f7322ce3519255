use std::time::Instant;

use egui::Pos2;

use super::geometry;
use super::message::{EnterMessage, PositionMessage, StatusMessage, XdndMessage};
use super::negotiate;
use super::operation::{Operation, action_to_operation, operation_to_action};
use super::session::{SourceInfo, SourceState};
use super::transport;
use super::types::{Atom, NONE, Payload, PeerVanished, Timestamp, ViewId, Window};
use super::{Backend, Cx, DragViews, XdndScreen};

#[derive(Clone, Copy, Debug)]
enum SourceEvent {
    Status(StatusMessage),
    Finished,
}

impl XdndScreen {
    /// A pointer button went down over `view`.
    ///
    /// A drag can only follow a left-button press on a drag source that is immediately followed
    /// by pointer motion; a plain click never starts a session.
    pub fn button_press(
        &mut self,
        backend: &mut dyn Backend,
        views: &mut dyn DragViews,
        view: ViewId,
        button: u8,
        point: Pos2,
    ) {
        if button != 1 || self.session.source.is_some() {
            return;
        }
        if views.source(view).is_none() || !backend.next_event_is_motion() {
            return;
        }
        let wanted = views
            .source(view)
            .map_or(Operation::None, |handler| handler.wanted_operation());

        self.session.source_action = operation_to_action(&self.atoms, wanted);
        self.session.destination_action = NONE;
        let id = self.session.next_session_id();
        self.session.source = Some(SourceInfo::new(id, view, point));
        self.debug_log_event(format!("source PRESS id={id} view={view}"));
    }

    /// The pointer moved while a button is held over `view`.
    ///
    /// `time` is the X server time of the motion event; it stamps the selection and the
    /// messages of the drag it starts.
    pub fn pointer_motion(
        &mut self,
        backend: &mut dyn Backend,
        views: &mut dyn DragViews,
        view: ViewId,
        point: Pos2,
        time: Timestamp,
        now: Instant,
    ) {
        let mut cx = Cx::new(backend, views, now);
        let Some(source) = self.session.source.as_mut() else {
            return;
        };
        if source.view != view || source.state == SourceState::FinishDrop {
            return;
        }

        if !source.started {
            if geometry::moved_beyond(source.press_point, point, self.options.drag_start_threshold)
            {
                self.start_drag(&mut cx, point, time);
            }
            return;
        }

        source.icon_pos = point - source.pointer_offset;
        if let Some(icon) = source.icon {
            cx.backend.move_window(icon, source.icon_pos);
        }

        if self.process_motion(&mut cx, point).is_err() {
            self.end_drag(&mut cx, false);
        }
    }

    /// The pointer button was released over `view`.
    pub fn button_release(
        &mut self,
        backend: &mut dyn Backend,
        views: &mut dyn DragViews,
        view: ViewId,
        now: Instant,
    ) {
        let Some(source) = self.session.source.as_ref() else {
            return;
        };
        if source.view != view || source.state == SourceState::FinishDrop {
            return;
        }
        if !source.started {
            let id = source.id;
            self.session.source = None;
            self.debug_log_event(format!("source DISCARD id={id} (released before drag)"));
            return;
        }

        let mut cx = Cx::new(backend, views, now);
        let dropped = self.process_button_release(&mut cx);
        cx.backend.show_drag_cursor(None);

        match dropped {
            Ok(true) => self.set_source_state(SourceState::FinishDrop, "release"),
            Ok(false) | Err(PeerVanished) => self.end_drag(&mut cx, false),
        }
    }

    /// Answers a conversion request for the XDND selection from the current destination.
    pub fn convert_selection(
        &mut self,
        backend: &mut dyn Backend,
        views: &mut dyn DragViews,
        target: Atom,
    ) -> Option<Payload> {
        let view = self.session.source.as_ref()?.view;
        let Some(type_name) = backend.atom_name(target) else {
            log::warn!("cannot convert XDND selection to unnamed target {target}");
            return None;
        };
        views.source(view)?.fetch_data(&type_name)
    }

    pub fn selection_lost(&mut self) {
        if self.session.source.is_some() {
            log::warn!("XDND selection lost during drag operation");
        }
    }

    /// True while `view` is the origin of a drag that has not been dropped yet.
    pub fn is_dragging_from(&self, view: ViewId) -> bool {
        self.session
            .source
            .as_ref()
            .is_some_and(|source| source.view == view && source.state != SourceState::FinishDrop)
    }

    pub(super) fn source_status(&mut self, cx: &mut Cx<'_>, status: &StatusMessage) {
        self.source_step(cx, status.destination, SourceEvent::Status(*status));
    }

    pub(super) fn source_finished(&mut self, cx: &mut Cx<'_>, destination: Window) {
        self.source_step(cx, destination, SourceEvent::Finished);
    }

    pub(super) fn source_timed_out(&mut self, cx: &mut Cx<'_>) {
        self.source_watchdog.disarm();
        let Some(state) = self.session.source.as_ref().map(|source| source.state) else {
            return;
        };
        log::warn!("delay for drag destination response expired");

        let left = self.send_to_destination(cx, |window| XdndMessage::Leave { source: window });
        cx.backend.show_drag_cursor(None);
        if state == SourceState::FinishDrop || left.is_err() {
            self.end_drag(cx, false);
            return;
        }

        self.session.destination_action = NONE;
        if let Some(source) = self.session.source.as_mut() {
            source.destination = None;
            source.no_position_zone = None;
        }
        self.set_source_state(SourceState::Idle, "timeout");
    }

    fn arm_source_watchdog(&mut self, now: Instant) {
        let delay = self.options.source_response_timeout;
        self.source_watchdog.arm(now, delay);
    }

    fn set_source_state(&mut self, to: SourceState, reason: &str) {
        let Some(source) = self.session.source.as_mut() else {
            return;
        };
        let from = source.state;
        source.state = to;
        if from != to {
            let id = source.id;
            self.debug_log_event(format!("source id={id} {from:?} -> {to:?} on {reason}"));
        }
    }

    fn start_drag(&mut self, cx: &mut Cx<'_>, point: Pos2, time: Timestamp) {
        let Some(view) = self.session.source.as_ref().map(|source| source.view) else {
            return;
        };
        let window = cx.views.window_of(view);
        self.session.timestamp = time;

        if !cx.backend.own_selection(window, self.atoms.selection, time) {
            log::warn!("could not get ownership of XDND selection");
            self.session.source = None;
            return;
        }

        let ask = self.session.source_action == self.atoms.action_ask;
        let (types, asked) = match cx.views.source(view) {
            Some(handler) => (
                handler.drop_data_types(),
                ask.then(|| handler.asked_operations()),
            ),
            None => (Vec::new(), None),
        };
        let first_types = negotiate::advertise_types(cx.backend, &self.atoms, window, &types);
        if let Some(items) = &asked {
            negotiate::advertise_ask_operations(cx.backend, &self.atoms, window, items);
        }
        if let Some(handler) = cx.views.source(view) {
            handler.began(point);
        }

        let icon_size = cx.views.drag_image_size(view);
        let icon_pos = geometry::initial_icon_pos(cx.views.root_rect(view), point, icon_size);
        let icon = cx.backend.create_drag_icon(icon_size);
        if let Some(icon) = icon {
            cx.backend.move_window(icon, icon_pos);
            cx.backend.map_raised(icon);
        }
        let cursor = cx.backend.create_drag_cursor();

        let Some(source) = self.session.source.as_mut() else {
            return;
        };
        source.started = true;
        source.first_types = first_types;
        source.icon = icon;
        source.icon_pos = icon_pos;
        source.pointer_offset = point - icon_pos;
        source.cursor = cursor;
        let id = source.id;
        self.debug_log_event(format!(
            "source START id={id} view={view} types={}",
            types.len()
        ));
    }

    fn find_destination(&self, cx: &mut Cx<'_>, point: Pos2, icon: Option<Window>) -> Option<Window> {
        let root = cx.backend.root_window();
        if self.is_aware(cx, root) {
            return Some(root);
        }

        // Stacking order is bottom to top; nothing above the drag icon can be the target.
        let children = cx.backend.children(root);
        let below_icon = icon
            .and_then(|icon| children.iter().position(|&child| child == icon))
            .and_then(|index| children.get(..index))
            .unwrap_or(children.as_slice());

        let hit = below_icon.iter().rev().copied().find(|&child| {
            cx.backend.window_frame(child).is_some_and(|frame| {
                frame.viewable && geometry::contains_half_open(frame.rect, point)
            })
        })?;
        self.look_for_aware_window(cx, point, hit)
    }

    fn look_for_aware_window(&self, cx: &mut Cx<'_>, point: Pos2, start: Window) -> Option<Window> {
        let mut window = start;
        loop {
            if self.is_aware(cx, window) {
                return Some(window);
            }
            window = cx.backend.child_at(window, point)?;
        }
    }

    fn is_aware(&self, cx: &mut Cx<'_>, window: Window) -> bool {
        cx.backend.xdnd_version(window, self.atoms.aware).is_some()
    }

    fn process_motion(&mut self, cx: &mut Cx<'_>, point: Pos2) -> Result<(), PeerVanished> {
        let Some(source) = self.session.source.as_ref() else {
            return Ok(());
        };
        let current = source.destination;
        let target = self.find_destination(cx, point, source.icon);

        if target == current {
            if current.is_some() && self.send_position(cx, point)? {
                self.arm_source_watchdog(cx.now);
            }
            return Ok(());
        }

        self.source_watchdog.disarm();
        cx.backend.show_drag_cursor(None);
        if current.is_some() {
            self.send_to_destination(cx, |window| XdndMessage::Leave { source: window })?;
        }

        self.session.destination_action = NONE;
        if let Some(source) = self.session.source.as_mut() {
            source.destination = target;
            source.no_position_zone = None;
        }
        self.set_source_state(SourceState::Idle, "target change");

        let Some(target) = target else {
            return Ok(());
        };
        self.debug_log_event(format!("source target -> {target}"));
        let peer_version = cx.backend.xdnd_version(target, self.atoms.aware).unwrap_or(0);
        let version = self.options.enter_version(peer_version);
        self.session.protocol_version = version;

        let types = self
            .session
            .source
            .as_ref()
            .map_or([NONE; 3], |source| source.first_types);
        self.send_to_destination(cx, |window| {
            XdndMessage::Enter(EnterMessage {
                source: window,
                version,
                has_type_list: true,
                types,
            })
        })?;
        self.arm_source_watchdog(cx.now);
        Ok(())
    }

    /// Sends a position unless the pointer is inside the destination's no-position zone.
    fn send_position(&mut self, cx: &mut Cx<'_>, point: Pos2) -> Result<bool, PeerVanished> {
        let zone = self
            .session
            .source
            .as_ref()
            .and_then(|source| source.no_position_zone);
        if geometry::zone_contains(zone, point) {
            return Ok(false);
        }

        let timestamp = self.session.timestamp;
        let action = self.session.source_action;
        self.send_to_destination(cx, |window| {
            XdndMessage::Position(PositionMessage {
                source: window,
                point,
                timestamp,
                action,
            })
        })?;
        Ok(true)
    }

    /// Sends a message built from our source window to the current target, if there is one.
    fn send_to_destination(
        &self,
        cx: &mut Cx<'_>,
        message: impl FnOnce(Window) -> XdndMessage,
    ) -> Result<(), PeerVanished> {
        let Some((view, target)) = self
            .session
            .source
            .as_ref()
            .and_then(|source| Some((source.view, source.destination?)))
        else {
            return Ok(());
        };
        let message = message(cx.views.window_of(view));
        if transport::send_message(cx.backend, &self.atoms, target, &message) {
            Ok(())
        } else {
            Err(PeerVanished)
        }
    }

    fn source_step(&mut self, cx: &mut Cx<'_>, sender: Window, event: SourceEvent) {
        let Some(source) = self.session.source.as_ref() else {
            log::warn!("received XDND destination message without a drag in progress");
            return;
        };
        let Some(target) = source.destination else {
            log::warn!("received XDND destination message without a target");
            return;
        };
        if sender != target {
            log::debug!("ignoring XDND message from stale target {sender}");
            return;
        }

        self.source_watchdog.disarm();
        let from = source.state;
        let to = match (from, event) {
            (SourceState::Idle, SourceEvent::Status(status)) => {
                if self.store_status(cx, &status) {
                    self.show_allowed_cursor(cx);
                    self.arm_source_watchdog(cx.now);
                    SourceState::DropAllowed
                } else {
                    cx.backend.show_drag_cursor(None);
                    SourceState::Idle
                }
            }
            (SourceState::Idle, SourceEvent::Finished) => {
                log::warn!("received XdndFinished before the drop");
                self.arm_source_watchdog(cx.now);
                SourceState::Idle
            }
            (SourceState::DropAllowed, SourceEvent::Status(status)) => {
                if self.store_status(cx, &status) {
                    self.arm_source_watchdog(cx.now);
                    SourceState::DropAllowed
                } else {
                    cx.backend.show_drag_cursor(None);
                    SourceState::Idle
                }
            }
            (SourceState::DropAllowed, SourceEvent::Finished) => {
                self.arm_source_watchdog(cx.now);
                SourceState::DropAllowed
            }
            (SourceState::FinishDrop, SourceEvent::Status(_)) => {
                self.arm_source_watchdog(cx.now);
                SourceState::FinishDrop
            }
            (SourceState::FinishDrop, SourceEvent::Finished) => {
                self.end_drag(cx, true);
                return;
            }
        };
        self.set_source_state(to, status_reason(event));
    }

    /// Records a status; returns whether the drop is now allowed.
    fn store_status(&mut self, cx: &mut Cx<'_>, status: &StatusMessage) -> bool {
        let Some(view) = self.session.source.as_ref().map(|source| source.view) else {
            return false;
        };
        if let Some(source) = self.session.source.as_mut() {
            source.no_position_zone = status
                .no_position_zone
                .filter(|&zone| !geometry::is_empty_zone(zone));
        }

        let action = if status.accept || status.action != NONE {
            let operation = action_to_operation(&self.atoms, status.action);
            let accepted = operation != Operation::None
                && cx
                    .views
                    .source(view)
                    .is_some_and(|handler| handler.accept_operation(operation));
            if accepted { status.action } else { NONE }
        } else {
            NONE
        };
        self.session.destination_action = action;
        action != NONE
    }

    fn show_allowed_cursor(&self, cx: &mut Cx<'_>) {
        let cursor = self.session.source.as_ref().and_then(|source| source.cursor);
        cx.backend.show_drag_cursor(cursor);
    }

    /// Returns `true` if a drop was sent and the drag now waits for `XdndFinished`.
    fn process_button_release(&mut self, cx: &mut Cx<'_>) -> Result<bool, PeerVanished> {
        let Some(state) = self.session.source.as_ref().map(|source| source.state) else {
            return Ok(false);
        };

        if state == SourceState::DropAllowed {
            self.source_watchdog.disarm();
            let timestamp = self.session.timestamp;
            self.send_to_destination(cx, |window| XdndMessage::Drop {
                source: window,
                timestamp,
            })?;
            self.arm_source_watchdog(cx.now);
            return Ok(true);
        }

        self.source_watchdog.disarm();
        self.send_to_destination(cx, |window| XdndMessage::Leave { source: window })?;
        Ok(false)
    }

    /// Ends the outgoing drag. A failed drag slides the icon back to its view first.
    fn end_drag(&mut self, cx: &mut Cx<'_>, deposited: bool) {
        self.source_watchdog.disarm();
        let Some(source) = self.session.source.take() else {
            return;
        };
        cx.backend.show_drag_cursor(None);

        if let Some(icon) = source.icon {
            if !deposited {
                let home = cx.views.root_rect(source.view).min;
                let path =
                    geometry::slide_path(source.icon_pos, home, self.options.max_slide_back_steps);
                cx.backend.slide_window(icon, &path);
            }
            cx.backend.destroy_window(icon);
        }

        let window = cx.views.window_of(source.view);
        cx.backend
            .disown_selection(window, self.atoms.selection, self.session.timestamp);
        if let Some(cursor) = source.cursor {
            cx.backend.free_cursor(cursor);
        }
        self.session.destination_action = NONE;

        if let Some(handler) = cx.views.source(source.view) {
            handler.ended(source.icon_pos, deposited);
        }
        self.debug_log_event(format!(
            "source END id={} deposited={deposited}",
            source.id
        ));
    }
}

fn status_reason(event: SourceEvent) -> &'static str {
    match event {
        SourceEvent::Status(_) => "XdndStatus",
        SourceEvent::Finished => "XdndFinished",
    }
}
