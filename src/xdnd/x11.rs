//! [`Backend`] over an `x11rb` connection.

use std::collections::VecDeque;
use std::time::Duration;

use ahash::AHashMap;
use egui::{Pos2, Rect, Vec2, pos2, vec2};
use x11rb::connection::Connection as _;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{
    AtomEnum, ChangeWindowAttributesAux, ClientMessageEvent, ConfigureWindowAux,
    ConnectionExt as _, CreateWindowAux, EventMask, GetPropertyType, MapState, PropMode,
    SELECTION_NOTIFY_EVENT, SelectionNotifyEvent, SelectionRequestEvent, StackMode, WindowClass,
};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::{COPY_DEPTH_FROM_PARENT, COPY_FROM_PARENT, NONE};

use super::backend::Backend;
use super::types::{Atom, ClientMessage, Cursor, Payload, Timestamp, Window, WindowFrame};

/// `left_ptr` in the standard cursor font.
const LEFT_PTR_GLYPH: u16 = 68;

const SLIDE_STEP_DELAY: Duration = Duration::from_micros(800);

/// Errors from [`X11Backend`].
#[derive(Debug)]
pub enum X11BackendError {
    Connect(ConnectError),
    Connection(ConnectionError),
    Reply(ReplyError),
    ReplyOrId(ReplyOrIdError),
}

impl std::fmt::Display for X11BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect(err) => write!(f, "cannot connect to X server: {err}"),
            Self::Connection(err) => write!(f, "X connection error: {err}"),
            Self::Reply(err) => write!(f, "X request failed: {err}"),
            Self::ReplyOrId(err) => write!(f, "X request failed: {err}"),
        }
    }
}

impl std::error::Error for X11BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connect(err) => Some(err),
            Self::Connection(err) => Some(err),
            Self::Reply(err) => Some(err),
            Self::ReplyOrId(err) => Some(err),
        }
    }
}

impl From<ConnectError> for X11BackendError {
    fn from(value: ConnectError) -> Self {
        Self::Connect(value)
    }
}

impl From<ConnectionError> for X11BackendError {
    fn from(value: ConnectionError) -> Self {
        Self::Connection(value)
    }
}

impl From<ReplyError> for X11BackendError {
    fn from(value: ReplyError) -> Self {
        Self::Reply(value)
    }
}

impl From<ReplyOrIdError> for X11BackendError {
    fn from(value: ReplyOrIdError) -> Self {
        Self::ReplyOrId(value)
    }
}

fn logged<T>(what: &str, result: Result<T, X11BackendError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("{what}: {err}");
            None
        }
    }
}

/// An X connection plus the bits of client-side state XDND needs.
///
/// Events consumed while peeking are kept and handed out again by [`Self::next_event`].
pub struct X11Backend {
    conn: RustConnection,
    root: Window,
    white_pixel: u32,
    pending: VecDeque<Event>,
    atom_ids: AHashMap<String, Atom>,
    atom_names: AHashMap<Atom, String>,
}

impl X11Backend {
    /// Connects to `display_name`, or `$DISPLAY` if `None`.
    ///
    /// # Errors
    /// If the X server cannot be reached or refuses the connection.
    pub fn connect(display_name: Option<&str>) -> Result<Self, X11BackendError> {
        let (conn, screen_num) = RustConnection::connect(display_name)?;
        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let white_pixel = screen.white_pixel;
        Ok(Self {
            conn,
            root,
            white_pixel,
            pending: VecDeque::new(),
            atom_ids: AHashMap::default(),
            atom_names: AHashMap::default(),
        })
    }

    pub fn connection(&self) -> &RustConnection {
        &self.conn
    }

    /// Next event, blocking until one arrives.
    ///
    /// # Errors
    /// If the connection to the X server broke.
    pub fn next_event(&mut self) -> Result<Event, X11BackendError> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(event);
        }
        Ok(self.conn.wait_for_event()?)
    }

    /// Next event if one is already queued.
    ///
    /// # Errors
    /// If the connection to the X server broke.
    pub fn poll_event(&mut self) -> Result<Option<Event>, X11BackendError> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }
        Ok(self.conn.poll_for_event()?)
    }

    /// The engine-level view of a client message; only format 32 carries XDND.
    pub fn client_message(event: &ClientMessageEvent) -> Option<ClientMessage> {
        (event.format == 32).then(|| ClientMessage {
            window: event.window,
            kind: event.type_,
            data: event.data.as_data32(),
        })
    }

    /// Reads (and deletes) the property a selection conversion was stored in.
    ///
    /// `None` if the owner refused the conversion.
    pub fn selection_payload(&mut self, event: &SelectionNotifyEvent) -> Option<Payload> {
        if event.property == NONE {
            return None;
        }
        logged(
            "cannot read converted selection",
            self.try_read_property(event.requestor, event.property),
        )
    }

    /// Stores `payload` on the requestor and notifies it; `None` refuses the conversion.
    ///
    /// # Errors
    /// If the property or the notification cannot be sent.
    pub fn answer_selection_request(
        &mut self,
        request: &SelectionRequestEvent,
        payload: Option<&[u8]>,
    ) -> Result<(), X11BackendError> {
        let property = match payload {
            Some(bytes) => {
                let property = if request.property == NONE {
                    request.target
                } else {
                    request.property
                };
                self.conn.change_property8(
                    PropMode::REPLACE,
                    request.requestor,
                    property,
                    request.target,
                    bytes,
                )?;
                property
            }
            None => NONE,
        };

        let notify = SelectionNotifyEvent {
            response_type: SELECTION_NOTIFY_EVENT,
            sequence: 0,
            time: request.time,
            requestor: request.requestor,
            selection: request.selection,
            target: request.target,
            property,
        };
        self.conn
            .send_event(false, request.requestor, EventMask::NO_EVENT, notify)?;
        self.conn.flush()?;
        Ok(())
    }

    fn try_read_property(&self, window: Window, property: Atom) -> Result<Payload, X11BackendError> {
        let reply = self
            .conn
            .get_property(true, window, property, GetPropertyType::ANY, 0, u32::MAX)?
            .reply()?;
        Ok(reply.value)
    }

    fn try_intern(&self, name: &str) -> Result<Atom, X11BackendError> {
        Ok(self.conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
    }

    fn try_atom_name(&self, atom: Atom) -> Result<String, X11BackendError> {
        let reply = self.conn.get_atom_name(atom)?.reply()?;
        Ok(String::from_utf8_lossy(&reply.name).into_owned())
    }

    fn try_send(&self, message: &ClientMessage) -> Result<(), X11BackendError> {
        let event = ClientMessageEvent::new(32, message.window, message.kind, message.data);
        self.conn
            .send_event(false, message.window, EventMask::NO_EVENT, event)?
            .check()?;
        self.conn.flush()?;
        Ok(())
    }

    fn try_own_selection(
        &self,
        owner: Window,
        selection: Atom,
        time: Timestamp,
    ) -> Result<bool, X11BackendError> {
        self.conn.set_selection_owner(owner, selection, time)?;
        let reply = self.conn.get_selection_owner(selection)?.reply()?;
        Ok(reply.owner == owner)
    }

    fn try_disown_selection(
        &self,
        owner: Window,
        selection: Atom,
        time: Timestamp,
    ) -> Result<(), X11BackendError> {
        let reply = self.conn.get_selection_owner(selection)?.reply()?;
        if reply.owner == owner {
            self.conn.set_selection_owner(NONE, selection, time)?;
            self.conn.flush()?;
        }
        Ok(())
    }

    fn try_request_selection(
        &self,
        requestor: Window,
        selection: Atom,
        target: Atom,
        time: Timestamp,
    ) -> Result<(), X11BackendError> {
        self.conn
            .convert_selection(requestor, selection, target, selection, time)?;
        self.conn.flush()?;
        Ok(())
    }

    fn try_window_frame(&self, window: Window) -> Result<WindowFrame, X11BackendError> {
        let attributes = self.conn.get_window_attributes(window)?.reply()?;
        let geometry = self.conn.get_geometry(window)?.reply()?;
        Ok(WindowFrame {
            rect: Rect::from_min_size(
                pos2(geometry.x.into(), geometry.y.into()),
                vec2(geometry.width.into(), geometry.height.into()),
            ),
            viewable: attributes.map_state == MapState::VIEWABLE,
        })
    }

    fn try_child_at(&self, window: Window, point: Pos2) -> Result<Option<Window>, X11BackendError> {
        let reply = self
            .conn
            .translate_coordinates(self.root, window, point.x as i16, point.y as i16)?
            .reply()?;
        Ok((reply.child != NONE).then_some(reply.child))
    }

    fn try_create_icon(&self, size: Vec2) -> Result<Window, X11BackendError> {
        let window = self.conn.generate_id()?;
        let aux = CreateWindowAux::new()
            .override_redirect(1u32)
            .save_under(1u32)
            .background_pixel(self.white_pixel);
        self.conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            window,
            self.root,
            0,
            0,
            size.x.max(1.0) as u16,
            size.y.max(1.0) as u16,
            0,
            WindowClass::INPUT_OUTPUT,
            COPY_FROM_PARENT,
            &aux,
        )?;
        Ok(window)
    }

    fn try_create_cursor(&self) -> Result<Cursor, X11BackendError> {
        let font = self.conn.generate_id()?;
        self.conn.open_font(font, b"cursor")?;
        let cursor = self.conn.generate_id()?;
        // Green arrow on white.
        self.conn.create_glyph_cursor(
            cursor,
            font,
            font,
            LEFT_PTR_GLYPH,
            LEFT_PTR_GLYPH + 1,
            0x4500,
            0xb000,
            0x4500,
            0xffff,
            0xffff,
            0xffff,
        )?;
        self.conn.close_font(font)?;
        Ok(cursor)
    }

    fn try_move(&self, window: Window, position: Pos2) -> Result<(), X11BackendError> {
        let aux = ConfigureWindowAux::new()
            .x(position.x.round() as i32)
            .y(position.y.round() as i32);
        self.conn.configure_window(window, &aux)?;
        self.conn.flush()?;
        Ok(())
    }
}

impl Backend for X11Backend {
    fn root_window(&self) -> Window {
        self.root
    }

    fn intern_atom(&mut self, name: &str) -> Atom {
        if let Some(&atom) = self.atom_ids.get(name) {
            return atom;
        }
        let Some(atom) = logged("cannot intern atom", self.try_intern(name)) else {
            return NONE;
        };
        self.atom_ids.insert(name.to_owned(), atom);
        self.atom_names.insert(atom, name.to_owned());
        atom
    }

    fn atom_name(&mut self, atom: Atom) -> Option<String> {
        if let Some(name) = self.atom_names.get(&atom) {
            return Some(name.clone());
        }
        let name = logged("cannot get atom name", self.try_atom_name(atom))?;
        self.atom_names.insert(atom, name.clone());
        self.atom_ids.insert(name.clone(), atom);
        Some(name)
    }

    fn window_exists(&mut self, window: Window) -> bool {
        self.conn
            .get_window_attributes(window)
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .is_some()
    }

    fn send_client_message(&mut self, message: &ClientMessage) -> bool {
        logged("failed to send XDND message", self.try_send(message)).is_some()
    }

    fn read_atom_list(&mut self, window: Window, property: Atom) -> Option<Vec<Atom>> {
        let reply = self
            .conn
            .get_property(false, window, property, AtomEnum::ATOM, 0, 0x0800_0000)
            .ok()?
            .reply()
            .ok()?;
        if reply.type_ != u32::from(AtomEnum::ATOM) || reply.value_len == 0 {
            return None;
        }
        Some(reply.value32()?.collect())
    }

    fn read_string_property(&mut self, window: Window, property: Atom) -> Option<Vec<u8>> {
        let reply = self
            .conn
            .get_property(false, window, property, AtomEnum::STRING, 0, 0x0800_0000)
            .ok()?
            .reply()
            .ok()?;
        if reply.type_ != u32::from(AtomEnum::STRING) || reply.format != 8 || reply.value.is_empty()
        {
            return None;
        }
        Some(reply.value)
    }

    fn write_atom_list(&mut self, window: Window, property: Atom, atoms: &[Atom]) {
        if let Err(err) =
            self.conn
                .change_property32(PropMode::REPLACE, window, property, AtomEnum::ATOM, atoms)
        {
            log::warn!("cannot write atom list property {property} on {window}: {err}");
        }
    }

    fn write_string_property(&mut self, window: Window, property: Atom, bytes: &[u8]) {
        if let Err(err) =
            self.conn
                .change_property8(PropMode::REPLACE, window, property, AtomEnum::STRING, bytes)
        {
            log::warn!("cannot write string property {property} on {window}: {err}");
        }
    }

    fn children(&mut self, window: Window) -> Vec<Window> {
        self.conn
            .query_tree(window)
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .map(|reply| reply.children)
            .unwrap_or_default()
    }

    fn window_frame(&mut self, window: Window) -> Option<WindowFrame> {
        self.try_window_frame(window).ok()
    }

    fn child_at(&mut self, window: Window, point: Pos2) -> Option<Window> {
        self.try_child_at(window, point).ok().flatten()
    }

    fn own_selection(&mut self, owner: Window, selection: Atom, time: Timestamp) -> bool {
        logged(
            "cannot take XDND selection",
            self.try_own_selection(owner, selection, time),
        )
        .unwrap_or(false)
    }

    fn disown_selection(&mut self, owner: Window, selection: Atom, time: Timestamp) {
        logged(
            "cannot release XDND selection",
            self.try_disown_selection(owner, selection, time),
        );
    }

    fn request_selection(
        &mut self,
        requestor: Window,
        selection: Atom,
        target: Atom,
        time: Timestamp,
    ) -> bool {
        logged(
            "cannot request XDND selection",
            self.try_request_selection(requestor, selection, target, time),
        )
        .is_some()
    }

    fn next_event_is_motion(&mut self) -> bool {
        if self.pending.is_empty() {
            match self.conn.wait_for_event() {
                Ok(event) => self.pending.push_back(event),
                Err(err) => {
                    log::warn!("cannot peek X event: {err}");
                    return false;
                }
            }
        }
        matches!(self.pending.front(), Some(Event::MotionNotify(_)))
    }

    fn create_drag_icon(&mut self, size: Vec2) -> Option<Window> {
        logged("cannot create drag icon", self.try_create_icon(size))
    }

    fn move_window(&mut self, window: Window, position: Pos2) {
        if let Err(err) = self.try_move(window, position) {
            log::debug!("cannot move window {window}: {err}");
        }
    }

    fn map_raised(&mut self, window: Window) {
        let aux = ConfigureWindowAux::new().stack_mode(StackMode::ABOVE);
        let mapped = self
            .conn
            .configure_window(window, &aux)
            .and_then(|_| self.conn.map_window(window))
            .and_then(|_| self.conn.flush());
        if let Err(err) = mapped {
            log::warn!("cannot map drag icon: {err}");
        }
    }

    fn slide_window(&mut self, window: Window, path: &[Pos2]) {
        for &position in path {
            self.move_window(window, position);
            std::thread::sleep(SLIDE_STEP_DELAY);
        }
    }

    fn destroy_window(&mut self, window: Window) {
        let destroyed = self
            .conn
            .destroy_window(window)
            .and_then(|_| self.conn.flush());
        if let Err(err) = destroyed {
            log::warn!("cannot destroy window {window}: {err}");
        }
    }

    fn create_drag_cursor(&mut self) -> Option<Cursor> {
        logged("cannot create drag cursor", self.try_create_cursor())
    }

    fn show_drag_cursor(&mut self, cursor: Option<Cursor>) {
        let aux = ChangeWindowAttributesAux::new().cursor(cursor.unwrap_or(NONE));
        let shown = self
            .conn
            .change_window_attributes(self.root, &aux)
            .and_then(|_| self.conn.flush());
        if let Err(err) = shown {
            log::debug!("cannot change pointer: {err}");
        }
    }

    fn free_cursor(&mut self, cursor: Cursor) {
        if let Err(err) = self.conn.free_cursor(cursor) {
            log::debug!("cannot free cursor {cursor}: {err}");
        }
    }
}
