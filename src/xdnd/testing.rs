//! In-memory [`Backend`] and [`DragViews`] for driving the engine in tests.

use std::time::Instant;

use ahash::{AHashMap, AHashSet};
use egui::{Pos2, Rect, Vec2, pos2, vec2};

use super::atoms::XdndAtoms;
use super::backend::{Backend, DragDestination, DragSource, DragViews};
use super::message::XdndMessage;
use super::operation::{Operation, OperationItem};
use super::types::{Atom, ClientMessage, Cursor, NONE, Payload, Timestamp, ViewId, Window, WindowFrame};
use super::{XdndOptions, XdndScreen};

pub(super) const ROOT: Window = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Property {
    Atoms(Vec<Atom>),
    Bytes(Vec<u8>),
}

#[derive(Default)]
pub(super) struct MockBackend {
    atom_ids: AHashMap<String, Atom>,
    atom_names: AHashMap<Atom, String>,
    properties: AHashMap<(Window, Atom), Property>,
    dead: AHashSet<Window>,

    pub(super) sent: Vec<ClientMessage>,
    pub(super) fail_delivery: bool,

    pub(super) selection_owner: Option<Window>,
    pub(super) refuse_selection: bool,
    pub(super) requests: Vec<(Window, Atom)>,
    pub(super) refuse_requests: AHashSet<Atom>,

    pub(super) stacking: Vec<Window>,
    pub(super) frames: AHashMap<Window, WindowFrame>,
    pub(super) child_under: AHashMap<Window, Window>,

    pub(super) next_is_motion: bool,

    next_window: Window,
    pub(super) icons: Vec<Window>,
    pub(super) moves: Vec<(Window, Pos2)>,
    pub(super) destroyed: Vec<Window>,
    pub(super) cursors: Vec<Option<Cursor>>,
    pub(super) freed_cursors: Vec<Cursor>,
}

impl MockBackend {
    pub(super) fn new() -> Self {
        Self {
            next_is_motion: true,
            next_window: 900,
            ..Default::default()
        }
    }

    pub(super) fn intern(&mut self, name: &str) -> Atom {
        self.intern_atom(name)
    }

    pub(super) fn kill_window(&mut self, window: Window) {
        self.dead.insert(window);
    }

    pub(super) fn set_atom_list(&mut self, window: Window, property: Atom, atoms: &[Atom]) {
        self.properties
            .insert((window, property), Property::Atoms(atoms.to_vec()));
    }

    pub(super) fn set_string(&mut self, window: Window, property: Atom, bytes: &[u8]) {
        self.properties
            .insert((window, property), Property::Bytes(bytes.to_vec()));
    }

    pub(super) fn atom_list(&self, window: Window, property: Atom) -> Option<Vec<Atom>> {
        match self.properties.get(&(window, property)) {
            Some(Property::Atoms(atoms)) => Some(atoms.clone()),
            _ => None,
        }
    }

    pub(super) fn string(&self, window: Window, property: Atom) -> Option<Vec<u8>> {
        match self.properties.get(&(window, property)) {
            Some(Property::Bytes(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// A top-level client window at `rect`, stacked above the existing ones.
    pub(super) fn add_toplevel(&mut self, window: Window, rect: Rect) {
        self.stacking.push(window);
        self.frames.insert(
            window,
            WindowFrame {
                rect,
                viewable: true,
            },
        );
    }

    pub(super) fn make_aware(&mut self, window: Window, version: u32) {
        let aware = self.intern("XdndAware");
        self.set_atom_list(window, aware, &[version]);
    }

    pub(super) fn take_sent(&mut self, atoms: &XdndAtoms) -> Vec<XdndMessage> {
        self.sent
            .drain(..)
            .filter_map(|message| XdndMessage::decode(atoms, &message))
            .collect()
    }
}

impl Backend for MockBackend {
    fn root_window(&self) -> Window {
        ROOT
    }

    fn intern_atom(&mut self, name: &str) -> Atom {
        if let Some(&atom) = self.atom_ids.get(name) {
            return atom;
        }
        let atom = 100 + self.atom_ids.len() as Atom;
        self.atom_ids.insert(name.to_owned(), atom);
        self.atom_names.insert(atom, name.to_owned());
        atom
    }

    fn atom_name(&mut self, atom: Atom) -> Option<String> {
        self.atom_names.get(&atom).cloned()
    }

    fn window_exists(&mut self, window: Window) -> bool {
        !self.dead.contains(&window)
    }

    fn send_client_message(&mut self, message: &ClientMessage) -> bool {
        if self.fail_delivery {
            return false;
        }
        self.sent.push(*message);
        true
    }

    fn read_atom_list(&mut self, window: Window, property: Atom) -> Option<Vec<Atom>> {
        self.atom_list(window, property).filter(|atoms| !atoms.is_empty())
    }

    fn read_string_property(&mut self, window: Window, property: Atom) -> Option<Vec<u8>> {
        self.string(window, property).filter(|bytes| !bytes.is_empty())
    }

    fn write_atom_list(&mut self, window: Window, property: Atom, atoms: &[Atom]) {
        self.set_atom_list(window, property, atoms);
    }

    fn write_string_property(&mut self, window: Window, property: Atom, bytes: &[u8]) {
        self.set_string(window, property, bytes);
    }

    fn children(&mut self, window: Window) -> Vec<Window> {
        if window == ROOT {
            let mut children = self.stacking.clone();
            children.extend(self.icons.iter().copied().filter(|icon| !self.destroyed.contains(icon)));
            children
        } else {
            Vec::new()
        }
    }

    fn window_frame(&mut self, window: Window) -> Option<WindowFrame> {
        self.frames.get(&window).copied()
    }

    fn child_at(&mut self, window: Window, _point: Pos2) -> Option<Window> {
        self.child_under.get(&window).copied()
    }

    fn own_selection(&mut self, owner: Window, _selection: Atom, _time: Timestamp) -> bool {
        if self.refuse_selection {
            return false;
        }
        self.selection_owner = Some(owner);
        true
    }

    fn disown_selection(&mut self, owner: Window, _selection: Atom, _time: Timestamp) {
        if self.selection_owner == Some(owner) {
            self.selection_owner = None;
        }
    }

    fn request_selection(
        &mut self,
        requestor: Window,
        _selection: Atom,
        target: Atom,
        _time: Timestamp,
    ) -> bool {
        if self.refuse_requests.contains(&target) {
            return false;
        }
        self.requests.push((requestor, target));
        true
    }

    fn next_event_is_motion(&mut self) -> bool {
        self.next_is_motion
    }

    fn create_drag_icon(&mut self, _size: Vec2) -> Option<Window> {
        let window = self.next_window;
        self.next_window += 1;
        self.icons.push(window);
        Some(window)
    }

    fn move_window(&mut self, window: Window, position: Pos2) {
        self.moves.push((window, position));
    }

    fn destroy_window(&mut self, window: Window) {
        self.destroyed.push(window);
    }

    fn create_drag_cursor(&mut self) -> Option<Cursor> {
        Some(7)
    }

    fn show_drag_cursor(&mut self, cursor: Option<Cursor>) {
        self.cursors.push(cursor);
    }

    fn free_cursor(&mut self, cursor: Cursor) {
        self.freed_cursors.push(cursor);
    }
}

/// Destination callbacks that record what the engine asked of them.
#[derive(Debug, Default)]
pub(super) struct RecordingDestination {
    /// Types this view can use; it requires whichever of them are offered.
    pub(super) wanted: Vec<String>,
    pub(super) inspects: bool,
    pub(super) inspect_verdict: bool,
    pub(super) grant: Option<Operation>,

    pub(super) prepared: usize,
    pub(super) concluded: usize,
    pub(super) required_calls: Vec<Vec<String>>,
    pub(super) inspected: Vec<Vec<Option<Payload>>>,
    pub(super) performed: Vec<(Vec<Option<Payload>>, Option<Vec<OperationItem>>, Pos2)>,
}

impl RecordingDestination {
    pub(super) fn wanting(types: &[&str]) -> Self {
        Self {
            wanted: types.iter().map(|&name| name.to_owned()).collect(),
            inspect_verdict: true,
            ..Default::default()
        }
    }
}

impl DragDestination for RecordingDestination {
    fn prepare(&mut self) {
        self.prepared += 1;
    }

    fn required_data_types(
        &mut self,
        _operation: Operation,
        offered: &[String],
    ) -> Option<Vec<String>> {
        self.required_calls.push(offered.to_vec());
        let required: Vec<String> = offered
            .iter()
            .filter(|name| self.wanted.contains(name))
            .cloned()
            .collect();
        (!required.is_empty()).then_some(required)
    }

    fn inspects_drop_data(&self) -> bool {
        self.inspects
    }

    fn inspect_drop_data(&mut self, payloads: &[Option<Payload>]) -> bool {
        self.inspected.push(payloads.to_vec());
        self.inspect_verdict
    }

    fn allowed_operation(&mut self, requested: Operation, offered: &[String]) -> Operation {
        if !offered.iter().any(|name| self.wanted.contains(name)) {
            return Operation::None;
        }
        self.grant.unwrap_or(requested)
    }

    fn perform_drag_operation(
        &mut self,
        payloads: &[Option<Payload>],
        asked: Option<&[OperationItem]>,
        point: Pos2,
    ) {
        self.performed
            .push((payloads.to_vec(), asked.map(<[OperationItem]>::to_vec), point));
    }

    fn conclude(&mut self) {
        self.concluded += 1;
    }
}

#[derive(Debug, Default)]
pub(super) struct RecordingSource {
    pub(super) types: Vec<String>,
    pub(super) wanted: Operation,
    pub(super) asked: Vec<OperationItem>,
    pub(super) accepts: bool,
    pub(super) data: AHashMap<String, Payload>,

    pub(super) began: Vec<Pos2>,
    pub(super) ended: Vec<(Pos2, bool)>,
}

impl RecordingSource {
    pub(super) fn offering(types: &[&str]) -> Self {
        Self {
            types: types.iter().map(|&name| name.to_owned()).collect(),
            wanted: Operation::Copy,
            accepts: true,
            ..Default::default()
        }
    }
}

impl DragSource for RecordingSource {
    fn drop_data_types(&mut self) -> Vec<String> {
        self.types.clone()
    }

    fn wanted_operation(&mut self) -> Operation {
        self.wanted
    }

    fn asked_operations(&mut self) -> Vec<OperationItem> {
        self.asked.clone()
    }

    fn accept_operation(&mut self, _operation: Operation) -> bool {
        self.accepts
    }

    fn began(&mut self, point: Pos2) {
        self.began.push(point);
    }

    fn ended(&mut self, icon_position: Pos2, deposited: bool) {
        self.ended.push((icon_position, deposited));
    }

    fn fetch_data(&mut self, type_name: &str) -> Option<Payload> {
        self.data.get(type_name).cloned()
    }
}

pub(super) struct MockView {
    pub(super) window: Window,
    pub(super) rect: Rect,
    pub(super) parent: Option<ViewId>,
    pub(super) destination: Option<RecordingDestination>,
    pub(super) source: Option<RecordingSource>,
}

#[derive(Default)]
pub(super) struct MockViews {
    pub(super) views: AHashMap<ViewId, MockView>,
}

impl MockViews {
    pub(super) fn add(&mut self, id: ViewId, window: Window, rect: Rect, parent: Option<ViewId>) {
        self.views.insert(
            id,
            MockView {
                window,
                rect,
                parent,
                destination: None,
                source: None,
            },
        );
    }

    pub(super) fn set_destination(&mut self, id: ViewId, destination: RecordingDestination) {
        if let Some(view) = self.views.get_mut(&id) {
            view.destination = Some(destination);
        }
    }

    pub(super) fn set_source(&mut self, id: ViewId, source: RecordingSource) {
        if let Some(view) = self.views.get_mut(&id) {
            view.source = Some(source);
        }
    }

    pub(super) fn dest(&self, id: ViewId) -> &RecordingDestination {
        self.views
            .get(&id)
            .and_then(|view| view.destination.as_ref())
            .expect("view has a destination")
    }

    pub(super) fn src(&self, id: ViewId) -> &RecordingSource {
        self.views
            .get(&id)
            .and_then(|view| view.source.as_ref())
            .expect("view has a source")
    }
}

impl DragViews for MockViews {
    fn window_of(&self, view: ViewId) -> Window {
        self.views.get(&view).map_or(NONE, |view| view.window)
    }

    fn view_at(&self, toplevel: ViewId, point: Pos2) -> ViewId {
        self.views
            .iter()
            .filter(|(_, view)| view.parent == Some(toplevel) && view.rect.contains(point))
            .map(|(&id, _)| id)
            .min()
            .unwrap_or(toplevel)
    }

    fn root_rect(&self, view: ViewId) -> Rect {
        self.views.get(&view).map_or(Rect::NOTHING, |view| view.rect)
    }

    fn has_children(&self, view: ViewId) -> bool {
        self.views.values().any(|child| child.parent == Some(view))
    }

    fn destination(&mut self, view: ViewId) -> Option<&mut dyn DragDestination> {
        let view = self.views.get_mut(&view)?;
        view.destination
            .as_mut()
            .map(|destination| destination as &mut dyn DragDestination)
    }

    fn source(&mut self, view: ViewId) -> Option<&mut dyn DragSource> {
        let view = self.views.get_mut(&view)?;
        view.source
            .as_mut()
            .map(|source| source as &mut dyn DragSource)
    }
}

/// Our top-level window and view, at the root origin.
pub(super) const OUR_WINDOW: Window = 10;
pub(super) const OUR_VIEW: ViewId = 1;

/// A remote client taking part in the drag.
pub(super) const PEER_WINDOW: Window = 50;

pub(super) fn our_rect() -> Rect {
    Rect::from_min_size(pos2(0.0, 0.0), vec2(400.0, 300.0))
}

/// One screen, one top-level view, the peer alive.
pub(super) struct Harness {
    pub(super) backend: MockBackend,
    pub(super) views: MockViews,
    pub(super) screen: XdndScreen,
    pub(super) now: Instant,
}

impl Harness {
    pub(super) fn new() -> Self {
        if let Err(err) = env_logger::builder().is_test(true).try_init() {
            log::trace!("test logger already installed: {err}");
        }

        let mut backend = MockBackend::new();
        let screen = XdndScreen::new(
            &mut backend,
            XdndOptions {
                debug_event_log: true,
                ..Default::default()
            },
        );
        let mut views = MockViews::default();
        views.add(OUR_VIEW, OUR_WINDOW, our_rect(), None);
        Self {
            backend,
            views,
            screen,
            now: Instant::now(),
        }
    }

    pub(super) fn atoms(&self) -> XdndAtoms {
        *self.screen.atoms()
    }

    /// Delivers `message` from the peer to our top-level view.
    pub(super) fn receive(&mut self, message: &XdndMessage) -> bool {
        let atoms = self.atoms();
        let (kind, sender, [d1, d2, d3, d4]) = message.encode(&atoms);
        let wire = ClientMessage {
            window: OUR_WINDOW,
            kind,
            data: [sender, d1, d2, d3, d4],
        };
        self.screen.handle_client_message(
            &mut self.backend,
            &mut self.views,
            OUR_VIEW,
            &wire,
            self.now,
        )
    }

    pub(super) fn data_arrives(&mut self, payload: Option<&[u8]>) {
        self.screen.drop_data_arrived(
            &mut self.backend,
            &mut self.views,
            payload.map(<[u8]>::to_vec),
            self.now,
        );
    }

    pub(super) fn advance(&mut self, by: std::time::Duration) {
        self.now += by;
        self.screen
            .poll_timeouts(&mut self.backend, &mut self.views, self.now);
    }

    pub(super) fn press(&mut self, view: ViewId, point: Pos2) {
        self.screen
            .button_press(&mut self.backend, &mut self.views, view, 1, point);
    }

    pub(super) fn motion(&mut self, view: ViewId, point: Pos2) {
        self.screen.pointer_motion(
            &mut self.backend,
            &mut self.views,
            view,
            point,
            4242,
            self.now,
        );
    }

    pub(super) fn release(&mut self, view: ViewId) {
        self.screen
            .button_release(&mut self.backend, &mut self.views, view, self.now);
    }

    pub(super) fn sent(&mut self) -> Vec<XdndMessage> {
        let atoms = self.atoms();
        self.backend.take_sent(&atoms)
    }

    pub(super) fn type_atoms(&mut self, names: &[&str]) -> [Atom; 3] {
        let mut atoms = [NONE; 3];
        for (slot, name) in atoms.iter_mut().zip(names) {
            *slot = self.backend.intern(name);
        }
        atoms
    }
}
