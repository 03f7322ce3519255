//! The seams between the protocol engine, the X server and the host application's widgets.

use egui::{Pos2, Rect, Vec2};

use super::operation::{Operation, OperationItem};
use super::types::{Atom, ClientMessage, Cursor, Payload, Timestamp, ViewId, Window, WindowFrame};

/// Everything the engine needs from the X connection.
///
/// Protocol methods report failure as `None`/`false`; the engine decides what a failure means.
/// The presentation methods (drag icon, cursor) default to no-ops so headless backends can skip them.
pub trait Backend {
    fn root_window(&self) -> Window;

    /// Returns the X11 `None` atom if interning fails.
    fn intern_atom(&mut self, name: &str) -> Atom;

    fn atom_name(&mut self, atom: Atom) -> Option<String>;

    /// Liveness check, done before every XDND message.
    fn window_exists(&mut self, window: Window) -> bool;

    /// Sends (and flushes) a format-32 client message to `message.window`.
    fn send_client_message(&mut self, message: &ClientMessage) -> bool;

    /// Reads an `ATOM`/format-32 property. `None` if absent, empty, or of another type.
    fn read_atom_list(&mut self, window: Window, property: Atom) -> Option<Vec<Atom>>;

    /// Reads a `STRING`/format-8 property. `None` if absent, empty, or of another type.
    fn read_string_property(&mut self, window: Window, property: Atom) -> Option<Vec<u8>>;

    fn write_atom_list(&mut self, window: Window, property: Atom, atoms: &[Atom]);

    fn write_string_property(&mut self, window: Window, property: Atom, bytes: &[u8]);

    /// The XDND version `window` advertises through `XdndAware`, if any.
    fn xdnd_version(&mut self, window: Window, aware: Atom) -> Option<u32> {
        self.read_atom_list(window, aware)
            .and_then(|version| version.first().copied())
    }

    /// Children of `window`, bottom-most first.
    fn children(&mut self, window: Window) -> Vec<Window>;

    fn window_frame(&mut self, window: Window) -> Option<WindowFrame>;

    /// The direct child of `window` under the root-relative `point`.
    fn child_at(&mut self, window: Window, point: Pos2) -> Option<Window>;

    /// Takes the selection and confirms ownership.
    fn own_selection(&mut self, owner: Window, selection: Atom, time: Timestamp) -> bool;

    fn disown_selection(&mut self, owner: Window, selection: Atom, time: Timestamp);

    /// Asks the selection owner to convert `selection` to `target`.
    ///
    /// The answer comes back later as an event; feed it to
    /// [`super::XdndScreen::drop_data_arrived`].
    fn request_selection(
        &mut self,
        requestor: Window,
        selection: Atom,
        target: Atom,
        time: Timestamp,
    ) -> bool;

    /// Whether the next queued input event is a pointer motion, without consuming it.
    fn next_event_is_motion(&mut self) -> bool;

    fn create_drag_icon(&mut self, _size: Vec2) -> Option<Window> {
        None
    }

    fn move_window(&mut self, _window: Window, _position: Pos2) {}

    fn map_raised(&mut self, _window: Window) {}

    /// Moves `window` through each position of `path`, in order.
    fn slide_window(&mut self, window: Window, path: &[Pos2]) {
        for &position in path {
            self.move_window(window, position);
        }
    }

    fn destroy_window(&mut self, _window: Window) {}

    fn create_drag_cursor(&mut self) -> Option<Cursor> {
        None
    }

    /// `None` restores the default pointer.
    fn show_drag_cursor(&mut self, _cursor: Option<Cursor>) {}

    fn free_cursor(&mut self, _cursor: Cursor) {}
}

/// Callbacks of a view that accepts drops.
pub trait DragDestination {
    /// Called when a drag first enters the view.
    fn prepare(&mut self) {}

    /// Types this view would need for `operation`, out of those `offered`.
    ///
    /// Returning `None` means none of the offered types are acceptable.
    fn required_data_types(
        &mut self,
        operation: Operation,
        offered: &[String],
    ) -> Option<Vec<String>>;

    /// If true, the required payloads are fetched before the drop is allowed and handed to
    /// [`Self::inspect_drop_data`].
    fn inspects_drop_data(&self) -> bool {
        false
    }

    fn inspect_drop_data(&mut self, _payloads: &[Option<Payload>]) -> bool {
        true
    }

    /// The operation to grant, given what the source requests. [`Operation::None`] refuses.
    fn allowed_operation(&mut self, requested: Operation, offered: &[String]) -> Operation;

    /// Performs the drop.
    ///
    /// `payloads` line up with the required types, with `None` for each type that could not be
    /// retrieved. `asked` is present when the source asked the user to choose.
    /// `point` is relative to the view's top-left corner.
    fn perform_drag_operation(
        &mut self,
        payloads: &[Option<Payload>],
        asked: Option<&[OperationItem]>,
        point: Pos2,
    );

    /// Called once when the session over this view ends, whatever the outcome.
    fn conclude(&mut self) {}
}

/// Callbacks of a view that can start drags.
pub trait DragSource {
    /// Types offered, in order of preference.
    fn drop_data_types(&mut self) -> Vec<String>;

    fn wanted_operation(&mut self) -> Operation;

    /// Choices offered when [`Self::wanted_operation`] is [`Operation::Ask`].
    fn asked_operations(&mut self) -> Vec<OperationItem> {
        Vec::new()
    }

    /// Whether the operation granted by the destination is acceptable.
    fn accept_operation(&mut self, operation: Operation) -> bool;

    fn began(&mut self, _point: Pos2) {}

    /// `deposited` is true only when the destination confirmed the drop.
    fn ended(&mut self, _icon_position: Pos2, _deposited: bool) {}

    fn fetch_data(&mut self, type_name: &str) -> Option<Payload>;
}

/// The host application's widget tree, as seen by the engine.
pub trait DragViews {
    fn window_of(&self, view: ViewId) -> Window;

    /// Deepest view under the root-relative `point`, starting from `toplevel`.
    fn view_at(&self, toplevel: ViewId, point: Pos2) -> ViewId;

    /// View bounds in root coordinates.
    fn root_rect(&self, view: ViewId) -> Rect;

    fn has_children(&self, view: ViewId) -> bool;

    fn drag_image_size(&self, _view: ViewId) -> Vec2 {
        Vec2::splat(32.0)
    }

    /// `None` if the view does not accept drops.
    fn destination(&mut self, view: ViewId) -> Option<&mut dyn DragDestination>;

    /// `None` if the view cannot start drags.
    fn source(&mut self, view: ViewId) -> Option<&mut dyn DragSource>;
}
