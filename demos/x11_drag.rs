//! One window that is both an XDND source and an XDND destination.
//!
//! Drag from the window to drop a line of text anywhere that accepts `text/plain`;
//! drop text or files onto it to have them logged.
//!
//! Run with `RUST_LOG=debug cargo run --example x11_drag`.

use std::time::{Duration, Instant};

use egui::{Pos2, Rect, pos2, vec2};
use x11rb::connection::Connection as _;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{ConnectionExt as _, CreateWindowAux, EventMask, WindowClass};
use x11rb::{COPY_DEPTH_FROM_PARENT, COPY_FROM_PARENT};

use xdnd_engine::{
    DragDestination, DragSource, DragViews, Operation, OperationItem, Payload, ViewId, Window,
    X11Backend, X11BackendError, XdndOptions, XdndScreen,
};

const VIEW: ViewId = 1;
const ACCEPTED: [&str; 2] = ["text/uri-list", "text/plain"];

struct LoggingDestination;

impl DragDestination for LoggingDestination {
    fn required_data_types(
        &mut self,
        _operation: Operation,
        offered: &[String],
    ) -> Option<Vec<String>> {
        let wanted = ACCEPTED
            .iter()
            .find(|accepted| offered.iter().any(|name| name == *accepted))?;
        Some(vec![(*wanted).to_owned()])
    }

    fn allowed_operation(&mut self, requested: Operation, _offered: &[String]) -> Operation {
        match requested {
            Operation::Move | Operation::Link => requested,
            _ => Operation::Copy,
        }
    }

    fn perform_drag_operation(
        &mut self,
        payloads: &[Option<Payload>],
        asked: Option<&[OperationItem]>,
        point: Pos2,
    ) {
        for payload in payloads.iter().flatten() {
            log::info!("dropped at {point:?}: {}", String::from_utf8_lossy(payload));
        }
        if let Some(items) = asked {
            log::info!("source offered a choice of {} operations", items.len());
        }
    }
}

struct TextSource;

impl DragSource for TextSource {
    fn drop_data_types(&mut self) -> Vec<String> {
        vec!["text/plain".to_owned(), "UTF8_STRING".to_owned()]
    }

    fn wanted_operation(&mut self) -> Operation {
        Operation::Copy
    }

    fn accept_operation(&mut self, operation: Operation) -> bool {
        operation == Operation::Copy
    }

    fn ended(&mut self, _icon_position: Pos2, deposited: bool) {
        log::info!("drag ended, deposited={deposited}");
    }

    fn fetch_data(&mut self, _type_name: &str) -> Option<Payload> {
        Some(b"Hello from xdnd_engine".to_vec())
    }
}

struct DemoViews {
    window: Window,
    rect: Rect,
    destination: LoggingDestination,
    source: TextSource,
}

impl DragViews for DemoViews {
    fn window_of(&self, _view: ViewId) -> Window {
        self.window
    }

    fn view_at(&self, toplevel: ViewId, _point: Pos2) -> ViewId {
        toplevel
    }

    fn root_rect(&self, _view: ViewId) -> Rect {
        self.rect
    }

    fn has_children(&self, _view: ViewId) -> bool {
        false
    }

    fn destination(&mut self, _view: ViewId) -> Option<&mut dyn DragDestination> {
        Some(&mut self.destination)
    }

    fn source(&mut self, _view: ViewId) -> Option<&mut dyn DragSource> {
        Some(&mut self.source)
    }
}

fn create_window(backend: &X11Backend) -> Result<Window, X11BackendError> {
    let conn = backend.connection();
    let screen = &conn.setup().roots[0];
    let window = conn.generate_id()?;
    let aux = CreateWindowAux::new()
        .background_pixel(screen.white_pixel)
        .event_mask(
            EventMask::BUTTON_PRESS
                | EventMask::BUTTON_RELEASE
                | EventMask::BUTTON1_MOTION
                | EventMask::STRUCTURE_NOTIFY,
        );
    conn.create_window(
        COPY_DEPTH_FROM_PARENT,
        window,
        screen.root,
        100,
        100,
        400,
        300,
        0,
        WindowClass::INPUT_OUTPUT,
        COPY_FROM_PARENT,
        &aux,
    )?;
    conn.map_window(window)?;
    conn.flush()?;
    Ok(window)
}

fn root_rect(backend: &X11Backend, window: Window) -> Result<Rect, X11BackendError> {
    let conn = backend.connection();
    let geometry = conn.get_geometry(window)?.reply()?;
    let origin = conn
        .translate_coordinates(window, geometry.root, 0, 0)?
        .reply()?;
    Ok(Rect::from_min_size(
        pos2(f32::from(origin.dst_x), f32::from(origin.dst_y)),
        vec2(f32::from(geometry.width), f32::from(geometry.height)),
    ))
}

fn main() -> Result<(), X11BackendError> {
    env_logger::init();

    let mut backend = X11Backend::connect(None)?;
    let window = create_window(&backend)?;
    let mut screen = XdndScreen::new(&mut backend, XdndOptions::default());
    screen.register_aware_window(&mut backend, window);

    let mut views = DemoViews {
        window,
        rect: root_rect(&backend, window)?,
        destination: LoggingDestination,
        source: TextSource,
    };

    loop {
        while let Some(event) = backend.poll_event()? {
            match event {
                Event::ClientMessage(event) => {
                    if let Some(message) = X11Backend::client_message(&event) {
                        screen.handle_client_message(
                            &mut backend,
                            &mut views,
                            VIEW,
                            &message,
                            Instant::now(),
                        );
                    }
                }
                Event::SelectionNotify(event) => {
                    let payload = backend.selection_payload(&event);
                    screen.drop_data_arrived(&mut backend, &mut views, payload, Instant::now());
                }
                Event::SelectionRequest(request) => {
                    let payload = screen.convert_selection(&mut backend, &mut views, request.target);
                    backend.answer_selection_request(&request, payload.as_deref())?;
                }
                Event::SelectionClear(_) => screen.selection_lost(),
                Event::ButtonPress(event) => {
                    let point = pos2(f32::from(event.root_x), f32::from(event.root_y));
                    screen.button_press(&mut backend, &mut views, VIEW, event.detail, point);
                }
                Event::MotionNotify(event) => {
                    let point = pos2(f32::from(event.root_x), f32::from(event.root_y));
                    screen.pointer_motion(
                        &mut backend,
                        &mut views,
                        VIEW,
                        point,
                        event.time,
                        Instant::now(),
                    );
                }
                Event::ButtonRelease(_) => {
                    screen.button_release(&mut backend, &mut views, VIEW, Instant::now());
                }
                Event::ConfigureNotify(_) => views.rect = root_rect(&backend, window)?,
                Event::DestroyNotify(_) => return Ok(()),
                _ => {}
            }
        }

        screen.poll_timeouts(&mut backend, &mut views, Instant::now());
        let idle = screen
            .next_deadline()
            .map_or(Duration::from_millis(10), |deadline| {
                deadline
                    .saturating_duration_since(Instant::now())
                    .min(Duration::from_millis(10))
            });
        std::thread::sleep(idle);
    }
}
