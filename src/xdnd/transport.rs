use super::atoms::XdndAtoms;
use super::backend::Backend;
use super::message::XdndMessage;
use super::types::{Atom, ClientMessage, Window};

/// Delivers one XDND client message to `target`, after probing that it still exists.
///
/// Returns `false` if the target is gone or delivery failed; the caller treats that as the
/// peer having vanished.
pub(super) fn send(
    backend: &mut dyn Backend,
    target: Window,
    kind: Atom,
    sender: Window,
    words: [u32; 4],
) -> bool {
    if !backend.window_exists(target) {
        log::warn!("target {target} for XDND message no longer exists");
        return false;
    }

    let [d1, d2, d3, d4] = words;
    let message = ClientMessage {
        window: target,
        kind,
        data: [sender, d1, d2, d3, d4],
    };
    if !backend.send_client_message(&message) {
        log::warn!("could not deliver XDND message to window {target}");
        return false;
    }
    true
}

pub(super) fn send_message(
    backend: &mut dyn Backend,
    atoms: &XdndAtoms,
    target: Window,
    message: &XdndMessage,
) -> bool {
    let (kind, sender, words) = message.encode(atoms);
    log::trace!("send {} to {target}", message.name());
    send(backend, target, kind, sender, words)
}
