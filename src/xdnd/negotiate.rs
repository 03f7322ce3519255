//! Type and action negotiation: reading what a source offers, advertising what we offer.

use itertools::{EitherOrBoth, Itertools as _};

use super::atoms::XdndAtoms;
use super::backend::{Backend, DragDestination};
use super::operation::{Operation, OperationItem, action_to_operation, operation_to_action};
use super::session::{DestInfo, DropSlots};
use super::types::{Atom, NONE, Timestamp, Window};

fn type_names(backend: &mut dyn Backend, atoms: &[Atom]) -> Vec<String> {
    atoms
        .iter()
        .filter(|&&atom| atom != NONE)
        .filter_map(|&atom| backend.atom_name(atom))
        .collect()
}

/// The (at most three) types carried inline by `XdndEnter`.
pub(super) fn inline_types(backend: &mut dyn Backend, types: &[Atom; 3]) -> Vec<String> {
    type_names(backend, types)
}

pub(super) fn full_type_list(
    backend: &mut dyn Backend,
    atoms: &XdndAtoms,
    source: Window,
) -> Option<Vec<String>> {
    let Some(list) = backend.read_atom_list(source, atoms.type_list) else {
        log::warn!("cannot read XDND type list of window {source}");
        return None;
    };
    Some(type_names(backend, &list))
}

/// Asks the destination which offered types it needs.
///
/// If the inline types are not enough and the source has a longer list, that list is fetched
/// once and the destination is asked again. A failed fetch keeps the inline types.
pub(super) fn store_required_types(
    backend: &mut dyn Backend,
    atoms: &XdndAtoms,
    handler: &mut dyn DragDestination,
    operation: Operation,
    dest: &mut DestInfo,
) {
    let Some(offered) = dest.source_types.as_deref() else {
        dest.required_types = None;
        return;
    };
    let mut required = handler.required_data_types(operation, offered);

    if required.is_none() && dest.type_list_available {
        dest.type_list_available = false;
        if let Some(full) = full_type_list(backend, atoms, dest.source_window) {
            required = handler.required_data_types(operation, &full);
            dest.source_types = Some(full);
        }
    }

    dest.required_types = required;
}

/// Issues the selection request for the next unsettled slot.
///
/// A type whose request cannot be issued is settled as `None` and skipped.
/// Returns `true` if a request is now outstanding, `false` once every slot is settled.
pub(super) fn request_next_drop_data(
    backend: &mut dyn Backend,
    atoms: &XdndAtoms,
    requestor: Window,
    required: &[String],
    slots: &mut DropSlots,
    time: Timestamp,
) -> bool {
    while let Some(index) = slots.next_pending() {
        let Some(type_name) = required.get(index) else {
            slots.skip();
            continue;
        };
        let target = backend.intern_atom(type_name);
        if target != NONE && backend.request_selection(requestor, atoms.selection, target, time) {
            return true;
        }
        log::warn!("could not request data for dropped data of type {type_name}");
        slots.skip();
    }
    false
}

pub(super) fn split_descriptions(bytes: &[u8]) -> Vec<String> {
    let bytes = bytes.strip_suffix(&[0]).unwrap_or(bytes);
    bytes
        .split(|&byte| byte == 0)
        .map(|label| String::from_utf8_lossy(label).into_owned())
        .collect()
}

/// Pairs the source's `XdndActionList` with its `XdndActionDescription` labels.
pub(super) fn read_ask_operations(
    backend: &mut dyn Backend,
    atoms: &XdndAtoms,
    source: Window,
) -> Option<Vec<OperationItem>> {
    let Some(actions) = backend.read_atom_list(source, atoms.action_list) else {
        log::warn!("cannot read XDND action list of window {source}");
        return None;
    };
    let Some(descriptions) = backend.read_string_property(source, atoms.action_description)
    else {
        log::warn!("cannot read XDND action description list of window {source}");
        return None;
    };

    let mut items = Vec::with_capacity(actions.len());
    for pair in actions.iter().zip_longest(split_descriptions(&descriptions)) {
        let EitherOrBoth::Both(&action, label) = pair else {
            log::warn!("XDND action list and action descriptions of window {source} differ in length");
            return None;
        };
        items.push(OperationItem::new(action_to_operation(atoms, action), label));
    }
    Some(items)
}

/// Writes `XdndTypeList` and returns the first three types for `XdndEnter`.
pub(super) fn advertise_types(
    backend: &mut dyn Backend,
    atoms: &XdndAtoms,
    window: Window,
    types: &[String],
) -> [Atom; 3] {
    let list: Vec<Atom> = types.iter().map(|name| backend.intern_atom(name)).collect();
    backend.write_atom_list(window, atoms.type_list, &list);

    let mut first = [NONE; 3];
    for (slot, &atom) in first.iter_mut().zip(&list) {
        *slot = atom;
    }
    first
}

pub(super) fn advertise_ask_operations(
    backend: &mut dyn Backend,
    atoms: &XdndAtoms,
    window: Window,
    items: &[OperationItem],
) {
    let actions: Vec<Atom> = items
        .iter()
        .map(|item| operation_to_action(atoms, item.operation))
        .collect();
    let mut descriptions = Vec::new();
    for item in items {
        descriptions.extend_from_slice(item.label.as_bytes());
        descriptions.push(0);
    }

    backend.write_atom_list(window, atoms.action_list, &actions);
    backend.write_string_property(window, atoms.action_description, &descriptions);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xdnd::testing::{MockBackend, RecordingDestination};

    const SOURCE: Window = 50;

    fn dest_with_inline(backend: &mut MockBackend, names: &[&str], more: bool) -> DestInfo {
        let mut dest = DestInfo::new(1, 1, 1, SOURCE);
        let mut inline = [NONE; 3];
        for (slot, name) in inline.iter_mut().zip(names) {
            *slot = backend.intern(name);
        }
        dest.source_types = Some(inline_types(backend, &inline));
        dest.type_list_available = more;
        dest
    }

    #[test]
    fn inline_types_skip_none() {
        let mut backend = MockBackend::new();
        let text = backend.intern("text/plain");
        let uri = backend.intern("text/uri-list");

        assert_eq!(
            inline_types(&mut backend, &[text, NONE, uri]),
            vec!["text/plain".to_owned(), "text/uri-list".to_owned()]
        );
    }

    #[test]
    fn full_list_is_fetched_only_when_inline_types_are_not_enough() {
        let mut backend = MockBackend::new();
        let atoms = XdndAtoms::intern(&mut backend);
        let list = ["a", "b", "c", "image/png"].map(|name| backend.intern(name));
        backend.set_atom_list(SOURCE, atoms.type_list, &list);

        let mut handler = RecordingDestination::wanting(&["image/png"]);
        let mut dest = dest_with_inline(&mut backend, &["a", "b", "c"], true);

        store_required_types(&mut backend, &atoms, &mut handler, Operation::Copy, &mut dest);

        assert_eq!(dest.required_types, Some(vec!["image/png".to_owned()]));
        assert_eq!(handler.required_calls.len(), 2);
        assert!(!dest.type_list_available);
    }

    #[test]
    fn unreadable_full_list_keeps_inline_types() {
        let mut backend = MockBackend::new();
        let atoms = XdndAtoms::intern(&mut backend);
        let mut handler = RecordingDestination::wanting(&["image/png"]);
        let mut dest = dest_with_inline(&mut backend, &["a", "b", "c"], true);

        store_required_types(&mut backend, &atoms, &mut handler, Operation::Copy, &mut dest);

        assert_eq!(dest.required_types, None);
        assert_eq!(dest.source_types.as_ref().map(Vec::len), Some(3));
        assert_eq!(handler.required_calls.len(), 1);
    }

    #[test]
    fn failed_request_leaves_a_hole_and_moves_on() {
        let mut backend = MockBackend::new();
        let atoms = XdndAtoms::intern(&mut backend);
        let broken = backend.intern("broken/type");
        backend.refuse_requests.insert(broken);

        let required = vec!["broken/type".to_owned(), "text/plain".to_owned()];
        let mut slots = DropSlots::sized(2);

        assert!(request_next_drop_data(&mut backend, &atoms, 10, &required, &mut slots, 0));
        assert_eq!(slots.next_pending(), Some(1));
        assert_eq!(backend.requests.len(), 1);

        assert!(slots.store(Some(b"hi".to_vec())));
        assert!(!request_next_drop_data(&mut backend, &atoms, 10, &required, &mut slots, 0));
        assert_eq!(slots.payloads(), &[None, Some(b"hi".to_vec())]);
    }

    #[test]
    fn ask_lists_must_have_matching_lengths() {
        let mut backend = MockBackend::new();
        let atoms = XdndAtoms::intern(&mut backend);
        backend.set_atom_list(SOURCE, atoms.action_list, &[atoms.action_copy, atoms.action_move]);
        backend.set_string(SOURCE, atoms.action_description, b"Copy here\0Move here\0");

        assert_eq!(
            read_ask_operations(&mut backend, &atoms, SOURCE),
            Some(vec![
                OperationItem::new(Operation::Copy, "Copy here"),
                OperationItem::new(Operation::Move, "Move here"),
            ])
        );

        backend.set_string(SOURCE, atoms.action_description, b"Copy here\0");
        assert_eq!(read_ask_operations(&mut backend, &atoms, SOURCE), None);
    }

    #[test]
    fn advertised_ask_operations_read_back() {
        let mut backend = MockBackend::new();
        let atoms = XdndAtoms::intern(&mut backend);
        let items = vec![
            OperationItem::new(Operation::Link, "Link"),
            OperationItem::new(Operation::Move, "Move"),
        ];

        advertise_ask_operations(&mut backend, &atoms, SOURCE, &items);

        assert_eq!(backend.string(SOURCE, atoms.action_description), Some(b"Link\0Move\0".to_vec()));
        assert_eq!(read_ask_operations(&mut backend, &atoms, SOURCE), Some(items));
    }

    #[test]
    fn advertised_types_fill_first_three() {
        let mut backend = MockBackend::new();
        let atoms = XdndAtoms::intern(&mut backend);
        let types: Vec<String> = ["a", "b", "c", "d"].map(str::to_owned).to_vec();

        let first = advertise_types(&mut backend, &atoms, SOURCE, &types);

        assert_eq!(first, ["a", "b", "c"].map(|name| backend.intern(name)));
        assert_eq!(backend.atom_list(SOURCE, atoms.type_list).map(|list| list.len()), Some(4));
        assert_eq!(split_descriptions(b"x\0\0y"), vec!["x".to_owned(), String::new(), "y".to_owned()]);
    }
}
