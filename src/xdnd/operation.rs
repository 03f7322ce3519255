use super::atoms::XdndAtoms;
use super::types::{Atom, NONE};

/// The semantic action requested for a drop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Operation {
    #[default]
    None,
    Copy,
    Move,
    Link,
    Ask,
    Private,
}

impl Operation {
    pub const ALL: [Self; 6] = [
        Self::None,
        Self::Copy,
        Self::Move,
        Self::Link,
        Self::Ask,
        Self::Private,
    ];
}

/// Links a human-readable label to an [`Operation`], offered to the user when the source asks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationItem {
    pub operation: Operation,
    pub label: String,
}

impl OperationItem {
    pub fn new(operation: Operation, label: impl Into<String>) -> Self {
        Self {
            operation,
            label: label.into(),
        }
    }
}

/// Wire action atom for `operation`. [`Operation::None`] maps to the X11 `None` atom.
pub fn operation_to_action(atoms: &XdndAtoms, operation: Operation) -> Atom {
    match operation {
        Operation::None => NONE,
        Operation::Copy => atoms.action_copy,
        Operation::Move => atoms.action_move,
        Operation::Link => atoms.action_link,
        Operation::Ask => atoms.action_ask,
        Operation::Private => atoms.action_private,
    }
}

/// Operation for a wire action atom. Unknown actions are reported and treated as a copy.
pub fn action_to_operation(atoms: &XdndAtoms, action: Atom) -> Operation {
    if action == NONE {
        Operation::None
    } else if action == atoms.action_copy {
        Operation::Copy
    } else if action == atoms.action_move {
        Operation::Move
    } else if action == atoms.action_link {
        Operation::Link
    } else if action == atoms.action_ask {
        Operation::Ask
    } else if action == atoms.action_private {
        Operation::Private
    } else {
        log::warn!("unknown XDND action {action}");
        Operation::Copy
    }
}
