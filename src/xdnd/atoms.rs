use super::backend::Backend;
use super::types::Atom;

/// The screen's fixed table of XDND atoms, interned once per connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XdndAtoms {
    pub aware: Atom,
    pub selection: Atom,

    pub enter: Atom,
    pub leave: Atom,
    pub position: Atom,
    pub status: Atom,
    pub drop: Atom,
    pub finished: Atom,

    pub type_list: Atom,
    pub action_list: Atom,
    pub action_description: Atom,

    pub action_copy: Atom,
    pub action_move: Atom,
    pub action_link: Atom,
    pub action_ask: Atom,
    pub action_private: Atom,
}

impl XdndAtoms {
    pub fn intern(backend: &mut dyn Backend) -> Self {
        let mut atom = |name: &str| backend.intern_atom(name);
        Self {
            aware: atom("XdndAware"),
            selection: atom("XdndSelection"),
            enter: atom("XdndEnter"),
            leave: atom("XdndLeave"),
            position: atom("XdndPosition"),
            status: atom("XdndStatus"),
            drop: atom("XdndDrop"),
            finished: atom("XdndFinished"),
            type_list: atom("XdndTypeList"),
            action_list: atom("XdndActionList"),
            action_description: atom("XdndActionDescription"),
            action_copy: atom("XdndActionCopy"),
            action_move: atom("XdndActionMove"),
            action_link: atom("XdndActionLink"),
            action_ask: atom("XdndActionAsk"),
            action_private: atom("XdndActionPrivate"),
        }
    }
}
