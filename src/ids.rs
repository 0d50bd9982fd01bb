// Identifier storage and lexical scoping (§4.6).
//
// `IdentifierStorage` is the single global table of identifier
// entries; every name a program declares (or a builtin it starts
// with) gets exactly one `IdentifierId` for its lifetime, and every
// entry lives in this table rather than inside the AST. `Scope` is
// the separate name-resolution structure: a chain of maps from source
// name to `IdentifierId`, one per lexical block, each holding a link
// to its parent so a lookup can walk outward. This mirrors the
// teacher's `Env<T>` scope chain (a `RefCell`-guarded map plus an
// `Option` parent link) but the thing being stored is an id into a
// shared table, not the value itself.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::source::Span;
use crate::types::{Constantness, IntTag, Type, Variant};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentifierId(pub u32);

// What's known about an identifier beyond its name. Builtins (the
// type names and the `ct_int` etc. tags) carry no expression data of
// their own; a constant or parameter does, once the type resolver has
// run.
pub enum EntryData {
    None,
    Expression { constantness: Constantness, ty: Type },
}

pub struct Entry {
    pub id: IdentifierId,
    pub name: String,
    pub builtin: bool,
    // `None` for builtins, which have no source location.
    pub span: Option<Span>,
    // Set while a constant's value expression is being resolved, so a
    // reference to the identifier from within its own definition can
    // be reported as an invalid recursive use rather than silently
    // treated as undefined.
    pub is_being_defined: Cell<bool>,
    pub data: RefCell<EntryData>,
    pub value: RefCell<Option<Variant>>,
    // Set once the type resolver has given up on this entry (a real
    // type error, not a dependency it just hasn't reached yet). Lets
    // dependents fail immediately instead of being mistaken for an
    // item that will still resolve on a later pass.
    pub resolution_failed: Cell<bool>,
}

pub struct IdentifierStorage {
    entries: Vec<Entry>,
}

// Every integer type tag plus `bool` and `type`, in this fixed order,
// get reserved the lowest ids so both `IdentifierStorage::new` and
// `Scope::root` can refer to them by position.
pub const BUILTIN_NAMES: &[&str] =
    &["ct_int", "i1", "i2", "i4", "i8", "u1", "u2", "u4", "u8", "iptr", "uptr", "bool", "type"];

impl IdentifierStorage {
    pub fn new() -> IdentifierStorage {
        let mut storage = IdentifierStorage { entries: Vec::new() };
        for name in BUILTIN_NAMES {
            let id = storage.alloc_raw(name.to_string(), true, None);
            debug_assert_eq!(storage.entries[id.0 as usize].name, *name);
        }
        // Every builtin name denotes a type, and so is itself a
        // `type`-typed, constant value: `ct_int` is the dynamic integer
        // type, `i1`..`uptr` their concrete counterparts, `bool` the
        // boolean type, and `type` the type of types itself.
        let builtin_type = |name: &str| -> Type {
            match name {
                "ct_int" => Type::ct_int(),
                "bool" => Type::Boolean,
                "type" => Type::TypeOfTypes,
                other => Type::Integer(IntTag::from_name(other).expect("builtin integer tag")),
            }
        };
        for name in BUILTIN_NAMES {
            let id = storage.builtin_id(name).expect("builtin just seeded");
            let entry = storage.get(id);
            *entry.data.borrow_mut() =
                EntryData::Expression { constantness: Constantness::Constant, ty: Type::TypeOfTypes };
            *entry.value.borrow_mut() = Some(Variant::Type(Rc::new(builtin_type(name))));
        }
        storage
    }

    fn alloc_raw(&mut self, name: String, builtin: bool, span: Option<Span>) -> IdentifierId {
        let id = IdentifierId(self.entries.len() as u32);
        self.entries.push(Entry {
            id,
            name,
            builtin,
            span,
            is_being_defined: Cell::new(false),
            data: RefCell::new(EntryData::None),
            value: RefCell::new(None),
            resolution_failed: Cell::new(false),
        });
        id
    }

    // Allocate a new entry for a user declaration (a constant, a
    // function, or a parameter).
    pub fn alloc(&mut self, name: impl Into<String>, span: Span) -> IdentifierId {
        self.alloc_raw(name.into(), false, Some(span))
    }

    pub fn get(&self, id: IdentifierId) -> &Entry {
        &self.entries[id.0 as usize]
    }

    pub fn builtin_id(&self, name: &str) -> Option<IdentifierId> {
        BUILTIN_NAMES.iter().position(|n| *n == name).map(|i| IdentifierId(i as u32))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for IdentifierStorage {
    fn default() -> IdentifierStorage {
        IdentifierStorage::new()
    }
}

pub struct Scope {
    names: RefCell<HashMap<String, IdentifierId>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    // The outermost scope, pre-populated with every builtin name.
    pub fn root(storage: &IdentifierStorage) -> Rc<Scope> {
        let mut names = HashMap::new();
        for name in BUILTIN_NAMES {
            let id = storage.builtin_id(name).expect("builtin just seeded");
            names.insert(name.to_string(), id);
        }
        Rc::new(Scope { names: RefCell::new(names), parent: None })
    }

    pub fn chain(parent: &Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope { names: RefCell::new(HashMap::new()), parent: Some(parent.clone()) })
    }

    // Bind `name` to `id` in this scope, returning the id it
    // previously held in the *same* scope, if any (the caller uses
    // this to raise an "overshadows" diagnostic). Shadowing a name
    // bound in an ancestor scope is not reported here: only the
    // immediate scope's prior binding counts as a collision.
    pub fn define(&self, name: impl Into<String>, id: IdentifierId) -> Option<IdentifierId> {
        self.names.borrow_mut().insert(name.into(), id)
    }

    // Walk outward from this scope looking for `name`.
    pub fn lookup(&self, name: &str) -> Option<IdentifierId> {
        if let Some(id) = self.names.borrow().get(name) {
            return Some(*id);
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    // True iff `name` is bound directly in this scope (not an
    // ancestor).
    pub fn defined_locally(&self, name: &str) -> bool {
        self.names.borrow().contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Location;

    fn span() -> Span {
        let loc = Location { file: 0, index: 0, line: 0, column: 0 };
        Span::new(loc, loc)
    }

    #[test]
    fn builtins_are_preseeded() {
        let storage = IdentifierStorage::new();
        assert_eq!(storage.len(), BUILTIN_NAMES.len());
        let id = storage.builtin_id("i4").unwrap();
        assert!(storage.get(id).builtin);
        assert_eq!(storage.get(id).name, "i4");
    }

    #[test]
    fn root_scope_resolves_every_builtin() {
        let storage = IdentifierStorage::new();
        let root = Scope::root(&storage);
        for name in BUILTIN_NAMES {
            assert!(root.lookup(name).is_some(), "missing builtin {}", name);
        }
        assert!(root.lookup("not_a_builtin").is_none());
    }

    #[test]
    fn child_scope_sees_parent_bindings() {
        let storage = IdentifierStorage::new();
        let root = Scope::root(&storage);
        let child = Scope::chain(&root);
        assert!(child.lookup("bool").is_some());
    }

    #[test]
    fn redefinition_in_same_scope_reports_previous_id() {
        let mut storage = IdentifierStorage::new();
        let root = Scope::root(&storage);
        let first = storage.alloc("x", span());
        let second = storage.alloc("x", span());
        assert_eq!(root.define("x", first), None);
        assert_eq!(root.define("x", second), Some(first));
    }

    #[test]
    fn shadowing_a_parent_binding_is_not_a_local_collision() {
        let storage = IdentifierStorage::new();
        let root = Scope::root(&storage);
        let child = Scope::chain(&root);
        assert!(!child.defined_locally("bool"));
        assert!(child.lookup("bool").is_some());
    }
}
