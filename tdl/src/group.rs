//! Namespace containers
use crate::{Error, NativeFn, Result, Val};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Names starting with this marker are internal and never enumerated
pub const RESERVED_PREFIX: &str = "__";

/// A container of named values, subgroups, and procedures
#[derive(Debug, Default)]
pub struct Group {
    members: HashMap<String, Val>,
    constants: HashSet<String>,
    protected: bool,
}

/// Shared reference to a [Group]
#[derive(Clone, Default)]
pub struct GroupRef(Arc<Mutex<Group>>);

impl GroupRef {
    /// Create an empty group
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty group that refuses deletion
    pub fn protected() -> Self {
        let g = Self::new();
        g.lock().protected = true;
        g
    }

    fn lock(&self) -> MutexGuard<'_, Group> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `name` to `value`, overwriting any existing member
    pub fn set(&self, name: &str, value: Val) {
        self.lock().members.insert(name.to_string(), value);
    }

    /// Bind native function under its own name
    pub fn bind_native(&self, func: NativeFn) -> &Self {
        self.set(func.name, Val::Native(func));
        self
    }

    /// Bind `name` to `value` and mark it constant
    pub fn set_const(&self, name: &str, value: Val) {
        let mut g = self.lock();
        g.members.insert(name.to_string(), value);
        g.constants.insert(name.to_string());
    }

    /// Get value of member `name`
    pub fn get(&self, name: &str) -> Result<Val> {
        self.lock()
            .members
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnresolvedSymbol(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.lock().members.contains_key(name)
    }

    pub fn is_const(&self, name: &str) -> bool {
        self.lock().constants.contains(name)
    }

    /// Unbind member `name`, returning its previous value
    pub fn remove(&self, name: &str) -> Option<Val> {
        let mut g = self.lock();
        g.constants.remove(name);
        g.members.remove(name)
    }

    /// Sorted names of members, excluding reserved names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .lock()
            .members
            .keys()
            .filter(|k| !k.starts_with(RESERVED_PREFIX))
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Sorted names of members that are groups themselves
    pub fn subgroup_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .lock()
            .members
            .iter()
            .filter(|(k, v)| !k.starts_with(RESERVED_PREFIX) && matches!(v, Val::Group(_)))
            .map(|(k, _)| k.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of visible members
    pub fn len(&self) -> usize {
        self.names().len()
    }

    /// Number of members, including reserved ones
    pub(crate) fn total_len(&self) -> usize {
        self.lock().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_protected(&self) -> bool {
        self.lock().protected
    }

    pub fn set_protected(&self, protected: bool) {
        self.lock().protected = protected;
    }

    /// Whether or not both references point to the same group
    pub fn ptr_eq(&self, other: &GroupRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl std::fmt::Display for GroupRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Group: {} items, id={:#x}>", self.len(), self.addr())
    }
}

impl std::fmt::Debug for GroupRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GroupRef({:#x})", self.addr())
    }
}
