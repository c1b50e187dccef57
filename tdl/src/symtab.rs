//! Scope resolution over the root namespace, core namespaces, and loaded modules
use crate::{builtin, Error, GroupRef, Result, Val, Writer};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Name aliasing the root namespace
pub const TOP_GROUP: &str = "_main";

/// Core namespaces, always present and always searched, in search order
pub const CORE_GROUPS: [&str; 3] = ["_sys", "_builtin", "_math"];

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Execution context: the namespaces consulted before the search path
#[derive(Debug, Clone)]
pub struct Scope {
    id: u64,
    local: GroupRef,
    module: GroupRef,
}

impl Scope {
    pub fn new(local: GroupRef, module: GroupRef) -> Self {
        Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            local,
            module,
        }
    }

    /// Scope where `group` is both local and module scope
    pub fn isolated(group: GroupRef) -> Self {
        Self::new(group.clone(), group)
    }

    /// Unique id of this execution context
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn local(&self) -> &GroupRef {
        &self.local
    }

    pub fn module(&self) -> &GroupRef {
        &self.module
    }
}

/// A loaded module
#[derive(Debug, Clone)]
pub enum Module {
    /// Loaded from a source file
    Script(GroupRef),
    /// Provided by the host
    Native(GroupRef),
}

impl Module {
    pub fn group(&self) -> &GroupRef {
        match self {
            Module::Script(g) | Module::Native(g) => g,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Module::Native(_))
    }
}

/// Loader for modules with no source file on the search path
pub trait ModuleLoader {
    /// Build namespace for module `name`, or `None` if unknown
    fn load(&self, name: &str) -> Result<Option<GroupRef>>;
}

/// [ModuleLoader] backed by registered factory functions
#[derive(Default)]
pub struct NativeModules {
    factories: HashMap<String, fn() -> GroupRef>,
}

impl NativeModules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register factory building module `name`
    pub fn register(&mut self, name: &str, factory: fn() -> GroupRef) -> &mut Self {
        self.factories.insert(name.to_string(), factory);
        self
    }
}

impl ModuleLoader for NativeModules {
    fn load(&self, name: &str) -> Result<Option<GroupRef>> {
        Ok(self.factories.get(name).map(|factory| factory()))
    }
}

/// Concrete search groups memoized for a (table version, scope id) pair
#[derive(Default)]
struct SearchCache {
    version: u64,
    scope_id: u64,
    groups: Vec<GroupRef>,
}

/// Owner of the namespace hierarchy
pub struct SymbolTable {
    root: GroupRef,
    modules: BTreeMap<String, Module>,
    path: Vec<PathBuf>,
    extension: String,
    search_names: Vec<String>,
    version: u64,
    cache: RefCell<SearchCache>,
    loader: Box<dyn ModuleLoader>,
    writer: Writer,
}

impl SymbolTable {
    /// Table with empty core namespaces
    pub fn new(writer: Writer) -> Self {
        let root = GroupRef::protected();
        let mut modules = BTreeMap::new();
        modules.insert(TOP_GROUP.to_string(), Module::Script(root.clone()));
        for name in CORE_GROUPS {
            let group = GroupRef::protected();
            root.set(name, Val::Group(group.clone()));
            modules.insert(name.to_string(), Module::Native(group));
        }
        Self {
            root,
            modules,
            path: vec![PathBuf::from(".")],
            extension: String::from("tdl"),
            search_names: CORE_GROUPS.iter().map(|s| s.to_string()).collect(),
            version: 1,
            cache: RefCell::new(SearchCache::default()),
            loader: Box::new(NativeModules::new()),
            writer,
        }
    }

    /// Table with builtins installed in core namespaces
    pub fn standard(writer: Writer) -> Self {
        let table = Self::new(writer);
        builtin::install(&table);
        table
    }

    pub fn root(&self) -> &GroupRef {
        &self.root
    }

    /// One of the [CORE_GROUPS]
    pub fn core_group(&self, name: &str) -> Option<GroupRef> {
        CORE_GROUPS
            .contains(&name)
            .then(|| self.modules.get(name).map(|m| m.group().clone()))
            .flatten()
    }

    pub fn writer(&self) -> &Writer {
        &self.writer
    }

    /// Send text to output sink
    pub fn write(&self, text: &str) {
        (self.writer)(text)
    }

    pub fn set_loader(&mut self, loader: Box<dyn ModuleLoader>) {
        self.loader = loader;
    }

    pub fn loader(&self) -> &dyn ModuleLoader {
        self.loader.as_ref()
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    /// Names of registered modules
    pub fn module_names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    pub fn register_module(&mut self, name: &str, module: Module) {
        debug!("registering module {name}");
        self.modules.insert(name.to_string(), module);
        self.version += 1;
    }

    /// Module import directories, searched in order
    pub fn path(&self) -> &[PathBuf] {
        &self.path
    }

    pub fn set_path(&mut self, path: Vec<PathBuf>) {
        self.path = path;
    }

    pub fn add_path(&mut self, dir: impl Into<PathBuf>) {
        self.path.push(dir.into());
    }

    pub fn set_extension(&mut self, extension: &str) {
        self.extension = extension.trim_start_matches('.').to_string();
    }

    /// First source file for module `name` on the import path
    pub fn find_module_source(&self, name: &str) -> Option<PathBuf> {
        self.path
            .iter()
            .map(|dir| dir.join(format!("{name}.{}", self.extension)))
            .find(|p| p.is_file())
    }

    /// Names whose groups are searched after local and module scope
    pub fn search_names(&self) -> &[String] {
        &self.search_names
    }

    /// Replace search names. Core namespaces are always appended
    pub fn set_search_names(&mut self, names: Vec<String>) {
        let mut search_names: Vec<String> = vec![];
        let core = CORE_GROUPS.iter().map(|s| s.to_string());
        for name in names.into_iter().chain(core) {
            if !search_names.contains(&name) {
                search_names.push(name);
            }
        }
        self.search_names = search_names;
        self.version += 1;
    }

    /// Group for a search name: a registered module, or a group bound in one
    fn find_search_group(&self, name: &str) -> Option<GroupRef> {
        if let Some(module) = self.modules.get(name) {
            return Some(module.group().clone());
        }
        self.modules
            .values()
            .find_map(|m| m.group().get(name).ok()?.as_group().cloned())
    }

    /// Groups searched for the first segment of a name, in order
    pub fn search_groups(&self, scope: &Scope) -> Vec<GroupRef> {
        self.refresh_search_path(scope);
        self.cache.borrow().groups.clone()
    }

    /// Recompute search groups if table or scope changed since last refresh
    pub fn refresh_search_path(&self, scope: &Scope) {
        let mut cache = self.cache.borrow_mut();
        if cache.version == self.version && cache.scope_id == scope.id {
            return;
        }
        let candidates = [scope.local.clone(), scope.module.clone()]
            .into_iter()
            .chain(self.search_names.iter().filter_map(|n| {
                let group = self.find_search_group(n);
                if group.is_none() {
                    warn!("search name {n} does not name a group");
                }
                group
            }))
            .chain(std::iter::once(self.root.clone()));

        let mut groups: Vec<GroupRef> = vec![];
        for g in candidates {
            if !groups.iter().any(|seen| seen.ptr_eq(&g)) {
                groups.push(g);
            }
        }
        debug!(
            "refreshed search path for scope {} - {} groups",
            scope.id,
            groups.len()
        );
        *cache = SearchCache {
            version: self.version,
            scope_id: scope.id,
            groups,
        };
    }

    /// Resolve a possibly dotted name.
    ///
    /// With `create`, missing segments are created: the first segment in
    /// local scope, intermediate segments as groups, and the final one as Nil.
    pub fn resolve(&self, scope: &Scope, name: &str, create: bool) -> Result<Val> {
        let segments: Vec<&str> = name.split('.').collect();
        let (first, rest) = segments
            .split_first()
            .ok_or_else(|| Error::UnresolvedSymbol(name.to_string()))?;

        let mut value = match self.lookup_first(scope, first) {
            Some(v) => v,
            None if create => {
                let v = if rest.is_empty() {
                    Val::Nil
                } else {
                    Val::Group(GroupRef::new())
                };
                scope.local.set(first, v.clone());
                v
            }
            None => return Err(Error::UnresolvedSymbol(name.to_string())),
        };

        for (i, seg) in rest.iter().enumerate() {
            let group = match &value {
                Val::Group(g) => g.clone(),
                _ if create => {
                    return Err(Error::InvalidTarget(format!(
                        "cannot create '{name}' - '{}' is not a group",
                        segments[..=i].join(".")
                    )))
                }
                _ => return Err(Error::UnresolvedSymbol(name.to_string())),
            };
            value = match group.get(seg) {
                Ok(v) => v,
                Err(_) if create => {
                    let v = if i + 1 == rest.len() {
                        Val::Nil
                    } else {
                        Val::Group(GroupRef::new())
                    };
                    group.set(seg, v.clone());
                    v
                }
                Err(_) => return Err(Error::UnresolvedSymbol(name.to_string())),
            };
        }
        Ok(value)
    }

    fn lookup_first(&self, scope: &Scope, name: &str) -> Option<Val> {
        if name == TOP_GROUP {
            return Some(Val::Group(self.root.clone()));
        }
        self.search_groups(scope)
            .iter()
            .find_map(|g| g.get(name).ok())
    }

    pub fn get_symbol(&self, scope: &Scope, name: &str) -> Result<Val> {
        self.resolve(scope, name, false)
    }

    pub fn has_symbol(&self, scope: &Scope, name: &str) -> bool {
        self.resolve(scope, name, false).is_ok()
    }

    /// Resolve name that must refer to a group
    pub fn get_group(&self, scope: &Scope, name: &str) -> Result<GroupRef> {
        match self.resolve(scope, name, false)? {
            Val::Group(g) => Ok(g),
            v => Err(Error::InvalidTarget(format!(
                "'{name}' is not a group - got {}",
                v.type_name()
            ))),
        }
    }

    pub fn has_group(&self, scope: &Scope, name: &str) -> bool {
        self.get_group(scope, name).is_ok()
    }

    /// Group and member name a binding for `name` goes into. Bare names bind
    /// in `group`, or local scope if not given. Missing intermediate groups
    /// of dotted names are created.
    pub fn binding_slot(
        &self,
        scope: &Scope,
        name: &str,
        group: Option<&GroupRef>,
    ) -> Result<(GroupRef, String)> {
        let (parents, child) = match name.rsplit_once('.') {
            Some((parents, child)) => (Some(parents), child),
            None => (None, name),
        };
        if child.is_empty() {
            return Err(Error::InvalidTarget(format!("invalid name '{name}'")));
        }
        let parent = match (parents, group) {
            (None, Some(g)) => g.clone(),
            (None, None) => scope.local.clone(),
            (Some(parents), Some(g)) => traverse(g.clone(), parents.split('.'))?,
            (Some(parents), None) => {
                let (first, rest) = match parents.split_once('.') {
                    Some((first, rest)) => (first, Some(rest)),
                    None => (parents, None),
                };
                let head = match self.lookup_first(scope, first) {
                    Some(Val::Group(g)) => g,
                    Some(v) => {
                        return Err(Error::InvalidTarget(format!(
                            "cannot bind '{name}' - '{first}' is {}",
                            v.type_name()
                        )))
                    }
                    None => {
                        let g = GroupRef::new();
                        scope.local.set(first, Val::Group(g.clone()));
                        g
                    }
                };
                match rest {
                    Some(rest) => traverse(head, rest.split('.'))?,
                    None => head,
                }
            }
        };
        Ok((parent, child.to_string()))
    }

    /// Bind `value` to `name`, in `group` if given
    pub fn set_symbol(
        &self,
        scope: &Scope,
        name: &str,
        value: Val,
        group: Option<&GroupRef>,
    ) -> Result<()> {
        let (parent, child) = self.binding_slot(scope, name, group)?;
        if parent.is_const(&child) {
            return Err(Error::InvalidTarget(format!(
                "cannot re-assign value of constant {name}"
            )));
        }
        parent.set(&child, value);
        Ok(())
    }

    /// Group containing the existing binding for `name`
    fn owner(&self, scope: &Scope, name: &str) -> Result<(GroupRef, String)> {
        match name.rsplit_once('.') {
            Some((parents, child)) => Ok((self.get_group(scope, parents)?, child.to_string())),
            None => self
                .search_groups(scope)
                .into_iter()
                .find(|g| g.has(name))
                .map(|g| (g, name.to_string()))
                .ok_or_else(|| Error::UnresolvedSymbol(name.to_string())),
        }
    }

    /// Remove a binding. Groups are removed with [Self::delete_group]
    pub fn delete_symbol(&self, scope: &Scope, name: &str) -> Result<()> {
        if let Val::Group(_) = self.resolve(scope, name, false)? {
            return Err(Error::InvalidTarget(format!(
                "'{name}' is a group - use del_group"
            )));
        }
        let (parent, child) = self.owner(scope, name)?;
        if parent.is_const(&child) {
            return Err(Error::InvalidTarget(format!("cannot delete constant {name}")));
        }
        parent.remove(&child);
        Ok(())
    }

    /// Remove a group. Protected groups are left in place and the refusal is
    /// reported through the writer.
    pub fn delete_group(&self, scope: &Scope, name: &str) -> Result<()> {
        let group = self.get_group(scope, name)?;
        if group.is_protected() {
            warn!("refused to delete protected group {name}");
            self.write(&format!("cannot delete group '{name}'\n"));
            return Ok(());
        }
        let (parent, child) = self.owner(scope, name)?;
        parent.remove(&child);
        Ok(())
    }

    /// Write a listing of group `name`, or the root group
    pub fn show_group(&self, scope: &Scope, name: Option<&str>) -> Result<()> {
        let (title, group) = match name {
            Some(name) => (name, self.get_group(scope, name)?),
            None => (TOP_GROUP, self.root.clone()),
        };
        self.write(&listing(title, &group));
        Ok(())
    }

    /// Write names of groups in root namespace with their sizes
    pub fn list_groups(&self) {
        let mut out = String::new();
        for name in self.root.subgroup_names() {
            if let Ok(Val::Group(g)) = self.root.get(&name) {
                out.push_str(&format!("  {name}: {} symbols\n", g.len()));
            }
        }
        self.write(&out);
    }

    /// Bind `group` under `name`, inside group `parent` or local scope
    pub fn place_group(
        &self,
        scope: &Scope,
        name: &str,
        group: GroupRef,
        parent: Option<&str>,
    ) -> Result<()> {
        let parent = parent.map(|p| self.get_group(scope, p)).transpose()?;
        self.set_symbol(scope, name, Val::Group(group), parent.as_ref())
    }

    pub fn create_group(&self) -> GroupRef {
        GroupRef::new()
    }
}

/// Walk `segments` from `group`, creating missing groups
fn traverse<'a>(group: GroupRef, segments: impl Iterator<Item = &'a str>) -> Result<GroupRef> {
    let mut current = group;
    for seg in segments {
        current = match current.get(seg) {
            Ok(Val::Group(g)) => g,
            Ok(v) => {
                return Err(Error::InvalidTarget(format!(
                    "'{seg}' is not a group - got {}",
                    v.type_name()
                )))
            }
            Err(_) => {
                let g = GroupRef::new();
                current.set(seg, Val::Group(g.clone()));
                g
            }
        };
    }
    Ok(current)
}

fn listing(title: &str, group: &GroupRef) -> String {
    let names = group.names();
    let mut out = format!("== {title}: {} symbols ==\n", names.len());
    for name in &names {
        if let Ok(v) = group.get(name) {
            out.push_str(&format!("  {name}: {}\n", v.repr()));
        }
    }
    out
}

impl std::fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolTable")
            .field("root", &self.root)
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .field("path", &self.path)
            .field("search_names", &self.search_names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdout_writer;
    use assert_matches::assert_matches;
    use std::sync::{Arc, Mutex};

    fn table() -> SymbolTable {
        SymbolTable::new(stdout_writer())
    }

    fn captured() -> (SymbolTable, Arc<Mutex<String>>) {
        let out = Arc::new(Mutex::new(String::new()));
        let sink = out.clone();
        let table = SymbolTable::new(Arc::new(move |s: &str| sink.lock().unwrap().push_str(s)));
        (table, out)
    }

    #[test]
    fn core_groups_are_present() {
        let t = table();
        for name in CORE_GROUPS {
            assert!(t.core_group(name).is_some());
            assert!(t.root().has(name));
        }
        assert!(t.core_group("_main").is_none());
    }

    #[test]
    fn resolve_create_then_resolve() {
        let t = table();
        let scope = Scope::isolated(t.root().clone());
        assert_matches!(t.resolve(&scope, "a.b.c", false), Err(Error::UnresolvedSymbol(_)));
        assert_eq!(t.resolve(&scope, "a.b.c", true), Ok(Val::Nil));
        assert_eq!(t.resolve(&scope, "a.b.c", false), Ok(Val::Nil));
        assert!(t.has_group(&scope, "a.b"));
    }

    #[test]
    fn resolve_through_non_group() {
        let t = table();
        let scope = Scope::isolated(t.root().clone());
        t.set_symbol(&scope, "x", Val::Int(1), None).unwrap();
        assert_matches!(t.resolve(&scope, "x.y", true), Err(Error::InvalidTarget(_)));
        assert_matches!(t.resolve(&scope, "x.y", false), Err(Error::UnresolvedSymbol(_)));
    }

    #[test]
    fn main_aliases_root() {
        let t = table();
        let scope = Scope::isolated(GroupRef::new());
        t.root().set("x", Val::Int(3));
        assert_eq!(t.get_symbol(&scope, "_main.x"), Ok(Val::Int(3)));
        assert_eq!(
            t.get_symbol(&scope, "_main"),
            Ok(Val::Group(t.root().clone()))
        );
    }

    #[test]
    fn local_shadows_module_and_core() {
        let t = table();
        let (local, module) = (GroupRef::new(), GroupRef::new());
        let scope = Scope::new(local.clone(), module.clone());
        t.core_group("_builtin").unwrap().set("x", Val::Int(1));
        assert_eq!(t.get_symbol(&scope, "x"), Ok(Val::Int(1)));
        module.set("x", Val::Int(2));
        assert_eq!(t.get_symbol(&scope, "x"), Ok(Val::Int(2)));
        local.set("x", Val::Int(3));
        assert_eq!(t.get_symbol(&scope, "x"), Ok(Val::Int(3)));
    }

    #[test]
    fn search_path_is_deduplicated() {
        let t = table();
        let scope = Scope::isolated(t.root().clone());
        let groups = t.search_groups(&scope);
        assert_eq!(groups.len(), 4);
        assert!(groups[0].ptr_eq(t.root()));
        assert!(groups[1].ptr_eq(&t.core_group("_sys").unwrap()));
    }

    #[test]
    fn search_names_keep_core() {
        let mut t = table();
        let scope = Scope::isolated(t.root().clone());
        let data = GroupRef::new();
        data.set("v", Val::Int(7));
        t.root().set("data", Val::Group(data));
        assert_matches!(t.get_symbol(&scope, "v"), Err(Error::UnresolvedSymbol(_)));

        t.set_search_names(vec!["data".to_string()]);
        assert_eq!(t.search_names(), ["data", "_sys", "_builtin", "_math"]);
        assert_eq!(t.get_symbol(&scope, "v"), Ok(Val::Int(7)));
    }

    #[test]
    fn set_symbol_dotted() {
        let t = table();
        let scope = Scope::isolated(t.root().clone());
        t.set_symbol(&scope, "cfg.opts.level", Val::Int(2), None).unwrap();
        assert_eq!(t.get_symbol(&scope, "cfg.opts.level"), Ok(Val::Int(2)));
        t.set_symbol(&scope, "cfg.opts.width", Val::Int(3), None).unwrap();
        assert_eq!(t.get_symbol(&scope, "cfg.opts.level"), Ok(Val::Int(2)));
        t.set_symbol(&scope, "top.x", Val::Nil, None).unwrap();
        assert!(t.has_group(&scope, "top"));

        assert_matches!(
            t.set_symbol(&scope, "cfg.opts.level.x", Val::Int(1), None),
            Err(Error::InvalidTarget(_))
        );
        t.root().set("n", Val::Int(1));
        assert_matches!(
            t.set_symbol(&scope, "n.x", Val::Int(1), None),
            Err(Error::InvalidTarget(_))
        );

        let g = GroupRef::new();
        t.set_symbol(&scope, "a.b", Val::Int(1), Some(&g)).unwrap();
        assert_eq!(t.get_symbol(&Scope::isolated(g), "a.b"), Ok(Val::Int(1)));
    }

    #[test]
    fn set_symbol_constant() {
        let t = table();
        let scope = Scope::isolated(t.root().clone());
        t.root().set_const("k", Val::Int(1));
        assert_matches!(
            t.set_symbol(&scope, "k", Val::Int(2), None),
            Err(Error::InvalidTarget(_))
        );
        assert_matches!(t.delete_symbol(&scope, "k"), Err(Error::InvalidTarget(_)));
    }

    #[test]
    fn delete_symbol() {
        let t = table();
        let scope = Scope::isolated(t.root().clone());
        t.set_symbol(&scope, "g.x", Val::Int(1), None).unwrap();
        assert_matches!(t.delete_symbol(&scope, "g"), Err(Error::InvalidTarget(_)));
        t.delete_symbol(&scope, "g.x").unwrap();
        assert!(!t.has_symbol(&scope, "g.x"));
        assert_matches!(t.delete_symbol(&scope, "g.x"), Err(Error::UnresolvedSymbol(_)));
    }

    #[test]
    fn delete_protected_group() {
        let (t, out) = captured();
        let scope = Scope::isolated(t.root().clone());
        assert_eq!(t.delete_group(&scope, "_math"), Ok(()));
        assert!(t.has_group(&scope, "_math"));
        assert_eq!(*out.lock().unwrap(), "cannot delete group '_math'\n");

        t.set_symbol(&scope, "tmp.x", Val::Int(1), None).unwrap();
        assert_eq!(t.delete_group(&scope, "tmp"), Ok(()));
        assert!(!t.has_group(&scope, "tmp"));
    }

    #[test]
    fn show_group_listing() {
        let (t, out) = captured();
        let scope = Scope::isolated(t.root().clone());
        t.set_symbol(&scope, "g.b", Val::string("x"), None).unwrap();
        t.set_symbol(&scope, "g.a", Val::Int(1), None).unwrap();
        t.show_group(&scope, Some("g")).unwrap();
        assert_eq!(*out.lock().unwrap(), "== g: 2 symbols ==\n  a: 1\n  b: 'x'\n");
    }

    #[test]
    fn place_group_in_parent() {
        let t = table();
        let scope = Scope::isolated(t.root().clone());
        t.set_symbol(&scope, "outer.x", Val::Nil, None).unwrap();
        let g = t.create_group();
        t.place_group(&scope, "inner", g.clone(), Some("outer")).unwrap();
        assert!(t.get_group(&scope, "outer.inner").unwrap().ptr_eq(&g));
    }

    #[test]
    fn native_modules_loader() {
        let mut modules = NativeModules::new();
        modules.register("answers", || {
            let g = GroupRef::new();
            g.set("everything", Val::Int(42));
            g
        });
        let g = modules.load("answers").unwrap().unwrap();
        assert_eq!(g.get("everything"), Ok(Val::Int(42)));
        assert!(modules.load("nope").unwrap().is_none());
    }
}
