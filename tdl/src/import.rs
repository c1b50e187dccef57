//! Module import
use crate::source::Input;
use crate::symtab::{Module, Scope};
use crate::{Error, Evaluator, GroupRef, Result, Val};
use tracing::{debug, error};

impl Evaluator {
    /// Import module `name` into module scope of `scope`.
    ///
    /// Loaded modules are reused unless `reload` is set. The module is bound
    /// under `alias` (default `name`), or only the members listed in `names`
    /// are copied.
    pub fn import(
        &mut self,
        scope: &Scope,
        name: &str,
        alias: Option<&str>,
        names: Option<&[String]>,
        reload: bool,
    ) -> Result<GroupRef> {
        let loaded = match reload {
            true => None,
            false => self.table().module(name).map(|m| m.group().clone()),
        };
        let group = match loaded {
            Some(group) => {
                debug!("reusing loaded module {name}");
                group
            }
            None => self.load_module(name)?,
        };

        match names {
            None => scope
                .module()
                .set(alias.unwrap_or(name), Val::Group(group.clone())),
            Some(names) => {
                for member in names {
                    let value = group.get(member).map_err(|_| {
                        Error::UnresolvedSymbol(format!("{member} in module {name}"))
                    })?;
                    scope.module().set(member, value);
                }
            }
        }
        Ok(group)
    }

    /// Run module source, or ask native loader, and register result
    fn load_module(&mut self, name: &str) -> Result<GroupRef> {
        let module = match self.table().find_module_source(name) {
            Some(path) => {
                debug!("loading module {name} from {}", path.display());
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| Error::Io(format!("{} - {e}", path.display())))?;
                let group = GroupRef::new();
                let mut input = Input::new();
                input.push_text(&text, &path.display().to_string());
                self.run_input(&mut input, &Scope::isolated(group.clone()))
                    .inspect_err(|e| error!("failed to load module {name} - {e}"))?;
                Module::Script(group)
            }
            None => match self.table().loader().load(name)? {
                Some(group) => {
                    debug!("loaded native module {name}");
                    Module::Native(group)
                }
                None => return Err(Error::ModuleNotFound(name.to_string())),
            },
        };
        let group = module.group().clone();
        self.table_mut().register_module(name, module);
        Ok(group)
    }
}
