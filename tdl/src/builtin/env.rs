//! Namespace related bindings
use super::arity;
use crate::eval::Frame;
use crate::{Error, GroupRef, NativeFn, Result, Val};

/// Group named or given by optional argument, defaulting to local scope
fn target_group(f: &Frame<'_>, name: &str, args: &[Val]) -> Result<GroupRef> {
    match args {
        [] => Ok(f.scope().local().clone()),
        [Val::Group(g)] => Ok(g.clone()),
        [Val::String(s)] => f.table().get_group(f.scope(), s),
        _ => Err(Error::UnexpectedArguments(format!(
            "{name} expects an optional group or group name"
        ))),
    }
}

fn string_list(names: Vec<String>) -> Val {
    Val::List(names.into_iter().map(Val::String).collect())
}

/// Binding for `group` creating a new, empty group
pub fn group_fn() -> NativeFn {
    NativeFn {
        name: "group",
        doc: "group() - Returns a new empty group".to_string(),
        func: |f, args| {
            arity("group", args, 0)?;
            Ok(Val::Group(f.table().create_group()))
        },
    }
}

/// Binding for `names` listing members of a group
pub fn names_fn() -> NativeFn {
    NativeFn {
        name: "names",
        doc: "names(GROUP) - Returns sorted names defined in GROUP, or in current scope".to_string(),
        func: |f, args| Ok(string_list(target_group(f, "names", args)?.names())),
    }
}

pub fn subgroups_fn() -> NativeFn {
    NativeFn {
        name: "subgroups",
        doc: "subgroups(GROUP) - Returns sorted names of groups within GROUP, or within current scope"
            .to_string(),
        func: |f, args| Ok(string_list(target_group(f, "subgroups", args)?.subgroup_names())),
    }
}

pub fn show_group_fn() -> NativeFn {
    NativeFn {
        name: "show_group",
        doc: "show_group(NAME) - Prints members of group NAME, or of the top level group".to_string(),
        func: |f, args| {
            let name = match args {
                [] => None,
                [Val::String(s)] => Some(s.as_str()),
                _ => {
                    return Err(Error::UnexpectedArguments(
                        "show_group expects an optional group name".to_string(),
                    ))
                }
            };
            f.table().show_group(f.scope(), name)?;
            Ok(Val::Nil)
        },
    }
}

pub fn del_group_fn() -> NativeFn {
    NativeFn {
        name: "del_group",
        doc: "del_group(NAME) - Deletes group NAME. Protected groups are kept".to_string(),
        func: |f, args| {
            arity("del_group", args, 1)?;
            f.table().delete_group(f.scope(), args[0].as_str()?)?;
            Ok(Val::Nil)
        },
    }
}

pub fn reload_fn() -> NativeFn {
    NativeFn {
        name: "reload",
        doc: "reload(NAME) - Imports module NAME again, replacing the loaded module".to_string(),
        func: |f, args| {
            arity("reload", args, 1)?;
            let name = args[0].as_str()?.to_string();
            Ok(Val::Group(f.import(&name, true)?))
        },
    }
}
