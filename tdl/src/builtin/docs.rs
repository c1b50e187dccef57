use crate::{Error, NativeFn, Val};

pub(crate) fn help_fn() -> NativeFn {
    NativeFn {
        name: "help",
        doc: "help(X) - Returns docstring for procedure or builtin X, or for the one named by string X"
            .to_string(),
        func: |f, args| {
            let target = match args {
                [Val::String(name)] => f.table().get_symbol(f.scope(), name)?,
                [v] => v.clone(),
                _ => {
                    return Err(Error::UnexpectedArguments(format!(
                        "help expects one callable object as argument - got {} arguments",
                        args.len()
                    )))
                }
            };
            let docstring = match target {
                Val::Proc(p) => p
                    .doc
                    .clone()
                    .unwrap_or("<missing documentation>".to_string()),
                Val::Native(n) => n.doc,
                v => {
                    return Err(Error::UnexpectedArguments(format!(
                        "help expects one callable object as argument - got {}",
                        v.type_name()
                    )))
                }
            };

            Ok(Val::String(docstring))
        },
    }
}
