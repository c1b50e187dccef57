use super::arity;
use crate::{Error, NativeFn, Val};
use dyn_fmt::AsStrFormatExt;

pub(crate) fn str_fn() -> NativeFn {
    NativeFn {
        name: "str",
        doc: "str(X) - Returns X converted to its display string".to_string(),
        func: |_, args| {
            arity("str", args, 1)?;
            Ok(Val::String(args[0].to_string()))
        },
    }
}

pub(crate) fn repr_fn() -> NativeFn {
    NativeFn {
        name: "repr",
        doc: "repr(X) - Returns X converted to a string, quoting strings".to_string(),
        func: |_, args| {
            arity("repr", args, 1)?;
            Ok(Val::String(args[0].repr()))
        },
    }
}

pub(crate) fn join_fn() -> NativeFn {
    NativeFn {
        name: "join",
        doc: "join(SEP, LIST) - Returns a new string by concatenating each item of LIST coerced into string, separated by SEP."
            .to_string(),
        func: |_, args| match args {
            [Val::String(sep), Val::List(items)] => Ok(Val::String(
                items
                    .iter()
                    .map(Val::to_string)
                    .collect::<Vec<_>>()
                    .join(sep),
            )),
            _ => Err(Error::UnexpectedArguments(
                "join expects SEP string and LIST as arguments".to_string(),
            )),
        },
    }
}

pub(crate) fn split_fn() -> NativeFn {
    NativeFn {
        name: "split",
        doc: "split(SEP, STR) - Returns a list separating string STR by SEP.".to_string(),
        func: |_, args| {
            let substrings = match args {
                [Val::String(sep), Val::String(string)] if !sep.is_empty() => string.split(sep.as_str()),
                _ => {
                    return Err(Error::UnexpectedArguments(
                        "split expects non-empty SEP and STR as arguments".to_string(),
                    ))
                }
            };
            Ok(Val::List(substrings.map(Val::string).collect()))
        },
    }
}

pub(crate) fn format_fn() -> NativeFn {
    NativeFn {
        name: "format",
        doc: "format(FORMAT, ARG1, ..., ARGN) - Returns a new string by templating each {} in FORMAT with arguments coerced into strings."
            .to_string(),
        func: |_, args| {
            let format = args
                .first()
                .ok_or(Error::UnexpectedArguments(
                    "First argument should be format string".to_string(),
                ))?
                .as_str()?;

            let str_args = args.iter().skip(1).map(Val::to_string).collect::<Vec<_>>();
            Ok(Val::String(format.format(str_args.as_slice())))
        },
    }
}
