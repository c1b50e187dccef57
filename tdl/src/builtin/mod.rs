//! Builtin functions and constants installed in the core namespaces
pub mod docs;
pub mod env;
pub mod list;
pub mod math;
pub mod string;
pub mod types;

use crate::{Error, Result, SymbolTable, Val};

/// Populate `_sys`, `_builtin` and `_math` of a fresh table
pub(crate) fn install(table: &SymbolTable) {
    if let Some(sys) = table.core_group("_sys") {
        sys.set_const("version", Val::string(env!("CARGO_PKG_VERSION")));
    }

    if let Some(builtin) = table.core_group("_builtin") {
        builtin
            .bind_native(list::len_fn())
            .bind_native(list::range_fn())
            .bind_native(list::min_fn())
            .bind_native(list::max_fn())
            .bind_native(list::sum_fn())
            .bind_native(string::str_fn())
            .bind_native(string::repr_fn())
            .bind_native(string::join_fn())
            .bind_native(string::split_fn())
            .bind_native(string::format_fn())
            .bind_native(types::int_fn())
            .bind_native(types::float_fn())
            .bind_native(types::type_fn())
            .bind_native(types::isgroup_fn())
            .bind_native(types::callable_fn())
            .bind_native(math::abs_fn())
            .bind_native(docs::help_fn())
            .bind_native(env::group_fn())
            .bind_native(env::names_fn())
            .bind_native(env::subgroups_fn())
            .bind_native(env::show_group_fn())
            .bind_native(env::del_group_fn())
            .bind_native(env::reload_fn());
    }

    if let Some(m) = table.core_group("_math") {
        m.set_const("pi", Val::Float(std::f64::consts::PI));
        m.set_const("e", Val::Float(std::f64::consts::E));
        m.bind_native(math::sqrt_fn())
            .bind_native(math::exp_fn())
            .bind_native(math::log_fn())
            .bind_native(math::log10_fn())
            .bind_native(math::sin_fn())
            .bind_native(math::cos_fn())
            .bind_native(math::tan_fn())
            .bind_native(math::floor_fn())
            .bind_native(math::ceil_fn())
            .bind_native(math::pow_fn());
    }
}

/// Check argument count of builtin `name`
pub(crate) fn arity(name: &str, args: &[Val], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(Error::UnexpectedArguments(format!(
            "{name} expects {expected} argument{} - got {}",
            if expected == 1 { "" } else { "s" },
            args.len()
        )));
    }
    Ok(())
}
