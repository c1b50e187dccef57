mod compile;
mod config;
mod error;
mod eval;
mod group;
mod import;
mod source;
mod stmt;
mod symtab;

pub mod builtin;
pub mod expr;
pub mod types;

pub use compile::Compiler;
pub use config::Config;
pub use error::Error;
pub use eval::Evaluator;
pub use eval::Frame;
pub use eval::Signal;
pub use group::GroupRef;
pub use group::RESERVED_PREFIX;
pub use source::Input;
pub use source::LineReader;
pub use source::Statement;
pub use stmt::Import;
pub use stmt::ProcDef;
pub use stmt::Stmt;
pub use stmt::Target;
pub use symtab::Module;
pub use symtab::ModuleLoader;
pub use symtab::NativeModules;
pub use symtab::Scope;
pub use symtab::SymbolTable;
pub use symtab::CORE_GROUPS;
pub use symtab::TOP_GROUP;
pub use types::stdout_writer;
pub use types::DefinedVar;
pub use types::NativeFn;
pub use types::Procedure;
pub use types::Val;
pub use types::Writer;

pub type Result<T> = std::result::Result<T, Error>;
