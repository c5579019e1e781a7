//! Command framework.
//!
//! Commands are declared with [`CommandBuilder`], registered on a
//! [`Dispatcher`], and invoked from raw [`InvocationEvent`]s. Each invocation
//! gets its own [`Context`] that checks, converters, hooks and the command
//! body share.
//!
//! ## Pipeline
//!
//! prefix → resolve → checks → cooldowns → concurrency → bind → before-invoke
//! → body → after-invoke → completion or error routing.

pub mod binding;
pub mod checks;
pub mod command;
pub mod context;
pub mod converters;
pub mod dispatcher;
pub mod hooks;
pub mod module;
pub mod params;
pub mod registry;
pub mod responder;
pub mod value;

pub use checks::{
    Check, Predicate, RoleRef, check_any, check_fn, dm_only, guild_only, has_any_role,
    has_permissions, has_role, is_nsfw, is_owner,
};
pub use command::{Command, CommandBuilder};
pub use context::{Author, Context, InvocationEvent, Origin, Permissions, ScopeKind};
pub use converters::{ConvertError, Converter, ConverterRegistry, Flag, FlagGroup, FlagSyntax};
pub use dispatcher::Dispatcher;
pub use hooks::{
    DefaultHooks, ErrorHandler, Handler, HandlerResult, Hooks, InvokeHook, cause_chain,
    error_handler_fn, handler_fn, hook_fn,
};
pub use module::Module;
pub use params::{ParamDefault, Parameter, Shape, TypeKey};
pub use registry::{Registry, Resolved};
pub use responder::{Reply, Responder};
pub use value::{Args, Value};
