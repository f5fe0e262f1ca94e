pub mod dispatcher;
pub mod handler;
pub mod registration;

pub use dispatcher::{FiringStatus, HookDispatcher, HookFiring};
pub use handler::{CommandHandler, HookContext, HookHandler};
pub use registration::{FilterExpr, HookEvent, HookRegistration};
