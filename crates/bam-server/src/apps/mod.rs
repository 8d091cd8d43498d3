//! App variants managed by the registry

mod alias;
mod group;
mod process;
mod shareable;
mod web;

pub use alias::AliasApp;
pub use process::{ProcessApp, DEFAULT_GRACE_PERIOD};
pub use shareable::ShareableApp;
pub use web::{WebServerApp, INDEX_FILE};
