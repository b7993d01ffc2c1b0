mod aggregate;
mod classify;
mod engine;
mod event;
mod feed;
mod fetch;
mod registry;

pub mod event_builder;
pub mod recurrence;
pub mod time;

pub use aggregate::*;
pub use classify::*;
pub use engine::*;
pub use event::*;
pub use feed::*;
pub use fetch::*;
pub use registry::*;
