//! Per-conversation session state

pub mod janitor;
pub mod store;

pub use janitor::SessionJanitor;
pub use store::{Session, SessionStore};
