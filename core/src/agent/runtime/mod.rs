//! Task execution runtime
//!
//! Capability traits, the task registry, the response synthesizer and the
//! executor that ties them to the session store.

pub mod capability;
pub mod context;
pub mod error;
pub mod executor;
pub mod ids;
pub mod impls;
pub mod registry;
pub mod response;

pub use capability::*;
pub use context::*;
pub use error::*;
pub use executor::{extract_user_message, AgentRuntime};
pub use ids::{IdGenerator, UuidGenerator};
pub use registry::{RegistrationGuard, TaskRegistry};
pub use response::{ResponseEvent, ResponseKind, ResponseSynthesizer, CANCELLED_TEXT};
