//! The reactive core: state store, name resolution, replacement, actions
//! and the update cycle.

pub mod action;
pub mod address;
pub mod arena;
pub(crate) mod builder;
pub mod chain;
pub mod coordinator;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod node;
pub mod replacement;
pub mod report;
pub mod resolver;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod tracker;
pub mod value;

pub use action::{ActionRequest, Interaction, InteractionKind, RequestId, RequestSource};
pub use address::{ComponentId, Namespace, StateKey};
pub use coordinator::{Engine, Phase};
pub use diagnostics::{ChangeEvent, ChangeReason};
pub use error::{EngineError, Issue, Rejection};
pub use report::{CycleReport, Disposition, FiredAction};
pub use snapshot::{ComponentSnapshot, DocumentSnapshot};
pub use value::Value;
