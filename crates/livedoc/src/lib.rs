//! Reactive engine for live interactive documents.
//!
//! A document is a tree of components. Component states are derived from
//! one another through a dependency graph, composites are replaced by
//! generated content, and actions write new values and chain into further
//! actions. [`Engine`] drives one update cycle per external event and
//! always leaves the document Settled.

pub mod components;
pub mod config;
pub mod document;
pub mod engine;
pub mod expr;

pub use config::{DocumentFlags, EngineConfig};
pub use document::{ChildSpec, ComponentSpec};
pub use engine::{
    ActionRequest, ComponentId, CycleReport, Disposition, DocumentSnapshot, Engine, EngineError,
    Interaction, Issue, Phase, Rejection, RequestId, Value,
};
