use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Absolute slash path of a component, e.g. `/p1` or `/a/count`.
///
/// The part before the last `/` is the namespace the component was created
/// in; the part after it is the component's name within that namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(Arc<str>);

impl ComponentId {
    pub fn new(path: impl Into<Arc<str>>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name within the enclosing namespace.
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(index) => &self.0[index + 1..],
            None => &self.0,
        }
    }

    /// Namespace this component was created in.
    pub fn namespace(&self) -> Namespace {
        match self.0.rfind('/') {
            Some(0) | None => Namespace::root(),
            Some(index) => Namespace(self.0[..index].into()),
        }
    }

    /// Namespace opened by this component for its descendants.
    pub fn as_namespace(&self) -> Namespace {
        Namespace(self.0.clone())
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Naming scope. The root namespace is the empty path; every other
/// namespace is named after the component that opened it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(Arc<str>);

impl Namespace {
    pub fn root() -> Self {
        Self("".into())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Id a component named `name` would get in this namespace.
    pub fn join(&self, name: &str) -> ComponentId {
        ComponentId::new(format!("{}/{}", self.0, name))
    }

    /// Enclosing namespace, `None` for the root.
    pub fn parent(&self) -> Option<Namespace> {
        if self.is_root() {
            return None;
        }
        Some(ComponentId(self.0.clone()).namespace())
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// One state variable of one component.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    pub component: ComponentId,
    pub state: Arc<str>,
}

impl StateKey {
    pub fn new(component: ComponentId, state: &str) -> Self {
        Self {
            component,
            state: state.into(),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.state)
    }
}

/// Something a computation can depend on.
///
/// `Exists` records a name probe, so a lookup that failed (or found a
/// different component) is retried when that id is created or destroyed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DepKey {
    State(StateKey),
    Exists(ComponentId),
}
