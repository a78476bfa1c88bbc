//! Shadow Runtime -- explicit bootstrap and the namespace registry.
//!
//! Nothing in the workspace does work at load time. A process builds a
//! [`Runtime`](runtime::Runtime) from a [`RuntimeConfig`](config::RuntimeConfig),
//! which resolves the cache root, loads the game constants (degrading to
//! empty constants when no data is available), and creates the event cache.
//! Feeding the cache is a separate step: [`Runtime::attach`](runtime::Runtime::attach)
//! hands it an event source.
//!
//! Namespace handles (`tabs`, `world`, ...) come from the runtime's
//! [`NamespaceRegistry`](registry::NamespaceRegistry). Each is constructed
//! once and shared; constructing one never waits for the cache to warm.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use shadow_runtime::prelude::*;
//!
//! shadow_runtime::logging::init("warn");
//! let runtime = Runtime::initialize(RuntimeConfig::from_env()).unwrap();
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! runtime.attach(rx).unwrap();
//! tx.send(serde_json::json!({"type": "snapshot_complete"})).unwrap();
//!
//! if runtime.await_warm(None) == WarmupOutcome::Warm {
//!     let world = runtime.namespace(NamespaceId::World);
//!     let npcs = world.query(EntityKind::Npc).unwrap().count();
//!     println!("{npcs} npcs in view");
//! }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod logging;
pub mod namespace;
pub mod registry;
pub mod runtime;

pub use shadow_resources;
pub use shadow_state;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Cache, fetch, generation, or load failure.
    #[error(transparent)]
    Resources(#[from] shadow_resources::ResourceError),

    /// Event cache or query failure.
    #[error(transparent)]
    State(#[from] shadow_state::StateError),

    /// A namespace child was requested with a different type than it was
    /// first created with.
    #[error("namespace '{namespace}' child '{child}' was created with a different type")]
    ChildTypeMismatch {
        namespace: namespace::NamespaceId,
        child: String,
    },

    /// A namespace was asked to query an entity kind it does not read.
    #[error("namespace '{namespace}' does not read {kind} entities")]
    KindOutsideNamespace {
        namespace: namespace::NamespaceId,
        kind: shadow_state::schema::EntityKind,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::config::RuntimeConfig;
    pub use crate::namespace::{NamespaceHandle, NamespaceId};
    pub use crate::registry::NamespaceRegistry;
    pub use crate::runtime::Runtime;
    pub use crate::RuntimeError;
    pub use shadow_state::prelude::*;
}
