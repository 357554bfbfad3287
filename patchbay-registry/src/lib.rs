//! # patchbay-registry
//!
//! The declarative side of the patchbay runtime: a [`Model`] describes
//! the threads, components, implemented services and dependencies of an
//! application before anything is instantiated, and the
//! [`ComponentLoader`] walks a model in thread → component order to
//! bring it to life against a running service manager.
//!
//! ```text
//! Model
//! └── ComponentThreadEntry ("workers")
//!     ├── ComponentEntry ("sensor0")
//!     │     services:     [Telemetry 1.0.0]
//!     │     dependencies: [storage]
//!     │     workers:      [workers::poller]
//!     └── ComponentEntry ("storage")
//!           services:     [Storage 1.2.0]
//! ```
//!
//! A model is mutable only until it is marked loaded. Every role name
//! is unique within the loader, every service name unique within its
//! component, every thread name unique within a model.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

/// The component loader.
pub mod loader;

/// Model entities and entry lists.
pub mod model;

pub use loader::{ComponentLoader, ModelError};
pub use model::{
    Component, ComponentEntry, ComponentList, ComponentThreadEntry, ComponentThreadList,
    DependencyEntry, DependencyList, EntryList, FuncCreateComponent, FuncDeleteComponent, Model,
    NamedEntry, ServiceEntry, ServiceList, WorkerThreadEntry, WorkerThreadList,
};
