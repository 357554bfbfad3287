//! The component loader: registers models, enforces cross-model
//! uniqueness, and instantiates components in thread → component order.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use patchbay_runtime::ServiceManager;

use crate::model::{Component, ComponentEntry, ComponentList, Model};

/// Errors registering or loading models.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The model fails its own validity check.
    #[error("model `{name}` is not valid")]
    InvalidModel {
        /// Name of the rejected model.
        name: String,
    },

    /// A model with the same name is already registered.
    #[error("model `{name}` is already registered")]
    DuplicateModel {
        /// The conflicting model name.
        name: String,
    },

    /// A role name is already taken by a registered model.
    #[error("role `{role}` already registered by model `{model}`")]
    DuplicateRole {
        /// The conflicting role name.
        role: String,
        /// The model already claiming the role.
        model: String,
    },

    /// A thread name is already taken by a registered model.
    #[error("thread `{thread}` already registered by model `{model}`")]
    DuplicateThread {
        /// The conflicting thread name.
        thread: String,
        /// The model already claiming the thread.
        model: String,
    },

    /// No registered model has the given name.
    #[error("unknown model `{name}`")]
    UnknownModel {
        /// The name that was looked up.
        name: String,
    },
}

struct LoadedComponent {
    entry: ComponentEntry,
    instance: Box<dyn Component>,
}

/// Registers models and drives their load/unload lifecycle against a
/// service manager.
///
/// Loading walks each model's threads in order and each thread's
/// components in order, calling every component's create function; the
/// create functions register their stubs with the manager. Unloading
/// walks the created instances in reverse, handing each to its delete
/// function.
pub struct ComponentLoader {
    manager: ServiceManager,
    models: Vec<Model>,
    instances: HashMap<String, Vec<LoadedComponent>>,
}

impl ComponentLoader {
    /// Create a loader bound to the given service manager.
    pub fn new(manager: ServiceManager) -> Self {
        Self {
            manager,
            models: Vec::new(),
            instances: HashMap::new(),
        }
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no model is registered.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Register a model.
    ///
    /// # Errors
    ///
    /// Rejects invalid models and any model whose name, thread names or
    /// role names collide with an already-registered model.
    pub fn add_model(&mut self, model: Model) -> Result<(), ModelError> {
        if !model.is_valid() {
            return Err(ModelError::InvalidModel {
                name: model.name().to_string(),
            });
        }
        if self.models.iter().any(|known| known.name() == model.name()) {
            return Err(ModelError::DuplicateModel {
                name: model.name().to_string(),
            });
        }
        for known in &self.models {
            for thread in known.threads() {
                if model.find_thread(&thread.thread_name).is_some() {
                    return Err(ModelError::DuplicateThread {
                        thread: thread.thread_name.clone(),
                        model: known.name().to_string(),
                    });
                }
                for component in &thread.components {
                    if model.has_component(&component.role_name) {
                        return Err(ModelError::DuplicateRole {
                            role: component.role_name.clone(),
                            model: known.name().to_string(),
                        });
                    }
                }
            }
        }

        info!(model = model.name(), "model registered");
        self.models.push(model);
        Ok(())
    }

    /// Load the named model, or every unloaded model with `None`.
    ///
    /// Returns the number of component instances created.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownModel`] when a name is given and no
    /// registered model carries it.
    pub fn load_model(&mut self, name: Option<&str>) -> Result<usize, ModelError> {
        if let Some(name) = name {
            if !self.models.iter().any(|model| model.name() == name) {
                return Err(ModelError::UnknownModel {
                    name: name.to_string(),
                });
            }
        }

        let mut created = 0;
        for model in &mut self.models {
            let selected = name.map(|n| n == model.name()).unwrap_or(true);
            if !selected || model.is_loaded() {
                continue;
            }

            let mut loaded = Vec::new();
            for thread in model.threads() {
                debug!(
                    model = model.name(),
                    thread = %thread.thread_name,
                    components = thread.components.len(),
                    "loading component thread"
                );
                for entry in &thread.components {
                    let create = match entry.create {
                        Some(create) => create,
                        None => {
                            warn!(role = %entry.role_name, "component has no create function");
                            continue;
                        }
                    };
                    let instance = create(entry, &self.manager);
                    debug!(role = %entry.role_name, "component created");
                    loaded.push(LoadedComponent {
                        entry: entry.clone(),
                        instance,
                    });
                    created += 1;
                }
            }

            self.instances.insert(model.name().to_string(), loaded);
            model.mark_loaded(true);
            info!(model = model.name(), "model loaded");
        }

        Ok(created)
    }

    /// Unload the named model, or every loaded model with `None`.
    ///
    /// Instances are torn down in reverse creation order through their
    /// delete functions.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownModel`] when a name is given and no
    /// registered model carries it.
    pub fn unload_model(&mut self, name: Option<&str>) -> Result<(), ModelError> {
        if let Some(name) = name {
            if !self.models.iter().any(|model| model.name() == name) {
                return Err(ModelError::UnknownModel {
                    name: name.to_string(),
                });
            }
        }

        for model in &mut self.models {
            let selected = name.map(|n| n == model.name()).unwrap_or(true);
            if !selected || !model.is_loaded() {
                continue;
            }

            let loaded = self.instances.remove(model.name()).unwrap_or_default();
            for component in loaded.into_iter().rev() {
                debug!(role = %component.entry.role_name, "component deleted");
                match component.entry.delete {
                    Some(delete) => delete(component.instance, &component.entry, &self.manager),
                    None => drop(component.instance),
                }
            }
            model.mark_loaded(false);
            info!(model = model.name(), "model unloaded");
        }

        Ok(())
    }

    /// Whether the named model is currently loaded.
    pub fn is_model_loaded(&self, name: &str) -> bool {
        self.models
            .iter()
            .any(|model| model.name() == name && model.is_loaded())
    }

    /// Find a component entry by role name across registered models.
    pub fn find_component_entry(&self, role_name: &str) -> Option<&ComponentEntry> {
        for model in &self.models {
            for thread in model.threads() {
                if let Some(entry) = thread.components.get_by_name(role_name) {
                    return Some(entry);
                }
            }
        }
        None
    }

    /// The component list of a loaded model thread.
    pub fn component_list(&self, thread_name: &str) -> Option<&ComponentList> {
        for model in &self.models {
            if !model.is_loaded() {
                continue;
            }
            for thread in model.threads() {
                if thread.thread_name == thread_name {
                    return Some(&thread.components);
                }
            }
        }
        None
    }
}
