//! Model entities: services, dependencies, worker threads, components,
//! component threads, and the model holding them all.
//!
//! Every list type is an [`EntryList`] over a [`NamedEntry`]: index
//! addressable, elementwise equality, add-with-dedup and plain append,
//! lookup and removal by name or by value. Absent lookups return
//! `Option`, never sentinel entries.

use tracing::warn;

use patchbay_core::Version;
use patchbay_runtime::ServiceManager;

/// An entry addressable by name inside an [`EntryList`].
pub trait NamedEntry: Clone + PartialEq {
    /// The name the entry is found under.
    fn entry_name(&self) -> &str;

    /// Whether the entry is well-formed.
    fn is_valid(&self) -> bool;
}

/// A list of named entries with the shared registry-list shape.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryList<T> {
    items: Vec<T>,
}

impl<T> Default for EntryList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: NamedEntry> EntryList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a list seeded with one entry, ignored when invalid.
    pub fn from_entry(entry: T) -> Self {
        let mut list = Self::new();
        if entry.is_valid() {
            list.items.push(entry);
        }
        list
    }

    /// A list is valid when it is non-empty.
    pub fn is_valid(&self) -> bool {
        !self.items.is_empty()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list holds no entries.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entry at the given index.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Mutable entry at the given index.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    /// Add with dedup: an equal entry is overwritten in place and its
    /// index returned; otherwise the entry is appended.
    pub fn add(&mut self, entry: T) -> usize {
        match self.find(&entry) {
            Some(index) => {
                self.items[index] = entry;
                index
            }
            None => {
                self.items.push(entry);
                self.items.len() - 1
            }
        }
    }

    /// Append without dedup, returning the new index.
    pub fn append(&mut self, entry: T) -> usize {
        self.items.push(entry);
        self.items.len() - 1
    }

    /// Index of the first entry equal to the given one.
    pub fn find(&self, entry: &T) -> Option<usize> {
        self.items.iter().position(|item| item == entry)
    }

    /// Index of the first entry with the given name.
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|item| item.entry_name() == name)
    }

    /// Entry with the given name.
    pub fn get_by_name(&self, name: &str) -> Option<&T> {
        self.items.iter().find(|item| item.entry_name() == name)
    }

    /// Remove the first entry equal to the given one.
    pub fn remove(&mut self, entry: &T) -> bool {
        match self.find(entry) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove the first entry with the given name.
    pub fn remove_by_name(&mut self, name: &str) -> bool {
        match self.find_by_name(name) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Iterate over the entries in list order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T: NamedEntry> std::ops::Index<usize> for EntryList<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T: NamedEntry> IntoIterator for &'a EntryList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// A service interface implemented by a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    /// Name of the service interface.
    pub name: String,
    /// Implemented interface version.
    pub version: Version,
}

impl ServiceEntry {
    /// Create a service entry.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl NamedEntry for ServiceEntry {
    fn entry_name(&self) -> &str {
        &self.name
    }

    fn is_valid(&self) -> bool {
        !self.name.is_empty() && self.version.is_valid()
    }
}

/// List of implemented services; names unique within a component.
pub type ServiceList = EntryList<ServiceEntry>;

/// A dependency on another component, by role name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEntry {
    /// Role name of the depended-on component.
    pub role_name: String,
}

impl DependencyEntry {
    /// Create a dependency entry.
    pub fn new(role_name: impl Into<String>) -> Self {
        Self {
            role_name: role_name.into(),
        }
    }
}

impl NamedEntry for DependencyEntry {
    fn entry_name(&self) -> &str {
        &self.role_name
    }

    fn is_valid(&self) -> bool {
        !self.role_name.is_empty()
    }
}

/// List of component dependencies.
pub type DependencyList = EntryList<DependencyEntry>;

/// A worker thread owned by a component.
///
/// Thread and consumer names are composed from their parts with `::`,
/// so a worker is unique per master thread and a consumer unique per
/// component role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerThreadEntry {
    /// Composed `master::worker` thread name.
    pub thread_name: String,
    /// Composed `role::consumer` event consumer name.
    pub consumer_name: String,
}

impl WorkerThreadEntry {
    /// Create a worker thread entry from its four name parts.
    pub fn new(master: &str, worker: &str, role: &str, consumer: &str) -> Self {
        Self {
            thread_name: format!("{master}::{worker}"),
            consumer_name: format!("{role}::{consumer}"),
        }
    }
}

impl NamedEntry for WorkerThreadEntry {
    fn entry_name(&self) -> &str {
        &self.thread_name
    }

    fn is_valid(&self) -> bool {
        !self.thread_name.is_empty() && !self.consumer_name.is_empty()
    }
}

/// List of worker threads.
pub type WorkerThreadList = EntryList<WorkerThreadEntry>;

/// A live component instance produced by a create function.
pub trait Component: Send {
    /// The role name this instance was created under.
    fn role_name(&self) -> &str;
}

/// Creates a component instance. Called by the loader on load; the
/// implementation registers the component's stubs with the manager.
pub type FuncCreateComponent = fn(&ComponentEntry, &ServiceManager) -> Box<dyn Component>;

/// Tears a component instance down. Called by the loader on unload;
/// the implementation unregisters the component's stubs.
pub type FuncDeleteComponent = fn(Box<dyn Component>, &ComponentEntry, &ServiceManager);

/// Declarative description of one component.
///
/// Equality is by role and thread name; two entries describing the same
/// role on the same thread are the same component.
#[derive(Debug, Clone)]
pub struct ComponentEntry {
    /// Unique role name of the component instance.
    pub role_name: String,
    /// Name of the thread the component runs on.
    pub thread_name: String,
    /// Factory for the component instance.
    pub create: Option<FuncCreateComponent>,
    /// Teardown for the component instance.
    pub delete: Option<FuncDeleteComponent>,
    /// Services this component implements.
    pub services: ServiceList,
    /// Role names this component depends on.
    pub dependencies: DependencyList,
    /// Worker threads this component owns.
    pub workers: WorkerThreadList,
    /// Opaque data handed to the create function.
    pub data: Option<u64>,
}

impl ComponentEntry {
    /// Create a component entry for the given thread and role.
    pub fn new(
        thread_name: impl Into<String>,
        role_name: impl Into<String>,
        create: FuncCreateComponent,
        delete: FuncDeleteComponent,
    ) -> Self {
        Self {
            role_name: role_name.into(),
            thread_name: thread_name.into(),
            create: Some(create),
            delete: Some(delete),
            services: ServiceList::new(),
            dependencies: DependencyList::new(),
            workers: WorkerThreadList::new(),
            data: None,
        }
    }

    /// Add an implemented service; an equal entry is overwritten.
    pub fn add_service(&mut self, name: &str, version: Version) -> usize {
        self.services.add(ServiceEntry::new(name, version))
    }

    /// Add a dependency on another role.
    pub fn add_dependency(&mut self, role_name: &str) -> usize {
        self.dependencies.add(DependencyEntry::new(role_name))
    }

    /// Add a worker thread.
    pub fn add_worker(&mut self, worker: &str, consumer: &str) -> usize {
        self.workers.add(WorkerThreadEntry::new(
            &self.thread_name,
            worker,
            &self.role_name,
            consumer,
        ))
    }

    /// Replace the instance functions.
    pub fn set_instance_methods(
        &mut self,
        create: FuncCreateComponent,
        delete: FuncDeleteComponent,
    ) {
        self.create = Some(create);
        self.delete = Some(delete);
    }

    /// Attach opaque data for the create function.
    pub fn set_data(&mut self, data: u64) {
        self.data = Some(data);
    }
}

impl PartialEq for ComponentEntry {
    fn eq(&self, other: &Self) -> bool {
        self.role_name == other.role_name && self.thread_name == other.thread_name
    }
}

impl NamedEntry for ComponentEntry {
    fn entry_name(&self) -> &str {
        &self.role_name
    }

    fn is_valid(&self) -> bool {
        !self.role_name.is_empty()
    }
}

/// List of components on one thread.
pub type ComponentList = EntryList<ComponentEntry>;

/// Declarative description of one component thread.
///
/// Equality is by thread name.
#[derive(Debug, Clone)]
pub struct ComponentThreadEntry {
    /// Unique thread name within the model.
    pub thread_name: String,
    /// Components running on this thread, in creation order.
    pub components: ComponentList,
}

impl ComponentThreadEntry {
    /// Create an empty thread entry.
    pub fn new(thread_name: impl Into<String>) -> Self {
        Self {
            thread_name: thread_name.into(),
            components: ComponentList::new(),
        }
    }

    /// Create a thread entry with its components.
    pub fn with_components(thread_name: impl Into<String>, components: ComponentList) -> Self {
        Self {
            thread_name: thread_name.into(),
            components,
        }
    }

    /// Add a component; an entry with the same role is overwritten.
    pub fn add_component(&mut self, entry: ComponentEntry) -> usize {
        self.components.add(entry)
    }

    /// Register a new component on this thread, returning its index.
    pub fn new_component(
        &mut self,
        role_name: &str,
        create: FuncCreateComponent,
        delete: FuncDeleteComponent,
    ) -> usize {
        self.components.add(ComponentEntry::new(
            self.thread_name.clone(),
            role_name,
            create,
            delete,
        ))
    }

    /// Remove a component by role name.
    pub fn remove_component(&mut self, role_name: &str) -> bool {
        self.components.remove_by_name(role_name)
    }

    /// Index of a component by role name.
    pub fn find_component(&self, role_name: &str) -> Option<usize> {
        self.components.find_by_name(role_name)
    }
}

impl PartialEq for ComponentThreadEntry {
    fn eq(&self, other: &Self) -> bool {
        self.thread_name == other.thread_name
    }
}

impl NamedEntry for ComponentThreadEntry {
    fn entry_name(&self) -> &str {
        &self.thread_name
    }

    fn is_valid(&self) -> bool {
        !self.thread_name.is_empty() && self.components.is_valid()
    }
}

/// List of component threads in a model.
pub type ComponentThreadList = EntryList<ComponentThreadEntry>;

/// A named, declarative application model.
///
/// Mutable only until it is marked loaded; mutations on a loaded model
/// are rejected.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    threads: ComponentThreadList,
    is_loaded: bool,
}

impl Model {
    /// Create an empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            threads: ComponentThreadList::new(),
            is_loaded: false,
        }
    }

    /// Create a model with its thread list.
    pub fn with_threads(name: impl Into<String>, threads: ComponentThreadList) -> Self {
        Self {
            name: name.into(),
            threads,
            is_loaded: false,
        }
    }

    /// The model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A model is valid when it has a name and at least one thread.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && self.threads.is_valid()
    }

    /// The thread list.
    pub fn threads(&self) -> &ComponentThreadList {
        &self.threads
    }

    /// Add a thread entry; rejected once the model is loaded.
    pub fn add_thread(&mut self, entry: ComponentThreadEntry) -> Option<usize> {
        if self.is_loaded {
            warn!(model = %self.name, "cannot modify a loaded model");
            return None;
        }
        Some(self.threads.add(entry))
    }

    /// Remove a thread by name; rejected once the model is loaded.
    pub fn remove_thread(&mut self, thread_name: &str) -> bool {
        if self.is_loaded {
            warn!(model = %self.name, "cannot modify a loaded model");
            return false;
        }
        self.threads.remove_by_name(thread_name)
    }

    /// Index of a thread by name.
    pub fn find_thread(&self, thread_name: &str) -> Option<usize> {
        self.threads.find_by_name(thread_name)
    }

    /// Whether any thread hosts a component with the given role.
    pub fn has_component(&self, role_name: &str) -> bool {
        self.threads
            .iter()
            .any(|thread| thread.find_component(role_name).is_some())
    }

    /// Attach opaque data to the named component; rejected once loaded.
    pub fn set_component_data(&mut self, role_name: &str, data: u64) -> bool {
        if self.is_loaded {
            warn!(model = %self.name, "cannot modify a loaded model");
            return false;
        }
        for index in 0..self.threads.len() {
            let thread = match self.threads.get_mut(index) {
                Some(thread) => thread,
                None => break,
            };
            if let Some(component_index) = thread.find_component(role_name) {
                if let Some(component) = thread.components.get_mut(component_index) {
                    component.set_data(data);
                    return true;
                }
            }
        }
        false
    }

    /// Whether the model is currently loaded.
    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    /// Flip the loaded flag. Loading freezes the model.
    pub fn mark_loaded(&mut self, is_loaded: bool) {
        self.is_loaded = is_loaded;
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.threads == other.threads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchbay_runtime::ServiceManager;

    struct Nothing;

    impl Component for Nothing {
        fn role_name(&self) -> &str {
            "nothing"
        }
    }

    fn make_nothing(_entry: &ComponentEntry, _manager: &ServiceManager) -> Box<dyn Component> {
        Box::new(Nothing)
    }

    fn drop_nothing(_c: Box<dyn Component>, _entry: &ComponentEntry, _manager: &ServiceManager) {}

    fn component(thread: &str, role: &str) -> ComponentEntry {
        ComponentEntry::new(thread, role, make_nothing, drop_nothing)
    }

    #[test]
    fn test_add_dedups_by_value_and_overwrites() {
        let mut list = ServiceList::new();
        let first = list.add(ServiceEntry::new("Telemetry", Version::new(1, 0, 0)));
        let second = list.add(ServiceEntry::new("Storage", Version::new(1, 0, 0)));
        assert_eq!((first, second), (0, 1));

        // Equal entry lands on the same index.
        let again = list.add(ServiceEntry::new("Telemetry", Version::new(1, 0, 0)));
        assert_eq!(again, 0);
        assert_eq!(list.len(), 2);

        // Different version is a different entry.
        let upgraded = list.add(ServiceEntry::new("Telemetry", Version::new(2, 0, 0)));
        assert_eq!(upgraded, 2);
    }

    #[test]
    fn test_append_allows_duplicates() {
        let mut list = DependencyList::new();
        list.append(DependencyEntry::new("storage"));
        list.append(DependencyEntry::new("storage"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_find_and_remove_by_name_and_value() {
        let mut list = DependencyList::new();
        list.add(DependencyEntry::new("storage"));
        list.add(DependencyEntry::new("telemetry"));

        assert_eq!(list.find_by_name("telemetry"), Some(1));
        assert!(list.get_by_name("storage").is_some());
        assert!(list.find_by_name("missing").is_none());

        assert!(list.remove_by_name("storage"));
        assert!(!list.remove_by_name("storage"));
        assert!(list.remove(&DependencyEntry::new("telemetry")));
        assert!(list.is_empty());
        assert!(!list.is_valid());
    }

    #[test]
    fn test_invalid_seed_entry_is_ignored() {
        let list = ServiceList::from_entry(ServiceEntry::new("", Version::new(1, 0, 0)));
        assert!(list.is_empty());

        let list = ServiceList::from_entry(ServiceEntry::new("Telemetry", Version::new(0, 0, 1)));
        assert!(list.is_empty());
    }

    #[test]
    fn test_worker_thread_name_composition() {
        let worker = WorkerThreadEntry::new("workers", "poller", "sensor0", "updates");
        assert_eq!(worker.thread_name, "workers::poller");
        assert_eq!(worker.consumer_name, "sensor0::updates");
        assert!(worker.is_valid());
    }

    #[test]
    fn test_component_entry_equality_is_role_and_thread() {
        let mut a = component("workers", "sensor0");
        let b = component("workers", "sensor0");
        a.add_service("Telemetry", Version::new(1, 0, 0));
        assert_eq!(a, b);
        assert_ne!(a, component("other", "sensor0"));
        assert_ne!(a, component("workers", "sensor1"));
    }

    #[test]
    fn test_component_services_dedup() {
        let mut entry = component("workers", "sensor0");
        entry.add_service("Telemetry", Version::new(1, 0, 0));
        entry.add_service("Telemetry", Version::new(1, 0, 0));
        assert_eq!(entry.services.len(), 1);
    }

    #[test]
    fn test_thread_entry_validity_requires_components() {
        let mut thread = ComponentThreadEntry::new("workers");
        assert!(!thread.is_valid());
        thread.add_component(component("workers", "sensor0"));
        assert!(thread.is_valid());
    }

    #[test]
    fn test_model_validity_and_lookup() {
        let mut model = Model::new("app");
        assert!(!model.is_valid());

        let mut thread = ComponentThreadEntry::new("workers");
        thread.add_component(component("workers", "sensor0"));
        model.add_thread(thread).expect("add thread");

        assert!(model.is_valid());
        assert!(model.has_component("sensor0"));
        assert!(!model.has_component("sensor1"));
        assert_eq!(model.find_thread("workers"), Some(0));
    }

    #[test]
    fn test_loaded_model_rejects_mutation() {
        let mut model = Model::new("app");
        let mut thread = ComponentThreadEntry::new("workers");
        thread.add_component(component("workers", "sensor0"));
        model.add_thread(thread).expect("add thread");

        model.mark_loaded(true);
        assert!(model.add_thread(ComponentThreadEntry::new("late")).is_none());
        assert!(!model.remove_thread("workers"));
        assert!(!model.set_component_data("sensor0", 42));

        model.mark_loaded(false);
        assert!(model.set_component_data("sensor0", 42));
    }
}
