//! Creation-ordered resource tracking.
//!
//! Every device object the harness creates is pushed here the moment it
//! exists. Teardown, and cleanup after a failed initialization, pop the stack
//! so objects are destroyed in exact reverse creation order, which never
//! destroys an object before something that depends on it.

use crate::driver::{Driver, Resource, ResourceKind};

/// Stack of live resources in creation order.
#[derive(Debug, Default)]
pub struct ResourceStack {
    live: Vec<Resource>,
}

impl ResourceStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly created resource.
    pub fn push(&mut self, resource: Resource) {
        tracing::trace!("Tracking {:?}", resource.kind());
        self.live.push(resource);
    }

    /// Number of tracked resources.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Count tracked resources of one kind.
    pub fn count(&self, kind: ResourceKind) -> usize {
        self.live.iter().filter(|r| r.kind() == kind).count()
    }

    /// Destroy every tracked resource, newest first.
    ///
    /// # Safety
    /// The device must be idle: no pending work may reference any tracked
    /// resource.
    pub unsafe fn unwind<D: Driver + ?Sized>(&mut self, driver: &D) {
        tracing::debug!("Destroying {} tracked resources", self.live.len());
        while let Some(resource) = self.live.pop() {
            driver.destroy(&resource);
        }
    }
}
