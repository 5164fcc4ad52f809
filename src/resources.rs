//! Scoped ownership of the GPU objects a simulation allocates.
//!
//! Every buffer, texture, pipeline and bind group created while a simulation
//! is being built goes through a [`ResourceTracker`]. Tearing the simulation
//! down calls [`ResourceTracker::destroy_all`], which releases each memory
//! resource exactly once and forgets the rest, so repeated navigation cannot
//! leak device memory.

use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::error::ReleaseError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Buffer,
    Texture,
}

/// A device allocation that must be explicitly released.
pub trait Releasable {
    fn kind(&self) -> ResourceKind;
    fn byte_size(&self) -> u64;
    fn release(&self) -> Result<(), String>;
}

impl Releasable for wgpu::Buffer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Buffer
    }
    fn byte_size(&self) -> u64 {
        self.size()
    }
    fn release(&self) -> Result<(), String> {
        self.destroy();
        Ok(())
    }
}

impl Releasable for wgpu::Texture {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Texture
    }
    fn byte_size(&self) -> u64 {
        let size = self.size();
        let texel = self.format().block_copy_size(None).unwrap_or(4) as u64;
        size.width as u64 * size.height as u64 * size.depth_or_array_layers as u64 * texel
    }
    fn release(&self) -> Result<(), String> {
        self.destroy();
        Ok(())
    }
}

/// Identifies one tracker; never reused within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackerId(u64);

/// Identifies one registration inside a tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId {
    tracker: TrackerId,
    index: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceCount {
    pub buffers: usize,
    pub textures: usize,
    pub pipelines: usize,
    pub bind_groups: usize,
    pub total_bytes: u64,
}

impl ResourceCount {
    pub fn is_empty(&self) -> bool {
        *self == ResourceCount::default()
    }
}

struct TrackedResource {
    id: ResourceId,
    label: String,
    size: u64,
    resource: Box<dyn Releasable>,
}

static NEXT_TRACKER: AtomicU64 = AtomicU64::new(1);

pub struct ResourceTracker {
    id: TrackerId,
    next_index: u64,
    resources: Vec<TrackedResource>,
    pipelines: Vec<Box<dyn Any>>,
    bind_groups: Vec<Box<dyn Any>>,
}

impl Default for ResourceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self {
            id: TrackerId(NEXT_TRACKER.fetch_add(1, Ordering::Relaxed)),
            next_index: 0,
            resources: Vec::new(),
            pipelines: Vec::new(),
            bind_groups: Vec::new(),
        }
    }

    pub fn id(&self) -> TrackerId {
        self.id
    }

    /// Record `resource` and hand it back unchanged.
    pub fn register<R>(&mut self, resource: R, label: &str) -> R
    where
        R: Releasable + Clone + 'static,
    {
        self.register_with_id(resource, label).0
    }

    /// Like [`register`](Self::register) but also returns the registry key.
    pub fn register_with_id<R>(&mut self, resource: R, label: &str) -> (R, ResourceId)
    where
        R: Releasable + Clone + 'static,
    {
        let id = ResourceId {
            tracker: self.id,
            index: self.next_index,
        };
        self.next_index += 1;
        let size = resource.byte_size();
        ledger_created(label, size);
        self.resources.push(TrackedResource {
            id,
            label: label.to_owned(),
            size,
            resource: Box::new(resource.clone()),
        });
        (resource, id)
    }

    pub fn register_pipeline<P: Clone + 'static>(&mut self, pipeline: P) -> P {
        self.pipelines.push(Box::new(pipeline.clone()));
        pipeline
    }

    pub fn register_bind_group<B: Clone + 'static>(&mut self, bind_group: B) -> B {
        self.bind_groups.push(Box::new(bind_group.clone()));
        bind_group
    }

    /// Whether `id` still refers to a live registration of this tracker.
    pub fn contains(&self, id: ResourceId) -> bool {
        id.tracker == self.id && self.resources.iter().any(|r| r.id == id)
    }

    pub fn label_of(&self, id: ResourceId) -> Option<&str> {
        self.resources
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.label.as_str())
    }

    pub fn resource_count(&self) -> ResourceCount {
        let mut count = ResourceCount {
            pipelines: self.pipelines.len(),
            bind_groups: self.bind_groups.len(),
            ..Default::default()
        };
        for tracked in &self.resources {
            count.total_bytes += tracked.size;
            match tracked.resource.kind() {
                ResourceKind::Buffer => count.buffers += 1,
                ResourceKind::Texture => count.textures += 1,
            }
        }
        count
    }

    /// Bytes per label, for diagnostics.
    pub fn memory_report(&self) -> BTreeMap<String, u64> {
        let mut report = BTreeMap::new();
        for tracked in &self.resources {
            *report.entry(tracked.label.clone()).or_insert(0) += tracked.size;
        }
        report
    }

    /// Release everything this tracker owns.
    ///
    /// Individual failures are logged and returned; they never stop the
    /// remaining releases. Calling this again is a no-op.
    pub fn destroy_all(&mut self) -> Vec<ReleaseError> {
        if self.resources.is_empty() && self.pipelines.is_empty() && self.bind_groups.is_empty() {
            return Vec::new();
        }
        log::debug!(
            "destroying {} GPU resources ({} bytes)",
            self.resources.len(),
            self.resource_count().total_bytes
        );

        let mut failures = Vec::new();
        for tracked in self.resources.drain(..) {
            match tracked.resource.release() {
                Ok(()) => ledger_destroyed(&tracked.label, tracked.size),
                Err(reason) => {
                    log::warn!("failed to destroy resource {}: {reason}", tracked.label);
                    failures.push(ReleaseError {
                        label: tracked.label,
                        reason,
                    });
                }
            }
        }
        self.pipelines.clear();
        self.bind_groups.clear();
        log::debug!("GPU resource cleanup complete: {:?}", self.resource_count());
        failures
    }
}

impl Drop for ResourceTracker {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

// Process-wide memory ledger. The orchestration layer is single threaded, so a
// thread local is the whole process on wasm and one test on the host.
thread_local! {
    static LIVE_BYTES: Cell<u64> = const { Cell::new(0) };
    static BY_LABEL: RefCell<BTreeMap<String, u64>> = const { RefCell::new(BTreeMap::new()) };
}

fn ledger_created(label: &str, size: u64) {
    let total = LIVE_BYTES.with(|live| {
        live.set(live.get() + size);
        live.get()
    });
    BY_LABEL.with(|m| *m.borrow_mut().entry(label.to_owned()).or_insert(0) += size);
    log::debug!("GPU buffer created: {label} (+{size} bytes, live: {total})");
}

fn ledger_destroyed(label: &str, size: u64) {
    let total = LIVE_BYTES.with(|live| {
        live.set(live.get().saturating_sub(size));
        live.get()
    });
    BY_LABEL.with(|m| {
        let mut m = m.borrow_mut();
        if let Some(bytes) = m.get_mut(label) {
            *bytes = bytes.saturating_sub(size);
            if *bytes == 0 {
                m.remove(label);
            }
        }
    });
    log::debug!("GPU buffer destroyed: {label} (-{size} bytes, live: {total})");
}

/// Bytes currently held by live tracked resources on this thread.
pub fn live_bytes() -> u64 {
    LIVE_BYTES.with(Cell::get)
}

/// Log the live bytes per label at debug level.
pub fn log_memory_report() {
    BY_LABEL.with(|m| {
        let m = m.borrow();
        log::debug!("GPU memory report:");
        for (label, bytes) in m.iter() {
            log::debug!("  {label}: {:.2} MB", *bytes as f64 / 1024.0 / 1024.0);
        }
        log::debug!("  total: {:.2} MB", live_bytes() as f64 / 1024.0 / 1024.0);
    });
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::rc::Rc;

    /// Stand-in for a device allocation that counts its releases.
    #[derive(Clone)]
    pub(crate) struct MockResource {
        pub kind: ResourceKind,
        pub size: u64,
        pub fail: bool,
        pub releases: Rc<Cell<u32>>,
    }

    impl MockResource {
        pub(crate) fn buffer(size: u64) -> Self {
            Self {
                kind: ResourceKind::Buffer,
                size,
                fail: false,
                releases: Rc::new(Cell::new(0)),
            }
        }
    }

    impl Releasable for MockResource {
        fn kind(&self) -> ResourceKind {
            self.kind
        }
        fn byte_size(&self) -> u64 {
            self.size
        }
        fn release(&self) -> Result<(), String> {
            self.releases.set(self.releases.get() + 1);
            if self.fail {
                Err("device lost".into())
            } else {
                Ok(())
            }
        }
    }

    #[derive(Clone)]
    struct Pipeline;

    #[test]
    fn destroy_all_releases_everything_once() {
        let mut tracker = ResourceTracker::new();
        let mut handles = Vec::new();
        for i in 0..5 {
            let (res, id) = tracker.register_with_id(MockResource::buffer(16 * (i + 1)), "field");
            handles.push((res, id));
        }
        let texture = tracker.register(
            MockResource {
                kind: ResourceKind::Texture,
                ..MockResource::buffer(64)
            },
            "texture",
        );
        tracker.register_pipeline(Pipeline);
        tracker.register_bind_group(Pipeline);

        let before = tracker.resource_count();
        assert_eq!(before.buffers, 5);
        assert_eq!(before.textures, 1);
        assert_eq!(before.pipelines, 1);
        assert_eq!(before.bind_groups, 1);
        assert_eq!(before.total_bytes, 16 * 15 + 64);

        assert!(tracker.destroy_all().is_empty());
        assert!(tracker.resource_count().is_empty());
        for (res, id) in &handles {
            assert_eq!(res.releases.get(), 1);
            assert!(!tracker.contains(*id));
        }
        assert_eq!(texture.releases.get(), 1);

        tracker.destroy_all();
        for (res, _) in &handles {
            assert_eq!(res.releases.get(), 1);
        }
    }

    #[test]
    fn a_failing_release_does_not_stop_the_rest() {
        let mut tracker = ResourceTracker::new();
        let first = tracker.register(MockResource::buffer(4), "first");
        let bad = tracker.register(
            MockResource {
                fail: true,
                ..MockResource::buffer(4)
            },
            "bad",
        );
        let last = tracker.register(MockResource::buffer(4), "last");

        let failures = tracker.destroy_all();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].label, "bad");
        assert_eq!(first.releases.get(), 1);
        assert_eq!(bad.releases.get(), 1);
        assert_eq!(last.releases.get(), 1);
        assert!(tracker.resource_count().is_empty());
    }

    #[test]
    fn ledger_follows_registration() {
        let start = live_bytes();
        let mut tracker = ResourceTracker::new();
        tracker.register(MockResource::buffer(1024), "ledger");
        assert_eq!(live_bytes(), start + 1024);
        assert_eq!(tracker.memory_report().get("ledger"), Some(&1024));
        tracker.destroy_all();
        assert_eq!(live_bytes(), start);
    }

    #[test]
    fn trackers_do_not_share_handles() {
        let mut a = ResourceTracker::new();
        let (_, id_a) = a.register_with_id(MockResource::buffer(8), "a");
        a.destroy_all();

        let mut b = ResourceTracker::new();
        let (_, id_b) = b.register_with_id(MockResource::buffer(8), "b");
        assert_ne!(a.id(), b.id());
        assert!(!b.contains(id_a));
        assert!(b.contains(id_b));
        assert_eq!(b.label_of(id_b), Some("b"));
    }

    #[test]
    fn dropping_a_tracker_releases_its_resources() {
        let res = {
            let mut tracker = ResourceTracker::new();
            tracker.register(MockResource::buffer(8), "scoped")
        };
        assert_eq!(res.releases.get(), 1);
    }
}
