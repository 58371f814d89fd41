//! Preview Service (C9): descriptor index, job queue, worker pool, prefetch
//! policy, and event emission.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, instrument, warn};

use crate::cache::{Tier, TwoTierCache, DEFAULT_PRELOAD_CAPACITY, DEFAULT_RAM_CAPACITY};
use crate::catalog::{CatalogStore, PreviewState};
use crate::error::CatalogError;
use crate::scanner;

use super::color::ColorTransformer;
use super::gpu_bridge::{create_bridge, GpuBridge};
use super::icc;
use super::sink::CacheEventSink;
use super::types::{CacheEvent, PreviewDescriptor, PreviewImage};

/// Sidecar extensions tried, in order, when a file carries no embedded
/// ICC profile.
const SIDECAR_EXTENSIONS: &[&str] = &["icc", "ICM", "profile"];

#[derive(Debug, Clone)]
pub struct PreviewServiceConfig {
    pub ram_capacity: usize,
    pub preload_capacity: usize,
    pub worker_count: usize,
    pub neighbor_window: usize,
}

impl Default for PreviewServiceConfig {
    fn default() -> Self {
        let available = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self {
            ram_capacity: DEFAULT_RAM_CAPACITY,
            preload_capacity: DEFAULT_PRELOAD_CAPACITY,
            worker_count: available.max(2),
            neighbor_window: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct Job {
    descriptor: PreviewDescriptor,
}

struct QueueState {
    jobs: VecDeque<Job>,
    pending_jobs: usize,
    stop: bool,
}

struct RootIndex {
    descriptors: Vec<PreviewDescriptor>,
    position_by_path: HashMap<String, usize>,
}

impl RootIndex {
    fn from_descriptors(descriptors: Vec<PreviewDescriptor>) -> Self {
        let position_by_path = descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (d.relative_path.clone(), i))
            .collect();
        Self { descriptors, position_by_path }
    }
}

struct Shared {
    queue: Mutex<QueueState>,
    not_empty: Condvar,
    idle: Condvar,
    cache: Mutex<TwoTierCache>,
    color: ColorTransformer,
    gpu_bridge: Mutex<Option<Box<dyn GpuBridge>>>,
    catalog: Mutex<Option<Arc<CatalogStore>>>,
    event_sink: Mutex<Option<Arc<dyn CacheEventSink>>>,
    indices: Mutex<HashMap<i64, RootIndex>>,
    neighbor_window: Mutex<usize>,
}

impl Shared {
    fn enqueue(&self, descriptor: PreviewDescriptor) {
        let mut queue = self.queue.lock().expect("queue poisoned");
        queue.jobs.push_back(Job { descriptor });
        queue.pending_jobs += 1;
        self.not_empty.notify_one();
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(sink) = self.event_sink.lock().expect("sink poisoned").as_ref() {
            sink.handle(&event);
        }
    }
}

/// Bounded worker pool that extracts, color-manages, caches, and uploads
/// preview images for one or more catalog roots.
pub struct PreviewService {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl PreviewService {
    pub fn new(config: PreviewServiceConfig) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueState { jobs: VecDeque::new(), pending_jobs: 0, stop: false }),
            not_empty: Condvar::new(),
            idle: Condvar::new(),
            cache: Mutex::new(TwoTierCache::new(config.ram_capacity, config.preload_capacity)),
            color: ColorTransformer::new(),
            gpu_bridge: Mutex::new(Some(create_bridge())),
            catalog: Mutex::new(None),
            event_sink: Mutex::new(None),
            indices: Mutex::new(HashMap::new()),
            neighbor_window: Mutex::new(config.neighbor_window),
        });

        let worker_count = config.worker_count.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let shared = shared.clone();
            workers.push(thread::spawn(move || worker_loop(id, shared)));
        }

        Self { shared, workers }
    }

    pub fn set_catalog_service(&self, catalog: Arc<CatalogStore>) {
        *self.shared.catalog.lock().expect("catalog slot poisoned") = Some(catalog);
    }

    pub fn set_event_sink(&self, sink: Arc<dyn CacheEventSink>) {
        *self.shared.event_sink.lock().expect("sink slot poisoned") = Some(sink);
    }

    pub fn set_gpu_bridge_for_testing(&self, bridge: Box<dyn GpuBridge>) {
        *self.shared.gpu_bridge.lock().expect("bridge slot poisoned") = Some(bridge);
    }

    pub fn prime_caches(&self, n: usize) {
        *self.shared.neighbor_window.lock().expect("window poisoned") = n;
    }

    /// Scans `path`, reconciles the result against the catalog's file
    /// rows (attaching `file_id` by `relative_path`), replaces this
    /// root's descriptor index, and enqueues a job for every descriptor.
    #[instrument(skip(self))]
    pub fn warm_root(&self, root_id: i64, path: &Path) -> Result<(), CatalogError> {
        let mut entries = scanner::scan(path)?;
        entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        let file_ids: HashMap<String, i64> = {
            let catalog = self.shared.catalog.lock().expect("catalog slot poisoned").clone();
            match catalog {
                Some(catalog) => catalog
                    .list_files(root_id)?
                    .into_iter()
                    .map(|row| (row.relative_path, row.id))
                    .collect(),
                None => HashMap::new(),
            }
        };

        let descriptors: Vec<PreviewDescriptor> = entries
            .into_iter()
            .map(|entry| PreviewDescriptor {
                root_id,
                file_id: file_ids.get(&entry.relative_path).copied(),
                absolute_path: entry.absolute_path,
                relative_path: entry.relative_path,
                file_size: entry.file_size,
                capture_ts: entry.capture_ts,
            })
            .collect();

        debug!(root_id, count = descriptors.len(), "warmed root");

        let index = RootIndex::from_descriptors(descriptors.clone());
        self.shared.indices.lock().expect("indices poisoned").insert(root_id, index);

        for descriptor in descriptors {
            self.shared.enqueue(descriptor);
        }
        Ok(())
    }

    /// Enqueues the anchor descriptor for `(root_id, relative_path)`, then
    /// its neighbor window. Silently returns if the root has no index or
    /// the path is unknown.
    pub fn request_preview(&self, root_id: i64, relative_path: &str) {
        let indices = self.shared.indices.lock().expect("indices poisoned");
        let Some(index) = indices.get(&root_id) else { return };
        let Some(&anchor) = index.position_by_path.get(relative_path) else { return };

        let window = *self.shared.neighbor_window.lock().expect("window poisoned");
        let len = index.descriptors.len();
        let start = anchor.saturating_sub(window);
        let end = (anchor + window + 1).min(len);

        let anchor_descriptor = index.descriptors[anchor].clone();
        let neighbor_descriptors: Vec<PreviewDescriptor> = (start..end)
            .filter(|&i| i != anchor)
            .map(|i| index.descriptors[i].clone())
            .collect();
        drop(indices);

        self.shared.enqueue(anchor_descriptor);
        for descriptor in neighbor_descriptors {
            self.shared.enqueue(descriptor);
        }
    }

    pub fn cached_preview(&self, cache_key: &str) -> Option<PreviewImage> {
        self.shared.cache.lock().expect("cache poisoned").get(cache_key).cloned()
    }

    pub fn wait_until_idle(&self) {
        let queue = self.shared.queue.lock().expect("queue poisoned");
        let _guard = self
            .shared
            .idle
            .wait_while(queue, |q| !(q.jobs.is_empty() && q.pending_jobs == 0))
            .expect("queue poisoned");
    }
}

impl Drop for PreviewService {
    fn drop(&mut self) {
        {
            let mut queue = self.shared.queue.lock().expect("queue poisoned");
            queue.stop = true;
        }
        self.shared.not_empty.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(id: usize, shared: Arc<Shared>) {
    debug!(worker_id = id, "preview worker started");
    loop {
        let job = {
            let mut queue = shared.queue.lock().expect("queue poisoned");
            loop {
                if let Some(job) = queue.jobs.pop_front() {
                    break Some(job);
                }
                if queue.stop {
                    break None;
                }
                queue = shared.not_empty.wait(queue).expect("queue poisoned");
            }
        };

        let Some(job) = job else { break };
        process_job(&shared, job.descriptor);

        let mut queue = shared.queue.lock().expect("queue poisoned");
        queue.pending_jobs -= 1;
        if queue.jobs.is_empty() && queue.pending_jobs == 0 {
            shared.idle.notify_all();
        }
    }
    debug!(worker_id = id, "preview worker stopped");
}

fn load_embedded_profile(descriptor: &PreviewDescriptor) -> Vec<u8> {
    let embedded = icc::extract_embedded_profile(&descriptor.absolute_path);
    if !embedded.is_empty() {
        return embedded;
    }
    for extension in SIDECAR_EXTENSIONS {
        let sidecar = descriptor.absolute_path.with_extension(extension);
        if let Ok(bytes) = std::fs::read(&sidecar) {
            if !bytes.is_empty() {
                return bytes;
            }
        }
    }
    Vec::new()
}

fn process_job(shared: &Shared, descriptor: PreviewDescriptor) {
    let key = descriptor.cache_key();

    {
        let mut cache = shared.cache.lock().expect("cache poisoned");
        if cache.get(&key).is_some() {
            let backend = shared
                .gpu_bridge
                .lock()
                .expect("bridge poisoned")
                .as_ref()
                .map(|b| b.backend().event_label().to_string())
                .unwrap_or_else(|| "none".to_string());
            shared.emit(CacheEvent {
                root_id: descriptor.root_id,
                relative_path: descriptor.relative_path.clone(),
                tier: Tier::Ram,
                hit: true,
                error: false,
                error_message: String::new(),
                backend,
                gpu_upload_ms: 0.0,
                color_transform_ms: 0.0,
            });
            return;
        }
    }

    let mut image = super::extractor::extract(&descriptor);

    let profile_bytes = load_embedded_profile(&descriptor);
    let transform_start = Instant::now();
    let (pixels, source_profile) = shared.color.apply(&image.pixels, &profile_bytes);
    let color_transform_ms = transform_start.elapsed().as_secs_f64() * 1000.0;
    image.pixels = pixels;
    image.color_managed = true;
    image.color_profile = format!("{} -> {}", source_profile, shared.color.target_profile_name());

    {
        let mut cache = shared.cache.lock().expect("cache poisoned");
        cache.put(image.clone(), Tier::Ram);
    }

    let upload_start = Instant::now();
    let (gpu_ok, error_message, backend) = {
        let bridge = shared.gpu_bridge.lock().expect("bridge poisoned");
        match bridge.as_ref() {
            Some(bridge) => {
                let (ok, message) = bridge.upload(&image);
                (ok, message, bridge.backend().event_label().to_string())
            }
            None => (false, "No GPU bridge configured.".to_string(), "none".to_string()),
        }
    };
    let gpu_upload_ms = upload_start.elapsed().as_secs_f64() * 1000.0;

    if !gpu_ok {
        warn!(relative_path = %descriptor.relative_path, %error_message, "gpu upload failed");
    }

    if let Some(file_id) = descriptor.file_id {
        if let Some(catalog) = shared.catalog.lock().expect("catalog slot poisoned").as_ref() {
            let state = if gpu_ok { PreviewState::GpuResident } else { PreviewState::Cached };
            if let Err(err) = catalog.update_preview_state(file_id, state) {
                warn!(relative_path = %descriptor.relative_path, %err, "failed to write back preview state");
            }
        }
    }

    shared.emit(CacheEvent {
        root_id: descriptor.root_id,
        relative_path: descriptor.relative_path,
        tier: Tier::Ram,
        hit: false,
        error: !gpu_ok,
        error_message,
        backend,
        gpu_upload_ms,
        color_transform_ms,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::IngestFileRecord;
    use super::super::gpu_bridge::Backend;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    struct FailingGpuBridge;

    impl GpuBridge for FailingGpuBridge {
        fn upload(&self, _image: &PreviewImage) -> (bool, String) {
            (false, "forced failure".to_string())
        }
        fn backend(&self) -> Backend {
            Backend::Stub
        }
    }

    struct RecordingSink {
        events: StdMutex<Vec<CacheEvent>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self { events: StdMutex::new(Vec::new()) }
        }
        fn events(&self) -> Vec<CacheEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl CacheEventSink for RecordingSink {
        fn handle(&self, event: &CacheEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn write_files(dir: &TempDir, names: &[&str]) {
        for name in names {
            std::fs::write(dir.path().join(name), format!("contents-of-{name}")).unwrap();
        }
    }

    fn setup_catalog(dir: &TempDir, names: &[&str]) -> (Arc<CatalogStore>, i64) {
        let catalog = Arc::new(CatalogStore::configure_in_memory().unwrap());
        let root_id = catalog.register_root(dir.path()).unwrap();
        let records: Vec<IngestFileRecord> =
            names.iter().map(|n| IngestFileRecord::new(*n, 0, 10)).collect();
        catalog.ingest_records(root_id, &records).unwrap();
        (catalog, root_id)
    }

    #[test]
    fn warm_root_produces_events_and_caches_previews() {
        let dir = TempDir::new().unwrap();
        let names = ["IMG_0001.CR3", "IMG_0002.CR3", "IMG_0003.CR3", "IMG_0004.CR3", "IMG_0005.CR3"];
        write_files(&dir, &names);
        let (catalog, root_id) = setup_catalog(&dir, &names);

        let service = PreviewService::new(PreviewServiceConfig { worker_count: 2, ..Default::default() });
        service.set_catalog_service(catalog.clone());
        let sink = Arc::new(RecordingSink::new());
        service.set_event_sink(sink.clone());
        service.prime_caches(2);

        service.warm_root(root_id, dir.path()).unwrap();
        service.wait_until_idle();

        assert!(sink.events().len() >= 5);

        let cache_key = format!("IMG_0001.CR3#{root_id}");
        let cached = service.cached_preview(&cache_key).expect("preview should be cached");
        assert!(cached.color_managed);

        for row in catalog.list_files(root_id).unwrap() {
            assert_ne!(row.preview_state, PreviewState::Idle);
        }
    }

    #[test]
    fn neighbor_prefetch_window_covers_expected_files() {
        let dir = TempDir::new().unwrap();
        let names = ["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"];
        write_files(&dir, &names);
        let (catalog, root_id) = setup_catalog(&dir, &names);

        let service = PreviewService::new(PreviewServiceConfig { worker_count: 2, ..Default::default() });
        service.set_catalog_service(catalog);
        service.prime_caches(2);
        service.warm_root(root_id, dir.path()).unwrap();
        service.wait_until_idle();

        let sink = Arc::new(RecordingSink::new());
        service.set_event_sink(sink.clone());
        service.request_preview(root_id, "b.jpg");
        service.wait_until_idle();

        let covered: std::collections::HashSet<String> =
            sink.events().into_iter().map(|e| e.relative_path).collect();
        for expected in ["a.jpg", "b.jpg", "c.jpg", "d.jpg"] {
            assert!(covered.contains(expected), "missing {expected} in {covered:?}");
        }
    }

    #[test]
    fn unknown_root_or_path_is_silently_ignored() {
        let service = PreviewService::new(PreviewServiceConfig { worker_count: 1, ..Default::default() });
        service.request_preview(999, "nothing.jpg");
        service.wait_until_idle();
    }

    #[test]
    fn gpu_failure_is_recorded_as_an_error_event() {
        let dir = TempDir::new().unwrap();
        let names = ["only.jpg"];
        write_files(&dir, &names);
        let (catalog, root_id) = setup_catalog(&dir, &names);

        let service = PreviewService::new(PreviewServiceConfig { worker_count: 1, ..Default::default() });
        service.set_catalog_service(catalog.clone());
        service.set_gpu_bridge_for_testing(Box::new(FailingGpuBridge));
        let sink = Arc::new(RecordingSink::new());
        service.set_event_sink(sink.clone());

        service.warm_root(root_id, dir.path()).unwrap();
        service.wait_until_idle();

        let events = sink.events();
        let failed = events.iter().find(|e| e.error).expect("expected a failed event");
        assert_eq!(failed.backend, "Stub");
        assert!(!failed.error_message.is_empty());

        let row = catalog
            .list_files(root_id)
            .unwrap()
            .into_iter()
            .find(|r| r.relative_path == "only.jpg")
            .unwrap();
        assert_eq!(row.preview_state, PreviewState::Cached);
    }

    #[test]
    fn external_icc_sidecar_is_used_when_no_embedded_profile() {
        let dir = TempDir::new().unwrap();
        let names = ["IMG_0001.CR3"];
        write_files(&dir, &names);
        std::fs::write(dir.path().join("IMG_0001.icc"), b"sRGB-sidecar-profile-bytes").unwrap();
        let (catalog, root_id) = setup_catalog(&dir, &names);

        let service = PreviewService::new(PreviewServiceConfig { worker_count: 1, ..Default::default() });
        service.set_catalog_service(catalog);
        service.warm_root(root_id, dir.path()).unwrap();
        service.wait_until_idle();

        let cache_key = format!("IMG_0001.CR3#{root_id}");
        let cached = service.cached_preview(&cache_key).unwrap();
        assert!(cached.color_managed);
        // The sidecar bytes aren't a parseable ICC profile, so the
        // transformer falls back to sRGB as the source profile too —
        // the label still names it, same as a genuine sRGB sidecar would.
        assert!(cached.color_profile.contains("sRGB"));
    }
}
