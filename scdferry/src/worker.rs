//! Per-collection notification workers.
//!
//! The relocation algorithm and directory scan are not internally
//! synchronized beyond atomic rename/copy primitives, so the pipeline
//! requires at most one in-flight coordinator invocation per collection.
//! Instead of leaving that to convention in the external notification layer,
//! each collection gets an [`IngestWorker`]: a single-consumer channel and one
//! thread that drains it in FIFO order, which guarantees the property
//! structurally.

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::JoinHandle;

use tracing::{debug, error};

use scdferry_core::FerryResult;
use scdferry_core::tracing_config::targets;

use crate::ingest::IngestCoordinator;

/// What a notification asks the coordinator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// New SCD data may be available: scan, relocate, dispatch.
    Data,
    /// Stage rebuild-snapshot aggregate data; never dispatches.
    StageSnapshot,
}

/// One notification from the external pub/sub layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Source directory; `None` means "consult the target's own staging dir".
    pub source_dir: Option<PathBuf>,
    /// Requested handling.
    pub kind: NotificationKind,
}

impl Notification {
    /// A "new data available" notification.
    #[must_use]
    pub fn data(source_dir: Option<PathBuf>) -> Self {
        Self {
            source_dir,
            kind: NotificationKind::Data,
        }
    }

    /// A snapshot-staging notification.
    #[must_use]
    pub fn stage_snapshot(source_dir: Option<PathBuf>) -> Self {
        Self {
            source_dir,
            kind: NotificationKind::StageSnapshot,
        }
    }
}

/// Single-consumer notification queue for one collection.
///
/// Dropping the worker closes the queue, lets the thread drain what is
/// already enqueued, and joins it.
pub struct IngestWorker {
    collection: String,
    tx: Option<mpsc::Sender<Notification>>,
    join: Option<JoinHandle<()>>,
}

impl IngestWorker {
    /// Spawn the consumer thread for `coordinator`'s collection.
    ///
    /// # Errors
    ///
    /// Returns `Io` when the OS refuses to spawn the thread.
    pub fn spawn(coordinator: IngestCoordinator) -> FerryResult<Self> {
        let collection = coordinator.collection().to_owned();
        let (tx, rx) = mpsc::channel::<Notification>();
        let thread_name = format!("scdferry-{collection}");
        let join = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || run_loop(&coordinator, &rx))?;
        Ok(Self {
            collection,
            tx: Some(tx),
            join: Some(join),
        })
    }

    /// The collection this worker serves.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Enqueue a notification.
    ///
    /// Returns false when the worker is no longer accepting (its thread has
    /// exited); the notification layer owns any retry policy.
    pub fn notify(&self, notification: Notification) -> bool {
        match &self.tx {
            Some(tx) => tx.send(notification).is_ok(),
            None => false,
        }
    }
}

impl Drop for IngestWorker {
    fn drop(&mut self) {
        // Closing the sender ends the consumer's loop once the queue drains.
        self.tx.take();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!(
                    target: targets::WORKER,
                    collection = %self.collection,
                    "ingest worker thread panicked"
                );
            }
        }
    }
}

fn run_loop(coordinator: &IngestCoordinator, rx: &mpsc::Receiver<Notification>) {
    for notification in rx {
        let source = notification.source_dir.as_deref();
        let result = match notification.kind {
            NotificationKind::Data => coordinator.on_notified(source),
            NotificationKind::StageSnapshot => coordinator.stage_snapshot(source),
        };
        if let Err(err) = result {
            error!(
                target: targets::WORKER,
                collection = coordinator.collection(),
                error = %err,
                "notification handling failed"
            );
        }
    }
    debug!(
        target: targets::WORKER,
        collection = coordinator.collection(),
        "ingest worker drained and stopped"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use scdferry_core::{
        CollectionLayout, DocumentSnapshot, FerryResult, IndexService, IngestChannel,
        NoopWriteQueue, StaticRoleResolver, StaticStorageProbe,
    };

    struct NullSnapshot;
    impl DocumentSnapshot for NullSnapshot {}

    /// Engine that records call order and asserts it is never re-entered.
    struct SerialEngine {
        root: PathBuf,
        busy: AtomicBool,
        overlapped: AtomicBool,
        calls: Mutex<Vec<String>>,
    }

    impl SerialEngine {
        fn new(root: &Path) -> Self {
            Self {
                root: root.to_path_buf(),
                busy: AtomicBool::new(false),
                overlapped: AtomicBool::new(false),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn enter(&self, label: String) {
            if self.busy.swap(true, Ordering::SeqCst) {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(5));
            self.calls.lock().unwrap().push(label);
            self.busy.store(false, Ordering::SeqCst);
        }
    }

    impl IndexService for SerialEngine {
        fn index_scd(&self, _scd_path: Option<&Path>) -> FerryResult<()> {
            self.enter("index".into());
            Ok(())
        }

        fn scd_dir(&self, rebuild: bool) -> PathBuf {
            self.root.join(if rebuild { "rebuild" } else { "index" })
        }

        fn document_snapshot(&self) -> Arc<dyn DocumentSnapshot> {
            Arc::new(NullSnapshot)
        }

        fn reindex_from(&self, _docs: &Arc<dyn DocumentSnapshot>) -> FerryResult<()> {
            Ok(())
        }

        fn collection_layout(&self) -> CollectionLayout {
            CollectionLayout {
                base_path: self.root.clone(),
                data_path: self.root.join("data"),
                current_dir: "current".into(),
            }
        }
    }

    fn spawn_worker(engine: Arc<SerialEngine>) -> IngestWorker {
        let coordinator = IngestCoordinator::new(
            "products",
            IngestChannel::Incremental,
            Arc::new(StaticRoleResolver::single_node()),
            Arc::new(StaticStorageProbe::node_local()),
            Arc::new(NoopWriteQueue),
            engine,
        );
        IngestWorker::spawn(coordinator).expect("spawn worker")
    }

    #[test]
    fn notifications_run_serially_in_fifo_order() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let engine = Arc::new(SerialEngine::new(dir.path()));

        // Empty-source incremental notifications go straight to dispatch, so
        // every one reaches the engine exactly once.
        let worker = spawn_worker(engine.clone());
        for _ in 0..4 {
            assert!(worker.notify(Notification::data(None)));
        }
        drop(worker); // drains the queue and joins

        assert_eq!(engine.calls.lock().unwrap().len(), 4);
        assert!(
            !engine.overlapped.load(Ordering::SeqCst),
            "coordinator invocations must never overlap"
        );
    }

    #[test]
    fn handler_failure_does_not_kill_the_worker() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let engine = Arc::new(SerialEngine::new(dir.path()));
        let worker = spawn_worker(engine.clone());

        // A data notification pointing at a missing directory fails the scan;
        // the worker logs and keeps serving.
        let missing = dir.path().join("missing");
        assert!(worker.notify(Notification::data(Some(missing))));
        assert!(worker.notify(Notification::data(None)));
        drop(worker);

        assert_eq!(engine.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn worker_reports_its_collection() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let worker = spawn_worker(Arc::new(SerialEngine::new(dir.path())));
        assert_eq!(worker.collection(), "products");
    }

    #[test]
    fn notification_constructors() {
        let n = Notification::data(Some(PathBuf::from("/x")));
        assert_eq!(n.kind, NotificationKind::Data);
        let n = Notification::stage_snapshot(None);
        assert_eq!(n.kind, NotificationKind::StageSnapshot);
        assert!(n.source_dir.is_none());
    }
}
