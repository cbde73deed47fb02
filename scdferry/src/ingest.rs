//! Ingest coordination: scan → relocate → dispatch.
//!
//! One [`IngestCoordinator`] serves one collection on one notification
//! channel. When the external notification layer reports "new data may be
//! here", the coordinator reconciles the files into the collection's staging
//! directory (unless shared storage makes copying pointless) and then decides,
//! by cluster role, whether to index locally or relay a [`WriteCommand`] to
//! the primary's write queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use scdferry_core::tracing_config::targets;
use scdferry_core::{
    FerryResult, IndexService, IngestChannel, RoleResolver, StorageProbe, WriteCommand, WriteQueue,
};

use crate::relocate::{relocate_batch, stage_overwrite};
use crate::scan::scan_scd_files;

/// Coordinates SCD ingest for a single collection and channel.
pub struct IngestCoordinator {
    collection: String,
    channel: IngestChannel,
    roles: Arc<dyn RoleResolver>,
    storage: Arc<dyn StorageProbe>,
    queue: Arc<dyn WriteQueue>,
    engine: Arc<dyn IndexService>,
}

impl IngestCoordinator {
    /// Build a coordinator from its injected collaborators.
    #[must_use]
    pub fn new(
        collection: impl Into<String>,
        channel: IngestChannel,
        roles: Arc<dyn RoleResolver>,
        storage: Arc<dyn StorageProbe>,
        queue: Arc<dyn WriteQueue>,
        engine: Arc<dyn IndexService>,
    ) -> Self {
        Self {
            collection: collection.into(),
            channel,
            roles,
            storage,
            queue,
            engine,
        }
    }

    /// The collection this coordinator serves.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The channel this coordinator serves.
    #[must_use]
    pub const fn channel(&self) -> IngestChannel {
        self.channel
    }

    /// React to a "new data available" notification.
    ///
    /// `source_dir` of `None` (or an empty path) on the rebuild channel means
    /// "nothing to copy from elsewhere": the coordinator substitutes the
    /// engine's own incremental staging directory and stages from there.
    ///
    /// With node-local storage the recognized files are relocated into the
    /// channel-appropriate staging directory and the path is cleared before
    /// dispatch; with shared storage copying is skipped and the path passes
    /// through, since it resolves identically on every node. Finding no SCD
    /// files is an idempotent no-op.
    ///
    /// # Errors
    ///
    /// Propagates scan and relocation failures, and the local engine's index
    /// failure on a single-node deployment.
    pub fn on_notified(&self, source_dir: Option<&Path>) -> FerryResult<()> {
        let mut source: Option<PathBuf> = non_empty(source_dir);
        if source.is_none() && self.channel.is_rebuild() {
            let own = self.engine.scd_dir(false);
            info!(
                target: targets::INGEST,
                collection = %self.collection,
                source_dir = %own.display(),
                "empty rebuild notification, staging from the engine's own directory"
            );
            source = Some(own);
        }

        let shared = self.storage.is_shared();
        if let Some(dir) = source.as_ref() {
            if !shared {
                let files = scan_scd_files(dir)?;
                if files.is_empty() {
                    info!(
                        target: targets::INGEST,
                        collection = %self.collection,
                        source_dir = %dir.display(),
                        "no SCD file found"
                    );
                    return Ok(());
                }
                let dest = self.engine.scd_dir(self.channel.is_rebuild());
                std::fs::create_dir_all(&dest)?;
                relocate_batch(&files, &dest)?;
                info!(
                    target: targets::INGEST,
                    collection = %self.collection,
                    channel = %self.channel,
                    file_count = files.len(),
                    dest_dir = %dest.display(),
                    "SCD files relocated"
                );
            }
        }

        // Downstream consumers on shared storage can trust the path; on
        // node-local storage they must resolve their own staging directory.
        let dispatch_path = if shared { source.as_deref() } else { None };
        self.dispatch(dispatch_path)
    }

    /// Stage rebuild-snapshot aggregate data without dispatching.
    ///
    /// Uses overwrite semantics: the staged data only feeds a later rebuild,
    /// so replacing a stale copy is the correct outcome. Shared storage or an
    /// empty source makes this a no-op.
    ///
    /// # Errors
    ///
    /// Propagates scan and copy failures.
    pub fn stage_snapshot(&self, source_dir: Option<&Path>) -> FerryResult<()> {
        let Some(dir) = non_empty(source_dir) else {
            return Ok(());
        };
        if self.storage.is_shared() {
            debug!(
                target: targets::INGEST,
                collection = %self.collection,
                "shared storage, snapshot staging skipped"
            );
            return Ok(());
        }

        let dest = self.engine.scd_dir(true);
        std::fs::create_dir_all(&dest)?;
        let files = scan_scd_files(&dir)?;
        if files.is_empty() {
            info!(
                target: targets::INGEST,
                collection = %self.collection,
                source_dir = %dir.display(),
                "no SCD file found"
            );
            return Ok(());
        }
        stage_overwrite(&files, &dest)?;
        info!(
            target: targets::INGEST,
            collection = %self.collection,
            file_count = files.len(),
            dest_dir = %dest.display(),
            "snapshot data staged"
        );
        Ok(())
    }

    /// Role-aware dispatch of the staged data.
    fn dispatch(&self, scd_path: Option<&Path>) -> FerryResult<()> {
        if self.roles.is_distributed() {
            if self.roles.is_primary() {
                let action = self.channel.write_action();
                let command = WriteCommand::new(&self.collection, scd_path, action);
                info!(
                    target: targets::DISPATCH,
                    collection = %self.collection,
                    action = action.as_str(),
                    uri = action.uri(),
                    "write command pushed to the primary queue"
                );
                self.queue.push(command);
            } else {
                // Replicas never originate index commands; the primary is the
                // single source of truth for command ordering.
                info!(
                    target: targets::DISPATCH,
                    collection = %self.collection,
                    "ignored on replica node"
                );
            }
            Ok(())
        } else {
            self.engine.index_scd(None)
        }
    }
}

fn non_empty(path: Option<&Path>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use scdferry_core::{
        CollectionLayout, DocumentSnapshot, FerryError, StaticRoleResolver, StaticStorageProbe,
        WriteAction,
    };

    struct NullSnapshot;
    impl DocumentSnapshot for NullSnapshot {}

    struct MockEngine {
        root: PathBuf,
        index_calls: Mutex<Vec<Option<PathBuf>>>,
        fail_index: bool,
    }

    impl MockEngine {
        fn new(root: &Path) -> Self {
            Self {
                root: root.to_path_buf(),
                index_calls: Mutex::new(Vec::new()),
                fail_index: false,
            }
        }

        fn index_calls(&self) -> Vec<Option<PathBuf>> {
            self.index_calls.lock().unwrap().clone()
        }
    }

    impl IndexService for MockEngine {
        fn index_scd(&self, scd_path: Option<&Path>) -> FerryResult<()> {
            self.index_calls
                .lock()
                .unwrap()
                .push(scd_path.map(Path::to_path_buf));
            if self.fail_index {
                return Err(FerryError::index_failed(
                    "mock",
                    std::io::Error::other("engine down"),
                ));
            }
            Ok(())
        }

        fn scd_dir(&self, rebuild: bool) -> PathBuf {
            if rebuild {
                self.root.join("scd/rebuild")
            } else {
                self.root.join("scd/index")
            }
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

    #[derive(Default)]
    struct RecordingQueue {
        commands: Mutex<Vec<WriteCommand>>,
    }

    impl RecordingQueue {
        fn commands(&self) -> Vec<WriteCommand> {
            self.commands.lock().unwrap().clone()
        }
    }

    impl WriteQueue for RecordingQueue {
        fn push(&self, command: WriteCommand) {
            self.commands.lock().unwrap().push(command);
        }
    }

    struct Harness {
        _workspace: tempfile::TempDir,
        source: PathBuf,
        engine: Arc<MockEngine>,
        queue: Arc<RecordingQueue>,
    }

    impl Harness {
        fn new() -> Self {
            let workspace = tempfile::tempdir().expect("tmpdir");
            let source = workspace.path().join("incoming");
            std::fs::create_dir_all(&source).expect("mkdir");
            let engine = Arc::new(MockEngine::new(workspace.path()));
            Self {
                _workspace: workspace,
                source,
                engine,
                queue: Arc::new(RecordingQueue::default()),
            }
        }

        fn drop_scd(&self, name: &str, contents: &str) {
            std::fs::write(self.source.join(name), contents).expect("write scd");
        }

        fn coordinator(
            &self,
            channel: IngestChannel,
            roles: StaticRoleResolver,
            storage: StaticStorageProbe,
        ) -> IngestCoordinator {
            IngestCoordinator::new(
                "products",
                channel,
                Arc::new(roles),
                Arc::new(storage),
                self.queue.clone(),
                self.engine.clone(),
            )
        }
    }

    #[test]
    fn primary_rebuild_channel_pushes_rebuild_command() {
        let h = Harness::new();
        h.drop_scd("B-00-a.scd", "a");
        let coord = h.coordinator(
            IngestChannel::RebuildSnapshot,
            StaticRoleResolver::primary(),
            StaticStorageProbe::node_local(),
        );

        coord.on_notified(Some(&h.source)).expect("ok");

        let commands = h.queue.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].action, WriteAction::RebuildFromScd);
        assert_eq!(commands[0].action.uri(), "collection/rebuild_from_scd");
        assert_eq!(commands[0].collection, "products");
        // Node-local storage: the path was cleared before dispatch.
        assert_eq!(commands[0].index_scd_path, "");
        // Files landed in the rebuild staging dir.
        assert!(h.engine.scd_dir(true).join("B-00-a.scd").exists());
        assert!(h.engine.index_calls().is_empty());
    }

    #[test]
    fn primary_incremental_channel_pushes_index_command() {
        let h = Harness::new();
        h.drop_scd("B-00-a.scd", "a");
        let coord = h.coordinator(
            IngestChannel::Incremental,
            StaticRoleResolver::primary(),
            StaticStorageProbe::node_local(),
        );

        coord.on_notified(Some(&h.source)).expect("ok");

        let commands = h.queue.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].action, WriteAction::Index);
        assert_eq!(commands[0].action.uri(), "commands/index");
        assert!(h.engine.scd_dir(false).join("B-00-a.scd").exists());
    }

    #[test]
    fn replica_relocates_but_never_dispatches() {
        let h = Harness::new();
        h.drop_scd("B-00-a.scd", "a");
        let coord = h.coordinator(
            IngestChannel::Incremental,
            StaticRoleResolver::replica(),
            StaticStorageProbe::node_local(),
        );

        coord.on_notified(Some(&h.source)).expect("still succeeds");

        assert!(h.queue.commands().is_empty());
        assert!(h.engine.index_calls().is_empty());
    }

    #[test]
    fn single_node_indexes_locally_with_no_path() {
        let h = Harness::new();
        h.drop_scd("B-00-a.scd", "a");
        let coord = h.coordinator(
            IngestChannel::Incremental,
            StaticRoleResolver::single_node(),
            StaticStorageProbe::node_local(),
        );

        coord.on_notified(Some(&h.source)).expect("ok");

        assert!(h.queue.commands().is_empty());
        assert_eq!(h.engine.index_calls(), vec![None]);
    }

    #[test]
    fn shared_storage_skips_copy_and_passes_path_through() {
        let h = Harness::new();
        h.drop_scd("B-00-a.scd", "a");
        let coord = h.coordinator(
            IngestChannel::Incremental,
            StaticRoleResolver::primary(),
            StaticStorageProbe::shared(),
        );

        coord.on_notified(Some(&h.source)).expect("ok");

        // No copy happened.
        assert!(!h.engine.scd_dir(false).exists());
        let commands = h.queue.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0].index_scd_path,
            h.source.to_string_lossy().as_ref()
        );
    }

    #[test]
    fn no_scd_files_is_a_quiet_no_op() {
        let h = Harness::new();
        std::fs::write(h.source.join("readme.txt"), "not scd").unwrap();
        let coord = h.coordinator(
            IngestChannel::Incremental,
            StaticRoleResolver::primary(),
            StaticStorageProbe::node_local(),
        );

        coord.on_notified(Some(&h.source)).expect("ok");

        assert!(h.queue.commands().is_empty());
        assert!(h.engine.index_calls().is_empty());
    }

    #[test]
    fn empty_incremental_notification_dispatches_without_copy() {
        let h = Harness::new();
        let coord = h.coordinator(
            IngestChannel::Incremental,
            StaticRoleResolver::primary(),
            StaticStorageProbe::node_local(),
        );

        coord.on_notified(None).expect("ok");

        // Nothing to scan, but the command still goes out with an empty path.
        let commands = h.queue.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].index_scd_path, "");
    }

    #[test]
    fn empty_rebuild_notification_stages_from_own_directory() {
        let h = Harness::new();
        // Seed the engine's incremental staging dir; the rebuild channel
        // pulls from there when the notification carries no path.
        let own = h.engine.scd_dir(false);
        std::fs::create_dir_all(&own).unwrap();
        std::fs::write(own.join("B-00-a.scd"), "a").unwrap();

        let coord = h.coordinator(
            IngestChannel::RebuildSnapshot,
            StaticRoleResolver::primary(),
            StaticStorageProbe::node_local(),
        );
        coord.on_notified(None).expect("ok");

        assert!(h.engine.scd_dir(true).join("B-00-a.scd").exists());
        assert_eq!(h.queue.commands().len(), 1);
    }

    #[test]
    fn empty_path_string_counts_as_empty() {
        let h = Harness::new();
        let coord = h.coordinator(
            IngestChannel::Incremental,
            StaticRoleResolver::replica(),
            StaticStorageProbe::node_local(),
        );
        coord.on_notified(Some(Path::new(""))).expect("ok");
        assert!(h.queue.commands().is_empty());
    }

    #[test]
    fn local_engine_failure_propagates() {
        let h = Harness::new();
        h.drop_scd("B-00-a.scd", "a");
        let mut engine = MockEngine::new(h._workspace.path());
        engine.fail_index = true;
        let coord = IngestCoordinator::new(
            "products",
            IngestChannel::Incremental,
            Arc::new(StaticRoleResolver::single_node()),
            Arc::new(StaticStorageProbe::node_local()),
            h.queue.clone(),
            Arc::new(engine),
        );

        let err = coord.on_notified(Some(&h.source)).unwrap_err();
        assert!(matches!(err, FerryError::IndexFailed { .. }));
    }

    #[test]
    fn stage_snapshot_overwrites_and_never_dispatches() {
        let h = Harness::new();
        h.drop_scd("T-00-total.scd", "new totals");
        let dest = h.engine.scd_dir(true);
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("T-00-total.scd"), "stale").unwrap();

        let coord = h.coordinator(
            IngestChannel::RebuildSnapshot,
            StaticRoleResolver::primary(),
            StaticStorageProbe::node_local(),
        );
        coord.stage_snapshot(Some(&h.source)).expect("ok");

        assert_eq!(
            std::fs::read_to_string(dest.join("T-00-total.scd")).unwrap(),
            "new totals"
        );
        assert!(h.queue.commands().is_empty());
        assert!(h.engine.index_calls().is_empty());
    }

    #[test]
    fn stage_snapshot_with_empty_source_is_no_op() {
        let h = Harness::new();
        let coord = h.coordinator(
            IngestChannel::RebuildSnapshot,
            StaticRoleResolver::primary(),
            StaticStorageProbe::node_local(),
        );
        coord.stage_snapshot(None).expect("ok");
        assert!(!h.engine.scd_dir(true).exists());
    }

    #[test]
    fn stage_snapshot_on_shared_storage_is_no_op() {
        let h = Harness::new();
        h.drop_scd("T-00-total.scd", "totals");
        let coord = h.coordinator(
            IngestChannel::RebuildSnapshot,
            StaticRoleResolver::primary(),
            StaticStorageProbe::shared(),
        );
        coord.stage_snapshot(Some(&h.source)).expect("ok");
        assert!(!h.engine.scd_dir(true).exists());
    }
}
