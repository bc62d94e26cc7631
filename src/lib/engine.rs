// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::{
    compile::{compile_batch, compile_object},
    decompile::{decompile, decompile_text, strip_output_framing},
    gen_diff, CodecContext, DevConfError, DeviceSession, ErrorKind,
    FeatureModel, OfflineSession, OptionsBlock, Statement, StatementBatch,
    StatementDiff,
};

// Wait maximum 30 seconds for discarding the candidate configuration
const DEFAULT_ROLLBACK_TIMEOUT: u32 = 30;
const SHOW_CONFIGURATION: &str = "show configuration";
const DISPLAY_SET_RELATIVE: &str = "| display set relative";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ApplyMode {
    /// Every step is performed against the device.
    Direct,
    /// Statements are only accumulated into a local batch artifact, no
    /// device is contacted.
    Offline,
}

impl Default for ApplyMode {
    fn default() -> Self {
        Self::Direct
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Create => "create",
                Self::Update => "update",
                Self::Delete => "delete",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApplyState {
    Idle,
    Locked,
    Replaced,
    Committed,
    Verified,
    Done,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct ApplyOutcome {
    /// Tree read back after the change, `None` for delete.
    pub tree: Option<OptionsBlock>,
    /// Non-fatal warnings reported by the device on commit.
    pub warnings: Vec<String>,
    /// Statements sent (or, in offline mode, recorded).
    pub batch: StatementBatch,
}

// Progress of one apply, only used for logging.
struct Transaction<'a> {
    operation: Operation,
    feature: &'a str,
    identity: &'a str,
    state: ApplyState,
}

impl<'a> Transaction<'a> {
    fn new(operation: Operation, feature: &'a str, identity: &'a str) -> Self {
        Self {
            operation,
            feature,
            identity,
            state: ApplyState::Idle,
        }
    }

    fn transit(&mut self, state: ApplyState) {
        log::debug!(
            "{} {} {}: {:?} -> {:?}",
            self.operation,
            self.feature,
            self.identity,
            self.state,
            state
        );
        self.state = state;
    }
}

/// Applies and reads feature objects on one device.
///
/// One [Engine] is created per device connection and shared by reference
/// (or [Arc]) between callers. Reads are serialized by a local mutex, writes
/// are serialized by the configuration lock of the device.
pub struct Engine<S: DeviceSession> {
    session: S,
    mode: ApplyMode,
    read_lock: Mutex<()>,
    artifact: Mutex<StatementBatch>,
    cancel: Arc<AtomicBool>,
    timeout: Option<u32>,
    rollback_timeout: u32,
    no_verify: bool,
}

impl Engine<OfflineSession> {
    /// Engine recording statements without any device.
    pub fn new_offline() -> Self {
        let mut ret = Self::new(OfflineSession);
        ret.mode = ApplyMode::Offline;
        ret
    }
}

impl<S: DeviceSession> Engine<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            mode: ApplyMode::Direct,
            read_lock: Mutex::new(()),
            artifact: Mutex::new(StatementBatch::new()),
            cancel: Arc::new(AtomicBool::new(false)),
            timeout: None,
            rollback_timeout: DEFAULT_ROLLBACK_TIMEOUT,
            no_verify: false,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn mode(&self) -> ApplyMode {
        self.mode
    }

    /// Seconds allowed for one whole operation. Default is no limit.
    pub fn set_timeout(&mut self, value: u32) -> &mut Self {
        self.timeout = Some(value);
        self
    }

    /// Seconds allowed for discarding the candidate configuration after a
    /// failure. Default is 30.
    pub fn set_rollback_timeout(&mut self, value: u32) -> &mut Self {
        self.rollback_timeout = value;
        self
    }

    /// By default(true), after a create is committed, the engine checks that
    /// the object exists on device. When set to false, no verification is
    /// performed.
    pub fn set_verify_change(&mut self, value: bool) -> &mut Self {
        self.no_verify = !value;
        self
    }

    /// Flag to set from another thread (e.g. a signal handler) for
    /// cancelling the running operations. A cancelled operation holding the
    /// configuration lock still discards its changes before returning.
    ///
    /// The engine never clears the flag: once set, every following
    /// operation fails with [ErrorKind::Cancelled] until the caller stores
    /// false again.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Statements recorded so far in offline mode, leaving the artifact
    /// empty.
    pub fn take_artifact(&self) -> Result<StatementBatch, DevConfError> {
        Ok(std::mem::take(&mut *self.lock_artifact()?))
    }

    /// Whether the device holds any statement under `path`.
    pub fn exists(&self, path: &Statement) -> Result<bool, DevConfError> {
        let deadline = self.deadline();
        let _guard = self.lock_read()?;
        self.exists_unlocked(path, deadline)
    }

    fn exists_unlocked(
        &self,
        path: &Statement,
        deadline: Option<Instant>,
    ) -> Result<bool, DevConfError> {
        let output = self.query(path, deadline)?;
        Ok(!strip_output_framing(&output).trim().is_empty())
    }

    /// Read one object of `feature` from the device.
    ///
    /// A missing object is not an error: the returned tree holds only
    /// unset values and an empty identity, see [FeatureModel::is_absent()].
    pub fn read(
        &self,
        feature: &FeatureModel,
        identity: &str,
        context: &CodecContext,
    ) -> Result<OptionsBlock, DevConfError> {
        let deadline = self.deadline();
        let _guard = self.lock_read()?;
        let path = feature.object_path(identity);
        let output = self.query(&path, deadline)?;
        if strip_output_framing(&output).trim().is_empty() {
            log::debug!("{} {} not found", feature.name, identity);
            return Ok(feature.new_tree(""));
        }
        let mut tree = decompile_text(&output, &feature.fields, context)?;
        if let Some(id_field) = feature.identity.as_deref() {
            tree.set(id_field, identity);
        }
        Ok(tree)
    }

    pub fn create(
        &self,
        feature: &FeatureModel,
        tree: &OptionsBlock,
        context: &CodecContext,
    ) -> Result<ApplyOutcome, DevConfError> {
        let deadline = self.deadline();
        // Validation happens before touching the device
        let batch = compile_batch(feature, tree, context)?;
        let identity = feature.identity_of(tree);
        if self.mode == ApplyMode::Offline {
            return self.record(feature, Some(tree), batch, context, deadline);
        }
        let path = feature.object_path(identity);

        if feature.identity.is_some() {
            let _guard = self.lock_read()?;
            if self.exists_unlocked(&path, deadline)? {
                let e = DevConfError::new(
                    ErrorKind::InvalidArgument,
                    format!("{} {identity} already exists", feature.name),
                );
                log::error!("{}", e);
                return Err(e);
            }
        }

        let mut transaction =
            Transaction::new(Operation::Create, &feature.name, identity);
        let warnings =
            self.apply_batch(&mut transaction, &batch, deadline)?;

        if !self.no_verify {
            let _guard = self.lock_read()?;
            if !self.exists_unlocked(&path, deadline)? {
                let e = DevConfError::new(
                    ErrorKind::InconsistentState,
                    format!(
                        "Device accepted the commit but {} {identity} is not \
                        found, please check the configuration",
                        feature.name
                    ),
                );
                log::error!("{}", e);
                return Err(e);
            }
            transaction.transit(ApplyState::Verified);
        }

        let new_tree = self.read(feature, identity, context)?;
        transaction.transit(ApplyState::Done);
        Ok(ApplyOutcome {
            tree: Some(new_tree),
            warnings,
            batch,
        })
    }

    /// Replace object `identity` by `tree`. The identity held by `tree`, if
    /// different, renames the object.
    pub fn update(
        &self,
        feature: &FeatureModel,
        identity: &str,
        tree: &OptionsBlock,
        context: &CodecContext,
    ) -> Result<ApplyOutcome, DevConfError> {
        check_identity(feature, identity, Operation::Update)?;
        let deadline = self.deadline();
        let mut tree = tree.clone();
        if let Some(id_field) = feature.identity.as_deref() {
            if feature.identity_of(&tree).is_empty() {
                tree.set(id_field, identity);
            }
        }
        let mut batch = delete_batch(feature, identity);
        batch.extend(compile_batch(feature, &tree, context)?);
        if self.mode == ApplyMode::Offline {
            return self.record(
                feature,
                Some(&tree),
                batch,
                context,
                deadline,
            );
        }
        let mut transaction =
            Transaction::new(Operation::Update, &feature.name, identity);
        let warnings = self.apply_batch(&mut transaction, &batch, deadline)?;

        let new_tree =
            self.read(feature, feature.identity_of(&tree), context)?;
        transaction.transit(ApplyState::Done);
        Ok(ApplyOutcome {
            tree: Some(new_tree),
            warnings,
            batch,
        })
    }

    pub fn delete(
        &self,
        feature: &FeatureModel,
        identity: &str,
    ) -> Result<ApplyOutcome, DevConfError> {
        check_identity(feature, identity, Operation::Delete)?;
        let deadline = self.deadline();
        let batch = delete_batch(feature, identity);
        if self.mode == ApplyMode::Offline {
            return self.record(
                feature,
                None,
                batch,
                &CodecContext::new(),
                deadline,
            );
        }
        let mut transaction =
            Transaction::new(Operation::Delete, &feature.name, identity);
        let warnings = self.apply_batch(&mut transaction, &batch, deadline)?;
        transaction.transit(ApplyState::Done);
        Ok(ApplyOutcome {
            tree: None,
            warnings,
            batch,
        })
    }

    /// Statements which applying `tree` to object `identity` would change.
    /// An empty diff means the apply is a no-op.
    pub fn plan(
        &self,
        feature: &FeatureModel,
        identity: &str,
        tree: &OptionsBlock,
        context: &CodecContext,
    ) -> Result<StatementDiff, DevConfError> {
        let desired = compile_object(feature, tree, context)?;
        let current_tree = self.read(feature, identity, context)?;
        let current = if feature.is_absent(&current_tree) {
            Vec::new()
        } else {
            compile_object(feature, &current_tree, context)?
        };
        Ok(gen_diff(current.as_slice(), desired.as_slice()))
    }

    // Lock, replace, commit. Any failure after the lock discards the
    // candidate configuration.
    fn apply_batch(
        &self,
        transaction: &mut Transaction,
        batch: &StatementBatch,
        deadline: Option<Instant>,
    ) -> Result<Vec<String>, DevConfError> {
        self.check_interrupt(deadline)?;
        if let Err(e) = self.session.config_lock() {
            log::error!("Failed to lock configuration: {}", e);
            return Err(e);
        }
        transaction.transit(ApplyState::Locked);

        let result = self.check_interrupt(deadline).and_then(|()| {
            self.session.config_set(batch)?;
            transaction.transit(ApplyState::Replaced);
            self.check_interrupt(deadline)?;
            let description = format!(
                "{} {} {} [devconf {}]",
                transaction.operation,
                transaction.feature,
                transaction.identity,
                uuid::Uuid::new_v4()
            );
            log::info!("Committing: {}", description);
            let warnings = self.session.commit_conf(&description)?;
            for warning in warnings.as_slice() {
                log::warn!("Commit warning: {}", warning);
            }
            transaction.transit(ApplyState::Committed);
            Ok(warnings)
        });
        match result {
            Ok(w) => Ok(w),
            Err(e) => Err(self.rollback(transaction, e)),
        }
    }

    fn rollback(
        &self,
        transaction: &mut Transaction,
        mut error: DevConfError,
    ) -> DevConfError {
        self.session.set_deadline(Some(
            Instant::now()
                + Duration::from_secs(self.rollback_timeout.into()),
        ));
        match self.session.config_clear() {
            Ok(()) => {
                log::info!("Discarded candidate configuration");
            }
            Err(e) => {
                log::warn!("config_clear() failed: {}", e);
                error.set_secondary(format!(
                    "failed to discard candidate configuration: {e}"
                ));
            }
        }
        transaction.transit(ApplyState::RolledBack);
        error
    }

    fn record(
        &self,
        feature: &FeatureModel,
        tree: Option<&OptionsBlock>,
        batch: StatementBatch,
        context: &CodecContext,
        deadline: Option<Instant>,
    ) -> Result<ApplyOutcome, DevConfError> {
        // What a read-after-write would give if the device kept the
        // statements as they are.
        let new_tree = match tree {
            Some(tree) => {
                let mut new_tree = decompile(
                    compile_object(feature, tree, context)?.as_slice(),
                    &feature.fields,
                    context,
                )?;
                if let Some(id_field) = feature.identity.as_deref() {
                    new_tree.set(id_field, feature.identity_of(tree));
                }
                Some(new_tree)
            }
            None => None,
        };
        self.check_interrupt(deadline)?;
        self.lock_artifact()?.extend(batch.clone());
        log::debug!(
            "Recorded {} statement(s) for {} in offline mode",
            batch.len(),
            feature.name
        );
        Ok(ApplyOutcome {
            tree: new_tree,
            warnings: Vec::new(),
            batch,
        })
    }

    fn query(
        &self,
        path: &Statement,
        deadline: Option<Instant>,
    ) -> Result<String, DevConfError> {
        self.check_interrupt(deadline)?;
        let cmd = format!("{SHOW_CONFIGURATION} {path} {DISPLAY_SET_RELATIVE}");
        log::debug!("Querying: {}", cmd);
        self.session.command(&cmd)
    }

    fn deadline(&self) -> Option<Instant> {
        self.timeout
            .map(|t| Instant::now() + Duration::from_secs(t.into()))
    }

    fn check_interrupt(
        &self,
        deadline: Option<Instant>,
    ) -> Result<(), DevConfError> {
        if self.cancel.load(Ordering::SeqCst) {
            let e = DevConfError::new(
                ErrorKind::Cancelled,
                "Operation cancelled".to_string(),
            );
            log::error!("{}", e);
            return Err(e);
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                let e = DevConfError::new(
                    ErrorKind::Timeout,
                    "Operation timed out".to_string(),
                );
                log::error!("{}", e);
                return Err(e);
            }
        }
        self.session.set_deadline(deadline);
        Ok(())
    }

    fn lock_read(&self) -> Result<MutexGuard<'_, ()>, DevConfError> {
        self.read_lock.lock().map_err(|e| {
            DevConfError::new(
                ErrorKind::Bug,
                format!("BUG: read lock poisoned: {e}"),
            )
        })
    }

    fn lock_artifact(
        &self,
    ) -> Result<MutexGuard<'_, StatementBatch>, DevConfError> {
        self.artifact.lock().map_err(|e| {
            DevConfError::new(
                ErrorKind::Bug,
                format!("BUG: artifact lock poisoned: {e}"),
            )
        })
    }
}

fn check_identity(
    feature: &FeatureModel,
    identity: &str,
    operation: Operation,
) -> Result<(), DevConfError> {
    if feature.identity.is_some() && identity.is_empty() {
        let e = DevConfError::new(
            ErrorKind::InvalidArgument,
            format!("No identity given for {operation} of {}", feature.name),
        );
        log::error!("{}", e);
        return Err(e);
    }
    Ok(())
}

// Superset delete of every path owned by the feature object
fn delete_batch(feature: &FeatureModel, identity: &str) -> StatementBatch {
    let mut ret = StatementBatch::new();
    for statement in feature.delete_statements(identity) {
        ret.push_delete(statement);
    }
    ret
}
