// SPDX-License-Identifier: Apache-2.0

use std::time::Instant;

use crate::{DevConfError, ErrorKind, StatementBatch};

/// Connection to one device, provided by the transport layer.
///
/// Methods take `&self`: an implementation shared between threads
/// synchronizes internally. The engine never issues two calls at the same
/// time for one read, but readers and writers may overlap.
pub trait DeviceSession {
    /// Run a read-only query and return its raw text output.
    fn command(&self, cmd: &str) -> Result<String, DevConfError>;

    /// Load statements into the candidate configuration.
    fn config_set(&self, batch: &StatementBatch) -> Result<(), DevConfError>;

    /// Take the exclusive configuration lock of the device.
    fn config_lock(&self) -> Result<(), DevConfError>;

    /// Discard all uncommitted changes of the candidate configuration and
    /// release the lock.
    fn config_clear(&self) -> Result<(), DevConfError>;

    /// Commit the candidate configuration, returning non-fatal warnings.
    fn commit_conf(&self, description: &str)
        -> Result<Vec<String>, DevConfError>;

    /// Deadline for the following calls, `None` for no deadline.
    fn set_deadline(&self, _deadline: Option<Instant>) {}
}

/// Session of an engine which never contacts a device.
#[derive(Debug, Clone, Copy, Default)]
#[non_exhaustive]
pub struct OfflineSession;

impl OfflineSession {
    fn refuse(action: &str) -> DevConfError {
        let e = DevConfError::new(
            ErrorKind::NotSupportedError,
            format!("Cannot {action} without a device session in offline mode"),
        );
        log::error!("{}", e);
        e
    }
}

impl DeviceSession for OfflineSession {
    fn command(&self, _cmd: &str) -> Result<String, DevConfError> {
        Err(Self::refuse("query"))
    }

    fn config_set(&self, _batch: &StatementBatch) -> Result<(), DevConfError> {
        Err(Self::refuse("send statements"))
    }

    fn config_lock(&self) -> Result<(), DevConfError> {
        Err(Self::refuse("lock configuration"))
    }

    fn config_clear(&self) -> Result<(), DevConfError> {
        Err(Self::refuse("discard configuration"))
    }

    fn commit_conf(
        &self,
        _description: &str,
    ) -> Result<Vec<String>, DevConfError> {
        Err(Self::refuse("commit"))
    }
}
