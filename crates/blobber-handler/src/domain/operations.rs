//! Operation registry: route, scope policy and timeout class per operation.
//!
//! Read-only scopes always roll back. Read-write scopes commit on success and
//! roll back on error. Allocation lookup and file download are routed through
//! read-write because the storage handler may record state for them.

use crate::domain::config::TimeoutConfig;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Transaction-handling rule applied around an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopePolicy {
    /// Open, run, always roll back
    ReadOnly,
    /// Open, run, commit on success, roll back on error
    ReadWrite,
}

impl ScopePolicy {
    pub fn is_read_only(&self) -> bool {
        matches!(self, ScopePolicy::ReadOnly)
    }
}

/// Timeout class for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    Default,
    Upload,
    Download,
}

/// Logical storage operations served by the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    AllocationLookup,
    FileMetadata,
    FileDownload,
    FileList,
    ReferencePathLookup,
    FileUpload,
    WriteCommit,
}

/// Static metadata for an operation
#[derive(Debug, Clone, Copy)]
pub struct OperationInfo {
    /// Operation name as used in logs and stats
    pub name: &'static str,
    /// Axum route path
    pub route: &'static str,
    /// Scope policy
    pub policy: ScopePolicy,
    /// Whether the route carries an `{allocation}` path parameter
    pub requires_allocation: bool,
    /// Timeout class
    pub timeout: TimeoutClass,
}

impl OperationInfo {
    const fn new(
        name: &'static str,
        route: &'static str,
        policy: ScopePolicy,
        requires_allocation: bool,
        timeout: TimeoutClass,
    ) -> Self {
        Self {
            name,
            route,
            policy,
            requires_allocation,
            timeout,
        }
    }
}

static ALLOCATION_LOOKUP: OperationInfo = OperationInfo::new(
    "allocation-lookup",
    "/allocation",
    ScopePolicy::ReadWrite,
    false,
    TimeoutClass::Default,
);
static FILE_METADATA: OperationInfo = OperationInfo::new(
    "file-metadata",
    "/v1/file/meta/:allocation",
    ScopePolicy::ReadOnly,
    true,
    TimeoutClass::Default,
);
static FILE_DOWNLOAD: OperationInfo = OperationInfo::new(
    "file-download",
    "/v1/file/download/:allocation",
    ScopePolicy::ReadWrite,
    true,
    TimeoutClass::Download,
);
static FILE_LIST: OperationInfo = OperationInfo::new(
    "file-list",
    "/v1/file/list/:allocation",
    ScopePolicy::ReadOnly,
    true,
    TimeoutClass::Default,
);
static REFERENCE_PATH_LOOKUP: OperationInfo = OperationInfo::new(
    "reference-path-lookup",
    "/v1/file/referencepath/:allocation",
    ScopePolicy::ReadOnly,
    true,
    TimeoutClass::Default,
);
static FILE_UPLOAD: OperationInfo = OperationInfo::new(
    "file-upload",
    "/v1/file/upload/:allocation",
    ScopePolicy::ReadWrite,
    true,
    TimeoutClass::Upload,
);
static WRITE_COMMIT: OperationInfo = OperationInfo::new(
    "write-commit",
    "/v1/connection/commit/:allocation",
    ScopePolicy::ReadWrite,
    true,
    TimeoutClass::Upload,
);

impl Operation {
    /// Every operation, in route-registration order
    pub const ALL: [Operation; 7] = [
        Operation::FileUpload,
        Operation::FileDownload,
        Operation::FileMetadata,
        Operation::FileList,
        Operation::ReferencePathLookup,
        Operation::WriteCommit,
        Operation::AllocationLookup,
    ];

    pub fn info(&self) -> &'static OperationInfo {
        match self {
            Operation::AllocationLookup => &ALLOCATION_LOOKUP,
            Operation::FileMetadata => &FILE_METADATA,
            Operation::FileDownload => &FILE_DOWNLOAD,
            Operation::FileList => &FILE_LIST,
            Operation::ReferencePathLookup => &REFERENCE_PATH_LOOKUP,
            Operation::FileUpload => &FILE_UPLOAD,
            Operation::WriteCommit => &WRITE_COMMIT,
        }
    }

    pub fn name(&self) -> &'static str {
        self.info().name
    }

    pub fn route(&self) -> &'static str {
        self.info().route
    }

    pub fn scope_policy(&self) -> ScopePolicy {
        self.info().policy
    }

    pub fn requires_allocation(&self) -> bool {
        self.info().requires_allocation
    }

    /// Resolve the timeout for this operation from config
    pub fn timeout(&self, config: &TimeoutConfig) -> Duration {
        match self.info().timeout {
            TimeoutClass::Default => config.default,
            TimeoutClass::Upload => config.upload,
            TimeoutClass::Download => config.download,
        }
    }

    /// Look an operation up by its name
    pub fn from_name(name: &str) -> Option<Operation> {
        Operation::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
