//! Error types shared by every device model operation

use core::fmt::{Debug, Display};
use dt::PropertyError;

const ENOENT: i32 = 2;
const ENOMEM: i32 = 12;
const EBUSY: i32 = 16;
const EINVAL: i32 = 22;

/// The external service an opaque error code came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    PinConfig,
    PowerDomain,
    Clock,
    Topology,
    /// A driver or category hook reporting its own failure.
    Driver,
}

/// An error produced outside the device model and passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollaboratorError {
    pub service: Service,
    /// Negative errno-style code as reported by the service.
    pub code: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmError {
    /// Unknown category, driver, device or child.
    NotFound,
    /// Storage or node allocation failed.
    OutOfMemory,
    /// Missing name, stale device handle or a call made in the wrong phase.
    InvalidArgument,
    /// The device is active (unbind) or vital (deactivation).
    Busy,
    Collaborator(CollaboratorError),
}

pub type DmResult<T> = Result<T, DmError>;

impl DmError {
    pub const fn collaborator(service: Service, code: i32) -> DmError {
        DmError::Collaborator(CollaboratorError { service, code })
    }

    /// Negative errno equivalent, for callers that report numeric status.
    pub fn errno(&self) -> i32 {
        match self {
            DmError::NotFound => -ENOENT,
            DmError::OutOfMemory => -ENOMEM,
            DmError::InvalidArgument => -EINVAL,
            DmError::Busy => -EBUSY,
            DmError::Collaborator(err) => err.code,
        }
    }
}

impl Display for DmError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DmError::NotFound => f.write_str("no such device, driver or category"),
            DmError::OutOfMemory => f.write_str("out of memory"),
            DmError::InvalidArgument => f.write_str("invalid argument"),
            DmError::Busy => f.write_str("device busy"),
            DmError::Collaborator(err) => write!(f, "{:?} error {}", err.service, err.code),
        }
    }
}

impl From<PropertyError> for DmError {
    fn from(value: PropertyError) -> Self {
        let code = match value {
            PropertyError::PropNotFound => -ENOENT,
            PropertyError::InvalidPropFormat | PropertyError::DanglingHandle => -EINVAL,
        };
        DmError::collaborator(Service::Topology, code)
    }
}
