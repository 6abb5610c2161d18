//! Error kinds shared by the matcher, translator and registrar

use thiserror::Error;

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// A dependency has not enumerated yet; the whole pass should be retried later.
    #[error("{0} is not ready yet")]
    NotReady(String),
    #[error("firmware object not found: {0}")]
    NotFound(String),
    #[error("firmware buffer of {len} bytes does not fit in {capacity} bytes")]
    BufferTooSmall { len: usize, capacity: usize },
    #[error("allocation failed: {0}")]
    AllocationFailure(String),
    #[error("node registration rejected: {0}")]
    RegistrationFailure(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl BridgeError {
    /// Whether the caller should defer and retry the whole discovery pass
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotReady(_))
    }

    /// Kernel style negative errno for the subsystem that triggered discovery
    pub fn errno(&self) -> i32 {
        match self {
            Self::NotReady(_) => -517,
            Self::NotFound(_) => -19,
            Self::BufferTooSmall { .. } => -105,
            Self::AllocationFailure(_) => -12,
            Self::RegistrationFailure(_) => -16,
            Self::InvalidArgument(_) => -22,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_not_ready_is_transient() {
        assert!(BridgeError::NotReady("i2c-INT33BE:00".into()).is_transient());
        assert!(!BridgeError::NotFound("SSDB".into()).is_transient());
        assert!(!BridgeError::BufferTooSmall { len: 200, capacity: 108 }.is_transient());
    }

    #[test]
    fn test_errno_mapping() {
        assert_eq!(BridgeError::NotReady(String::new()).errno(), -517);
        assert_eq!(BridgeError::AllocationFailure(String::new()).errno(), -12);
        assert_eq!(BridgeError::InvalidArgument(String::new()).errno(), -22);
    }
}
