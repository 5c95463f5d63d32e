//! Capability predicate for privileged BLE operations.
//!
//! The host platform decides whether scanning and connecting are allowed. The
//! core never caches an answer: the predicate is queried immediately before
//! each privileged transport call.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A privileged BLE capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Start scanning for peripherals.
    Scan,
    /// Connect to a peripheral and use its GATT server.
    Connect,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Scan => f.write_str("scan"),
            Permission::Connect => f.write_str("connect"),
        }
    }
}

/// Answers whether a privileged operation may be performed right now.
///
/// Implemented for any `Fn(Permission) -> bool` closure:
///
/// ```
/// use heartlink_core::permission::{Permission, Permissions};
///
/// let scan_only = |p: Permission| p == Permission::Scan;
/// assert!(scan_only.is_granted(Permission::Scan));
/// assert!(!scan_only.is_granted(Permission::Connect));
/// ```
pub trait Permissions: Send + Sync {
    /// Whether `permission` is currently granted.
    fn is_granted(&self, permission: Permission) -> bool;
}

impl<F> Permissions for F
where
    F: Fn(Permission) -> bool + Send + Sync,
{
    fn is_granted(&self, permission: Permission) -> bool {
        self(permission)
    }
}

/// Grants every permission. Desktop stacks have no runtime grants.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllGranted;

impl Permissions for AllGranted {
    fn is_granted(&self, _permission: Permission) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[test]
    fn test_all_granted() {
        assert!(AllGranted.is_granted(Permission::Scan));
        assert!(AllGranted.is_granted(Permission::Connect));
    }

    #[test]
    fn test_closure_is_queried_each_time() {
        let flag = Arc::new(AtomicBool::new(true));
        let check = {
            let flag = Arc::clone(&flag);
            move |_: Permission| flag.load(Ordering::SeqCst)
        };

        assert!(check.is_granted(Permission::Connect));
        flag.store(false, Ordering::SeqCst);
        assert!(!check.is_granted(Permission::Connect));
    }

    #[test]
    fn test_permission_display() {
        assert_eq!(Permission::Scan.to_string(), "scan");
        assert_eq!(Permission::Connect.to_string(), "connect");
    }
}
