pub mod access;
pub mod audit;
pub mod lock;
pub mod user;

pub use access::{
    AccessEntry, AccessGroup, AccessRole, AccessSource, DirectGrant, GroupMember, GroupSummary,
};
pub use audit::{Action, AuditLogEntry, Command, NewAuditEntry};
pub use lock::{Lock, LockSummary, NewLock};
pub use user::{Identity, User, UserRole};
