mod audit;
mod login;

pub use audit::{AuditEvent, AuditRecorder};
pub use login::{LoginEvent, LoginRecorder};
