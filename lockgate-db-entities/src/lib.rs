#![allow(non_snake_case)]

pub mod AttemptCounter;
pub mod AuditLogEntry;
pub mod BlockEntry;
pub mod LoginLogEntry;
