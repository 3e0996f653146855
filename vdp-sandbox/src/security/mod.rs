//! Audit logging and redaction.
//!
//! ```rust
//! use uuid::Uuid;
//! use vdp_sandbox::security::audit::{AuditEvent, AuditEventType, audit_log};
//!
//! let event = AuditEvent::new(AuditEventType::SettingsSaved, Uuid::new_v4())
//!     .with_auth_method("mutualAuth");
//! audit_log(&event);
//! ```
//!
//! Audit logs use the separate `audit` tracing target so they can be routed
//! on their own. Nothing secret is ever put in an event: key material,
//! passwords and shared secrets appear only as presence flags, and free text
//! goes through [`redact_sensitive`].

pub mod audit;

pub use audit::{AuditDetails, AuditEvent, AuditEventType, audit_log, redact_sensitive};
