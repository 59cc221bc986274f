//! Use-case services.
//!
//! # Responsibility
//! - Orchestrate repository, registry and encoder calls into use-case APIs.
//! - Map every failure onto an [`ErrorCategory`](crate::error::ErrorCategory).

pub mod chat_service;
pub mod identity_service;
pub mod memory_service;
pub mod task_service;
