//! # hub-core
//!
//! Foundation types shared by every agent-hub crate:
//!
//! - **Branded IDs**: [`SessionId`], [`AgentId`], [`CorrelationId`] as newtypes
//! - **Constants**: registry marker and layout names
//! - **Logging**: [`logging::init_subscriber`] for binaries

#![deny(unsafe_code)]

pub mod constants;
pub mod ids;
pub mod logging;

pub use ids::{AgentId, CorrelationId, SessionId};
