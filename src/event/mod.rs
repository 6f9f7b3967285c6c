// src/event/mod.rs

//! "What happened" descriptors.
//!
//! - [`descriptor`] holds the closed [`EventDescriptor`] variant and its
//!   construction from protocol attributes.
//! - [`matching`] implements the cross-variant equality matrix.
//! - [`internal`] lists the internal event codes the lifecycle raises itself.

pub mod descriptor;
pub mod internal;
pub mod matching;

pub use descriptor::{
    EventDescriptor, ExpressionRef, Modifier, ResolvedUserEvent, UserEventDef, UserEventRef,
};
pub use internal::InternalCode;
pub use matching::EventContext;
