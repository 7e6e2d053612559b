//! Backend for a frame-oriented GPU render graph.
//!
//! A render graph is a declarative description of the GPU work a frame must perform: a set of
//! passes (draw, compute, blit, acceleration-structure build, external), the resources they read
//! and write, and the render targets they use. This crate takes that declaration and produces a
//! scheduled, synchronized stream of native GPU command-buffer submissions.
//!
//! Frontend construction of the graph, shader authoring, the swapchain/window system and the
//! public resource-handle API live outside this crate; see [`external`] for the thin interfaces
//! this backend consumes from (and exposes to) those collaborators.

#[macro_use]
extern crate log;

pub mod alloc;
pub mod assembler;
pub mod config;
pub mod dependency;
pub mod descriptor;
pub mod error;
pub mod external;
pub mod fence;
pub mod generator;
pub mod handle;
pub mod pass;
pub mod purgeable;
pub mod queue;
pub mod registry;
pub mod usage;

pub use crate::error::{Error, Result};
pub use crate::handle::{Resource, ResourceFlags, ResourceKind};
