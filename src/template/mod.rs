//! Template materialization.
//!
//! This module provides:
//!
//! - **Engine**: minijinja environments evaluating one template expression
//! - **Marker**: the literal marker vocabulary and the phase flags
//! - **Renderer**: depth-first document rendering with marker rewriting
//! - **Resolver**: fixed-point rendering of a document against itself

mod engine;
pub mod marker;
mod render;
mod resolve;


pub use engine::{Engine, Mode, Scope};
pub use marker::{AskKind, Marker, Phase};
pub use render::{NodePath, render};
pub use resolve::resolve_fixed_point;
