//! Change-point model specifications.
//!
//! - `prior`: distribution descriptors
//! - `likelihood`: segment assignment and prefix-sum Gaussian likelihood
//! - `spec`: the four model variants and their parameter layouts
//! - `builder`: spec construction from configuration and data
//! - `selection`: choosing the number of breaks by BIC

pub mod builder;
pub mod likelihood;
pub mod prior;
pub mod selection;
pub mod spec;

pub use builder::build_model;
pub use likelihood::SegmentAssignment;
pub use prior::Prior;
pub use spec::{BoundModel, ChangePointModelSpec, ParameterDecl, ParameterKind};
