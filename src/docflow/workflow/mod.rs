// SPDX-License-Identifier: MIT

pub mod engine;
pub mod routing;
pub mod state;

pub use engine::WorkflowEngine;
pub use routing::Route;
pub use state::{QueryState, SessionContext, Stage};
