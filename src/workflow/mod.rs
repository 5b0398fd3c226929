//! Edit workflow: selection, prompt and generation state.

mod controller;
mod state;

pub use controller::WorkflowController;
pub use state::WorkflowState;
