//! Flow view
//!
//! [`FlowUiService`] renders the flow list and the active flow's steps into a
//! [`Document`] of named containers and turns clicks on that tree into bus
//! events (`flow:select`, `step:edit`, ...). Flows themselves are owned and
//! persisted elsewhere; the service only sees them through `flows:loaded`
//! and `flow:activated`.

mod dom;
mod model;
mod ui;

pub use dom::{Document, Node};
pub use model::{Flow, FlowStep, StepKind, StepStatus};
pub use ui::{ConfirmFn, FlowUiService, UiAction, classes};
