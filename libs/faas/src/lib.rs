//! Function archive-to-image build/push (spec.md §4.1 "Function create") and
//! the synchronous Workflow DAG executor (spec.md §6's Workflow invoke route),
//! both called directly from `cmd/apiserver`'s request handlers rather than
//! from a poll loop.

pub mod build;
pub mod invoke;
pub mod workflow;

pub use build::{ImageBuilder, SimulatedImageBuilder, MAX_ARCHIVE_SIZE};
pub use invoke::{build_pod_for_function, forward_request, pick_pod, FUNCTION_PORT};
pub use workflow::execute;
