//! One module per reconcile step (§4.6), each independently unit-testable
//! against a plain struct rather than a live cluster.

pub mod autoscaler;
pub mod finalizer;
pub mod queue;
pub mod runtime_script;
pub mod status;
pub mod validate;
pub mod workload;
