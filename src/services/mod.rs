pub mod collaborators;
pub mod paths;
pub mod pipeline;
pub mod qbit;
pub mod reconciler;
pub mod submission;
pub mod transitions;
