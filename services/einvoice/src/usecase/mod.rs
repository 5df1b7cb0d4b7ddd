pub mod reconcile;
pub mod settings;
pub mod submission;
