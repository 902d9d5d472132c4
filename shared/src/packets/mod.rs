pub mod container;
pub mod discovery;
pub mod topic;
