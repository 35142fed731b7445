pub mod dependency_checker;
pub mod repository;

// Re-export the traits and core types, not specific implementations
pub use dependency_checker::DependencyChecker;
pub use repository::{FindById, HardDeletable};
