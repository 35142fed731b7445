pub mod types;
pub mod repository;
pub mod service;

pub use types::{
    CurrentPeriodResponse, NewProject, Project, ProjectResponse, ProjectRow, UpdateProject,
    MAX_DURATION_YEARS,
};
pub use repository::{ProjectRepository, SqliteProjectRepository};
pub use service::{ProjectService, ProjectServiceImpl};
