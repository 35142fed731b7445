pub mod types;
pub mod repository;
pub mod service;

pub use types::{GrantAllocation, GrantEntry, GrantEntryResponse, GrantEntryRow, NewGrantReceipt};
pub use repository::{GrantRepository, SqliteGrantRepository};
pub use service::{GrantService, GrantServiceImpl};
