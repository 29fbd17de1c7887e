pub mod memory;
pub mod sqlite;

pub use memory::{
    InMemoryAssignmentRepository, InMemoryAuditRepository, InMemoryDeadLetterRepository,
    InMemoryIdempotencyRepository, InMemoryOrganizationRepository, InMemoryUsageRepository,
};
pub use sqlite::{
    DatabaseManager, SqliteAssignmentRepository, SqliteAuditRepository,
    SqliteDeadLetterRepository, SqliteIdempotencyRepository, SqliteOrganizationRepository,
    SqliteUsageRepository,
};
