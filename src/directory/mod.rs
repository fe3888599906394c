// Read-only collaborators: user records and the university directory

pub mod universities;
pub mod users;

pub use universities::{
    PgUniversityDirectory, SeedOutcome, StaticUniversityDirectory, UniversityDirectory,
    FALLBACK_UNIVERSITIES,
};
pub use users::{MemoryUserDirectory, PgUserDirectory, UserDirectory};
