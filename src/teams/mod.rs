//! Support teams, their members, and the default roster.

pub mod model;
pub mod seed;

pub use model::{Team, TeamStatus, User, UserRole, UserStatus};
pub use seed::seed_defaults;
