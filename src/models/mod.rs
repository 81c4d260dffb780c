pub mod organization;
pub mod user;

pub use organization::{slugify, Organization, OrganizationResponse};
pub use user::{Role, TeamMembership, User, UserResponse};
