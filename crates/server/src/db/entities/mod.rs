//! SeaORM entities mapping the portal's tables.

pub mod agent;
pub mod print_job;
pub mod site;
pub mod user;

// Prelude module for easy importing of all entities and their related types
pub mod prelude {
    pub use super::agent::Entity as Agent;
    pub use super::agent::Model as AgentModel;

    pub use super::print_job::Entity as PrintJob;
    pub use super::print_job::Model as PrintJobModel;

    pub use super::site::Entity as Site;
    pub use super::site::Model as SiteModel;

    pub use super::user::Entity as User;
    pub use super::user::Model as UserModel;
}
