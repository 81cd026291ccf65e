pub mod certificates;
pub mod orgs;
pub mod resource_sessions;
pub mod sessions;
pub mod users;
