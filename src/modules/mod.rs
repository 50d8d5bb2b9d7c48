pub mod auth;
pub mod consultants;
pub mod networks;
pub mod permissions;
pub mod roles;
pub mod schools;
pub mod users;
