pub mod controller;
pub mod router;
pub mod service;

pub use router::{init_roles_router, init_user_roles_router};
pub use service::RoleService;
