pub mod controller;
pub mod router;
pub mod service;

pub use router::init_networks_router;
pub use service::NetworkService;
