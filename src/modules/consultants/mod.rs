pub mod controller;
pub mod router;
pub mod service;

pub use router::init_consultants_router;
pub use service::ConsultantService;
