//! Entity services: the upstream boundary of the core.

pub mod driver_attribute;
pub mod reply;

pub use driver_attribute::DriverAttributeService;
pub use reply::Reply;
