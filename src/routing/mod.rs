//! Router port resolution and static routing tables.

pub mod interface;
pub mod table;

pub use interface::{free_interfaces, resolve_interface};
pub use table::{auto_generate_routes, link_router_routes};
