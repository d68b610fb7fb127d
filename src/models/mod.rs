//! Data models for the Trash Tracker backend.
//!
//! Field names match the mobile client's JSON shapes for seamless interoperability.

mod drop;
mod location;
mod reference;
mod site;
mod town;
mod user;

pub use drop::*;
pub use location::*;
pub use reference::*;
pub use site::*;
pub use town::*;
pub use user::*;
