mod entry;
pub mod error;
pub mod key;
mod listing;
mod node;
mod tree;

pub use crate::entry::VirtualEntry;
pub use crate::key::BROWSE_ALL_MARKER;
pub use crate::listing::synthesize;
pub use crate::node::VirtualNode;
pub use crate::tree::VirtualTree;
