//! Request handlers.

pub mod batch;
pub mod health;
pub mod items;

pub use batch::*;
pub use health::*;
pub use items::*;
