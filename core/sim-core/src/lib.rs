pub mod error;
pub mod stat;
pub mod util;
pub mod world;

pub use error::Error;
pub use world::World;
