pub mod publish;
pub mod tag;
pub mod version;

pub use publish::*;
pub use tag::*;
pub use version::*;
