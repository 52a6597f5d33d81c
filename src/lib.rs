pub mod convert;
pub mod epub;
pub mod error;
pub mod interact;
pub mod util;
