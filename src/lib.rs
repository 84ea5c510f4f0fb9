pub mod debugger;
pub mod error;
pub mod options;
pub mod parse;
pub mod pipe;
pub mod process;

pub use error::{Error, Result};
