pub mod assets;
pub mod config;
pub mod emit;
pub mod error;
pub mod loader;
pub mod parsing;
pub mod pipeline;
pub mod site;
pub mod theme;
pub mod types;
pub mod views;

pub use config::*;
pub use error::*;
pub use pipeline::*;
pub use site::*;
pub use theme::*;
pub use types::*;
