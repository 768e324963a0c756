pub mod entity;
pub mod loader;
pub mod settings;
pub mod validator;

pub use entity::*;
pub use loader::*;
pub use settings::*;
pub use validator::*;
