pub mod item;
pub mod university;
pub mod user;

pub use item::*;
pub use university::*;
pub use user::*;
