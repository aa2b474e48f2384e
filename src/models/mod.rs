pub mod enums;
pub mod problem;
pub mod unit;
pub mod user;
pub mod workbook;

pub use enums::*;
pub use problem::*;
pub use unit::*;
pub use user::*;
pub use workbook::*;
