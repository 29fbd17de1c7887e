pub mod notification;
pub mod quota;
pub mod repository;

pub use notification::*;
pub use quota::*;
pub use repository::*;
