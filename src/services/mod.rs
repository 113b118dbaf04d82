pub mod password;
pub use password::{hash_password, verify_password};

pub mod photos;
pub use photos::{PhotoError, PhotoService};
