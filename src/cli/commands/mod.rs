mod create_admin;
mod init;

pub use create_admin::{cmd_create_admin, CreateAdminArgs};
pub use init::cmd_init;
