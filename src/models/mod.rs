pub mod record;

pub use record::{NewRecord, ProfileUpdate, Record};
