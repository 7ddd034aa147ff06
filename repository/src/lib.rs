pub mod advisory_lock;
pub mod gc;
pub mod row;
pub mod schema;
pub mod workspaces;

pub use schema::init_schema;
pub use workspaces::{ListPage, WcCommit};
