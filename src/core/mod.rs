pub mod engine;
pub mod pages;
pub mod query;
pub mod reporter;
pub mod resolver;
pub mod schema;
pub mod server;
pub mod source;
pub mod store;

pub use engine::{BuildSummary, Engine};
pub use pages::{PageRegistry, PageSpec};
pub use reporter::{ReportLevel, Reporter};
pub use schema::Schema;
pub use server::Server;
pub use store::ContentStore;
