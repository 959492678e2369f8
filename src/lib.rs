pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod query;
pub mod repository;
pub mod service;

pub use config::Config;
pub use db::{Database, ReadScope};
pub use error::{QueryError, ServiceError};
pub use models::{Note, NoteBuilder, NoteId, ShareToken, ShareTokenId, Tag, TagId};
pub use repository::{NoteFilter, ShareTokenFilter};
pub use service::{NewNote, NoteService};
