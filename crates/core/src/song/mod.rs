//! Song metadata and work items.
//!
//! A `Song` is the metadata record passed between the search provider, the
//! download collaborator and the HTTP layer. The core never interprets most
//! of its fields; it only hands them to the collaborators.

mod types;
mod validator;

pub use types::{Song, WorkItem};
pub use validator::{SchemaValidator, SongValidator, ValidationError};
