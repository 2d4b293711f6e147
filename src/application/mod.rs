//! Application services: ports, the content store client, generation, the publish
//! pipeline and callback dispatch.

pub mod documents;
pub mod error;
pub mod generator;
pub mod notify;
pub mod publish;
pub mod repos;
pub mod store;
pub mod tasks;
