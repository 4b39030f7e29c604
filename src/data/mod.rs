//! Market data: collaborator sources and the FX rate engine

pub mod fx;
pub mod sources;
