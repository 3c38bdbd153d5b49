//! Small shared utilities: JSON serialization glue and id generation.

pub mod id_generator;
pub mod json_ext;
