//! Command spec derivation and validation.
//!
//! A command spec is the structural record of one source document: header
//! fields plus the heading outline. It never carries body prose, so an
//! independent generator given only the spec cannot copy the reference.

mod derive;
mod schema;

pub use derive::{
    derive_spec, derive_spec_at, derive_spec_from_str, infer_group, parse_tool_list,
    resolve_allowed_tools, CommandIdentity, CommandSpec, Implementation, SpecError,
    StructureHints, COMMAND_SPEC_SCHEMA_VERSION,
};
pub use schema::validate_spec_schema;
