// Module declarations
mod common;
mod object_ref;
mod privilege;
mod resolve;

// Re-export all public items
pub use object_ref::{
    canonical_signature, parse_object_ref, parse_object_refs, parse_signature, NameScope,
    ObjectRef,
};
pub use privilege::{parse_actions, parse_object_type};
