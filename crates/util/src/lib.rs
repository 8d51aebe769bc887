//! Helpers shared by the binding engine: binding path arithmetic, URL literal formatting,
//! and query option handling.

pub mod literal;
pub mod path;
pub mod query_options;

pub use literal::{LiteralError, encode_uri_component, format_literal};
pub use path::{
    build_path, is_deferred_operation_path, operation_name, parent_segment_path, relative_path, resolve_path, strip_operation_marker,
};
pub use query_options::{QueryOptionError, build_binding_parameters, build_query_options, merge_query_options};
