//! Request materialization - from a stored definition plus variable scopes
//! to the exact request that goes on the wire.

pub mod materializer;
pub mod params;

pub use materializer::{materialize, prepare, MaterializedRequest};
pub use params::{build_url, form_data_body, parse_form_data, parse_query_params};
