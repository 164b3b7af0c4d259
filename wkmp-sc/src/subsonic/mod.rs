//! Subsonic/OpenSubsonic protocol layer
//!
//! Error taxonomy, request parameters, payload shapes and the response
//! envelope with its three renderings.

pub mod error_code;
pub mod params;
pub mod payload;
pub mod response;
pub mod xml;

pub use error_code::{http_status_for_code, ErrorCode};
pub use params::RequestParams;
pub use response::{Envelope, Format, Payload, PayloadKind, Reply, API_VERSION};
