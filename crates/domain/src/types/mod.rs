//! Domain value types

pub mod error_kind;
pub mod policy;
pub mod request;
pub mod response;

pub use error_kind::{ErrorKind, TransportError};
pub use policy::{JitterMode, RetryPolicy, RetryPolicyBuilder};
pub use request::{HttpMethod, RequestDescriptor, RequestDescriptorBuilder, ResponseMode};
pub use response::RawResponse;
