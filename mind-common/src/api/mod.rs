//! Wire types of the remote generation/resolution service
//!
//! Shared between the runtime's HTTP client and anything else that speaks to
//! (or stands in for) the service.

pub mod types;

pub use types::{
    declares_error, ErrorBody, ErrorEnvelope, GenerateContext, GenerateRequest, Profile,
    ProfilesResponse, ResolveInput, ResolveRequest, ResolveResponse, ResolvedThought, Role,
    BACKEND_ERROR_MESSAGE, INTERNAL_ERROR, RESOLVE_SCHEMA_VERSION,
};
