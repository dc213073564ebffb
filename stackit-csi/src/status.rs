//! Maps the shared ambient `Error` onto gRPC status codes. Grounded on
//! `api.rs`'s match-on-error-kind style, generalized from the one-off
//! `io::ErrorKind` match there into a single conversion for every RPC.

use stackit_common::Error;
use tonic::Status;

pub fn to_status(err: Error) -> Status {
    match err {
        Error::NotFound(msg) => Status::not_found(msg),
        Error::Conflict(msg) => Status::already_exists(msg),
        Error::InvalidSpec(msg) => Status::invalid_argument(msg),
        Error::Retry(_) => Status::unavailable(err.to_string()),
        Error::ImmutableChange(msg) => Status::failed_precondition(msg),
        other => Status::internal(other.to_string()),
    }
}
