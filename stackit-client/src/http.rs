use reqwest::StatusCode;
use stackit_common::Error;

/// Maps a non-2xx response to the `Error` taxonomy (§7). 404 becomes
/// `NotFound` so delete-path idempotence and read-path "doesn't exist"
/// handling compose naturally; everything else is `Internal`.
pub fn classify_status(status: StatusCode, body: impl Into<String>) -> Error {
    if status == StatusCode::NOT_FOUND {
        Error::NotFound(body.into())
    } else if status == StatusCode::CONFLICT {
        Error::Conflict(body.into())
    } else {
        Error::Internal(format!("http {status}: {}", body.into()))
    }
}

pub async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(classify_status(status, body))
}
