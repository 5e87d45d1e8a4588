// HTTP plumbing for the remote gradebook API.
use crate::credentials::ApiCredentials;
use crate::error::StorageError;
use log::{debug, warn};
use reqwest::blocking::{Client, Response};
use std::time::Duration;

/// The number of attempts made for a request the server asked us to retry.
pub const MAX_ATTEMPTS: u32 = 3;

/// Wait between attempts after a 429/503 answer.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// HTTP methods used by the remote store. Bodies travel as JSON.
#[derive(Clone, Debug)]
pub enum HttpMethod {
    Get,
    Put(serde_json::Value),
    Post(serde_json::Value),
    Delete,
}

// Either a successful response or the failing status code (0 for transport
// failures such as a refused connection or a timeout) with a description.
type SingleAttemptResult = Result<Response, (u16, String)>;

/// Builds the blocking client with the fixed per-request timeout.
pub fn build_client(timeout: Duration) -> Result<Client, StorageError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| StorageError::Unavailable(format!("cannot build HTTP client: {}", e)))
}

/// Maps a failing status to a storage error. Transport failures and 5xx answers
/// mean the backend is unavailable; anything else is a real answer.
pub fn status_error(status: u16, message: String) -> StorageError {
    match status {
        0 => StorageError::Unavailable(message),
        500..=599 => StorageError::Unavailable(format!("status {}: {}", status, message)),
        _ => StorageError::Http { status, message },
    }
}

fn send_http_request_single_attempt(
    client: &Client,
    method: &HttpMethod,
    url: &str,
    credentials: &ApiCredentials,
) -> SingleAttemptResult {
    let request_builder = match method {
        HttpMethod::Get => client.get(url),
        HttpMethod::Put(body) => client.put(url).json(body),
        HttpMethod::Post(body) => client.post(url).json(body),
        HttpMethod::Delete => client.delete(url),
    };
    let request_builder = match &credentials.token_api {
        Some(token) => request_builder.bearer_auth(token),
        None => request_builder,
    };

    match request_builder.send() {
        Ok(response) if response.status().is_success() => Ok(response),
        Ok(response) => {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            Err((status, body))
        }
        Err(e) => Err((0, e.to_string())),
    }
}

/// Sends an HTTP request, retrying while the server answers 429 or 503.
pub fn send_http_request(
    client: &Client,
    method: HttpMethod,
    url: &str,
    credentials: &ApiCredentials,
) -> Result<Response, StorageError> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        debug!("{} {} (attempt {})", method_name(&method), url, attempts);
        match send_http_request_single_attempt(client, &method, url, credentials) {
            Ok(response) => return Ok(response),
            Err((status, message)) if is_retryable(status) && attempts < MAX_ATTEMPTS => {
                warn!("{} answered {}; retrying: {}", url, status, message);
                std::thread::sleep(RETRY_DELAY);
            }
            Err((status, message)) => return Err(status_error(status, message)),
        }
    }
}

fn is_retryable(status: u16) -> bool {
    status == 429 || status == 503
}

fn method_name(method: &HttpMethod) -> &'static str {
    match method {
        HttpMethod::Get => "GET",
        HttpMethod::Put(_) => "PUT",
        HttpMethod::Post(_) => "POST",
        HttpMethod::Delete => "DELETE",
    }
}
