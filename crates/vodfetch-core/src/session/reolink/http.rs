//! Blocking libcurl requests against the device CGI endpoint.

use std::cell::{Cell, RefCell};
use std::io::Write;
use std::str;
use std::time::Duration;

use curl::easy::{Easy, List};
use url::Url;

use crate::session::SessionError;

/// Transfer settings shared by every request of one session.
#[derive(Debug, Clone, Copy)]
pub(super) struct HttpOptions {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

/// Buffered response of a command request.
pub(super) struct HttpResponse {
    pub status: u32,
    pub body: Vec<u8>,
}

/// Result of a streamed download.
pub(super) enum Streamed {
    /// Body was written to the sink.
    Body { bytes: u64 },
    /// The device answered with a JSON command response instead of media.
    Json(Vec<u8>),
}

/// Map a curl failure into the session taxonomy.
pub(super) fn transport_error(e: curl::Error) -> SessionError {
    if e.is_operation_timedout() {
        return SessionError::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return SessionError::Transport(e.to_string());
    }
    SessionError::Other(e.to_string())
}

/// Map a non-2xx status into the session taxonomy.
pub(super) fn status_error(status: u32) -> SessionError {
    match status {
        401 => SessionError::SessionExpired("HTTP 401".to_string()),
        500..=599 => SessionError::Busy { status },
        _ => SessionError::Http(status),
    }
}

fn configure(easy: &mut Easy, url: &Url, opts: &HttpOptions) -> Result<(), curl::Error> {
    easy.reset();
    easy.url(url.as_str())?;
    easy.follow_location(true)?;
    easy.connect_timeout(opts.connect_timeout)?;
    // Abort a stalled transfer instead of waiting for the hard timeout.
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;
    easy.timeout(opts.timeout)?;
    if opts.accept_invalid_certs {
        easy.ssl_verify_peer(false)?;
        easy.ssl_verify_host(false)?;
    }
    Ok(())
}

/// POST a JSON command body and buffer the response.
pub(super) fn post_json(
    easy: &mut Easy,
    url: &Url,
    body: &[u8],
    opts: &HttpOptions,
) -> Result<HttpResponse, SessionError> {
    configure(easy, url, opts).map_err(transport_error)?;
    easy.post(true).map_err(transport_error)?;
    easy.post_fields_copy(body).map_err(transport_error)?;
    let mut list = List::new();
    list.append("Content-Type: application/json")
        .map_err(transport_error)?;
    easy.http_headers(list).map_err(transport_error)?;

    let mut response = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                response.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(transport_error)?;
        transfer.perform().map_err(transport_error)?;
    }
    let status = easy.response_code().map_err(transport_error)?;
    Ok(HttpResponse {
        status,
        body: response,
    })
}

/// GET `url` and stream a successful media body into `sink`.
///
/// Error bodies are never written to the sink: non-2xx responses become a
/// status error and JSON bodies are returned for the caller to decode.
pub(super) fn get_streaming(
    easy: &mut Easy,
    url: &Url,
    opts: &HttpOptions,
    sink: &mut dyn Write,
) -> Result<Streamed, SessionError> {
    configure(easy, url, opts).map_err(transport_error)?;
    easy.get(true).map_err(transport_error)?;

    let status = Cell::new(0u32);
    let is_json = Cell::new(false);
    let json_body = RefCell::new(Vec::new());
    let written = Cell::new(0u64);
    let mut sink_error: Option<std::io::Error> = None;

    let perform_result = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|line| {
                if let Ok(line) = str::from_utf8(line) {
                    if let Some(code) = parse_status_line(line) {
                        status.set(code);
                        is_json.set(false);
                    } else if is_json_content_type(line) {
                        is_json.set(true);
                    }
                }
                true
            })
            .map_err(transport_error)?;
        transfer
            .write_function(|data| {
                if !(200..300).contains(&status.get()) {
                    return Ok(data.len());
                }
                if is_json.get() {
                    json_body.borrow_mut().extend_from_slice(data);
                    return Ok(data.len());
                }
                match sink.write_all(data) {
                    Ok(()) => {
                        written.set(written.get() + data.len() as u64);
                        Ok(data.len())
                    }
                    Err(e) => {
                        sink_error = Some(e);
                        // Returning a short count makes curl abort with a write error.
                        Ok(0)
                    }
                }
            })
            .map_err(transport_error)?;
        transfer.perform()
    };

    if let Err(e) = perform_result {
        if e.is_write_error() {
            if let Some(io_err) = sink_error.take() {
                return Err(SessionError::Storage(io_err));
            }
        }
        return Err(transport_error(e));
    }

    let code = easy.response_code().map_err(transport_error)?;
    if !(200..300).contains(&code) {
        return Err(status_error(code));
    }
    if is_json.get() {
        return Ok(Streamed::Json(json_body.into_inner()));
    }
    sink.flush().map_err(SessionError::Storage)?;
    Ok(Streamed::Body {
        bytes: written.get(),
    })
}

/// Status code of an `HTTP/x.y NNN reason` header line.
fn parse_status_line(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("HTTP/")?;
    rest.split_whitespace().nth(1)?.parse().ok()
}

fn is_json_content_type(line: &str) -> bool {
    let Some((name, value)) = line.split_once(':') else {
        return false;
    };
    name.trim().eq_ignore_ascii_case("content-type")
        && value.trim().to_ascii_lowercase().starts_with("application/json")
}
