//! JSON command bodies and responses of the Reolink CGI API.
//!
//! Every command is a POST of a one-element JSON array
//! (`[{"cmd": .., "param": ..}]`) answered by a one-element array carrying
//! `code` (0 on success), `value` and, on failure, `error.rspCode`.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::session::{Segment, SessionError, Stream};

/// `rspCode` values meaning the token is missing or no longer valid.
const RSP_LOGIN_REQUIRED: [i64; 2] = [-6, -5];

#[derive(Debug, Deserialize)]
pub(super) struct CmdResponse {
    #[serde(default)]
    pub cmd: String,
    pub code: i64,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub error: Option<CmdError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CmdError {
    #[serde(default)]
    pub detail: String,
    pub rsp_code: i64,
}

#[derive(Debug, Deserialize)]
struct LoginValue {
    #[serde(rename = "Token")]
    token: Token,
}

#[derive(Debug, Deserialize)]
struct Token {
    name: String,
    #[serde(rename = "leaseTime", default)]
    lease_time: u64,
}

/// Calendar time as the device encodes it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub(super) struct DeviceTime {
    pub year: i32,
    pub mon: u32,
    pub day: u32,
    pub hour: u32,
    pub min: u32,
    pub sec: u32,
}

impl DeviceTime {
    pub fn from_naive(t: NaiveDateTime) -> Self {
        Self {
            year: t.year(),
            mon: t.month(),
            day: t.day(),
            hour: t.hour(),
            min: t.minute(),
            sec: t.second(),
        }
    }

    pub fn to_naive(self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.mon, self.day)?
            .and_hms_opt(self.hour, self.min, self.sec)
    }
}

#[derive(Debug, Deserialize)]
struct SearchValue {
    #[serde(rename = "SearchResult")]
    search_result: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(rename = "File", default)]
    file: Vec<SearchFile>,
}

#[derive(Debug, Deserialize)]
struct SearchFile {
    name: String,
    #[serde(rename = "StartTime")]
    start_time: DeviceTime,
    #[serde(rename = "EndTime")]
    end_time: DeviceTime,
}

pub(super) fn login_body(username: &str, password: &str) -> Value {
    json!([{
        "cmd": "Login",
        "param": {
            "User": {
                "Version": "0",
                "userName": username,
                "password": password,
            }
        }
    }])
}

pub(super) fn logout_body() -> Value {
    json!([{ "cmd": "Logout", "param": {} }])
}

pub(super) fn search_body(
    channel: u8,
    stream: Stream,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Value {
    json!([{
        "cmd": "Search",
        "action": 0,
        "param": {
            "Search": {
                "channel": channel,
                "onlyStatus": 0,
                "streamType": stream.as_str(),
                "StartTime": DeviceTime::from_naive(start),
                "EndTime": DeviceTime::from_naive(end),
            }
        }
    }])
}

/// Timestamp format of the `start`/`end` query parameters of `Playback`.
pub(super) fn playback_time(t: NaiveDateTime) -> String {
    t.format("%Y%m%d%H%M%S").to_string()
}

/// Parse the one-element response array.
pub(super) fn parse_response(body: &[u8]) -> Result<CmdResponse, SessionError> {
    let mut responses: Vec<CmdResponse> =
        serde_json::from_slice(body).map_err(|e| SessionError::Decode(e.to_string()))?;
    if responses.is_empty() {
        return Err(SessionError::Decode("empty response array".to_string()));
    }
    Ok(responses.swap_remove(0))
}

/// Turn a non-zero response code into the matching session error; return `value` otherwise.
pub(super) fn check(resp: CmdResponse) -> Result<Value, SessionError> {
    if resp.code == 0 {
        return Ok(resp.value.unwrap_or(Value::Null));
    }
    let (code, detail) = match resp.error {
        Some(e) => (e.rsp_code, e.detail),
        None => (resp.code, format!("{} failed", resp.cmd)),
    };
    if RSP_LOGIN_REQUIRED.contains(&code) {
        return Err(SessionError::SessionExpired(detail));
    }
    Err(SessionError::Api { code, detail })
}

/// Extract the token name and lease time (seconds) from a Login value.
pub(super) fn parse_login(value: Value) -> Result<(String, u64), SessionError> {
    let login: LoginValue =
        serde_json::from_value(value).map_err(|e| SessionError::Decode(e.to_string()))?;
    Ok((login.token.name, login.token.lease_time))
}

/// Extract segments from a Search value. Entries with unreadable times are skipped.
pub(super) fn parse_search(value: Value) -> Result<Vec<Segment>, SessionError> {
    if value.get("SearchResult").is_none() {
        return Ok(Vec::new());
    }
    let search: SearchValue =
        serde_json::from_value(value).map_err(|e| SessionError::Decode(e.to_string()))?;
    let mut segments = Vec::with_capacity(search.search_result.file.len());
    for f in search.search_result.file {
        match (f.start_time.to_naive(), f.end_time.to_naive()) {
            (Some(start), Some(end)) => segments.push(Segment {
                name: f.name,
                start,
                end,
            }),
            _ => tracing::warn!(file = %f.name, "skipping recording with invalid timestamps"),
        }
    }
    segments.sort_by_key(|s| s.start);
    Ok(segments)
}
