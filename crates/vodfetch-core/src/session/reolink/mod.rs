//! Reolink NVR/camera session over the JSON CGI API (`/cgi-bin/api.cgi`).
//!
//! Uses the curl crate (libcurl). Each session keeps one `Easy` handle and
//! one login token; requests run in the calling thread.

mod api;
mod http;

use std::io::Write;
use std::time::Duration;

use chrono::NaiveDateTime;
use url::Url;

use crate::config::VodConfig;
use crate::session::{
    FetchRequest, RetrievalSession, Segment, SessionError, SessionFactory, Stream,
};

use self::http::{HttpOptions, Streamed};

/// Connection parameters shared by every session of a run.
#[derive(Debug, Clone)]
pub struct ReolinkOptions {
    /// Full CGI endpoint, e.g. `http://192.168.1.10/cgi-bin/api.cgi`.
    pub endpoint: Url,
    pub username: String,
    pub password: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl ReolinkOptions {
    /// Build options for `host` (IP or hostname, optionally `:port`).
    pub fn new(
        scheme: &str,
        host: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, url::ParseError> {
        let endpoint = Url::parse(&format!("{}://{}/cgi-bin/api.cgi", scheme, host.trim()))?;
        Ok(Self {
            endpoint,
            username: username.to_string(),
            password: password.to_string(),
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(600),
            accept_invalid_certs: true,
        })
    }

    /// Options from the effective configuration. Fails if host or password is missing.
    pub fn from_config(cfg: &VodConfig) -> anyhow::Result<Self> {
        let host = cfg
            .host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing device host (--host or REOLINK_HOST)"))?;
        let password = cfg
            .password
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("missing password (--password or REOLINK_PASSWORD)"))?;
        let mut opts = Self::new(cfg.scheme.as_str(), host, &cfg.username, password)
            .map_err(|e| anyhow::anyhow!("invalid device host {:?}: {}", host, e))?;
        opts.request_timeout = cfg.request_timeout();
        opts.accept_invalid_certs = cfg.accept_invalid_certs;
        Ok(opts)
    }

    fn http(&self) -> HttpOptions {
        HttpOptions {
            connect_timeout: self.connect_timeout,
            timeout: self.request_timeout,
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }
}

/// Opens one `ReolinkSession` per call.
#[derive(Debug, Clone)]
pub struct ReolinkFactory {
    options: ReolinkOptions,
}

impl ReolinkFactory {
    pub fn new(options: ReolinkOptions) -> Self {
        Self { options }
    }
}

impl SessionFactory for ReolinkFactory {
    type Session = ReolinkSession;

    fn open(&self) -> ReolinkSession {
        ReolinkSession::new(self.options.clone())
    }
}

/// One login session against the device.
pub struct ReolinkSession {
    options: ReolinkOptions,
    easy: curl::easy::Easy,
    token: Option<String>,
}

impl ReolinkSession {
    pub fn new(options: ReolinkOptions) -> Self {
        Self {
            options,
            easy: curl::easy::Easy::new(),
            token: None,
        }
    }

    fn url(&self, cmd: &str, params: &[(&str, String)]) -> Url {
        let mut url = self.options.endpoint.clone();
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("cmd", cmd);
            for (k, v) in params {
                q.append_pair(k, v);
            }
            if let Some(token) = &self.token {
                q.append_pair("token", token);
            }
        }
        url
    }

    fn require_login(&self) -> Result<(), SessionError> {
        match self.token {
            Some(_) => Ok(()),
            None => Err(SessionError::SessionExpired("not logged in".to_string())),
        }
    }

    /// Send one JSON command and return its `value`.
    fn command(&mut self, cmd: &str, body: serde_json::Value) -> Result<serde_json::Value, SessionError> {
        let url = self.url(cmd, &[]);
        let body = serde_json::to_vec(&body).map_err(|e| SessionError::Other(e.to_string()))?;
        let http = self.options.http();
        let resp = http::post_json(&mut self.easy, &url, &body, &http)?;
        if !(200..300).contains(&resp.status) {
            return Err(http::status_error(resp.status));
        }
        api::check(api::parse_response(&resp.body)?)
    }
}

impl RetrievalSession for ReolinkSession {
    fn authenticate(&mut self) -> Result<(), SessionError> {
        self.token = None;
        let body = api::login_body(&self.options.username, &self.options.password);
        let value = self
            .command("Login", body)
            .map_err(|e| SessionError::Auth(e.to_string()))?;
        let (token, lease_secs) =
            api::parse_login(value).map_err(|e| SessionError::Auth(e.to_string()))?;
        tracing::debug!(lease_secs, "logged in to {}", self.options.endpoint.host_str().unwrap_or("?"));
        self.token = Some(token);
        Ok(())
    }

    fn list_segments(
        &mut self,
        channel: u8,
        stream: Stream,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Segment>, SessionError> {
        self.require_login()?;
        let value = self.command("Search", api::search_body(channel, stream, start, end))?;
        api::parse_search(value)
    }

    fn fetch(
        &mut self,
        request: &FetchRequest<'_>,
        sink: &mut dyn Write,
    ) -> Result<u64, SessionError> {
        self.require_login()?;
        let url = self.url(
            "Playback",
            &[
                ("channel", request.channel.to_string()),
                ("source", request.segment_name.to_string()),
                ("output", request.segment_name.to_string()),
                ("streamType", request.stream.as_str().to_string()),
                ("start", api::playback_time(request.start)),
                ("end", api::playback_time(request.end)),
            ],
        );
        let http = self.options.http();
        match http::get_streaming(&mut self.easy, &url, &http, sink)? {
            Streamed::Body { bytes } => Ok(bytes),
            Streamed::Json(body) => {
                api::check(api::parse_response(&body)?)?;
                Err(SessionError::Decode(
                    "device answered playback with a command response".to_string(),
                ))
            }
        }
    }

    fn release(&mut self) {
        if self.token.is_none() {
            return;
        }
        if let Err(e) = self.command("Logout", api::logout_body()) {
            tracing::warn!("logout failed (ignored): {}", e);
        }
        self.token = None;
    }
}
