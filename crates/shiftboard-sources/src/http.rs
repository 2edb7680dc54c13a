//! HTTP schedule source.
//!
//! This module fetches a schedule page or slot feed over HTTP and handles:
//! - An optional session cookie supplied by configuration
//! - CSRF scraping: a landing page is loaded first, its cookies are kept and
//!   its `<meta name="_csrf" content="...">` token is sent as `X-CSRF-TOKEN`
//! - Optional form payloads for endpoints that only answer POST
//! - Fan-out: one request per combination of form field values, answered
//!   as a JSON array of the individual responses
//! - Slot feed continuation through a "more slots" endpoint
//! - Timeouts, user agent and status mapping

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, trace, warn};
use url::Url;

use crate::continuation::{self, SlotContinuation};
use crate::error::{SourceError, SourceResult};
use crate::source::{BoxFuture, FetchedDocument, ScheduleSource};

/// Header carrying the scraped CSRF token.
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

static META_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("Invalid meta regex"));

static META_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(name|content)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("Invalid meta attribute regex")
});

/// Extracts the `_csrf` meta token from a landing page.
pub fn extract_csrf(html: &str) -> Option<String> {
    META_RE.find_iter(html).find_map(|tag| {
        let mut name = None;
        let mut content = None;
        for caps in META_ATTR_RE.captures_iter(tag.as_str()) {
            let value = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str());
            match caps[1].to_lowercase().as_str() {
                "name" => name = value,
                _ => content = value,
            }
        }
        match (name, content) {
            (Some("_csrf"), Some(token)) if !token.trim().is_empty() => {
                Some(token.trim().to_string())
            }
            _ => None,
        }
    })
}

/// Returns the `name=value` part of a `Set-Cookie` header.
fn cookie_pair(set_cookie: &str) -> Option<&str> {
    let pair = set_cookie.split(';').next()?.trim();
    pair.contains('=').then_some(pair)
}

/// Configuration for an HTTP source.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// URL of the schedule page or feed.
    pub url: Url,

    /// Page to load first for cookies and the CSRF token.
    pub landing_url: Option<Url>,

    /// Raw `Cookie` header value (e.g. `JSESSIONID=abc`).
    pub session: Option<String>,

    /// Form fields; when non-empty the document is requested with POST.
    pub form: Vec<(String, String)>,

    /// Form fields taking each of several values, one request per
    /// combination.
    pub fan_out: Vec<(String, Vec<String>)>,

    /// Follow-up endpoint for slot feed days cut short by `next_start_time`.
    pub continuation: Option<SlotContinuation>,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// Request timeout.
    pub timeout: Duration,

    /// User agent string.
    pub user_agent: String,
}

impl HttpConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a new HTTP configuration with the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: impl AsRef<str>) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(url.as_ref())?;
        Ok(Self {
            url: parsed,
            landing_url: None,
            session: None,
            form: Vec::new(),
            fan_out: Vec::new(),
            continuation: None,
            verify_tls: true,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("shiftboard/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Sets the landing page used for CSRF scraping.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn with_landing_url(mut self, url: impl AsRef<str>) -> Result<Self, url::ParseError> {
        self.landing_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Sets the session cookie.
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Adds a form field.
    pub fn with_form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    /// Requests the document once for every value of `key`. Several fan-out
    /// fields multiply.
    pub fn with_fan_out<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fan_out
            .push((key.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn with_continuation(mut self, continuation: SlotContinuation) -> Self {
        self.continuation = Some(continuation);
        self
    }

    /// The form of every request, in fan-out order. Fan-out values replace
    /// a base field of the same name.
    pub fn request_forms(&self) -> Vec<Vec<(String, String)>> {
        let mut forms = vec![self.form.clone()];
        for (key, values) in &self.fan_out {
            if values.is_empty() {
                continue;
            }
            forms = forms
                .iter()
                .flat_map(|form| {
                    values.iter().map(move |value| {
                        let mut form: Vec<(String, String)> =
                            form.iter().filter(|(k, _)| k != key).cloned().collect();
                        form.push((key.clone(), value.clone()));
                        form
                    })
                })
                .collect();
        }
        forms
    }

    /// Disables TLS verification (for testing only).
    pub fn with_insecure_tls(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Fetches a schedule document over HTTP.
pub struct HttpSource {
    name: String,
    client: Client,
    config: HttpConfig,
}

impl HttpSource {
    /// Creates a new HTTP source.
    pub fn new(name: impl Into<String>, config: HttpConfig) -> SourceResult<Self> {
        let name = name.into();
        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                SourceError::configuration(format!("Failed to create HTTP client: {}", e))
                    .with_origin(&name)
            })?;

        Ok(Self {
            name,
            client,
            config,
        })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Loads the landing page, returning its cookies and CSRF token.
    async fn prepare_session(&self, landing: &Url) -> SourceResult<(Vec<String>, String)> {
        let mut request = self.client.get(landing.clone());
        if let Some(session) = &self.config.session {
            request = request.header(COOKIE, session);
        }
        let response = self.send(request, landing).await?;

        let cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(cookie_pair)
            .map(str::to_string)
            .collect();
        let (page, _) = Self::handle_response(response).await?;

        let token = extract_csrf(&page).ok_or_else(|| {
            SourceError::authentication("Landing page carries no _csrf token")
        })?;
        debug!(source = %self.name, cookies = cookies.len(), "prepared session from landing page");
        Ok((cookies, token))
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> SourceResult<Response> {
        trace!(source = %self.name, url = %url, "Sending request");
        request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("Request to {} timed out", url)
            } else {
                format!("Request to {} failed: {}", url, e)
            };
            SourceError::network(message).with_source(e)
        })
    }

    /// Handles the HTTP response and extracts the body and content type.
    async fn handle_response(response: Response) -> SourceResult<(String, Option<String>)> {
        let status = response.status();
        trace!(status = %status, "Received response");

        match status {
            s if s.is_success() => {
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let body = response
                    .text()
                    .await
                    .map_err(|e| SourceError::network(format!("Failed to read response: {}", e)))?;
                Ok((body, content_type))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SourceError::authentication(
                format!("Session rejected ({})", status),
            )),
            StatusCode::NOT_FOUND => Err(SourceError::not_found("Schedule page not found")),
            StatusCode::TOO_MANY_REQUESTS => {
                Err(SourceError::rate_limited("Too many requests to server"))
            }
            s if s.is_server_error() => {
                let body = response.text().await.unwrap_or_default();
                Err(SourceError::server(format!("Server error ({}): {}", s, body)))
            }
            s => {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %s, body = %body, "Unexpected response status");
                Err(SourceError::invalid_response(format!(
                    "Unexpected status {}: {}",
                    s, body
                )))
            }
        }
    }

    async fn session(&self) -> SourceResult<Session> {
        let mut cookies: Vec<String> = self.config.session.iter().cloned().collect();
        let mut token = None;
        if let Some(landing) = &self.config.landing_url {
            let (landing_cookies, csrf) = self.prepare_session(landing).await?;
            cookies.extend(landing_cookies);
            token = Some(csrf);
        }
        Ok(Session { cookies, token })
    }

    async fn request(
        &self,
        session: &Session,
        url: &Url,
        form: &[(String, String)],
    ) -> SourceResult<(String, Option<String>)> {
        let mut request = if form.is_empty() {
            self.client.get(url.clone())
        } else {
            self.client.post(url.clone()).form(form)
        };
        request = request.header(ACCEPT, "application/json,text/html;q=0.9,*/*;q=0.5");
        if !session.cookies.is_empty() {
            request = request.header(COOKIE, session.cookies.join("; "));
        }
        if let Some(token) = &session.token {
            request = request.header(CSRF_HEADER, token);
        }

        let response = self.send(request, url).await?;
        let (body, content_type) = Self::handle_response(response).await?;
        debug!(source = %self.name, url = %url, bytes = body.len(), "fetched schedule document");
        Ok((body, content_type))
    }

    /// Fills in every truncated day of a slot response. Bodies that are not
    /// JSON are returned untouched.
    async fn follow_continuations(
        &self,
        session: &Session,
        form: &[(String, String)],
        body: String,
    ) -> SourceResult<String> {
        let Some(more) = &self.config.continuation else {
            return Ok(body);
        };
        let Ok(mut doc) = serde_json::from_str::<Value>(&body) else {
            return Ok(body);
        };

        let mut requests = 0usize;
        for block in continuation::blocks_mut(&mut doc) {
            for day in continuation::days_mut(block) {
                let mut asked = 0;
                while let Some((date, start)) = continuation::pending(day) {
                    if asked == more.max_requests {
                        warn!(source = %self.name, date = %date, start = %start, "giving up on slot continuation");
                        break;
                    }
                    let form = more.form_for(form, &date, &start);
                    let (reply, _) = self.request(session, &more.url, &form).await?;
                    let reply: Value = serde_json::from_str(&reply).map_err(|e| {
                        SourceError::invalid_response(format!(
                            "More slots reply for {date} is not JSON: {e}"
                        ))
                    })?;
                    let added = continuation::extend_day(day, &reply);
                    asked += 1;
                    trace!(source = %self.name, date = %date, start = %start, added, "continued slot day");
                    if added == 0 {
                        break;
                    }
                }
                requests += asked;
            }
        }
        if requests > 0 {
            debug!(source = %self.name, requests, "followed slot continuations");
        }
        Ok(doc.to_string())
    }

    async fn fetch_one(
        &self,
        session: &Session,
        form: &[(String, String)],
    ) -> SourceResult<(String, Option<String>)> {
        let (body, content_type) = self.request(session, &self.config.url, form).await?;
        let body = self.follow_continuations(session, form, body).await?;
        Ok((body, content_type))
    }

    async fn fetch_document(&self) -> SourceResult<FetchedDocument> {
        let session = self.session().await?;
        let forms = self.config.request_forms();

        if self.config.fan_out.is_empty() {
            let (body, content_type) = self.fetch_one(&session, &self.config.form).await?;
            let doc = FetchedDocument::new(&self.name, body);
            return Ok(match content_type {
                Some(ct) => doc.with_content_type(ct),
                None => doc,
            });
        }

        // A request that fails for good stays in the batch as a failed
        // response; retryable failures abort the whole fetch.
        let mut batch = Vec::with_capacity(forms.len());
        let mut first_error = None;
        for form in &forms {
            match self.fetch_one(&session, form).await {
                Ok((body, _)) => {
                    let response = serde_json::from_str::<Value>(&body).map_err(|e| {
                        SourceError::invalid_response(format!("Fan-out response is not JSON: {e}"))
                    })?;
                    batch.push(response);
                }
                Err(e) if e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(source = %self.name, error = %e, "fan-out request failed");
                    batch.push(json!({ "status": format!("error: {}", e.message()) }));
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        let any_ok = batch
            .iter()
            .any(|r| r.get("status").and_then(Value::as_str).is_none_or(|s| s == "success"));
        if let (false, Some(e)) = (any_ok, first_error) {
            return Err(e);
        }
        debug!(source = %self.name, requests = forms.len(), "fetched fan-out batch");

        Ok(FetchedDocument::new(&self.name, Value::Array(batch).to_string())
            .with_content_type("application/json"))
    }
}

/// Cookies and CSRF token shared by the requests of one fetch.
struct Session {
    cookies: Vec<String>,
    token: Option<String>,
}

impl ScheduleSource for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> String {
        self.config.url.to_string()
    }

    fn fetch(&self) -> BoxFuture<'_, SourceResult<FetchedDocument>> {
        Box::pin(async move {
            self.fetch_document()
                .await
                .map_err(|e| e.with_origin(&self.name))
        })
    }
}
