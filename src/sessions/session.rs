//! Session: everything needed to resolve and run requests of one collection
//!
//! A session owns the collection tree, the stores and the transport. It is
//! also the executor the chain resolver calls back into, so a `response`
//! directive can run another request of the same collection.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, COOKIE};
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, MemoryCacheStore};
use crate::chain::{ChainResolver, RequestExecutor};
use crate::client::{
    form_urlencode, ExecutedResponse, OutgoingRequest, ReqwestTransport, Transport, DEFAULT_TIMEOUT,
};
use crate::collection::{Body, BodyContent, BodyParam, ConfigTree, LocatedRequest};
use crate::cookies::{CookieStore, MemoryCookieStore};
use crate::directives::{ChainContext, DirectiveContext, DirectiveEngine, Prompter, TerminalPrompter};
use crate::errors::Result;
use crate::middleware::Auth;
use crate::request::{RequestResolver, ResolvedRequest};
use crate::template::{TemplateOptions, TemplateResolver};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART_FORM: &str = "multipart/form-data";

pub struct Session {
    tree: ConfigTree,
    templates: TemplateResolver,
    engine: DirectiveEngine,
    chain: ChainResolver,
    cache: Arc<dyn CacheStore>,
    cookies: Arc<dyn CookieStore>,
    transport: Arc<dyn Transport>,
    prompter: Arc<dyn Prompter>,
}

/// Builder for [`Session`]; unset collaborators get in-memory/terminal defaults
pub struct SessionBuilder {
    tree: ConfigTree,
    options: TemplateOptions,
    engine: DirectiveEngine,
    timeout: Duration,
    cache: Option<Arc<dyn CacheStore>>,
    cookies: Option<Arc<dyn CookieStore>>,
    transport: Option<Arc<dyn Transport>>,
    prompter: Option<Arc<dyn Prompter>>,
}

impl SessionBuilder {
    pub fn template_options(mut self, options: TemplateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn engine(mut self, engine: DirectiveEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Timeout of the default transport
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cookies(mut self, cookies: Arc<dyn CookieStore>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = Some(prompter);
        self
    }

    /// Seeds the cookie store from the collection's cookie jar
    pub fn build(self) -> Result<Session> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.timeout)?),
        };
        let cookies = self
            .cookies
            .unwrap_or_else(|| Arc::new(MemoryCookieStore::new()));

        let seeded = cookies.load_from_insomnia_config(self.tree.cookies())?;
        if seeded > 0 {
            debug!(cookies = seeded, "cookie store seeded from collection");
        }

        Ok(Session {
            templates: TemplateResolver::new(self.tree.environment().clone(), self.options),
            tree: self.tree,
            engine: self.engine,
            chain: ChainResolver::new(),
            cache: self.cache.unwrap_or_else(|| Arc::new(MemoryCacheStore::new())),
            cookies,
            transport,
            prompter: self.prompter.unwrap_or_else(|| Arc::new(TerminalPrompter)),
        })
    }
}

impl Session {
    pub fn builder(tree: ConfigTree) -> SessionBuilder {
        SessionBuilder {
            tree,
            options: TemplateOptions::default(),
            engine: DirectiveEngine::with_builtins(),
            timeout: DEFAULT_TIMEOUT,
            cache: None,
            cookies: None,
            transport: None,
            prompter: None,
        }
    }

    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    pub fn templates(&self) -> &TemplateResolver {
        &self.templates
    }

    pub fn cache(&self) -> &dyn CacheStore {
        self.cache.as_ref()
    }

    pub fn cookies(&self) -> &dyn CookieStore {
        self.cookies.as_ref()
    }

    pub fn chain(&self) -> &ChainResolver {
        &self.chain
    }

    fn context(&self) -> DirectiveContext<'_> {
        DirectiveContext {
            templates: &self.templates,
            cache: self.cache.as_ref(),
            cookies: self.cookies.as_ref(),
            prompter: self.prompter.as_ref(),
            chain: Some(ChainContext {
                resolver: &self.chain,
                executor: self,
            }),
        }
    }

    /// Resolve without sending; chained requests still run
    pub async fn resolve(&self, path: &str) -> Result<ResolvedRequest> {
        let located = self.tree.find_by_path(path)?;
        self.resolve_marked(&located).await
    }

    pub async fn resolve_by_id(&self, id: &str) -> Result<ResolvedRequest> {
        let located = self.tree.find_by_id(id)?;
        self.resolve_marked(&located).await
    }

    /// Resolve and send the request at `path`
    pub async fn execute(&self, path: &str) -> Result<ExecutedResponse> {
        let located = self.tree.find_by_path(path)?;
        let resolved = self.resolve_marked(&located).await?;
        self.send(&resolved).await
    }

    pub async fn execute_by_id(&self, id: &str) -> Result<ExecutedResponse> {
        let located = self.tree.find_by_id(id)?;
        let resolved = self.resolve_marked(&located).await?;
        self.send(&resolved).await
    }

    /// Resolve with the request marked in flight so chains back to it fail
    async fn resolve_marked(&self, located: &LocatedRequest<'_>) -> Result<ResolvedRequest> {
        let _guard = self.chain.acquire(&located.request.meta.id)?;
        self.resolve_located(located).await
    }

    async fn resolve_located(&self, located: &LocatedRequest<'_>) -> Result<ResolvedRequest> {
        let ctx = self.context();
        RequestResolver::new(&self.tree, &self.engine, &ctx)
            .resolve_located(located)
            .await
    }

    /// Chain target: the caller already holds the in-flight mark
    async fn run_chained(&self, id: &str) -> Result<ExecutedResponse> {
        let located = self.tree.find_by_id(id)?;
        let resolved = self.resolve_located(&located).await?;
        self.send(&resolved).await
    }

    /// Send an already resolved request and store returned cookies
    pub async fn send(&self, resolved: &ResolvedRequest) -> Result<ExecutedResponse> {
        let outgoing = self.build_outgoing(resolved)?;
        info!(method = %outgoing.method, url = %outgoing.url, id = %resolved.id(), "sending request");

        let response = self.transport.send(&outgoing).await?;

        let set_cookies = response.header_values("set-cookie");
        if !set_cookies.is_empty() {
            match self.cookies.process_set_cookie_headers(&set_cookies, &response.url) {
                Ok(stored) => debug!(stored, "cookies stored from response"),
                Err(e) => warn!(error = %e, "failed to store response cookies"),
            }
        }
        if resolved.has_after_response_script {
            warn!(path = %resolved.path, "post-response script present but not executed");
        }
        Ok(response)
    }

    /// Headers, cookies, authentication and encoded body
    pub fn build_outgoing(&self, resolved: &ResolvedRequest) -> Result<OutgoingRequest> {
        let mut headers = HeaderMap::new();
        for header in &resolved.headers {
            let name = HeaderName::from_bytes(header.name.trim().as_bytes());
            let value = HeaderValue::from_str(&header.value);
            match (name, value) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => warn!(header = %header.name, "skipping header with invalid name or value"),
            }
        }

        self.add_cookie_header(&resolved.url, &mut headers);

        if let Some(auth) = resolved
            .authentication
            .as_ref()
            .and_then(|a| Auth::from_kind(&a.kind))
        {
            if !auth.apply(&mut headers)? {
                debug!(auth = auth.type_name(), "explicit header kept over authentication");
            }
        }

        let body = resolved
            .body
            .as_ref()
            .map(|body| encode_body(body, &mut headers));

        Ok(OutgoingRequest {
            method: resolved.method.clone(),
            url: resolved.url.clone(),
            headers,
            body,
        })
    }

    fn add_cookie_header(&self, url: &str, headers: &mut HeaderMap) {
        let stored = match self.cookies.get_cookie_header(url) {
            Ok(stored) if !stored.is_empty() => stored,
            Ok(_) => return,
            Err(e) => {
                warn!(error = %e, "cookie store read failed");
                return;
            }
        };
        let combined = match headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{}; {}", existing, stored),
            None => stored,
        };
        match HeaderValue::from_str(&combined) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(_) => warn!("stored cookies produce an invalid Cookie header"),
        }
    }
}

impl RequestExecutor for Session {
    fn has_request(&self, id: &str) -> bool {
        self.tree.find_by_id(id).is_ok()
    }

    fn execute_request<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<ExecutedResponse>> {
        Box::pin(self.run_chained(id))
    }
}

/// Encode the body and set `Content-Type` unless the request already has one
fn encode_body(body: &Body, headers: &mut HeaderMap) -> String {
    let (encoded, content_type) = match &body.content {
        BodyContent::Text(text) => (text.clone(), body.mime_type.clone()),
        BodyContent::Params(params) => {
            let mime = body.mime_type.as_deref().unwrap_or(FORM_URLENCODED);
            if mime.starts_with(MULTIPART_FORM) {
                let boundary = format!("----reqchain{}", uuid::Uuid::new_v4().simple());
                (
                    encode_multipart(params, &boundary),
                    Some(format!("{}; boundary={}", MULTIPART_FORM, boundary)),
                )
            } else {
                (encode_urlencoded(params), Some(mime.to_string()))
            }
        }
    };

    if let Some(content_type) = content_type {
        if !headers.contains_key(CONTENT_TYPE) || content_type.starts_with(MULTIPART_FORM) {
            match HeaderValue::from_str(&content_type) {
                Ok(value) => {
                    headers.insert(CONTENT_TYPE, value);
                }
                Err(_) => warn!(mime = %content_type, "invalid body mime type"),
            }
        }
    }
    encoded
}

fn encode_urlencoded(params: &[BodyParam]) -> String {
    params
        .iter()
        .filter(|p| !p.disabled)
        .map(|p| format!("{}={}", form_urlencode(&p.name), form_urlencode(&p.value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_multipart(params: &[BodyParam], boundary: &str) -> String {
    let mut out = String::new();
    for param in params.iter().filter(|p| !p.disabled) {
        out.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            boundary,
            param.name.replace('"', "%22"),
            param.value
        ));
    }
    out.push_str(&format!("--{}--\r\n", boundary));
    out
}
