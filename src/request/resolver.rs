//! Turns a collection request into a [`ResolvedRequest`]
//!
//! Headers and authentication are inherited from ancestor folders, then
//! every string field goes through the template resolver and the directive
//! engine in declaration order: url, headers, body, authentication.

use tracing::{debug, warn};
use url::Url;

use super::resolved::{ResolutionIssue, ResolvedRequest};
use crate::collection::{
    AuthKind, Authentication, Body, BodyContent, BodyParam, ConfigTree, Header, LocatedRequest,
};
use crate::directives::{has_directives, DirectiveContext, DirectiveEngine};
use crate::errors::Result;
use crate::utils::has_http_scheme;

/// Headers and authentication after inheritance, before templating
#[derive(Debug, Clone, PartialEq)]
pub struct Inherited {
    pub headers: Vec<Header>,
    pub authentication: Option<Authentication>,
}

/// Merge ancestor folders into the request's own headers and authentication.
///
/// Every active ancestor header is collected; request headers win on a
/// case-insensitive name collision. The deepest active folder
/// authentication is inherited unless the request has its own.
pub fn merge_inheritance(located: &LocatedRequest<'_>) -> Inherited {
    let mut inherited_headers: Vec<&Header> = Vec::new();
    let mut inherited_auth: Option<&Authentication> = None;

    for folder in &located.ancestors {
        inherited_headers.extend(folder.headers.iter().filter(|h| h.is_active()));
        if let Some(auth) = folder.authentication.as_ref().filter(|a| a.is_active()) {
            inherited_auth = Some(auth);
        }
    }

    let request = located.request;
    let mut headers: Vec<Header> = request
        .headers
        .iter()
        .filter(|h| h.is_active())
        .cloned()
        .collect();
    let own_names: Vec<String> = headers.iter().map(|h| h.name.to_ascii_lowercase()).collect();
    headers.extend(
        inherited_headers
            .into_iter()
            .filter(|h| !own_names.contains(&h.name.to_ascii_lowercase()))
            .cloned(),
    );

    let authentication = request
        .authentication
        .as_ref()
        .filter(|a| a.is_active())
        .or(inherited_auth)
        .cloned();

    Inherited {
        headers,
        authentication,
    }
}

/// Prefix `http://` when no scheme is present, unless that still does not parse
pub fn sanitize_url(url: &str) -> String {
    let trimmed = url.trim();
    if has_http_scheme(trimmed) {
        return trimmed.to_string();
    }
    let prefixed = format!("http://{}", trimmed);
    match Url::parse(&prefixed) {
        Ok(_) => prefixed,
        Err(_) => url.to_string(),
    }
}

pub struct RequestResolver<'a> {
    tree: &'a ConfigTree,
    engine: &'a DirectiveEngine,
    ctx: &'a DirectiveContext<'a>,
}

impl<'a> RequestResolver<'a> {
    pub fn new(tree: &'a ConfigTree, engine: &'a DirectiveEngine, ctx: &'a DirectiveContext<'a>) -> Self {
        Self { tree, engine, ctx }
    }

    /// Resolve the request at a slash-separated name path
    pub async fn resolve(&self, path: &str) -> Result<ResolvedRequest> {
        let located = self.tree.find_by_path(path)?;
        self.resolve_located(&located).await
    }

    pub async fn resolve_by_id(&self, id: &str) -> Result<ResolvedRequest> {
        let located = self.tree.find_by_id(id)?;
        self.resolve_located(&located).await
    }

    pub async fn resolve_located(&self, located: &LocatedRequest<'_>) -> Result<ResolvedRequest> {
        let request = located.request;
        debug!(path = %located.path, id = %request.meta.id, "resolving request");

        let inherited = merge_inheritance(located);
        let mut issues = Vec::new();

        let url = self.field("url", &request.url, &mut issues).await?;
        let url = sanitize_url(&url);

        let mut headers = Vec::with_capacity(inherited.headers.len());
        for header in &inherited.headers {
            let label = format!("header[{}]", header.name);
            let name = self.field(&label, &header.name, &mut issues).await?;
            let value = self.field(&label, &header.value, &mut issues).await?;
            headers.push(Header::new(name, value));
        }

        let body = match &request.body {
            Some(body) => Some(self.body(body, &mut issues).await?),
            None => None,
        };

        let authentication = match &inherited.authentication {
            Some(auth) => Some(self.authentication(auth, &mut issues).await?),
            None => None,
        };

        for issue in &issues {
            warn!(path = %located.path, field = %issue.field, "{}", issue.message);
        }

        Ok(ResolvedRequest {
            name: request.name.clone(),
            path: located.path.clone(),
            method: request.method.clone(),
            url,
            headers,
            body,
            authentication,
            meta: request.meta.clone(),
            has_after_response_script: request.after_response_script.is_some(),
            issues,
        })
    }

    /// Templates, then directives.
    ///
    /// Recoverable failures are recorded and the raw text is kept; chain
    /// failures propagate.
    async fn field(&self, label: &str, raw: &str, issues: &mut Vec<ResolutionIssue>) -> Result<String> {
        let templated = match self.ctx.templates.resolve(raw) {
            Ok(value) => value,
            Err(e) if e.is_recoverable() => {
                issues.push(ResolutionIssue {
                    field: label.to_string(),
                    message: e.to_string(),
                });
                return Ok(raw.to_string());
            }
            Err(e) => return Err(e),
        };
        if !has_directives(&templated) {
            return Ok(templated);
        }

        let rendered = self.engine.render(&templated, self.ctx).await?;
        issues.extend(rendered.skipped.into_iter().map(|message| ResolutionIssue {
            field: label.to_string(),
            message,
        }));
        Ok(rendered.text)
    }

    async fn body(&self, body: &Body, issues: &mut Vec<ResolutionIssue>) -> Result<Body> {
        let content = match &body.content {
            BodyContent::Text(text) => BodyContent::Text(self.field("body", text, issues).await?),
            BodyContent::Params(params) => {
                let mut resolved = Vec::with_capacity(params.len());
                for param in params.iter().filter(|p| !p.disabled) {
                    let label = format!("body[{}]", param.name);
                    resolved.push(BodyParam {
                        name: self.field(&label, &param.name, issues).await?,
                        value: self.field(&label, &param.value, issues).await?,
                        disabled: false,
                    });
                }
                BodyContent::Params(resolved)
            }
        };
        Ok(Body {
            mime_type: body.mime_type.clone(),
            content,
        })
    }

    async fn authentication(
        &self,
        auth: &Authentication,
        issues: &mut Vec<ResolutionIssue>,
    ) -> Result<Authentication> {
        let kind = match &auth.kind {
            AuthKind::None => AuthKind::None,
            AuthKind::Basic { username, password } => AuthKind::Basic {
                username: self.field("auth.username", username, issues).await?,
                password: self.field("auth.password", password, issues).await?,
            },
            AuthKind::Bearer { token } => AuthKind::Bearer {
                token: self.field("auth.token", token, issues).await?,
            },
            AuthKind::ApiKey { key, token } => AuthKind::ApiKey {
                key: self.field("auth.key", key, issues).await?,
                token: self.field("auth.token", token, issues).await?,
            },
            AuthKind::OAuth2 { token } => AuthKind::OAuth2 {
                token: self.field("auth.token", token, issues).await?,
            },
            AuthKind::Unknown { scheme, token } => AuthKind::Unknown {
                scheme: scheme.clone(),
                token: self.field("auth.token", token, issues).await?,
            },
        };
        Ok(Authentication {
            kind,
            disabled: auth.disabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::collection::{parse_collection, LoadOptions};
    use crate::cookies::MemoryCookieStore;
    use crate::directives::NonInteractivePrompter;
    use crate::errors::ReqchainError;
    use crate::template::{TemplateOptions, TemplateResolver};

    const COLLECTION: &str = r#"
type: collection.insomnia.rest/5.0
name: Inheritance
collection:
  - name: Outer
    meta: { id: fld_outer }
    headers:
      - { name: A, value: "1" }
      - { name: X-Outer, value: outer }
      - { name: X-Off, value: off, disabled: true }
    authentication: { type: basic, username: "{{ _.user }}", password: secret }
    children:
      - name: Inner
        meta: { id: fld_inner }
        headers:
          - { name: x-outer, value: inner-dup }
        authentication: { type: bearer, token: "{{ _.token }}" }
        children:
          - name: Profile
            meta: { id: req_profile }
            url: "{{ _.host }}/me"
            method: get
            headers:
              - { name: a, value: "2" }
              - { name: B, value: "3" }
          - name: Own Auth
            meta: { id: req_own }
            url: https://api.example.com/own
            method: GET
            authentication: { type: apikey, key: X-Key, value: "{{ _.token }}" }
          - name: Disabled Own Auth
            meta: { id: req_disabled }
            url: https://api.example.com/d
            method: GET
            authentication: { type: bearer, token: mine, disabled: true }
      - name: Shallow
        meta: { id: req_shallow }
        url: "{{ _.host }}/shallow"
        method: POST
        body:
          mimeType: application/x-www-form-urlencoded
          params:
            - { name: user, value: "{{ _.user }}" }
            - { name: skip, value: x, disabled: true }
            - { name: id, value: "{% faker 'nope' %}" }
  - name: Broken
    meta: { id: req_broken }
    url: "{{ _.missing }}/x"
    method: GET
environments:
  name: Base
  data:
    host: localhost:8080
    user: alice
    token: t0k
"#;

    struct Fixture {
        tree: ConfigTree,
        templates: TemplateResolver,
        cache: MemoryCacheStore,
        cookies: MemoryCookieStore,
        engine: DirectiveEngine,
    }

    impl Fixture {
        fn new(strict: bool) -> Self {
            let tree = parse_collection(COLLECTION, &LoadOptions::default()).unwrap();
            let options = TemplateOptions {
                strict,
                ..TemplateOptions::default()
            };
            Self {
                templates: TemplateResolver::new(tree.environment().clone(), options),
                tree,
                cache: MemoryCacheStore::new(),
                cookies: MemoryCookieStore::new(),
                engine: DirectiveEngine::with_builtins(),
            }
        }

        async fn resolve(&self, path: &str) -> Result<ResolvedRequest> {
            let ctx = DirectiveContext {
                templates: &self.templates,
                cache: &self.cache,
                cookies: &self.cookies,
                prompter: &NonInteractivePrompter,
                chain: None,
            };
            RequestResolver::new(&self.tree, &self.engine, &ctx).resolve(path).await
        }
    }

    #[tokio::test]
    async fn test_request_headers_win_over_inherited() {
        let fixture = Fixture::new(false);
        let resolved = fixture.resolve("Outer/Inner/Profile").await.unwrap();

        let pairs: Vec<(&str, &str)> = resolved
            .headers
            .iter()
            .map(|h| (h.name.as_str(), h.value.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("a", "2"), ("B", "3"), ("X-Outer", "outer"), ("x-outer", "inner-dup")]
        );
        assert!(!pairs.iter().any(|(_, v)| *v == "1"));
        assert!(resolved.header("x-off").is_none());
    }

    #[tokio::test]
    async fn test_deepest_folder_auth_is_inherited() {
        let fixture = Fixture::new(false);
        let resolved = fixture.resolve("Outer/Inner/Profile").await.unwrap();
        assert_eq!(
            resolved.authentication.unwrap().kind,
            AuthKind::Bearer { token: "t0k".into() }
        );

        let shallow = fixture.resolve("Outer/Shallow").await.unwrap();
        assert_eq!(
            shallow.authentication.unwrap().kind,
            AuthKind::Basic {
                username: "alice".into(),
                password: "secret".into()
            }
        );
    }

    #[tokio::test]
    async fn test_own_auth_wins_unless_disabled() {
        let fixture = Fixture::new(false);
        let own = fixture.resolve("Outer/Inner/Own Auth").await.unwrap();
        assert_eq!(
            own.authentication.unwrap().kind,
            AuthKind::ApiKey {
                key: "X-Key".into(),
                token: "t0k".into()
            }
        );

        let disabled = fixture.resolve("Outer/Inner/Disabled Own Auth").await.unwrap();
        assert_eq!(
            disabled.authentication.unwrap().kind,
            AuthKind::Bearer { token: "t0k".into() }
        );
    }

    #[tokio::test]
    async fn test_url_gets_scheme() {
        let fixture = Fixture::new(false);
        let resolved = fixture.resolve("Outer/Inner/Profile").await.unwrap();
        assert_eq!(resolved.url, "http://localhost:8080/me");
        assert_eq!(resolved.method, "GET");
        assert_eq!(resolved.id(), "req_profile");
    }

    #[tokio::test]
    async fn test_params_resolved_and_failures_isolated() {
        let fixture = Fixture::new(false);
        let resolved = fixture.resolve("Outer/Shallow").await.unwrap();

        let Some(Body { content: BodyContent::Params(params), .. }) = &resolved.body else {
            panic!("expected params body");
        };
        assert_eq!(params.len(), 2);
        assert_eq!((params[0].name.as_str(), params[0].value.as_str()), ("user", "alice"));
        assert_eq!(params[1].value, "{% faker 'nope' %}");
        assert_eq!(resolved.issues.len(), 1);
        assert_eq!(resolved.issues[0].field, "body[id]");
    }

    #[tokio::test]
    async fn test_lenient_leaves_placeholder() {
        let fixture = Fixture::new(false);
        let resolved = fixture.resolve("Broken").await.unwrap();
        assert_eq!(resolved.url, "{{ _.missing }}/x");
        assert!(resolved.issues.is_empty());
    }

    #[tokio::test]
    async fn test_strict_records_issue_and_keeps_raw_field() {
        let fixture = Fixture::new(true);
        let resolved = fixture.resolve("Broken").await.unwrap();
        assert_eq!(resolved.url, "{{ _.missing }}/x");
        assert_eq!(resolved.issues.len(), 1);
        assert!(resolved.issues[0].message.contains("missing"));
    }

    #[tokio::test]
    async fn test_folder_path_is_not_found() {
        let fixture = Fixture::new(false);
        let err = fixture.resolve("Outer/Inner").await.unwrap_err();
        assert!(matches!(err, ReqchainError::NotFound(_)));
    }

    #[test]
    fn test_sanitize_url() {
        assert_eq!(sanitize_url("example.com/a"), "http://example.com/a");
        assert_eq!(sanitize_url("https://example.com"), "https://example.com");
        assert_eq!(sanitize_url("HTTP://example.com"), "HTTP://example.com");
        assert_eq!(sanitize_url("{{ _.base }}/x"), "{{ _.base }}/x");
    }
}
