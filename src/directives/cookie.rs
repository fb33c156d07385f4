//! `{% cookie <url> <key> %}`: value of a stored cookie

use futures::future::BoxFuture;
use tracing::debug;

use super::{Directive, DirectiveContext};
use crate::errors::{ReqchainError, Result};
use crate::utils::url_host;

pub struct CookieDirective;

impl Directive for CookieDirective {
    fn name(&self) -> &'static str {
        "cookie"
    }

    fn evaluate<'a>(&'a self, args: &'a [String], ctx: &'a DirectiveContext<'a>) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let [url, key] = args else {
                return Err(ReqchainError::directive(
                    "cookie",
                    format!("expected <url> <key>, got {} arguments", args.len()),
                ));
            };
            let url = resolve_reference(url, ctx)?;
            let key = resolve_reference(key, ctx)?;
            let domain = url_host(&url);

            for candidate in domain_candidates(&domain) {
                if let Some(cookie) = ctx.cookies.get_cookie(&key, &candidate)? {
                    return Ok(cookie.value);
                }
            }
            debug!(key = %key, domain = %domain, "cookie not found");
            Ok(String::new())
        })
    }
}

/// `_.NAME` arguments are environment references
fn resolve_reference(arg: &str, ctx: &DirectiveContext<'_>) -> Result<String> {
    if arg.starts_with("_.") {
        ctx.templates.resolve(&format!("{{{{ {} }}}}", arg))
    } else {
        Ok(arg.to_string())
    }
}

/// Domain lookup order: exact, dot-prefixed, then parent and dot-parent for 3+ labels
pub fn domain_candidates(domain: &str) -> Vec<String> {
    let mut candidates = vec![domain.to_string(), format!(".{}", domain)];
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() >= 3 {
        let parent = labels[1..].join(".");
        candidates.push(format!(".{}", parent));
        candidates.insert(2, parent);
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::collection::Environment;
    use crate::cookies::{CookieOptions, CookieStore, MemoryCookieStore};
    use crate::directives::NonInteractivePrompter;
    use crate::template::{TemplateOptions, TemplateResolver};

    async fn lookup(cookies: &MemoryCookieStore, env: Environment, args: &[&str]) -> Result<String> {
        let templates = TemplateResolver::new(env, TemplateOptions::default());
        let cache = MemoryCacheStore::new();
        let ctx = DirectiveContext {
            templates: &templates,
            cache: &cache,
            cookies,
            prompter: &NonInteractivePrompter,
            chain: None,
        };
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        CookieDirective.evaluate(&args, &ctx).await
    }

    #[test]
    fn test_domain_candidates() {
        assert_eq!(domain_candidates("example.com"), vec!["example.com", ".example.com"]);
        assert_eq!(
            domain_candidates("api.example.com"),
            vec!["api.example.com", ".api.example.com", "example.com", ".example.com"]
        );
    }

    #[tokio::test]
    async fn test_exact_and_parent_lookup() {
        let cookies = MemoryCookieStore::new();
        cookies.set_cookie("sid", "exact", CookieOptions::for_domain("localhost")).unwrap();
        cookies.set_cookie("wide", "parent", CookieOptions::for_domain(".example.com")).unwrap();

        let env = Environment::new("Base");
        assert_eq!(lookup(&cookies, env.clone(), &["http://localhost:8080", "sid"]).await.unwrap(), "exact");
        assert_eq!(lookup(&cookies, env.clone(), &["api.example.com/x", "wide"]).await.unwrap(), "parent");
        assert_eq!(lookup(&cookies, env, &["http://other.org", "sid"]).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_environment_references() {
        let cookies = MemoryCookieStore::new();
        cookies.set_cookie("token", "t1", CookieOptions::for_domain("example.com")).unwrap();

        let mut env = Environment::new("Base");
        env.set_data("base", "https://example.com");
        env.set_data("name", "token");
        assert_eq!(lookup(&cookies, env, &["_.base", "_.name"]).await.unwrap(), "t1");
    }

    #[tokio::test]
    async fn test_wrong_arity() {
        let cookies = MemoryCookieStore::new();
        let err = lookup(&cookies, Environment::new("Base"), &["only-url"]).await.unwrap_err();
        assert!(err.is_recoverable());
    }
}
