//! `{% name arg ... %}` directives
//!
//! The engine finds every directive span in a string and replaces it with
//! the directive's value, left to right and one at a time. A directive
//! that is unknown or fails recoverably leaves its own span untouched;
//! the rest of the string is still rendered.

pub mod cookie;
pub mod faker;
pub mod prompt;
pub mod response;

pub use cookie::CookieDirective;
pub use faker::FakerDirective;
pub use prompt::{NonInteractivePrompter, PromptDirective, PromptRequest, Prompter, TerminalPrompter};
pub use response::{ExpiryMode, ResponseDirective, ResponseField, ResponsePath, ResponseTemplate};

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::cache::CacheStore;
use crate::chain::{ChainResolver, RequestExecutor};
use crate::cookies::CookieStore;
use crate::errors::Result;
use crate::template::TemplateResolver;

/// Non-greedy `{% ... %}` span
static DIRECTIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{%\s*(.*?)\s*%\}").expect("Invalid directive regex"));

/// Collaborators a directive may use while evaluating
pub struct DirectiveContext<'a> {
    pub templates: &'a TemplateResolver,
    pub cache: &'a dyn CacheStore,
    pub cookies: &'a dyn CookieStore,
    pub prompter: &'a dyn Prompter,
    /// Present when requests can be executed (a session is driving resolution)
    pub chain: Option<ChainContext<'a>>,
}

/// What `response` needs to run another request
#[derive(Clone, Copy)]
pub struct ChainContext<'a> {
    pub resolver: &'a ChainResolver,
    pub executor: &'a dyn RequestExecutor,
}

/// A named template function
pub trait Directive: Send + Sync {
    fn name(&self) -> &'static str;

    /// Evaluate with the arguments that follow the name
    fn evaluate<'a>(
        &'a self,
        args: &'a [String],
        ctx: &'a DirectiveContext<'a>,
    ) -> BoxFuture<'a, Result<String>>;
}

/// Output of [`DirectiveEngine::render`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// One message per span left in place
    pub skipped: Vec<String>,
}

#[derive(Clone)]
pub struct DirectiveEngine {
    directives: HashMap<&'static str, Arc<dyn Directive>>,
}

impl Default for DirectiveEngine {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl DirectiveEngine {
    /// An engine that knows no directives
    pub fn empty() -> Self {
        Self {
            directives: HashMap::new(),
        }
    }

    /// `faker`, `prompt`, `cookie` and `response`
    pub fn with_builtins() -> Self {
        let mut engine = Self::empty();
        engine.register(Arc::new(FakerDirective));
        engine.register(Arc::new(PromptDirective));
        engine.register(Arc::new(CookieDirective));
        engine.register(Arc::new(ResponseDirective));
        engine
    }

    /// Add or replace a directive by name
    pub fn register(&mut self, directive: Arc<dyn Directive>) {
        self.directives.insert(directive.name(), directive);
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.directives.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Render every directive span in `input`.
    ///
    /// Only non-recoverable errors (chain failures, cycles, transport)
    /// are returned; everything else is reported in [`Rendered::skipped`].
    pub async fn render(&self, input: &str, ctx: &DirectiveContext<'_>) -> Result<Rendered> {
        let spans: Vec<(usize, usize, String)> = DIRECTIVE_RE
            .captures_iter(input)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some((whole.start(), whole.end(), caps[1].to_string()))
            })
            .collect();
        if spans.is_empty() {
            return Ok(Rendered {
                text: input.to_string(),
                skipped: Vec::new(),
            });
        }

        let mut rendered = Rendered::default();
        let mut last = 0;

        for (start, end, body) in spans {
            rendered.text.push_str(&input[last..start]);
            last = end;
            let span = &input[start..end];

            let tokens = tokenize(&body);
            let Some((name, args)) = tokens.split_first() else {
                rendered.text.push_str(span);
                continue;
            };

            let Some(directive) = self.directives.get(name.as_str()) else {
                warn!(directive = %name, "unknown directive left unresolved");
                rendered.skipped.push(format!("unknown directive '{}'", name));
                rendered.text.push_str(span);
                continue;
            };

            match directive.evaluate(args, ctx).await {
                Ok(value) => rendered.text.push_str(&value),
                Err(e) if e.is_recoverable() => {
                    warn!(directive = %name, error = %e, "directive failed, span left unresolved");
                    rendered.skipped.push(e.to_string());
                    rendered.text.push_str(span);
                }
                Err(e) => return Err(e),
            }
        }

        rendered.text.push_str(&input[last..]);
        Ok(rendered)
    }
}

pub fn has_directives(s: &str) -> bool {
    DIRECTIVE_RE.is_match(s)
}

/// Split a directive body into tokens.
///
/// Whitespace and bare commas separate tokens. Single or double quotes keep
/// their content verbatim (a backslash escapes the quote character). Empty
/// unquoted tokens are dropped; an explicit `''` is kept as an empty argument.
pub fn tokenize(body: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == '\\' && matches!(chars.peek(), Some(&next) if next == q || next == '\\') {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                } else if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_token = true;
                }
                c if c.is_whitespace() || c == ',' => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }

    if in_token {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::collection::Environment;
    use crate::cookies::MemoryCookieStore;
    use crate::errors::ReqchainError;
    use crate::template::TemplateOptions;

    struct Echo;

    impl Directive for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn evaluate<'a>(&'a self, args: &'a [String], _ctx: &'a DirectiveContext<'a>) -> BoxFuture<'a, Result<String>> {
            Box::pin(async move { Ok(args.join("|")) })
        }
    }

    struct Fails(fn() -> ReqchainError);

    impl Directive for Fails {
        fn name(&self) -> &'static str {
            "fails"
        }

        fn evaluate<'a>(&'a self, _args: &'a [String], _ctx: &'a DirectiveContext<'a>) -> BoxFuture<'a, Result<String>> {
            let err = (self.0)();
            Box::pin(async move { Err(err) })
        }
    }

    struct Fixture {
        templates: TemplateResolver,
        cache: MemoryCacheStore,
        cookies: MemoryCookieStore,
        prompter: NonInteractivePrompter,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                templates: TemplateResolver::new(Environment::new("Base"), TemplateOptions::default()),
                cache: MemoryCacheStore::new(),
                cookies: MemoryCookieStore::new(),
                prompter: NonInteractivePrompter,
            }
        }

        fn ctx(&self) -> DirectiveContext<'_> {
            DirectiveContext {
                templates: &self.templates,
                cache: &self.cache,
                cookies: &self.cookies,
                prompter: &self.prompter,
                chain: None,
            }
        }
    }

    fn engine() -> DirectiveEngine {
        let mut engine = DirectiveEngine::empty();
        engine.register(Arc::new(Echo));
        engine
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("response 'body', 'req_1'"), vec!["response", "body", "req_1"]);
        assert_eq!(tokenize(r#"a "b c, d" e"#), vec!["a", "b c, d", "e"]);
        assert_eq!(tokenize("a,,  b"), vec!["a", "b"]);
        assert_eq!(tokenize("prompt 'T' 'L' '' 'k' false false").len(), 7);
        assert_eq!(tokenize(r"x 'it\'s'"), vec!["x", "it's"]);
        assert!(tokenize("   ").is_empty());
    }

    #[tokio::test]
    async fn test_render_left_to_right() {
        let fixture = Fixture::new();
        let out = engine()
            .render("a={% echo 1 %}, b={% echo 'x y' 2 %}", &fixture.ctx())
            .await
            .unwrap();
        assert_eq!(out.text, "a=1, b=x y|2");
        assert!(out.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_directive_isolated() {
        let fixture = Fixture::new();
        let out = engine()
            .render("{% nope 1 %}-{% echo ok %}", &fixture.ctx())
            .await
            .unwrap();
        assert_eq!(out.text, "{% nope 1 %}-ok");
        assert_eq!(out.skipped.len(), 1);
    }

    #[tokio::test]
    async fn test_recoverable_error_leaves_span() {
        let fixture = Fixture::new();
        let mut engine = engine();
        engine.register(Arc::new(Fails(|| ReqchainError::directive("fails", "boom"))));
        let out = engine
            .render("[{% fails %}] [{% echo fine %}]", &fixture.ctx())
            .await
            .unwrap();
        assert_eq!(out.text, "[{% fails %}] [fine]");
    }

    #[tokio::test]
    async fn test_fatal_error_propagates() {
        let fixture = Fixture::new();
        let mut engine = engine();
        engine.register(Arc::new(Fails(|| ReqchainError::CircularDependency("req_a".into()))));
        let err = engine.render("{% fails %}", &fixture.ctx()).await.unwrap_err();
        assert!(matches!(err, ReqchainError::CircularDependency(_)));
    }

    #[tokio::test]
    async fn test_plain_text_untouched() {
        let fixture = Fixture::new();
        let out = engine().render("no directives {{ here }}", &fixture.ctx()).await.unwrap();
        assert_eq!(out.text, "no directives {{ here }}");
        assert!(!has_directives("no directives"));
        assert!(has_directives("{% echo %}"));
    }

    #[test]
    fn test_builtins_registered() {
        assert_eq!(
            DirectiveEngine::with_builtins().names(),
            vec!["cookie", "faker", "prompt", "response"]
        );
    }
}
