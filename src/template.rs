//! `{{ _.NAME }}` environment substitution

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::collection::Environment;
use crate::errors::{ReqchainError, Result};

/// `{{ _.NAME }}` with optional inner whitespace
static VARIABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*_\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("Invalid variable regex")
});

/// Nesting bound for values that reference further variables
pub const MAX_TEMPLATE_DEPTH: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct TemplateOptions {
    /// Undefined variables are errors instead of being left in place
    pub strict: bool,
    /// Lenient-mode replacement for undefined variables; `None` keeps the original text
    pub placeholder: Option<String>,
}

/// Result of [`TemplateResolver::validate_template`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateValidation {
    pub is_valid: bool,
    pub undefined_variables: Vec<String>,
    pub all_variables: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateResolver {
    environment: Environment,
    options: TemplateOptions,
}

impl TemplateResolver {
    pub fn new(environment: Environment, options: TemplateOptions) -> Self {
        Self { environment, options }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn options(&self) -> &TemplateOptions {
        &self.options
    }

    pub fn is_strict(&self) -> bool {
        self.options.strict
    }

    /// Substitute every variable, expanding values that are templates themselves
    pub fn resolve(&self, template: &str) -> Result<String> {
        self.expand(template, &mut Vec::new())
    }

    fn expand(&self, template: &str, stack: &mut Vec<String>) -> Result<String> {
        if stack.len() > MAX_TEMPLATE_DEPTH {
            return Err(ReqchainError::TemplateDepth(MAX_TEMPLATE_DEPTH));
        }
        if !VARIABLE_RE.is_match(template) {
            return Ok(template.to_string());
        }

        let mut out = String::with_capacity(template.len());
        let mut last = 0;

        for caps in VARIABLE_RE.captures_iter(template) {
            let Some(whole) = caps.get(0) else { continue };
            let name = &caps[1];
            out.push_str(&template[last..whole.start()]);
            last = whole.end();

            // A variable reached again through its own value stays as written
            if stack.iter().any(|seen| seen == name) {
                out.push_str(whole.as_str());
                continue;
            }

            match self.environment.get(name) {
                Some(value) => {
                    stack.push(name.to_string());
                    let expanded = self.expand(&value, stack);
                    stack.pop();
                    out.push_str(&expanded?);
                }
                None if self.options.strict => {
                    return Err(ReqchainError::UndefinedVariable(name.to_string()));
                }
                None => {
                    debug!(variable = name, "undefined template variable left unresolved");
                    out.push_str(self.options.placeholder.as_deref().unwrap_or(whole.as_str()));
                }
            }
        }

        out.push_str(&template[last..]);
        Ok(out)
    }

    /// Referenced names the environment does not define
    pub fn get_undefined_variables(&self, template: &str) -> Vec<String> {
        extract_variable_names(template)
            .into_iter()
            .filter(|name| !self.environment.contains(name))
            .collect()
    }

    pub fn validate_template(&self, template: &str) -> TemplateValidation {
        let undefined_variables = self.get_undefined_variables(template);
        TemplateValidation {
            is_valid: undefined_variables.is_empty(),
            undefined_variables,
            all_variables: extract_variable_names(template),
        }
    }
}

pub fn has_template_variables(s: &str) -> bool {
    VARIABLE_RE.is_match(s)
}

/// Variable names in order of first appearance, without duplicates
pub fn extract_variable_names(s: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in VARIABLE_RE.captures_iter(s) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(pairs: &[(&str, &str)], strict: bool) -> TemplateResolver {
        let mut env = Environment::new("Base");
        for (k, v) in pairs {
            env.set_data(*k, *v);
        }
        TemplateResolver::new(env, TemplateOptions { strict, placeholder: None })
    }

    #[test]
    fn test_identity_without_variables() {
        let r = resolver(&[("a", "1")], true);
        for s in ["", "plain", "{{ a }}", "{{_a}}", "{% faker uuid %}", "{ { _.a } }"] {
            assert_eq!(r.resolve(s).unwrap(), s);
        }
    }

    #[test]
    fn test_substitution_and_whitespace() {
        let r = resolver(&[("base", "http://localhost"), ("Mixed_Case1", "ok")], false);
        assert_eq!(r.resolve("{{ _.base }}/a").unwrap(), "http://localhost/a");
        assert_eq!(r.resolve("{{_.base}}").unwrap(), "http://localhost");
        assert_eq!(r.resolve("{{   _.Mixed_Case1 }}").unwrap(), "ok");
    }

    #[test]
    fn test_override_precedence() {
        let mut env = Environment::new("Base");
        env.set_data("token", "base");
        let env = env.with_overrides([("token", "override")]);
        let r = TemplateResolver::new(env, TemplateOptions::default());
        assert_eq!(r.resolve("{{ _.token }}").unwrap(), "override");
    }

    #[test]
    fn test_nested_values_expand() {
        let r = resolver(&[("host", "example.com"), ("base", "https://{{ _.host }}/v1")], false);
        assert_eq!(r.resolve("{{ _.base }}/users").unwrap(), "https://example.com/v1/users");
    }

    #[test]
    fn test_self_reference_does_not_loop() {
        let r = resolver(&[("a", "x{{ _.a }}"), ("p", "{{ _.q }}"), ("q", "{{ _.p }}")], false);
        assert_eq!(r.resolve("{{ _.a }}").unwrap(), "x{{ _.a }}");
        assert_eq!(r.resolve("{{ _.p }}").unwrap(), "{{ _.p }}");
    }

    #[test]
    fn test_depth_limit() {
        let mut env = Environment::new("Base");
        for i in 0..40 {
            env.set_data(format!("v{}", i), format!("{{{{ _.v{} }}}}", i + 1));
        }
        let r = TemplateResolver::new(env, TemplateOptions::default());
        assert!(matches!(r.resolve("{{ _.v0 }}"), Err(ReqchainError::TemplateDepth(_))));
    }

    #[test]
    fn test_undefined_lenient_and_strict() {
        let lenient = resolver(&[], false);
        assert_eq!(lenient.resolve("a {{ _.missing }} b").unwrap(), "a {{ _.missing }} b");

        let strict = resolver(&[], true);
        match strict.resolve("{{ _.missing }}") {
            Err(ReqchainError::UndefinedVariable(name)) => assert_eq!(name, "missing"),
            other => panic!("expected undefined variable, got {:?}", other),
        }

        let placeholder = TemplateResolver::new(
            Environment::new("Base"),
            TemplateOptions { strict: false, placeholder: Some(String::new()) },
        );
        assert_eq!(placeholder.resolve("[{{ _.missing }}]").unwrap(), "[]");
    }

    #[test]
    fn test_introspection() {
        let r = resolver(&[("a", "1")], false);
        let s = "{{ _.b }} {{ _.a }} {{_.b}}";
        assert!(has_template_variables(s));
        assert!(!has_template_variables("none"));
        assert_eq!(extract_variable_names(s), vec!["b", "a"]);
        assert_eq!(r.get_undefined_variables(s), vec!["b"]);

        let validation = r.validate_template(s);
        assert!(!validation.is_valid);
        assert_eq!(validation.undefined_variables, vec!["b"]);
        assert_eq!(validation.all_variables, vec!["b", "a"]);
        assert!(r.validate_template("{{ _.a }}").is_valid);
    }
}
