//! Placeholder substitution engine (§4.6 "Substitution semantics").
//!
//! Pure functions only — no I/O, no caching. `TemplateStore`/`TemplateEngine`
//! wrap this with versioning and persistence.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{(.+?)\}\}").unwrap())
}

fn valid_inner_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"^[A-Za-z0-9_.|:"']+$"#).unwrap())
}

/// Find every `{{ ... }}` placeholder's inner content, trimmed.
pub fn find_placeholders(template: &str) -> Vec<String> {
    placeholder_pattern()
        .captures_iter(template)
        .map(|c| c[1].trim().to_string())
        .collect()
}

/// Parsed placeholder: the dot-path variable name, the filter chain
/// (left to right), and an optional default fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub var_path: String,
    pub filters: Vec<String>,
    pub default: Option<String>,
}

/// Split `var|filter1|filter2|default:"fallback"` into its parts. The
/// `default:` segment, if present, must be last.
pub fn parse_placeholder(inner: &str) -> Placeholder {
    let parts: Vec<&str> = inner.split('|').collect();
    let mut filters = Vec::new();
    let mut default = None;

    for part in &parts[1..] {
        if let Some(stripped) = part.strip_prefix("default:") {
            default = Some(stripped.trim().trim_matches('"').trim_matches('\'').to_string());
        } else {
            filters.push(part.trim().to_string());
        }
    }

    Placeholder {
        var_path: parts[0].trim().to_string(),
        filters,
        default,
    }
}

/// Resolve a dot-path (`user.profile.name`) against a JSON variables map.
pub fn resolve_path<'a>(variables: &'a serde_json::Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = variables.get(first)?;

    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }

    Some(current)
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Apply the fixed filter registry, in order. Unknown filter names are a
/// no-op, matching the Python original's `filter_functions.get(f, identity)`.
pub fn apply_filters(value: &str, filters: &[String]) -> String {
    let mut current = value.to_string();
    for filter in filters {
        current = match filter.as_str() {
            "upper" => current.to_uppercase(),
            "lower" => current.to_lowercase(),
            "capitalize" => capitalize(&current),
            "truncate" => truncate(&current, 50),
            _ => current,
        };
    }
    current
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let truncated: String = s.chars().take(max_len).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

/// Render a single string against the variables map, applying the full
/// placeholder grammar (§4.6).
pub fn render_string(template: &str, variables: &serde_json::Map<String, Value>) -> String {
    let placeholders = find_placeholders(template);
    let mut rendered = template.to_string();

    for raw in placeholders {
        let parsed = parse_placeholder(&raw);
        let resolved = resolve_path(variables, &parsed.var_path);

        let replacement = match (resolved, &parsed.default) {
            (Some(value), _) => apply_filters(&value_to_display(value), &parsed.filters),
            (None, Some(default)) => apply_filters(default, &parsed.filters),
            (None, None) => format!("{{{{{raw}}}}}"),
        };

        rendered = rendered.replacen(&format!("{{{{{raw}}}}}"), &replacement, 1);
    }

    rendered
}

/// Render subject and body together.
pub fn render(subject: &str, body: &str, variables: &serde_json::Map<String, Value>) -> (String, String) {
    (render_string(subject, variables), render_string(body, variables))
}

/// Variable names referenced without a `default:` fallback — the set a
/// caller must supply for the template to fully resolve.
pub fn required_variables(template: &str) -> Vec<String> {
    let mut required = Vec::new();
    for raw in find_placeholders(template) {
        let parsed = parse_placeholder(&raw);
        if parsed.default.is_none() && !required.contains(&parsed.var_path) {
            required.push(parsed.var_path);
        }
    }
    required
}

#[derive(Debug, Clone)]
pub struct SyntaxValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Balanced braces, and every placeholder's inner content restricted to
/// `[A-Za-z0-9_.|:"']+` (§4.6 "Syntax validation").
pub fn validate_syntax(template: &str) -> SyntaxValidation {
    let mut errors = Vec::new();

    if template.matches("{{").count() != template.matches("}}").count() {
        errors.push("unclosed template braces".to_string());
    }

    for placeholder in find_placeholders(template) {
        if !valid_inner_pattern().is_match(&placeholder) {
            errors.push(format!("invalid variable name: {placeholder}"));
        }
    }

    SyntaxValidation {
        is_valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(json_value: Value) -> serde_json::Map<String, Value> {
        json_value.as_object().unwrap().clone()
    }

    #[test]
    fn placeholder_free_text_round_trips() {
        let (subject, body) = render("Hello", "World", &vars(json!({})));
        assert_eq!(subject, "Hello");
        assert_eq!(body, "World");
    }

    #[test]
    fn simple_variable_substitution() {
        let rendered = render_string("Hi {{name}}", &vars(json!({"name": "Ada"})));
        assert_eq!(rendered, "Hi Ada");
    }

    #[test]
    fn missing_variable_without_default_stays_literal() {
        let rendered = render_string("Hi {{name}}", &vars(json!({})));
        assert_eq!(rendered, "Hi {{name}}");
    }

    #[test]
    fn default_applies_then_filter_chain() {
        let rendered = render_string(r#"Hi {{name|upper|default:"Guest"}}"#, &vars(json!({})));
        assert_eq!(rendered, "Hi GUEST");
    }

    #[test]
    fn dot_path_resolves_nested_objects() {
        let rendered = render_string("Hi {{user.profile.name}}", &vars(json!({
            "user": {"profile": {"name": "Ada"}}
        })));
        assert_eq!(rendered, "Hi Ada");
    }

    #[test]
    fn truncate_appends_ellipsis_over_length() {
        let long = "a".repeat(60);
        let rendered = render_string("{{text|truncate}}", &vars(json!({"text": long.clone()})));
        assert_eq!(rendered, format!("{}...", &long[..50]));
    }

    #[test]
    fn required_variables_excludes_defaulted_ones() {
        let required = required_variables(r#"{{name}} {{greeting|default:"hi"}} {{name}}"#);
        assert_eq!(required, vec!["name".to_string()]);
    }

    #[test]
    fn syntax_validation_flags_unclosed_braces() {
        let result = validate_syntax("Hi {{name");
        assert!(!result.is_valid);
    }

    #[test]
    fn syntax_validation_accepts_well_formed_template() {
        let result = validate_syntax(r#"Hi {{name|upper|default:"Guest"}}"#);
        assert!(result.is_valid);
    }
}
