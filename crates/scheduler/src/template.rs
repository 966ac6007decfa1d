use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

fn var_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
            .expect("variable pattern")
    })
}

/// Substitute `${VAR}` and `$VAR` occurrences from the map. Variables with
/// no binding are left exactly as written, so templates can carry
/// placeholders resolved later inside the job itself.
pub fn substitute_params(template: &str, vars: &HashMap<String, String>) -> String {
    var_pattern()
        .replace_all(template, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match vars.get(name) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
