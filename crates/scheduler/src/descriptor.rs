use crate::template::substitute_params;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use storage::SourceLocation;

/// A rendered job specification bound to exactly one batch.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    /// Position in the manifest; drives naming and log/result correlation.
    pub ordinal: usize,
    /// Descriptor file name used for bulk apply.
    pub name: String,
    pub body: String,
}

fn batch_num_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^0-9]+([0-9]{3,})").expect("batch number pattern"))
}

/// Recover the zero-padded ordinal embedded in a batch file stem, falling
/// back to the manifest position when the name carries none.
fn batch_number(stem: &str, ordinal: usize) -> String {
    match batch_num_pattern()
        .captures(stem)
        .and_then(|caps| caps.get(1))
    {
        Some(m) => m.as_str().to_string(),
        None => format!("{ordinal:03}"),
    }
}

/// Render one descriptor per manifest entry, in manifest order.
///
/// Bound variables: `BATCH_NUM` (manifest ordinal), `QUERY` (batch file
/// stem), `QUERY_FQN`, `QUERY_PATH` (parent directory), `QUERY_NUM`
/// (ordinal recovered from the file name), `RESULTS`, plus anything in
/// `extra`.
pub fn render_descriptors(
    template: &str,
    manifest: &[String],
    results: &str,
    extra: &HashMap<String, String>,
) -> Vec<JobDescriptor> {
    manifest
        .iter()
        .enumerate()
        .map(|(ordinal, fqn)| {
            let location = SourceLocation::resolve(fqn);
            let stem = location
                .file_name()
                .rsplit_once('.')
                .map(|(stem, _)| stem)
                .unwrap_or(location.file_name());

            let mut vars = extra.clone();
            vars.insert("BATCH_NUM".to_string(), ordinal.to_string());
            vars.insert("QUERY".to_string(), stem.to_string());
            vars.insert("QUERY_FQN".to_string(), fqn.clone());
            vars.insert("QUERY_PATH".to_string(), location.parent().to_string());
            vars.insert("QUERY_NUM".to_string(), batch_number(stem, ordinal));
            vars.insert("RESULTS".to_string(), results.to_string());

            JobDescriptor {
                ordinal,
                name: format!("job_{ordinal:03}.yaml"),
                body: substitute_params(template, &vars),
            }
        })
        .collect()
}
