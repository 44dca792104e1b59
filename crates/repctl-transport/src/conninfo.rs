/// Renders connection parameters in the canonical `key=value key=value ...`
/// form, never URI form, so embedding the result inside a remote shell
/// command never introduces `://`-style metacharacter surprises.
///
/// Values containing whitespace or a single quote are single-quoted with
/// internal `'` and `\` escaped, matching libpq's own conninfo-string rules.
pub fn render_conninfo(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}={}", quote_if_needed(v)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_if_needed(value: &str) -> String {
    if value.chars().any(|c| c.is_whitespace() || c == '\'' || c == '\\') {
        let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
        format!("'{escaped}'")
    } else {
        value.to_string()
    }
}
