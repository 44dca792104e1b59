use std::collections::BTreeMap;
use thiserror::Error;

/// A parsed line of `--key=value` (or bare `--key`, treated as `key=""`)
/// tokens, in the order they were written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    values: BTreeMap<String, String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("unrecognised flag `--{0}` in strict mode")]
    UnknownKey(String),
}

impl Options {
    /// Tolerant parse: unknown keys are kept (queryable via [`Self::get`])
    /// but never rejected.
    pub fn parse(line: &str) -> Options {
        let mut values = BTreeMap::new();
        for token in line.split_whitespace() {
            let Some(flag) = token.strip_prefix("--") else {
                continue;
            };
            match flag.split_once('=') {
                Some((k, v)) => {
                    values.insert(k.to_string(), v.to_string());
                }
                None => {
                    values.insert(flag.to_string(), String::new());
                }
            }
        }
        Options { values }
    }

    /// Strict parse: any key not present in `known_keys` is a hard error.
    pub fn parse_strict(line: &str, known_keys: &[&str]) -> Result<Options, OptionsError> {
        let opts = Options::parse(line);
        for key in opts.values.keys() {
            if !known_keys.contains(&key.as_str()) {
                return Err(OptionsError::UnknownKey(key.clone()));
            }
        }
        Ok(opts)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }
}

/// Builds a line in `--key=value` form, in insertion order (the wire format
/// doesn't require a canonical order, but a stable one makes output
/// deterministic and diffable).
#[derive(Default)]
pub struct OptionsBuilder {
    pairs: Vec<(String, String)>,
}

impl OptionsBuilder {
    pub fn set(mut self, key: &str, value: impl ToString) -> Self {
        self.pairs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn set_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    pub fn build(self) -> String {
        self.pairs
            .into_iter()
            .map(|(k, v)| format!("--{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_and_unknown_keys_tolerantly() {
        let opts = Options::parse("--state=SHUTDOWN --last-checkpoint-lsn=0/300 --future-flag=x");
        assert_eq!(opts.get("state"), Some("SHUTDOWN"));
        assert_eq!(opts.get("future-flag"), Some("x"));
        assert_eq!(opts.get("missing"), None);
    }

    #[test]
    fn empty_line_yields_no_keys() {
        let opts = Options::parse("");
        assert_eq!(opts.get("state"), None);
    }

    #[test]
    fn strict_parse_rejects_unknown_keys() {
        let err = Options::parse_strict("--state=OK --bogus=1", &["state"]).unwrap_err();
        assert_eq!(err, OptionsError::UnknownKey("bogus".to_string()));
    }

    #[test]
    fn builder_round_trips_through_parse() {
        let line = Options::builder()
            .set("status", "OK")
            .set("files", 3)
            .build();
        let opts = Options::parse(&line);
        assert_eq!(opts.get("status"), Some("OK"));
        assert_eq!(opts.get_parsed::<u32>("files"), Some(3));
    }
}
