use std::time::Duration;

/// Everything the writer needs to render a standby's recovery parameters.
/// Built by the caller (the clone/follow/switchover subsystems) from a
/// resolved upstream [`repctl_types::NodeRecord`].
#[derive(Debug, Clone)]
pub struct RecoveryParams {
    /// Upstream connection parameters, `dbname`/`replication`/blank values
    /// already stripped by the caller; `application_name` will be forced to
    /// `node_name` regardless of what's passed here.
    pub upstream_conninfo: Vec<(String, String)>,
    pub node_name: String,
    pub passfile: Option<String>,
    /// Only included if the caller explicitly asked for it (spec.md §4.4).
    pub password: Option<String>,
    pub slot_name: Option<String>,
    pub min_apply_delay: Option<Duration>,
    pub restore_command: Option<String>,
    pub archive_cleanup_command: Option<String>,
}

impl RecoveryParams {
    /// Renders `primary_conninfo`'s inner value: canonical `key=value`
    /// pairs, single-quoted and fully escaped for embedding inside a
    /// `primary_conninfo = '...'` config-file assignment.
    pub fn render_primary_conninfo(&self) -> String {
        let mut pairs: Vec<(String, String)> = self
            .upstream_conninfo
            .iter()
            .filter(|(k, v)| !v.is_empty() && k != "dbname" && k != "replication")
            .filter(|(k, _)| k != "application_name")
            .cloned()
            .collect();
        pairs.push(("application_name".to_string(), self.node_name.clone()));
        if let Some(passfile) = &self.passfile {
            pairs.push(("passfile".to_string(), passfile.clone()));
        }
        if let Some(password) = &self.password {
            pairs.push(("password".to_string(), password.clone()));
        }
        let rendered = pairs
            .iter()
            .map(|(k, v)| format!("{k}={}", escape_conninfo_value(v)))
            .collect::<Vec<_>>()
            .join(" ");
        escape_for_single_quoted_conf_value(&rendered)
    }
}

fn escape_conninfo_value(value: &str) -> String {
    if value.chars().any(|c| c.is_whitespace() || c == '\'' || c == '\\') {
        let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
        format!("'{escaped}'")
    } else {
        value.to_string()
    }
}

/// Postgres config-file string literals escape `'` by doubling it.
fn escape_for_single_quoted_conf_value(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RecoveryParams {
        RecoveryParams {
            upstream_conninfo: vec![
                ("host".to_string(), "n1".to_string()),
                ("port".to_string(), "5432".to_string()),
                ("user".to_string(), "repl".to_string()),
                ("dbname".to_string(), "replication".to_string()),
                ("replication".to_string(), "true".to_string()),
                ("application_name".to_string(), "whatever".to_string()),
            ],
            node_name: "node2".to_string(),
            passfile: None,
            password: None,
            slot_name: Some("repmgr_slot_2".to_string()),
            min_apply_delay: None,
            restore_command: None,
            archive_cleanup_command: None,
        }
    }

    #[test]
    fn strips_dbname_and_replication_and_forces_application_name() {
        let rendered = base().render_primary_conninfo();
        assert!(!rendered.contains("dbname"));
        assert!(!rendered.contains("replication=true"));
        assert!(rendered.contains("application_name=node2"));
        assert!(!rendered.contains("whatever"));
    }

    #[test]
    fn drops_blank_values() {
        let mut p = base();
        p.upstream_conninfo.push(("password".to_string(), "".to_string()));
        let rendered = p.render_primary_conninfo();
        assert!(!rendered.contains("password="));
    }

    #[test]
    fn password_included_only_when_explicitly_set() {
        let mut p = base();
        p.password = Some("s3cret".to_string());
        let rendered = p.render_primary_conninfo();
        assert!(rendered.contains("password=s3cret"));
    }
}
