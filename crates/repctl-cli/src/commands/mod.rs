//! CLI command implementations.

pub mod node;
pub mod standby;

use repctl_config::{Context, RepctlConfig, Voice};
use repctl_transport::{SshOptions, SshTransport};

/// Loads the node configuration and builds the operation-scoped [`Context`]
/// every subcommand threads through instead of reaching for global state.
pub fn load_context(config_file: Option<&str>, dry_run: bool) -> anyhow::Result<(RepctlConfig, Context)> {
    let config_file = config_file.unwrap_or("repctl.toml");
    let config = RepctlConfig::load(config_file)?;

    let ssh_opts = SshOptions {
        port: config.ssh.port,
        extra_opts: if config.ssh.extra_options.is_empty() {
            SshOptions::default().extra_opts
        } else {
            config.ssh.extra_options.clone()
        },
        ..SshOptions::default()
    };
    let transport = SshTransport::new(ssh_opts);
    let voice = if dry_run { Voice::WouldDo } else { Voice::Doing };
    let ctx = Context::new(voice, transport);
    Ok((config, ctx))
}
