//! `standby clone|register|unregister|promote|follow|switchover` — the
//! standby lifecycle operations (spec.md §4.4-§4.10).

use super::load_context;
use anyhow::{anyhow, Context as _};
use clap::{Args, Subcommand};
use repctl_core::clone::plan::{CloneRequest, ExternalConfigMode, UpstreamConfigCheck, WalMethod};
use repctl_core::clone::{catalog_backup, direct};
use repctl_core::follow::{self, FollowRequest};
use repctl_core::promote::{self, choose_mechanism, PromoteRequest};
use repctl_core::register::{self, RegisterOutcome, RegisterRequest};
use repctl_core::switchover::{self, SwitchoverHooks, SwitchoverRequest};
use repctl_db::{DbConn, PgCatalog};
use repctl_recovery::{Features, RecoveryParams, RecoveryWriter};
use repctl_transport::SshTransport;
use repctl_types::{NodeRecord, NodeType};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Subcommand)]
pub enum StandbyCommands {
    /// Clones a standby from the primary (or an explicit upstream).
    Clone {
        #[arg(short = 'D', long = "pgdata")]
        data_directory: PathBuf,
        #[arg(short = 'd', long = "upstream-conninfo")]
        upstream_conninfo: String,
        #[arg(long)]
        upstream_node_id: Option<i32>,
        #[arg(long)]
        node_id: i32,
        #[arg(long)]
        node_name: String,
        #[arg(short = 'R', long = "replication-user", default_value = "repl")]
        replication_user: String,
        #[arg(long)]
        fast_checkpoint: bool,
        #[arg(long)]
        verify_backup: bool,
        #[arg(long, num_args = 0..=1, default_missing_value = "samepath")]
        copy_external_config_files: Option<String>,
        #[arg(long)]
        no_upstream_connection: bool,
        #[arg(short = 'S', long = "slot-name")]
        slot_name: Option<String>,
        /// Forces direct streaming even when a backup catalog is configured.
        #[arg(long)]
        without_barman: bool,
    },
    /// Registers the local node (or an already-cloned standby) against the catalog.
    Register(RegisterArgs),
    /// Removes a standby from the catalog.
    Unregister {
        #[arg(long)]
        node_id: i32,
    },
    /// Promotes the local standby to primary.
    Promote {
        #[arg(long)]
        node_id: i32,
        #[arg(long)]
        siblings_follow: bool,
        #[arg(long)]
        service_promote_command: Option<String>,
    },
    /// Repoints the local standby at a new upstream.
    Follow {
        #[arg(long)]
        upstream_node_id: i32,
    },
    /// Runs a zero-downtime switchover, promoting the local standby.
    Switchover {
        #[arg(long)]
        siblings_follow: bool,
        #[arg(long)]
        always_promote: bool,
        #[arg(long)]
        repmgrd_no_pause: bool,
        #[arg(long)]
        repmgrd_force_unpause: bool,
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        force_rewind: Option<String>,
    },
}

#[derive(Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub node_id: i32,
    #[arg(long)]
    pub node_name: String,
    #[arg(short = 'd', long = "conninfo")]
    pub conninfo: String,
    #[arg(long)]
    pub upstream_node_id: Option<i32>,
    #[arg(long, num_args = 0..=1, default_missing_value = "30")]
    pub wait_sync: Option<u64>,
}

pub async fn run(cmd: &StandbyCommands, config_file: Option<&str>, dry_run: bool, force: bool) -> anyhow::Result<()> {
    let (config, ctx) = load_context(config_file, dry_run)?;

    match cmd {
        StandbyCommands::Clone {
            data_directory,
            upstream_conninfo,
            upstream_node_id,
            node_id,
            node_name,
            replication_user,
            fast_checkpoint,
            verify_backup,
            copy_external_config_files,
            no_upstream_connection: _,
            slot_name,
            without_barman,
        } => {
            let catalog = PgCatalog::connect(upstream_conninfo)
                .await
                .context("connecting to the catalog/upstream")?;
            let req = CloneRequest {
                destination_data_directory: data_directory.clone(),
                source_conninfo: upstream_conninfo.clone(),
                upstream_node_id: *upstream_node_id,
                force,
                fast_checkpoint: *fast_checkpoint,
                verify_backup: *verify_backup,
                tablespace_mappings: Vec::new(),
                copy_external_config_files: copy_external_config_files.as_deref().map(|mode| {
                    if mode == "pgdata" {
                        ExternalConfigMode::Pgdata
                    } else {
                        ExternalConfigMode::SamePath
                    }
                }),
                use_replication_slot: config.use_replication_slots,
                wal_method: WalMethod::Stream,
            };
            let upstream = direct::resolve_upstream(&catalog, &req).await?;

            let server_version = catalog.server_version().await?;
            let features = Features::for_version(server_version);
            let writer = RecoveryWriter::new(features, force, dry_run);
            let local_node = NodeRecord {
                node_id: *node_id,
                node_name: node_name.clone(),
                node_type: NodeType::Standby,
                upstream_node_id: Some(upstream.record.node_id),
                conninfo: config.conninfo.clone(),
                repluser: replication_user.clone(),
                slot_name: slot_name.clone().unwrap_or_else(|| repctl_types::slot_name_for_node(*node_id)),
                config_file: PathBuf::from(config_file.unwrap_or("repctl.toml")),
                data_directory: data_directory.clone(),
                priority: 100,
                location: String::new(),
                active: true,
            };
            let upstream_conninfo_pairs: Vec<(String, String)> = upstream
                .record
                .conninfo
                .split_whitespace()
                .filter_map(|kv| kv.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            let recovery_params = RecoveryParams {
                upstream_conninfo: upstream_conninfo_pairs,
                node_name: node_name.clone(),
                passfile: None,
                password: None,
                slot_name: Some(local_node.slot_name.clone()),
                min_apply_delay: None,
                restore_command: None,
                archive_cleanup_command: None,
            };
            let gucs = catalog.get_upstream_gucs().await?;
            let upstream_config = UpstreamConfigCheck::from_gucs(&gucs, &req);

            let outcome = if let Some(backup_catalog) = config.backup_catalog.as_ref().filter(|_| !*without_barman) {
                catalog_backup::clone_catalog_backup(
                    &catalog,
                    *node_id,
                    &req,
                    &upstream,
                    &backup_catalog.list_command,
                    &backup_catalog.restore_command,
                    backup_catalog.wal_directory.as_deref(),
                    &recovery_params,
                    &writer,
                    &local_node,
                )
                .await?
            } else {
                direct::clone_direct(
                    &catalog,
                    &catalog,
                    &config.pg_bindir,
                    *node_id,
                    &req,
                    &upstream,
                    &upstream_config,
                    &recovery_params,
                    &writer,
                    &local_node,
                    &[],
                )
                .await?
            };

            tracing::info!(node_id, duration = ?outcome.duration, "clone finished");
            Ok(())
        }

        StandbyCommands::Register(args) => {
            let primary = PgCatalog::connect(&args.conninfo).await.context("connecting to the primary")?;
            let record = NodeRecord {
                node_id: args.node_id,
                node_name: args.node_name.clone(),
                node_type: if args.upstream_node_id.is_some() {
                    NodeType::Standby
                } else {
                    NodeType::Primary
                },
                upstream_node_id: args.upstream_node_id,
                conninfo: config.conninfo.clone(),
                repluser: config.repluser.clone(),
                slot_name: repctl_types::slot_name_for_node(args.node_id),
                config_file: PathBuf::from(config_file.unwrap_or("repctl.toml")),
                data_directory: config.data_directory.clone(),
                priority: 100,
                location: String::new(),
                active: true,
            };
            let wait_sync = args.wait_sync.map(Duration::from_secs);
            let req = RegisterRequest { record, force, wait_sync };

            let local = if ctx.has_connection(args.node_id).await {
                None
            } else {
                PgCatalog::connect(&config.conninfo).await.ok()
            };
            let local_dyn: Option<&dyn DbConn> = local.as_ref().map(|c| c as &dyn DbConn);
            let outcome = register::register(local_dyn, &primary, &req).await?;
            match outcome {
                RegisterOutcome::Registered => tracing::info!("standby registered"),
                RegisterOutcome::RegisteredSyncPending => {
                    tracing::warn!("standby registered, but catalog replica had not caught up before --wait-sync elapsed");
                }
            }
            Ok(())
        }

        StandbyCommands::Unregister { node_id } => {
            let primary = PgCatalog::connect(&config.conninfo).await.context("connecting to the primary")?;
            register::unregister(&primary, *node_id).await?;
            Ok(())
        }

        StandbyCommands::Promote {
            node_id,
            siblings_follow,
            service_promote_command,
        } => {
            let conn = PgCatalog::connect(&config.conninfo).await.context("connecting to the local node")?;
            let features = Features::for_version(conn.server_version().await?);
            let mechanism = choose_mechanism(service_promote_command.clone(), features.has_sql_promote_function);
            let local_node = conn.get_node(*node_id).await?;
            let host = host_from_conninfo(&local_node.conninfo, &local_node.node_name).to_string();
            let req = PromoteRequest {
                node_id: *node_id,
                siblings_follow: *siblings_follow,
            };
            promote::promote(
                &conn,
                &mechanism,
                |mechanism| {
                    invoke_promotion(
                        &ctx.transport,
                        &config.ssh.remote_user,
                        &host,
                        &config.pg_bindir,
                        &config.data_directory,
                        &conn,
                        mechanism,
                    )
                },
                &config.timeouts,
                &req,
            )
            .await?;

            if *siblings_follow {
                let new_primary = conn.get_node(*node_id).await?;
                let siblings = conn.get_active_siblings(new_primary.node_id, new_primary.node_id).await.unwrap_or_default();
                let results = repctl_core::siblings::reconfigure_siblings(
                    &ctx.transport,
                    &config.ssh.remote_user,
                    &new_primary,
                    &siblings,
                    |_| true,
                )
                .await;
                for r in &results {
                    if let Err(e) = &r.outcome {
                        tracing::warn!(node_id = r.node_id, error = %e, "sibling did not reconfigure");
                    }
                }
            }
            Ok(())
        }

        StandbyCommands::Follow { upstream_node_id } => {
            let conn = PgCatalog::connect(&config.conninfo).await.context("connecting to the local node")?;
            let local = conn.get_node(config.node_id).await?;
            let new_upstream = conn.get_node(*upstream_node_id).await?;
            let features = Features::for_version(conn.server_version().await?);
            let writer = RecoveryWriter::new(features, force, dry_run);
            let upstream_conninfo_pairs: Vec<(String, String)> = new_upstream
                .conninfo
                .split_whitespace()
                .filter_map(|kv| kv.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            let params = RecoveryParams {
                upstream_conninfo: upstream_conninfo_pairs,
                node_name: local.node_name.clone(),
                passfile: None,
                password: None,
                slot_name: Some(local.slot_name.clone()),
                min_apply_delay: None,
                restore_command: None,
                archive_cleanup_command: None,
            };
            let req = FollowRequest { new_upstream, params };
            follow::follow(&conn, &writer, &local, &req).await?;
            Ok(())
        }

        StandbyCommands::Switchover {
            siblings_follow,
            always_promote,
            repmgrd_no_pause,
            repmgrd_force_unpause,
            force_rewind,
        } => {
            let local_conn = PgCatalog::connect(&config.conninfo).await.context("connecting to the local node")?;
            let local_rec = local_conn.get_node(config.node_id).await?;
            let primary_id = local_rec
                .upstream_node_id
                .ok_or_else(|| anyhow!("local node {} has no upstream to switch over with", config.node_id))?;
            let primary_record = local_conn.get_node(primary_id).await?;
            let siblings = local_conn.get_active_siblings(primary_id, config.node_id).await.unwrap_or_default();

            let hooks = CliSwitchoverHooks {
                transport: &ctx.transport,
                remote_user: config.ssh.remote_user.clone(),
            };
            let req = SwitchoverRequest {
                local_node_id: config.node_id,
                primary_node_id: primary_id,
                force,
                always_promote: *always_promote,
                siblings_follow: *siblings_follow,
                repmgrd_no_pause: *repmgrd_no_pause,
                repmgrd_force_unpause: *repmgrd_force_unpause,
                force_rewind: force_rewind.clone(),
            };

            let local_features = Features::for_version(local_conn.server_version().await?);
            let local_host = host_from_conninfo(&local_rec.conninfo, &local_rec.node_name).to_string();
            let mechanism = choose_mechanism(None, local_features.has_sql_promote_function);

            let result = switchover::run_switchover(
                &local_conn,
                &primary_record,
                &siblings,
                &hooks,
                &config.timeouts,
                || {
                    invoke_promotion(
                        &ctx.transport,
                        &config.ssh.remote_user,
                        &local_host,
                        &config.pg_bindir,
                        &config.data_directory,
                        &local_conn,
                        &mechanism,
                    )
                },
                &req,
            )
            .await;

            if *siblings_follow {
                let new_primary = local_conn.get_node(config.node_id).await?;
                repctl_core::siblings::reconfigure_siblings(
                    &ctx.transport,
                    &config.ssh.remote_user,
                    &new_primary,
                    &siblings,
                    |_| true,
                )
                .await;
            }

            tracing::info!(?result, "switchover finished");
            let exit_code = result.exit_code();
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
    }
}

/// Pulls the `host=` component out of a `key=value key=value` conninfo
/// string, falling back to `default` when it's absent (e.g. a conninfo
/// that relies on a service file or `PGHOST`).
fn host_from_conninfo<'a>(conninfo: &'a str, default: &'a str) -> &'a str {
    conninfo
        .split_whitespace()
        .find_map(|kv| kv.strip_prefix("host="))
        .unwrap_or(default)
}

/// Carries out the chosen [`PromotionMechanism`] (spec.md §4.8 step 2).
/// `promote::promote`/`switchover::run_switchover` keep their invoke
/// closures synchronous, so the actual SSH/SQL work is bridged onto the
/// current multi-thread runtime with `block_in_place`.
#[allow(clippy::too_many_arguments)]
fn invoke_promotion(
    transport: &SshTransport,
    remote_user: &str,
    host: &str,
    pg_bindir: &Path,
    data_directory: &Path,
    conn: &dyn DbConn,
    mechanism: &promote::PromotionMechanism,
) -> std::result::Result<(), String> {
    tokio::task::block_in_place(|| {
        tokio::runtime::Handle::current().block_on(async move {
            match mechanism {
                promote::PromotionMechanism::ServiceCommand(cmd) => transport
                    .run_checked(host, remote_user, cmd)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                promote::PromotionMechanism::SqlPromote => conn.promote_to_primary().await.map_err(|e| e.to_string()),
                promote::PromotionMechanism::ServiceControlAction => {
                    let cmd = format!(
                        "{} promote -D '{}'",
                        pg_bindir.join("pg_ctl").display(),
                        data_directory.display()
                    );
                    transport
                        .run_checked(host, remote_user, &cmd)
                        .await
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                }
            }
        })
    })
}

/// Production [`SwitchoverHooks`]: every network-crossing step goes through
/// SSH and the node-check protocol's `--key=value` reports.
struct CliSwitchoverHooks<'a> {
    transport: &'a SshTransport,
    remote_user: String,
}

#[async_trait::async_trait]
impl SwitchoverHooks for CliSwitchoverHooks<'_> {
    async fn probe_ssh(&self, host: &str) -> bool {
        self.transport.probe(host, &self.remote_user).await.is_ok()
    }

    async fn stop_primary(&self, host: &str) -> std::result::Result<(), String> {
        self.transport
            .run_checked(host, &self.remote_user, "pg_ctl stop -m fast")
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn is_shutdown_cleanly(&self, host: &str) -> repctl_types::CheckpointRecord {
        match self
            .transport
            .run_checked(host, &self.remote_user, "repctl node status --is-shutdown-cleanly")
            .await
        {
            Ok(out) => repctl_protocol::Report::parse_shutdown_status(&out.stdout),
            Err(_) => repctl_types::CheckpointRecord {
                last_checkpoint_lsn: repctl_types::Lsn::ZERO,
                shutdown_state: repctl_types::ShutdownState::Unknown,
            },
        }
    }

    async fn ping(&self, host: &str) -> bool {
        self.transport.probe(host, &self.remote_user).await.is_ok()
    }

    async fn rejoin(&self, host: &str, local_conninfo: &str, force_rewind: Option<&str>) -> std::result::Result<(), String> {
        let mut cmd = format!("repctl node rejoin -d '{local_conninfo}'");
        if let Some(path) = force_rewind {
            cmd.push_str(&format!(" --force-rewind={path}"));
        }
        self.transport
            .run_checked(host, &self.remote_user, &cmd)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn pause_daemon(&self, node: &NodeRecord) -> std::result::Result<bool, String> {
        let host = host_from_conninfo(&node.conninfo, &node.node_name);
        self.transport
            .run_checked(host, &self.remote_user, "repctl daemon pause")
            .await
            .map(|_| false)
            .map_err(|e| e.to_string())
    }

    async fn unpause_daemon(&self, node: &NodeRecord) -> std::result::Result<(), String> {
        let host = host_from_conninfo(&node.conninfo, &node.node_name);
        self.transport
            .run_checked(host, &self.remote_user, "repctl daemon unpause")
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn replication_connection_ok(&self, primary_host: &str, _candidate_node_id: i32) -> bool {
        match self
            .transport
            .run_checked(primary_host, &self.remote_user, "repctl node check --replication-connection")
            .await
        {
            Ok(out) => matches!(
                repctl_protocol::Report::parse_replication_connection(&out.stdout),
                repctl_protocol::ReplicationConnectionStatus::Ok
            ),
            Err(_) => false,
        }
    }
}
