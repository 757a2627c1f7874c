//! CLI command handler: resolve settings, then run the collector on a fixed interval until Ctrl+C.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::time::Duration;

use crate::backend::{build_backends, build_cache};
use crate::collector::Collector;
use crate::engine::arg_parser::Cli;
use crate::engine::filters::{allow_all, generic_file_filter};
use crate::engine::tools::check_root_and_canonicalize;
use crate::error::CollectError;
use crate::utils::colly_toml::{
    apply_file_to_opts, load_colly_toml, parse_cache_backend, parse_walk_strategy,
};
use crate::utils::{parse_human_size, setup_logging};
use crate::{BackendOpts, Opts};

/// Overwrite a settings field when the flag was given.
macro_rules! apply_cli_opt {
    ($cli:expr, $opts:expr, $cli_field:ident => $opts_field:ident) => {
        if let Some(v) = $cli.$cli_field.clone() {
            $opts.$opts_field = v;
        }
    };
}

/// Defaults, then the config file, then CLI flags.
pub fn build_opts(cli: &Cli) -> Result<(Opts, BackendOpts)> {
    let mut opts = Opts::default();
    let mut backend = BackendOpts::default();
    if let Some(file) = load_colly_toml(&cli.config_path())? {
        apply_file_to_opts(&file, &mut opts, &mut backend)?;
    }

    if let Some(ref dir) = cli.dir {
        opts.collect_dir = dir.clone();
    }
    apply_cli_opt!(cli, backend, redis_host => redis_host);
    apply_cli_opt!(cli, backend, redis_port => redis_port);
    apply_cli_opt!(cli, backend, redis_db => redis_db);
    if let Some(ref pw) = cli.redis_password {
        backend.redis_password = Some(pw.clone());
    }
    apply_cli_opt!(cli, backend, dest_queue => dest_queue);
    apply_cli_opt!(cli, opts, dest_queue_limit => dest_queue_limit);
    apply_cli_opt!(cli, opts, max_reader => reader_workers);
    apply_cli_opt!(cli, opts, max_sender => sender_workers);
    if let Some(ref limit) = cli.file_limit {
        opts.file_max_size = parse_human_size(limit)?;
    }
    apply_cli_opt!(cli, opts, allow_empty => allow_empty);
    apply_cli_opt!(cli, opts, read_wait_time => read_wait_secs);
    apply_cli_opt!(cli, opts, reserve_file => reserve_file);
    apply_cli_opt!(cli, opts, cache_timeout => cache_timeout_secs);
    if let Some(ref b) = cli.cache_backend {
        backend.cache_backend = parse_cache_backend(b)?;
    }
    if let Some(ref w) = cli.walk {
        opts.walk_strategy = parse_walk_strategy(w)?;
    }
    apply_cli_opt!(cli, opts, follow_links => follow_links);
    apply_cli_opt!(cli, opts, strict => strict_walk);
    if let Some(secs) = cli.interval {
        opts.scan_interval = Duration::from_secs(secs);
    }
    apply_cli_opt!(cli, opts, verbose => verbose);
    if let Some(ref p) = cli.log_file {
        opts.log_file = Some(p.clone());
    }
    backend.dry_run = cli.dry_run;

    anyhow::ensure!(opts.dest_queue_limit > 0, "dest queue limit must be positive");
    anyhow::ensure!(opts.read_wait_secs >= 0, "read wait time must not be negative");
    Ok((opts, backend))
}

/// Run the collector until Ctrl+C (or once with `--once`).
pub fn handle_run(cli: &Cli) -> Result<()> {
    let (mut opts, backend) = build_opts(cli)?;
    let log = setup_logging(opts.verbose, opts.log_file.as_deref())?;
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );

    if cli.list_cache {
        let cache = build_cache(&backend)?;
        for path in cache.list().context("list cache")? {
            println!("{}", path);
        }
        return Ok(());
    }

    opts.collect_dir = check_root_and_canonicalize(&opts.collect_dir)?;
    let (sender, cache) = build_backends(&opts, &backend)?;
    let interval = opts.scan_interval;
    let collector = Collector::new(opts, sender, cache, log)?;
    collector.walker().on_filter(generic_file_filter);
    collector.on_filter(allow_all);

    let cancel = collector.cancel_token();
    ctrlc::set_handler(move || cancel.cancel()).context("install Ctrl+C handler")?;
    let cancel = collector.cancel_token();

    info!(
        "Collecting {} every {:?}",
        collector.opts().collect_dir.display(),
        interval
    );
    loop {
        let report = collector.send_flow();
        if cli.once {
            return match report.walk_error {
                Some(CollectError::WalkCanceled) | None => Ok(()),
                Some(e) => Err(e).context("collect run"),
            };
        }
        if cancel.wait_timeout(interval) {
            break;
        }
    }
    warn!(
        "Stopped after {} records sent",
        collector.dispatched_total()
    );
    Ok(())
}
