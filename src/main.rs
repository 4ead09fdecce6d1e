//! rlvpn - Main entry point
//!
//! Parses the command line, builds the requested plan from the saved node
//! state and runs it with either the terminal progress view or headless
//! line output.

use anyhow::{Context, anyhow};
use rlvpn::cli::{Cli, Commands};
use rlvpn::engine::{ProgressBoard, Reporter};
use rlvpn::host::Host;
use rlvpn::layout::LOG_FILE;
use rlvpn::plans::{self, Plan, install, lit, lnd, prune, self_update, syncthing, unlock};
use rlvpn::process_guard::{self, CancelToken, ProcessGuard};
use rlvpn::state::{AppConfig, StateStore};
use rlvpn::trust::fetch::Arch;
use rlvpn::ui::{self, TerminalSession, headless, summary::NodeSummary};
use rlvpn::{sanity, version};
use std::fs::{self, OpenOptions};
use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Mutex;
use std::thread;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize tracing. While the terminal UI owns the screen logs go to
/// the log file, otherwise to stderr.
fn init_logger(to_file: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if to_file {
        match OpenOptions::new().create(true).append(true).open(LOG_FILE) {
            Ok(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).init(),
            // Without the file there is nowhere safe to write under the UI
            Err(_) => builder.with_writer(io::sink).init(),
        }
    } else {
        builder.with_writer(io::stderr).init();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    let tui = !cli.headless
        && io::stdout().is_terminal()
        && !matches!(cli.command, Some(Commands::Status));

    init_logger(tui);
    version::set_version(env!("CARGO_PKG_VERSION"));
    info!(version = version::version(), "rlvpn starting up");

    match run(cli, tui) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, tui: bool) -> anyhow::Result<bool> {
    let cancel = CancelToken::new();
    if let Err(e) = process_guard::init_signal_handlers(cancel.clone()) {
        warn!("Failed to initialize signal handlers: {}", e);
    }
    // Terminates any child still registered when run() returns
    let _guard = ProcessGuard::new();

    let host = Host::system();
    let cfg = StateStore::for_layout(host.layout()).load_or_default();

    let command = match cli.command {
        Some(Commands::Status) => {
            print!("{}", NodeSummary::collect(&cfg, &host).to_text());
            return Ok(true);
        }
        Some(command) => command,
        None if install::needs_install(&host) => {
            info!("No command specified and bitcoind is absent, starting install");
            Commands::Install {
                network: cfg.network,
                prune: cfg.prune_size,
                ssh_port: cfg.ssh_port,
            }
        }
        None => {
            let summary = NodeSummary::collect(&cfg, &host);
            if tui {
                let mut session = TerminalSession::enter().context("failed to open the terminal")?;
                ui::show_summary(&mut session, &summary)?;
            } else {
                print!("{}", summary.to_text());
            }
            return Ok(true);
        }
    };

    if command.is_mutating() {
        sanity::require_root()?;
    }
    sanity::run_preflight_checks(host.runner());
    let arch = Arch::host()?;

    let plan = build_plan(command, &cfg, &host, arch)?;
    run_plan(plan, &host, &cancel, tui)
}

fn build_plan(command: Commands, cfg: &AppConfig, host: &Host, arch: Arch) -> anyhow::Result<Plan> {
    debug!(?command, "building plan");
    let plan = match command {
        Commands::Install {
            network,
            prune,
            ssh_port,
        } => {
            let wanted = AppConfig {
                network,
                prune_size: prune,
                ssh_port,
                ..cfg.clone()
            };
            install::initial_install(&wanted, host, arch)
        }
        Commands::AddLnd { p2p } => {
            let public_ipv4 = lnd::discover_public_ipv4(host.runner(), p2p);
            lnd::add_lnd(cfg, host, arch, p2p, public_ipv4)?
        }
        Commands::AddLit => lit::add_lit(cfg, host, arch)?,
        Commands::AddSyncthing => syncthing::add_syncthing(cfg, host)?,
        Commands::Prune { gb } => prune::change_prune_size(cfg, host, gb)?,
        Commands::AutoUnlock { password_file } => {
            let password = fs::read_to_string(&password_file)
                .with_context(|| format!("cannot read {}", password_file.display()))?;
            let password = password.trim_end_matches(['\n', '\r']).to_string();
            unlock::enable_auto_unlock(cfg, host, password)?
        }
        Commands::SelfUpdate { version } => {
            let wanted = match version {
                Some(v) => v,
                None => self_update::latest_version(host.runner())?,
            };
            self_update::self_update(cfg, host, arch, &wanted)
        }
        Commands::Status => return Err(anyhow!("status does not build a plan")),
    };
    Ok(plan)
}

/// Execute `plan` on a worker thread while this thread shows its progress.
fn run_plan(plan: Plan, host: &Host, cancel: &CancelToken, tui: bool) -> anyhow::Result<bool> {
    let kind = plan.kind;
    if plan.is_empty() {
        println!("{}: nothing to do", kind);
    }

    let board = ProgressBoard::new(kind.to_string(), plan.step_names());
    let (reporter, rx) = Reporter::channel();
    let worker = {
        let host = host.clone();
        let cancel = cancel.clone();
        thread::Builder::new()
            .name("plan".into())
            .spawn(move || plans::execute(plan, &host, &reporter, &cancel))
            .context("failed to start the plan worker")?
    };

    let board = if tui {
        let mut session = TerminalSession::enter().context("failed to open the terminal")?;
        ui::show_progress(&mut session, &rx, board, cancel)?
    } else {
        headless::print_progress(&rx, board, &mut io::stdout().lock())?
    };

    let result = worker
        .join()
        .map_err(|_| anyhow!("plan worker panicked"))?;
    match result {
        Ok(_) => {
            info!(plan = %kind, "completed");
            if tui {
                println!("✓ {} complete", kind);
            }
            Ok(board.outcome.unwrap_or(true))
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("{} failed", kind))),
    }
}
