use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::builder::NonEmptyStringValueParser;
use clap::{ArgAction, CommandFactory, Parser, ValueEnum};
use cs_switch::{SwitchConfig, SwitchError, SwitchOutcome, Switcher};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cs", version, about = "Switch kubeconfig context by AO cluster shortname")]
struct Cli {
    /// Cluster shortname as listed in the AO config
    cluster: Option<String>,

    /// Namespace for the context
    #[arg(short = 'n', long = "namespace", env = "CS_NAMESPACE", default_value = "aurora", value_parser = NonEmptyStringValueParser::new())]
    namespace: String,

    /// kubeconfig file (default is $HOME/.kube/config)
    #[arg(long = "kubeconfig", env = "CS_KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// aoconfig file (default is $HOME/.ao.json)
    #[arg(long = "aoconfig", env = "CS_AOCONFIG")]
    aoconfig: Option<PathBuf>,

    /// Operator name used in user/context names (default: current account)
    #[arg(long = "user", env = "CS_USER")]
    user: Option<String>,

    /// List clusters known to the AO config
    #[arg(short = 'l', long = "list", action = ArgAction::SetTrue, conflicts_with = "cluster")]
    list: bool,

    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t = Output::Human)]
    output: Output,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

impl Cli {
    fn switch_config(&self) -> SwitchConfig {
        let mut cfg = SwitchConfig::default();
        if let Some(p) = &self.kubeconfig { cfg.kubeconfig = p.clone(); }
        if let Some(p) = &self.aoconfig { cfg.registry = p.clone(); }
        cfg.operator = self.user.clone();
        cfg
    }
}

fn init_tracing() {
    let env = std::env::var("CS_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

fn main() {
    init_tracing();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help / --version are not failures
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if let Err(e) = run(cli) {
        let code = match e.downcast_ref::<SwitchError>() {
            Some(se) => {
                error!(kind = se.kind(), "switch failed");
                eprintln!("cs: {}", se);
                se.exit_code()
            }
            None => {
                error!(error = ?e, "cs failed");
                eprintln!("cs: {:#}", e);
                1
            }
        };
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let switcher = Switcher::new(cli.switch_config());

    if cli.list {
        let rows = switcher.clusters()?;
        match cli.output {
            Output::Human => {
                println!("{:<12} {:<36} {}", "NAME", "CLUSTER-ID", "URL");
                for r in rows {
                    let id = r.cluster_id.as_ref().map(|c| c.as_str()).unwrap_or("-");
                    println!("{:<12} {:<36} {}", r.shortname, id, r.url);
                }
            }
            Output::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        }
        return Ok(());
    }

    let Some(cluster) = cli.cluster.as_deref() else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    info!(cluster, namespace = %cli.namespace, "switch invoked");
    let outcome = switcher.switch(cluster, &cli.namespace)?;
    match cli.output {
        Output::Human => match &outcome {
            SwitchOutcome::Activated { context, created, .. } => {
                if *created {
                    println!("Created context \"{}\"", context);
                }
                println!("Switched to context \"{}\"", context);
            }
            SwitchOutcome::LoginRequired { cluster, login_url, .. } => {
                match login_url {
                    Some(url) => println!("Never seen cluster {} before. Please login at {}", cluster, url),
                    None => println!("Never seen cluster {} before. Please login", cluster),
                }
            }
        },
        Output::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }
    Ok(())
}
