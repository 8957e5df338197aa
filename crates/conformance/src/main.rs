use std::process::ExitCode;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use conformance::app::render_expected;
use conformance::app::render_summary;
use conformance::app::ConformanceRunner;
use conformance::app::RunSettings;
use conformance::config::load_expected_config;
use conformance::config::CheckConfigArgs;
use conformance::config::Cli;
use conformance::config::Commands;
use conformance::config::OutputFormat;
use conformance::config::RunArgs;
use conformance::k8s::KubeClusterState;
use conformance::k8s::KubeVirtWorkloads;
use conformance::kube_client;
use conformance::logging;
use tokio_util::sync::CancellationToken;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    setup_global_hooks();

    let cli = Cli::parse();
    let _guard = logging::init();

    match cli.command {
        Commands::Run(run_args) => run_conformance(*run_args).await,
        Commands::CheckConfig(check_config_args) => run_check_config(check_config_args).await,
    }
}

async fn run_conformance(run_args: RunArgs) -> Result<ExitCode> {
    tracing::info!("Starting gpu-conformance {}", &**version::VERSION);

    let expected = load_expected_config(&run_args.test_config).await?;
    let client = kube_client::init_kube_client(&run_args.cluster_config())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize Kubernetes client: {e:?}"))?;

    let cancellation_token = CancellationToken::new();
    {
        let token = cancellation_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, cancelling conformance run");
                token.cancel();
            }
        });
    }

    let settings = RunSettings {
        placement_mode: run_args.placement_mode,
        quantity_source: run_args.quantity_source,
        lifecycle: run_args.lifecycle_config(),
    };
    let runner = ConformanceRunner::new(
        KubeClusterState::new(client.clone()),
        KubeVirtWorkloads::new(client),
        expected,
        settings,
    )
    .with_cancellation(cancellation_token);

    let summary = runner.run(&run_args.selected_checks()).await;

    match run_args.output {
        OutputFormat::Text => print!("{}", render_summary(&summary)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("serialize summary failed")?
        ),
    }

    if summary.success {
        tracing::info!("Conformance run passed");
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::warn!("Conformance run failed");
        Ok(ExitCode::FAILURE)
    }
}

async fn run_check_config(check_config_args: CheckConfigArgs) -> Result<ExitCode> {
    let expected = load_expected_config(&check_config_args.test_config).await?;
    print!("{}", render_expected(&expected));
    Ok(ExitCode::SUCCESS)
}
