use clap::Parser;
use std::net::Ipv4Addr;

use tracing::info;
use tracing_subscriber::EnvFilter;

// Import our library components
use knockwatch::{
    application::{cli::Args, service::KnockService},
    config::AppConfig,
    domain::entities::CaptureConfig,
    domain::errors::EngineError,
    domain::ports::validation::{KnockConfigValidator, ValidationSummary},
    infrastructure::factories::{create_container_with_config, DependencyContainer, FactoryConfig},
    Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let mut config = match args.config {
        Some(ref path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    args.apply_to(&mut config);

    init_tracing(args.log_level(&config.log_level));

    let mut container = create_container_with_config(FactoryConfig::from(&config));

    let validator = container.create_knock_config_validator();
    let summary = validator
        .validate_knock_config(&config.to_validation_config())
        .await?;
    print_validation(&summary);

    if args.check {
        return handle_check_command(&mut container, &summary);
    }

    if !summary.is_valid() {
        return Err("Invalid knock configuration".into());
    }

    handle_watch_command(&mut container, &config).await
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Console triggers own stdout
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_validation(summary: &ValidationSummary) {
    for result in summary.findings() {
        if result.is_valid() {
            eprintln!("⚠️  {}", result.message);
        } else {
            eprintln!("❌ {}", result.message);
        }

        for suggestion in &result.suggestions {
            eprintln!("   💡 {}", suggestion);
        }
    }
}

// Report tooling and configuration status without capturing
fn handle_check_command(
    container: &mut DependencyContainer,
    summary: &ValidationSummary,
) -> Result<()> {
    let tool = container.event_source().check_availability()?;

    match (tool.tshark_available, tool.tshark_version) {
        (true, Some(version)) => println!("tshark {} available", version),
        (true, None) => println!("tshark available"),
        (false, _) => println!("tshark not found"),
    }

    println!(
        "{} error(s), {} warning(s)",
        summary.error_count, summary.warning_count
    );

    if summary.is_valid() {
        println!("Configuration OK");
        Ok(())
    } else {
        Err("Invalid knock configuration".into())
    }
}

// Capture and run every configured knocker until Ctrl-C
async fn handle_watch_command(container: &mut DependencyContainer, config: &AppConfig) -> Result<()> {
    let local_address: Ipv4Addr = config
        .local_address
        .as_deref()
        .ok_or("A local address is required (--address or local_address)")?
        .parse()
        .map_err(|e| format!("Invalid local address: {}", e))?;

    let capture = CaptureConfig::new(
        &config.interface,
        local_address,
        config.snaplen,
        config.channel_capacity,
    )?;
    let live = capture.capture_type.is_live();

    let mut service = KnockService::new(container.event_source(), capture);
    for (spec, trigger_config) in config.knocker_specs()? {
        let trigger = container.create_trigger(&trigger_config, &spec.name)?;
        info!(knocker = %spec.name, sequence = %spec.sequence, "knocker configured");
        service = service.with_knocker(spec, trigger);
    }

    info!("Press Ctrl+C to stop");
    let report = service.run().await?;

    for (name, stats) in &report.engines {
        info!(
            knocker = %name,
            events = stats.events_seen,
            completions = stats.completions,
            resets = stats.resets,
            evictions = stats.evictions,
            "session summary"
        );
    }

    if report.stream_closed {
        if live {
            return Err(EngineError::StreamClosed.into());
        }
        info!("replay finished");
    }

    Ok(())
}
