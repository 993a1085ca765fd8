mod cli;

use std::process::ExitCode;

use clap::Parser;
use keel_core::kernel::bootstrap::LoadReport;
use keel_core::{AppConfig, Application, KernelError, PluginCatalog};
use log::{error, info};

use crate::cli::{CliArgs, Commands, ConfigArgs};

/// Every plugin entry point and host module this binary links in
fn catalog() -> PluginCatalog {
    let mut catalog = PluginCatalog::new().with_module(greeter_example::CLOCK_MODULE, greeter_example::clock_module);
    catalog.extend(core_logging::catalog());
    catalog.extend(greeter_example::catalog());
    catalog
}

async fn load_config(args: &ConfigArgs) -> Result<AppConfig, KernelError> {
    let config = match &args.config {
        Some(path) => AppConfig::load(path).await?,
        None => AppConfig::default(),
    };
    Ok(args.apply(config))
}

fn print_problems(load: &LoadReport) {
    for failure in &load.registration.failed {
        eprintln!("  ! {}: {}", failure.path.display(), failure.error);
    }
    for (_, errors) in &load.resolution.failed {
        for e in errors {
            eprintln!("  ! {}", e);
        }
    }
    if !load.cyclic.is_empty() {
        eprintln!("  ! disabled by dependency cycle: {}", load.cyclic.join(", "));
    }
}

fn print_plugins(app: &Application) {
    if app.registry().is_empty() {
        println!("  No plugins registered.");
        return;
    }
    for plugin in app.registry().iter() {
        let deps = if plugin.dependencies().is_empty() {
            String::new()
        } else {
            format!(" (requires {})", plugin.dependencies().join(", "))
        };
        println!("  - {} {} [{}]{}", plugin.name(), plugin.version(), plugin.state(), deps);
    }
}

async fn run(app: &mut Application, wait: bool) -> Result<(), KernelError> {
    println!("Starting {}...", app.config().name);
    let report = app.start().await?;
    print_problems(&report.load);
    println!("Started plugins in order: {}", report.start.succeeded.join(", "));
    print_plugins(app);

    if wait {
        println!("Running, press Ctrl-C to stop.");
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    }

    println!("Stopping...");
    app.stop().await?;
    println!("Stopped.");
    Ok(())
}

async fn list_plugins(app: &mut Application) -> Result<(), KernelError> {
    let load = app.prepare().await?;
    print_problems(&load);
    println!("Priority order: {}", load.priority.join(", "));
    print_plugins(app);
    Ok(())
}

async fn list_components(app: &mut Application) -> Result<(), KernelError> {
    let load = app.prepare().await?;
    print_problems(&load);
    app.initialize().await?;

    let injector = app.injector();
    for name in injector.names() {
        let Some(info) = injector.info(&name) else {
            continue;
        };
        let owner = info.plugin.as_deref().unwrap_or("core");
        let role = info.role.map(|r| format!(" role={}", r)).unwrap_or_default();
        println!("  - {} [{}] owner={}{}", info.name, info.kind, owner, role);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.ping {
        println!("pong");
        return ExitCode::SUCCESS;
    }

    // Records from configuration loading and discovery come before any
    // plugin is installed
    if let Err(e) = core_logging::install_subscriber() {
        eprintln!("Failed to set up logging: {}", e);
    }

    let config = match load_config(&args.config).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut app = Application::new(config, catalog());
    let outcome = match args.command.unwrap_or(Commands::Run { wait: false }) {
        Commands::Run { wait } => run(&mut app, wait).await,
        Commands::Plugins => list_plugins(&mut app).await,
        Commands::Components => list_components(&mut app).await,
    };

    match outcome {
        Ok(()) => {
            info!("{} exiting", app.config().name);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
