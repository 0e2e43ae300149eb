//! EcoTrace CLI: command-line client for the EcoTrace traceability API.
//!
//! Configuration comes from the environment (see `ClientConfig::from_env`).
//! `ecotrace login` prints the `ECOTRACE_*` lines to put in `.env`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use ecotrace_api_client::{ApiClient, Auth};
use ecotrace_cli::{
    env_lines, init_tracing, print_json, render_public_batch, render_sidebar, render_stats,
    render_transport_table, OutputFormat,
};
use ecotrace_core::models::{
    AuthContext, DraftField, LoginRequest, RegisterRequest, Role, TransportQuery,
};
use ecotrace_core::{authorize, parse_batch_reference, Access, ClientConfig, Route};
use ecotrace_intake::{resolve_batch, WorkflowController, WorkflowState};
use ecotrace_scanner::{DirectoryFrameSource, RqrrDecoder, ScannerLifecycle};

#[derive(Parser)]
#[command(name = "ecotrace", about = "EcoTrace traceability CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and print the credentials for `.env`
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and print the credentials for `.env`
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// consumer, manufacturer, transporter or lab
        #[arg(long)]
        role: Role,
    },
    /// Show the screens available to the signed-in role
    Routes,
    /// Check whether the signed-in role may open a client path
    Open {
        /// Client path, e.g. /transporter/create?batch=9
        path: String,
    },
    /// Resolve a batch id or QR payload to its available origins
    Resolve {
        /// Batch id or any text containing batch/<id>
        batch: String,
    },
    /// Record a transport leg (transporter only)
    Intake(IntakeArgs),
    /// Transport history of the signed-in transporter
    Transports {
        #[command(subcommand)]
        sub: TransportCommands,
    },
    /// Public trust summary of a batch
    Batch {
        /// Batch id or any text containing batch/<id>
        batch: String,
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
enum TransportCommands {
    /// List transports
    List {
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "10")]
        limit: u32,
        /// Filter by origin, destination or batch
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Get a single transport by ID
    Get { id: i64 },
    /// Totals for distance and emission
    Stats {
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(clap::Args)]
struct IntakeArgs {
    /// Batch id or QR payload; skips scanning
    #[arg(long, conflicts_with_all = ["image", "camera_dir"])]
    batch: Option<String>,
    /// Image file containing the batch QR code
    #[arg(long, conflicts_with = "camera_dir")]
    image: Option<PathBuf>,
    /// Frame directory of the capture device (defaults to ECOTRACE_CAMERA_DIR)
    #[arg(long)]
    camera_dir: Option<PathBuf>,
    /// Origin to ship from; defaults to the first one the batch offers
    #[arg(long)]
    origin: Option<String>,
    #[arg(long)]
    destination: String,
    #[arg(long)]
    distance_km: String,
    #[arg(long)]
    fuel_type: String,
    #[arg(long)]
    vehicle_type: String,
    #[arg(long)]
    notes: String,
}

/// Accept a bare id as well as any text carrying a batch reference.
fn batch_id_arg(raw: &str) -> anyhow::Result<i64> {
    if let Ok(id) = raw.trim().parse::<i64>() {
        return Ok(id);
    }
    parse_batch_reference(raw).map_err(|e| anyhow!("{}: '{}'", e, raw))
}

fn require_auth(config: &ClientConfig) -> anyhow::Result<AuthContext> {
    config
        .auth_context()?
        .ok_or_else(|| anyhow!("Not signed in. Run `ecotrace login` and set ECOTRACE_TOKEN / ECOTRACE_ROLE"))
}

fn require_route(auth: &AuthContext, route: &Route) -> anyhow::Result<()> {
    authorize(Some(auth), route)
        .into_result()
        .map_err(|denied| anyhow!("{} is not available to a {} ({})", route, auth.role, denied))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("Invalid ECOTRACE_* configuration")?;
    init_tracing(config.log_format);

    let cli = Cli::parse();
    let client = ApiClient::from_config(&config).context("Failed to create API client")?;

    match cli.command {
        Commands::Login { email, password } => {
            let response = client
                .with_auth(Auth::Anonymous)
                .login(&LoginRequest { email, password })
                .await?;
            let auth = response.into_context();
            eprintln!("Welcome, {}. Landing page: {}", auth.display_name, auth.role.dashboard_path());
            print!("{}", env_lines(&auth));
        }
        Commands::Register {
            name,
            email,
            password,
            role,
        } => {
            let response = client
                .with_auth(Auth::Anonymous)
                .register(&RegisterRequest {
                    name,
                    email,
                    password,
                    role,
                })
                .await?;
            print!("{}", env_lines(&response.into_context()));
        }
        Commands::Routes => {
            let auth = require_auth(&config)?;
            print!("{}", render_sidebar(&auth));
        }
        Commands::Open { path } => {
            let route = Route::parse(&path).ok_or_else(|| anyhow!("Unknown path '{}'", path))?;
            let auth = config.auth_context()?;
            match authorize(auth.as_ref(), &route) {
                Access::Granted => println!("granted {}", route),
                Access::RedirectToLogin => println!("redirect {}", Route::Login),
                Access::RedirectTo(target) => println!("redirect {}", target),
            }
        }
        Commands::Resolve { batch } => {
            let auth = require_auth(&config)?;
            let batch_id = batch_id_arg(&batch)?;
            require_route(&auth, &Route::CreateTransport { batch: Some(batch_id) })?;
            let resolved = resolve_batch(&client, batch_id).await?;
            print_json(&resolved)?;
        }
        Commands::Intake(args) => {
            let auth = require_auth(&config)?;
            run_intake(&config, client.with_auth(Auth::from(&auth)), auth, args).await?;
        }
        Commands::Transports { sub } => {
            let auth = require_auth(&config)?;
            require_route(&auth, &Route::TransportList)?;
            match sub {
                TransportCommands::List {
                    page,
                    limit,
                    search,
                    format,
                } => {
                    let query = TransportQuery {
                        page: page.max(1),
                        limit,
                        search,
                    };
                    let result = client.my_transports(&query).await?;
                    match format {
                        OutputFormat::Json => print_json(&result)?,
                        OutputFormat::Table => {
                            print!("{}", render_transport_table(&result, query.skip()))
                        }
                    }
                }
                TransportCommands::Get { id } => {
                    let record = client.transport(id).await?;
                    print_json(&record)?;
                }
                TransportCommands::Stats { format } => {
                    let stats = client.transport_stats().await?;
                    match format {
                        OutputFormat::Json => print_json(&stats)?,
                        OutputFormat::Table => print!("{}", render_stats(&stats)),
                    }
                }
            }
        }
        Commands::Batch { batch, format } => {
            let batch_id = batch_id_arg(&batch)?;
            let view = client
                .with_auth(Auth::Anonymous)
                .public_batch(batch_id)
                .await?;
            match format {
                OutputFormat::Json => print_json(&view)?,
                OutputFormat::Table => {
                    let auth = config.auth_context()?;
                    print!("{}", render_public_batch(batch_id, &view, auth.as_ref()))
                }
            }
        }
    }

    Ok(())
}

async fn run_intake(
    config: &ClientConfig,
    client: ApiClient,
    auth: AuthContext,
    args: IntakeArgs,
) -> anyhow::Result<()> {
    let scanner = ScannerLifecycle::new(Arc::new(RqrrDecoder), config.scan_fps);
    let mut controller = WorkflowController::new(Arc::new(client), auth, scanner).map_err(|denied| {
        anyhow!("Transport intake is for transporters only ({})", denied)
    })?;

    let result = drive_intake(config, &mut controller, args).await;
    // The camera is released on every exit path.
    controller.teardown().await;
    result
}

async fn drive_intake(
    config: &ClientConfig,
    controller: &mut WorkflowController,
    args: IntakeArgs,
) -> anyhow::Result<()> {
    if let Some(batch) = &args.batch {
        controller.enter(Some(batch_id_arg(batch)?)).await;
    } else if let Some(image) = &args.image {
        controller.scan_image_file(image).await;
    } else {
        let dir = args
            .camera_dir
            .clone()
            .or_else(|| config.camera_dir.clone())
            .ok_or_else(|| anyhow!("No acquisition method: pass --batch, --image or --camera-dir"))?;
        eprintln!("Scanning frames in {} (Ctrl-C to cancel)...", dir.display());

        if let Some(subscription) = controller
            .start_scan(Box::new(DirectoryFrameSource::new(dir)), async {})
            .await
        {
            let timeout = Duration::from_secs(config.scan_timeout_secs);
            tokio::select! {
                _ = controller.run_scan(subscription) => {}
                _ = tokio::signal::ctrl_c() => eprintln!("Scan cancelled"),
                _ = tokio::time::sleep(timeout) => eprintln!("No batch QR code seen within {}s", timeout.as_secs()),
            }
            controller.stop_scan().await;
        }
    }

    if controller.state() != WorkflowState::BatchResolved {
        let reason = controller
            .notice()
            .map(|n| n.message.clone())
            .unwrap_or_else(|| "No batch resolved".to_string());
        bail!(reason);
    }

    if let Some(batch) = controller.resolved_batch() {
        eprintln!(
            "Batch {} resolved; origins: {}",
            batch.batch_id,
            if batch.available_origins.is_empty() {
                "(none)".to_string()
            } else {
                batch.available_origins.join(", ")
            }
        );
    }

    if let Some(origin) = &args.origin {
        controller.select_origin(origin)?;
    }
    controller.update_field(DraftField::Destination, args.destination)?;
    controller.update_field(DraftField::DistanceKm, args.distance_km)?;
    controller.update_field(DraftField::FuelType, args.fuel_type)?;
    controller.update_field(DraftField::VehicleType, args.vehicle_type)?;
    controller.update_field(DraftField::Notes, args.notes)?;

    match controller.submit().await {
        Ok(record) => {
            if let Some(notice) = controller.notice() {
                eprintln!("{}", notice.message);
            }
            print_json(&record)
        }
        Err(_) => {
            let reason = controller
                .notice()
                .map(|n| n.message.clone())
                .unwrap_or_else(|| "Failed to create transport".to_string());
            bail!(reason)
        }
    }
}
