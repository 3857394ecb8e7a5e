//! image-tweak - upload, adjust and browse images.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_tweak::{
    config::{CheckConfig, Cli, Command, ServeConfig, TokenConfig, TokenOutputFormat},
    gallery::ImageService,
    processing::{HttpProcessor, ImageProcessor},
    server::{create_router, RouterConfig, SessionAuth},
    storage::{
        create_dynamodb_client, create_s3_client, DynamoMetadataStore, MetadataStore,
        S3ObjectStore,
    },
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Token(config) => run_token(config),
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    print_banner();

    info!("Configuration:");
    info!("  S3 bucket: {}", config.s3_bucket);
    if let Some(ref prefix) = config.s3_prefix {
        info!("  S3 prefix: {}", prefix);
    }
    if let Some(ref endpoint) = config.s3_endpoint {
        info!("  S3 endpoint: {}", endpoint);
    }
    info!("  Region: {}", config.s3_region);
    info!(
        "  DynamoDB table: {} (index {})",
        config.dynamodb_table, config.dynamodb_user_index
    );
    if let Some(ref endpoint) = config.dynamodb_endpoint {
        info!("  DynamoDB endpoint: {}", endpoint);
    }

    if config.auth_enabled {
        info!("  Auth: enabled");
    } else {
        warn!("  Auth: DISABLED - the user is taken from X-User-Id or ?user=");
        warn!("        Enable for production: --auth-enabled=true --auth-secret=<secret>");
    }

    match config.webhook_secret {
        Some(_) => info!("  Webhooks: enabled at /api/webhooks/auth"),
        None => info!("  Webhooks: disabled"),
    }

    match config.processing_endpoint {
        Some(ref endpoint) => info!(
            "  Processing: {} (timeout {}s, inline images: {})",
            endpoint, config.processing_timeout, config.processing_inline_images
        ),
        None => warn!("  Processing: no endpoint configured, uploads will not be processed"),
    }

    info!(
        "  Uploads: up to {} file(s), {}MB per request",
        config.max_files,
        config.max_upload_bytes / (1024 * 1024)
    );
    if let Some(target) = config.upload_resize {
        info!("  Resize: fill {}", target);
    }

    let s3_client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
    let dynamo_client =
        create_dynamodb_client(config.dynamodb_endpoint.as_deref(), &config.s3_region).await;

    info!("");
    info!("Connecting to S3...");
    match test_s3_connection(&s3_client, &config.s3_bucket).await {
        Ok(()) => info!("  Connected successfully"),
        Err(e) => {
            error!("  Failed to connect to S3: {}", e);
            error!("");
            error!("  Please check:");
            error!("    - Your AWS credentials are configured correctly");
            error!("    - The bucket '{}' exists and is accessible", config.s3_bucket);
            error!("    - The S3 endpoint is correct (if using MinIO/custom S3)");
            return ExitCode::FAILURE;
        }
    }

    info!("Connecting to DynamoDB...");
    match test_dynamodb_connection(&dynamo_client, &config.dynamodb_table).await {
        Ok(item_count) => {
            info!("  Connected successfully");
            info!("  Table holds ~{} upload record(s)", item_count);
        }
        Err(e) => {
            error!("  Failed to reach DynamoDB: {}", e);
            error!("");
            error!("  Please check:");
            error!("    - The table '{}' exists in {}", config.dynamodb_table, config.s3_region);
            error!("    - It has a '{}' index keyed by user", config.dynamodb_user_index);
            return ExitCode::FAILURE;
        }
    }

    let mut objects = S3ObjectStore::new(s3_client, config.s3_bucket.clone());
    if let Some(ref prefix) = config.s3_prefix {
        objects = objects.with_prefix(prefix.clone());
    }
    let metadata = DynamoMetadataStore::new(dynamo_client, config.dynamodb_table.clone())
        .with_user_index(config.dynamodb_user_index.clone());

    let mut service = ImageService::new(Arc::new(objects), Arc::new(metadata))
        .with_max_files(config.max_files)
        .with_resize(config.upload_resize);

    if let Some(ref endpoint) = config.processing_endpoint {
        let processor = match HttpProcessor::new(
            endpoint.clone(),
            Duration::from_secs(config.processing_timeout),
        ) {
            Ok(processor) => processor.with_inline_images(config.processing_inline_images),
            Err(e) => {
                error!("Failed to create processing client: {}", e);
                return ExitCode::FAILURE;
            }
        };
        let processor: Arc<dyn ImageProcessor> = Arc::new(processor);
        service = service.with_processor(processor);
    }

    let router_config = match build_router_config(&config) {
        Ok(router_config) => router_config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let router = create_router(service, router_config);

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    if config.auth_enabled {
        info!("    curl -H \"Authorization: Bearer $(image-tweak token <user>)\" http://{}/api/uploads", addr);
    } else {
        info!("    curl -H \"X-User-Id: <user>\" http://{}/api/uploads", addr);
    }
    info!("");
    info!("  Open the gallery in your browser:");
    info!("    open http://{}/gallery", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Print the startup banner.
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("");
    info!(" _                                _                       _    ");
    info!("(_)_ __ ___   __ _  __ _  ___    | |___      _____  __ _| | __");
    info!("| | '_ ` _ \\ / _` |/ _` |/ _ \\___| __\\ \\ /\\ / / _ \\/ _` | |/ /");
    info!("| | | | | | | (_| | (_| |  __/___| |_ \\ V  V /  __/ (_| |   < ");
    info!("|_|_| |_| |_|\\__,_|\\__, |\\___|    \\__| \\_/\\_/ \\___|\\__,_|_|\\_\\");
    info!("                   |___/                                       ");
    info!("                                                        v{}", version);
}

/// Test S3 connectivity.
async fn test_s3_connection(client: &aws_sdk_s3::Client, bucket: &str) -> Result<(), String> {
    client
        .head_bucket()
        .bucket(bucket)
        .send()
        .await
        .map_err(|e| format!("{}", e))?;
    Ok(())
}

/// Test DynamoDB connectivity and return the approximate item count.
async fn test_dynamodb_connection(
    client: &aws_sdk_dynamodb::Client,
    table: &str,
) -> Result<i64, String> {
    let result = client
        .describe_table()
        .table_name(table)
        .send()
        .await
        .map_err(|e| format!("{}", e))?;

    Ok(result
        .table()
        .and_then(|t| t.item_count())
        .unwrap_or_default())
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "image_tweak=debug,tower_http=debug"
    } else {
        "image_tweak=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> Result<RouterConfig, String> {
    let mut router_config = if config.auth_enabled {
        RouterConfig::new(config.auth_secret_or_empty())
    } else {
        RouterConfig::without_auth()
    };

    router_config = router_config
        .with_cache_max_age(config.cache_max_age)
        .with_max_upload_bytes(config.max_upload_bytes);

    if let Some(ref secret) = config.webhook_secret {
        router_config = router_config
            .with_webhook_secret(secret)
            .map_err(|e| e.to_string())?;
    }

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    Ok(router_config.with_tracing(!config.no_tracing))
}

// =============================================================================
// Token Command
// =============================================================================

fn run_token(config: TokenConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let expiry = now.saturating_add(config.ttl);

    let auth = SessionAuth::new(&config.secret);
    let token = auth.issue_with_expiry(&config.user_id, expiry);

    match config.format {
        TokenOutputFormat::Token => println!("{}", token),
        TokenOutputFormat::Header => println!("Authorization: Bearer {}", token),
        TokenOutputFormat::Json => {
            let json = serde_json::json!({
                "token": token,
                "user": config.user_id,
                "expiry": expiry,
                "ttl": config.ttl,
            });
            match serde_json::to_string_pretty(&json) {
                Ok(text) => println!("{}", text),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("image-tweak Configuration Check");
    println!("═══════════════════════════════");
    println!();

    let bucket = match config.resolve_bucket() {
        Ok(b) => {
            println!("✓ Bucket: {}", b);
            b
        }
        Err(e) => {
            println!("✗ Bucket: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(ref endpoint) = config.s3_endpoint {
        println!("✓ S3 endpoint: {}", endpoint);
    }
    println!("✓ Table: {}", config.dynamodb_table);
    if let Some(ref endpoint) = config.dynamodb_endpoint {
        println!("✓ DynamoDB endpoint: {}", endpoint);
    }
    println!("✓ Region: {}", config.s3_region);
    println!();

    print!("Testing S3 connection... ");
    let s3_client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
    match test_s3_connection(&s3_client, &bucket).await {
        Ok(()) => println!("✓ success"),
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            println!("  - Your AWS credentials are configured correctly");
            println!("  - The bucket '{}' exists and is accessible", bucket);
            if config.s3_endpoint.is_some() {
                println!("  - The S3 endpoint is correct and reachable");
            }
            return ExitCode::FAILURE;
        }
    }

    print!("Testing DynamoDB connection... ");
    let dynamo_client =
        create_dynamodb_client(config.dynamodb_endpoint.as_deref(), &config.s3_region).await;
    match test_dynamodb_connection(&dynamo_client, &config.dynamodb_table).await {
        Ok(item_count) => {
            println!("✓ success");
            println!("  ~{} upload record(s)", item_count);
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("  The table '{}' must exist with a '{}' index.", config.dynamodb_table, config.dynamodb_user_index);
            return ExitCode::FAILURE;
        }
    }

    if let Some(ref user) = config.user {
        println!();
        println!("Uploads for '{}':", user);
        println!("─────────────────");

        let store = DynamoMetadataStore::new(dynamo_client, config.dynamodb_table.clone())
            .with_user_index(config.dynamodb_user_index.clone());

        match store.records_for_user(user).await {
            Ok(records) if records.is_empty() => println!("  (no uploads found)"),
            Ok(records) => {
                for record in &records {
                    println!(
                        "  {}  {}  {} image(s)",
                        record.start_time,
                        record.upload_id,
                        record.image_name.len()
                    );
                }
                println!();
                println!("Total: {} upload(s)", records.len());
            }
            Err(e) => {
                println!("  Error querying uploads: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    println!();
    println!("═══════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}
