use std::sync::Arc;
use story_video::animation_client::{HttpImageAnimator, HttpImageFetcher};
use story_video::config::AppConfig;
use story_video::handlers::{self, AppState};
use story_video::jobs::JobManager;
use story_video::pipeline::PipelineOrchestrator;
use story_video::speech_client::{ChunkedSpeechSynthesizer, HttpSpeechEngine};
use story_video::toolkit::{FfmpegToolkit, MediaToolkit};
use story_video::workspace::Workspace;

// How often finished jobs are checked against the retention window
const PRUNE_INTERVAL_SECS: u64 = 600;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging().expect("Failed to initialize logging");

    let config = AppConfig::from_env().expect("Invalid configuration");

    if let Err(e) = std::fs::create_dir_all(&config.storage_root) {
        tracing::warn!("Failed to create storage root {}: {}", config.storage_root.display(), e);
    } else {
        tracing::info!("Storage root ready: {}", config.storage_root.display());
    }

    match story_video::utils::check_ffmpeg_available().await {
        Ok(()) => tracing::info!("✅ ffmpeg available"),
        Err(e) => tracing::warn!("⚠️ {} - renders will fail until it is installed", e),
    }

    let workspace = Workspace::new(config.storage_root.clone());
    let toolkit: Arc<dyn MediaToolkit> = Arc::new(FfmpegToolkit::new(config.output_fps));

    let speech_engine = Arc::new(HttpSpeechEngine::new(config.speech_engine_url.clone()));
    let speech = Arc::new(ChunkedSpeechSynthesizer::new(
        speech_engine,
        config.speaker_profile.clone(),
    ));
    let animator = Arc::new(HttpImageAnimator::new(
        config.animator_url.clone(),
        toolkit.clone(),
    ));
    tracing::info!("🎙️ Speech engine: {}", config.speech_engine_url);
    tracing::info!("🎞️ Image animator: {}", config.animator_url);

    let orchestrator = PipelineOrchestrator::new(
        workspace.clone(),
        toolkit,
        speech,
        Arc::new(HttpImageFetcher::new()),
        animator,
        config.orchestrator_settings(),
    );
    let job_manager = Arc::new(JobManager::new(Arc::new(orchestrator), workspace.clone()));

    // Drop finished jobs and their run directories once they age out
    let pruning_manager = job_manager.clone();
    let retention = config.job_retention;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(PRUNE_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let pruned = pruning_manager.prune_finished(retention).await;
            if pruned > 0 {
                tracing::info!("🗑️ Pruned {} finished jobs", pruned);
            }
        }
    });

    let bind_addr = config.bind_addr.clone();
    let shared_state = Arc::new(AppState {
        job_manager,
        workspace,
        config,
    });
    let app = handlers::router(shared_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind listen address");
    tracing::info!("listening on {}", bind_addr);
    axum::serve(listener, app)
        .await
        .expect("Server error");
}

// Production-grade logging configuration
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "info,story_video=debug,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,story_video=info,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        // JSON logging for log aggregation
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!("🎬 Story video service starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Build mode: {}",
        if cfg!(debug_assertions) { "development" } else { "production" }
    );
    tracing::info!("Log level: {}", log_level);

    Ok(())
}
