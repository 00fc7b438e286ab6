use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, eyre};
use futures_util::future::join_all;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use media_transfer::application::{DownloadHandle, DownloadManager, PreparedImage, UploadCoordinator};
use media_transfer::domain::TransportPort;
use media_transfer::domain::entities::ImageCatalog;
use media_transfer::infrastructure::{
    AppConfig, CliArgs, Command, ConfigStore, JpegCompressor, MediaServerClient,
    MemoryImageCache,
};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry().with(filter).init();
    }

    Ok(())
}

struct Services {
    client: Arc<MediaServerClient>,
    downloads: Arc<DownloadManager>,
    uploads: UploadCoordinator,
}

fn create_services(config: &AppConfig) -> Result<Services> {
    let client = Arc::new(MediaServerClient::new(&config.server)?);
    let transport: Arc<dyn TransportPort> = client.clone();
    let cache = Arc::new(MemoryImageCache::new(
        config.cache.max_entries,
        config.cache.max_bytes,
    ));

    let downloads = Arc::new(
        DownloadManager::new(transport.clone())
            .with_base_url(client.base_url().clone())
            .with_cache(cache.clone()),
    );
    let compressor = JpegCompressor::new(
        config.compression.target_size,
        config.compression.min_quality,
    );
    let uploads = UploadCoordinator::new(downloads.clone(), transport, cache, compressor);

    Ok(Services {
        client,
        downloads,
        uploads,
    })
}

async fn list_images(services: &Services) -> Result<()> {
    let mut catalog = ImageCatalog::new();
    catalog.replace(services.client.list_images().await?);

    info!(count = catalog.len(), "Fetched image list");
    for entry in catalog.entries() {
        println!("{}", entry.url);
    }
    Ok(())
}

async fn download_images(services: &Services, urls: &[String], output: Option<&Path>) -> Result<()> {
    let output = output.map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    tokio::fs::create_dir_all(&output)
        .await
        .wrap_err_with(|| format!("failed to create {}", output.display()))?;

    let handles: Vec<DownloadHandle> = urls
        .iter()
        .map(|url| services.downloads.start_download(url))
        .collect();
    let outcomes = join_all(handles.into_iter().map(|handle| drive(handle, &output))).await;

    let failed = outcomes.iter().filter(|ok| !**ok).count();
    if failed > 0 {
        return Err(eyre!("{failed} of {} downloads failed", urls.len()));
    }
    Ok(())
}

async fn drive(mut handle: DownloadHandle, output: &Path) -> bool {
    let id = handle.id();
    let url = handle.url().to_string();

    while let Some(progress) = handle.next_progress().await {
        eprintln!("{id} {url}: {:>3.0}%", progress * 100.0);
    }

    match handle.wait().await {
        Ok(bytes) => {
            let path = output.join(file_name_for(&url));
            match tokio::fs::write(&path, &bytes).await {
                Ok(()) => {
                    println!("{url} -> {} ({} bytes)", path.display(), bytes.len());
                    true
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to write download");
                    eprintln!("{url}: {e}");
                    false
                }
            }
        }
        Err(e) => {
            eprintln!("{url}: {e}");
            false
        }
    }
}

fn file_name_for(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').find(|segment| !segment.is_empty()))
        .map_or_else(|| "download".to_string(), str::to_string)
}

async fn upload_image(
    services: &Services,
    file: Option<&Path>,
    url: Option<&str>,
    key: Option<&str>,
) -> Result<()> {
    let prepared: PreparedImage = match (file, url) {
        (Some(path), _) => {
            let raw = tokio::fs::read(path)
                .await
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            services.uploads.prepare_local(Bytes::from(raw), key).await?
        }
        (None, Some(url)) => services.uploads.load_source(url).await?,
        (None, None) => return Err(eyre!("either --file or --url is required")),
    };

    match prepared.quality {
        Some(quality) => info!(key = %prepared.key, quality, size = prepared.bytes.len(), "Prepared image"),
        None => info!(key = %prepared.key, size = prepared.bytes.len(), "Forwarding original bytes"),
    }

    let receipt = services.uploads.upload(prepared.bytes).await?;
    println!("{} ({})", receipt.message, prepared.key);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let store = match &args.config {
        Some(path) => ConfigStore::at(path),
        None => ConfigStore::open()?,
    };
    let mut config = store.load()?;
    config.merge_with_args(&args);

    init_logging(&config)?;

    info!(
        version = media_transfer::VERSION,
        config = %store.path().display(),
        "Starting media-transfer"
    );

    let services = create_services(&config)?;

    match &args.command {
        Command::List => list_images(&services).await,
        Command::Download { urls, output } => {
            download_images(&services, urls, output.as_deref()).await
        }
        Command::Upload { file, url, key } => {
            upload_image(&services, file.as_deref(), url.as_deref(), key.as_deref()).await
        }
    }
}
