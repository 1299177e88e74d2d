use crate::config::ClientConfig;
use crate::types::{SuitabilityError, SuitabilityResult};
use regex::Regex;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, OnceLock};

const CHUNK_SIZE: usize = 64 * 1024;

/// Where result rasters are read from
pub trait ResultSource: Send + Sync + 'static {
    fn open(&self, url: &str) -> SuitabilityResult<Box<dyn Read + Send>>;
}

/// Fetches results over HTTP, resolving relative URLs against the backend
pub struct HttpResultSource {
    client: reqwest::blocking::Client,
    config: ClientConfig,
}

impl HttpResultSource {
    pub fn new(config: ClientConfig) -> SuitabilityResult<Self> {
        Ok(Self {
            client: config.http_client()?,
            config,
        })
    }

    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            self.config.endpoint(url)
        }
    }
}

impl ResultSource for HttpResultSource {
    fn open(&self, url: &str) -> SuitabilityResult<Box<dyn Read + Send>> {
        let url = self.resolve(url);
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| SuitabilityError::NetworkFailure(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SuitabilityError::NetworkFailure(format!(
                "HTTP {} {}: {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or(""),
                url
            )));
        }
        Ok(Box::new(response))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A fetch in progress, or one answered from cache
pub struct FetchHandle {
    url: String,
    token: CancelToken,
    receiver: Receiver<SuitabilityResult<Arc<Vec<u8>>>>,
}

impl FetchHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Block until the fetch completes or is cancelled
    pub fn wait(self) -> SuitabilityResult<Arc<Vec<u8>>> {
        self.receiver
            .recv()
            .unwrap_or_else(|_| Err(SuitabilityError::Cancelled(self.url.clone())))
    }
}

/// Result rasters kept on disk between sessions
#[derive(Debug, Clone)]
pub struct ResultCache {
    cache_dir: PathBuf,
}

impl ResultCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Cache file for a result URL
    ///
    /// Named by the SHA-256 of the full URL, followed by the sanitized last
    /// path segment so cached rasters stay recognizable.
    pub fn path_for(&self, url: &str) -> PathBuf {
        use sha2::{Digest, Sha256};
        static UNSAFE: OnceLock<Option<Regex>> = OnceLock::new();

        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let digest = format!("{:x}", hasher.finalize());

        let segment = url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .unwrap_or_default();
        let segment = match UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").ok()) {
            Some(re) => re.replace_all(segment, "_").into_owned(),
            None => segment.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '.').collect(),
        };
        let segment: String = segment.trim_start_matches('.').chars().take(64).collect();

        if segment.is_empty() {
            self.cache_dir.join(digest)
        } else {
            self.cache_dir.join(format!("{}-{}", digest, segment))
        }
    }

    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        let path = self.path_for(url);
        let bytes = std::fs::read(&path).ok()?;
        log::debug!("Using cached result: {}", path.display());
        Some(bytes)
    }

    pub fn store(&self, url: &str, bytes: &[u8]) -> SuitabilityResult<PathBuf> {
        std::fs::create_dir_all(&self.cache_dir)?;
        let path = self.path_for(url);
        std::fs::write(&path, bytes)?;
        log::debug!("Cached result {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

type MemoryCache = Arc<Mutex<HashMap<String, Arc<Vec<u8>>>>>;

/// Downloads analysis results, one at a time
///
/// Opening a new result cancels the fetch still in flight. Fully fetched
/// results are reused from memory, then from the disk cache.
pub struct ResultFetcher<S: ResultSource> {
    source: Arc<S>,
    memory: MemoryCache,
    disk: Option<ResultCache>,
    in_flight: Option<CancelToken>,
}

impl<S: ResultSource> ResultFetcher<S> {
    pub fn new(source: S, disk: Option<ResultCache>) -> Self {
        Self {
            source: Arc::new(source),
            memory: Arc::new(Mutex::new(HashMap::new())),
            disk,
            in_flight: None,
        }
    }

    pub fn open(&mut self, url: &str) -> FetchHandle {
        if let Some(previous) = self.in_flight.take() {
            if !previous.is_cancelled() {
                log::info!("Cancelling previous result fetch");
                previous.cancel();
            }
        }

        let token = CancelToken::default();
        let (sender, receiver) = mpsc::channel();
        let handle = FetchHandle {
            url: url.to_string(),
            token: token.clone(),
            receiver,
        };

        if let Some(bytes) = self.cached(url) {
            let _ = sender.send(Ok(bytes));
            return handle;
        }

        self.in_flight = Some(token.clone());
        let source = Arc::clone(&self.source);
        let memory = Arc::clone(&self.memory);
        let disk = self.disk.clone();
        let url = url.to_string();

        std::thread::spawn(move || {
            let result = fetch(source.as_ref(), &url, &token).map(Arc::new);
            if let Ok(bytes) = &result {
                log::info!("Fetched result {} ({} bytes)", url, bytes.len());
                if let Some(disk) = &disk {
                    if let Err(e) = disk.store(&url, bytes) {
                        log::warn!("Failed to cache result {}: {}", url, e);
                    }
                }
                lock(&memory).insert(url.clone(), Arc::clone(bytes));
            }
            // The receiver may be gone if the caller dropped the handle
            let _ = sender.send(result);
        });

        handle
    }

    pub fn is_cached(&self, url: &str) -> bool {
        lock(&self.memory).contains_key(url)
    }

    fn cached(&self, url: &str) -> Option<Arc<Vec<u8>>> {
        if let Some(bytes) = lock(&self.memory).get(url) {
            log::debug!("Result already in memory: {}", url);
            return Some(Arc::clone(bytes));
        }
        let bytes = Arc::new(self.disk.as_ref()?.get(url)?);
        lock(&self.memory).insert(url.to_string(), Arc::clone(&bytes));
        Some(bytes)
    }
}

fn lock(memory: &MemoryCache) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Vec<u8>>>> {
    memory.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn fetch<S: ResultSource + ?Sized>(source: &S, url: &str, token: &CancelToken) -> SuitabilityResult<Vec<u8>> {
    let cancelled = || SuitabilityError::Cancelled(url.to_string());
    if token.is_cancelled() {
        return Err(cancelled());
    }

    let mut reader = source.open(url)?;
    let mut bytes = Vec::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        if token.is_cancelled() {
            log::debug!("Fetch of {} cancelled after {} bytes", url, bytes.len());
            return Err(cancelled());
        }
        let n = reader
            .read(&mut chunk)
            .map_err(|e| SuitabilityError::NetworkFailure(format!("Failed to read result {}: {}", url, e)))?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
    }
    Ok(bytes)
}
