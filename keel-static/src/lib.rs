//! Static file serving for the Keel server.
//!
//! Serves files under a url prefix from a directory, with a small LRU
//! response cache, `If-Modified-Since` handling, single-range requests and
//! pre-compressed `.gz` variants for clients that accept gzip. Anything
//! the handler cannot serve delegates to the next handler in the chain.

mod lru;

pub use lru::LruCache;

use bytes::{Bytes, BytesMut};
use keel_http::constants;
use keel_http::date::format_http_date_from_unix;
use keel_http::{HttpResponse, LocalBoxFuture};
use keel_server::{HandlerResult, HttpContext, HttpHandler, Next};
use std::cell::RefCell;
use std::time::UNIX_EPOCH;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

const COMPRESSED_SUFFIX: &str = ".gz";
const RANGE_PREFIX: &str = "bytes=";
const STREAM_CHUNK_SIZE: usize = 65536;

pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 16;
pub const DEFAULT_MAX_CACHE_FILE_SIZE: usize = 1024 * 1024;

/// Cached file content plus its formatted modification time.
///
/// Cloned out of the cache before any await point; clones share the
/// content buffer.
#[derive(Clone)]
struct FileCacheEntry {
    content: Bytes,
    last_modified: Bytes,
}

impl FileCacheEntry {
    /// Reply 304 when the client's `If-Modified-Since` matches, else 200
    /// with the cached bytes.
    async fn reply(
        &self,
        response: &mut HttpResponse,
        mime: Bytes,
        if_modified_since: Bytes,
        cache_control: &Bytes,
        gzipped: bool,
    ) -> HandlerResult {
        if !cache_control.is_empty() {
            response.headers_mut().set_cache_control(cache_control.clone());
        }
        if !if_modified_since.is_empty() && if_modified_since == self.last_modified {
            response.set_status(constants::STATUS_304, constants::NOT_MODIFIED);
            response.headers_mut().set_content_type(mime);
            response.headers_mut().set_last_modified(if_modified_since);
            return Ok(());
        }
        response
            .headers_mut()
            .set_last_modified(self.last_modified.clone());
        if gzipped {
            response
                .headers_mut()
                .set_content_encoding(Bytes::from_static(constants::GZIP.as_bytes()));
        }
        response.reply(self.content.clone(), mime).await?;
        Ok(())
    }
}

/// Rejects traversal and other unsafe relative paths.
fn is_safe_path(path: &str) -> bool {
    if path.contains('\0') || path.contains('\\') || path.contains("//") {
        return false;
    }
    !path.split('/').any(|segment| segment == "..")
}

/// Parse `Range: bytes=from-to` or `bytes=from-`; anything else (including
/// multi-range) is treated as malformed.
fn parse_range(header: &[u8]) -> Option<(u64, Option<u64>)> {
    let text = std::str::from_utf8(header).ok()?;
    let spec = text.strip_prefix(RANGE_PREFIX)?;
    if spec.contains(',') {
        return None;
    }
    let (from, to) = spec.split_once('-')?;
    let from: u64 = from.trim().parse().ok()?;
    let to = match to.trim() {
        "" => None,
        text => Some(text.parse::<u64>().ok()?),
    };
    if matches!(to, Some(to) if from > to) {
        return None;
    }
    Some((from, to))
}

fn modified_time(metadata: &std::fs::Metadata) -> Bytes {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| format_http_date_from_unix(elapsed.as_secs() as i64))
        .unwrap_or_default()
}

/// Handler serving files under `url_base` from `path_base`.
pub struct StaticFileHandler {
    url_base: String,
    path_base: String,
    cache_control: Bytes,
    max_cache_file_size: usize,
    cache: RefCell<LruCache<String, FileCacheEntry>>,
}

impl StaticFileHandler {
    /// Create a handler with the default cache (16 entries, 1 MiB per
    /// file) and no `Cache-Control` header.
    pub fn new(url_base: impl Into<String>, path_base: impl Into<String>) -> Self {
        let mut url_base = url_base.into();
        let mut path_base = path_base.into();
        while url_base.ends_with('/') {
            url_base.pop();
        }
        while path_base.ends_with('/') {
            path_base.pop();
        }
        Self {
            url_base,
            path_base,
            cache_control: Bytes::new(),
            max_cache_file_size: DEFAULT_MAX_CACHE_FILE_SIZE,
            cache: RefCell::new(LruCache::new(DEFAULT_MAX_CACHE_ENTRIES)),
        }
    }

    /// `Cache-Control` value sent with every served file.
    pub fn with_cache_control(mut self, value: impl Into<Bytes>) -> Self {
        self.cache_control = value.into();
        self
    }

    /// Cache capacity in entries; zero disables the cache.
    pub fn with_max_cache_entries(self, entries: usize) -> Self {
        self.cache.replace(LruCache::new(entries));
        self
    }

    /// Largest file size eligible for caching.
    pub fn with_max_cache_file_size(mut self, size: usize) -> Self {
        self.max_cache_file_size = size;
        self
    }

    /// Drop all cached file contents.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    async fn serve<'a>(
        &'a self,
        context: &'a mut HttpContext,
        next: Next<'a>,
    ) -> HandlerResult {
        let path = context.request.uri().path().clone();
        let Ok(path_text) = std::str::from_utf8(&path) else {
            return next.invoke(context).await;
        };
        // the url-base check is redundant behind a router but cheap
        if !path_text.starts_with(&self.url_base) {
            return next.invoke(context).await;
        }
        let relative = &path_text[self.url_base.len()..];
        if relative.is_empty() || !relative.starts_with('/') {
            return next.invoke(context).await;
        }
        if !is_safe_path(relative) {
            return next.invoke(context).await;
        }

        let headers = context.request.headers();
        let accepts_gzip = headers
            .accept_encoding()
            .windows_contains(constants::GZIP.as_bytes());
        let range_header = headers.get_header(b"Range");
        let if_modified_since = headers.get_header(b"If-Modified-Since");
        let mime: Bytes = match mime_guess::from_path(relative).first_raw() {
            Some(mime) => Bytes::from_static(mime.as_bytes()),
            None => Bytes::from_static(constants::MIME_OCTET_STREAM.as_bytes()),
        };
        let file_path = format!("{}{}", self.path_base, relative);
        let compressed_path = format!("{file_path}{COMPRESSED_SUFFIX}");

        // range requests bypass the cache and the compressed variant
        if !range_header.is_empty() {
            return self
                .serve_ranged(context, next, &file_path, mime, if_modified_since, &range_header)
                .await;
        }

        // cache probe: compressed variant first when accepted; the entry is
        // cloned out so the cache borrow never spans an await
        let hit = {
            let mut cache = self.cache.borrow_mut();
            if accepts_gzip {
                cache
                    .get(&compressed_path)
                    .cloned()
                    .map(|entry| (entry, true))
                    .or_else(|| cache.get(&file_path).cloned().map(|entry| (entry, false)))
            } else {
                cache.get(&file_path).cloned().map(|entry| (entry, false))
            }
        };
        if let Some((entry, gzipped)) = hit {
            return entry
                .reply(
                    &mut context.response,
                    mime,
                    if_modified_since,
                    &self.cache_control,
                    gzipped,
                )
                .await;
        }

        // filesystem: compressed variant first when accepted
        let mut candidates: Vec<(String, bool)> = Vec::with_capacity(2);
        if accepts_gzip {
            candidates.push((compressed_path, true));
        }
        candidates.push((file_path, false));
        for (candidate, gzipped) in candidates {
            let Ok(metadata) = tokio::fs::metadata(&candidate).await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            return self
                .serve_from_disk(
                    context,
                    &candidate,
                    gzipped,
                    &metadata,
                    mime,
                    if_modified_since,
                )
                .await;
        }
        next.invoke(context).await
    }

    async fn serve_from_disk(
        &self,
        context: &mut HttpContext,
        path: &str,
        gzipped: bool,
        metadata: &std::fs::Metadata,
        mime: Bytes,
        if_modified_since: Bytes,
    ) -> HandlerResult {
        let response = &mut context.response;
        if !self.cache_control.is_empty() {
            response
                .headers_mut()
                .set_cache_control(self.cache_control.clone());
        }
        let last_modified = modified_time(metadata);
        if !if_modified_since.is_empty() && if_modified_since == last_modified {
            response.set_status(constants::STATUS_304, constants::NOT_MODIFIED);
            response.headers_mut().set_content_type(mime);
            response.headers_mut().set_last_modified(if_modified_since);
            return Ok(());
        }
        response.headers_mut().set_last_modified(last_modified.clone());
        if gzipped {
            response
                .headers_mut()
                .set_content_encoding(Bytes::from_static(constants::GZIP.as_bytes()));
        }
        let size = metadata.len() as usize;
        if size <= self.max_cache_file_size {
            // small file: buffer whole, fill the cache, reply from memory
            let content = Bytes::from(tokio::fs::read(path).await?);
            tracing::debug!(path, size, "cached static file");
            self.cache.borrow_mut().set(
                path.to_string(),
                FileCacheEntry {
                    content: content.clone(),
                    last_modified,
                },
            );
            response.reply(content, mime).await?;
            return Ok(());
        }
        // large file: stream in chunks under a fixed content length
        let mut file = tokio::fs::File::open(path).await?;
        response.set_status(constants::STATUS_200, constants::OK);
        response.headers_mut().set_content_type(mime);
        response
            .headers_mut()
            .set_content_length(Bytes::from(size.to_string()));
        let mut remaining = size;
        while remaining > 0 {
            let mut chunk = BytesMut::with_capacity(STREAM_CHUNK_SIZE.min(remaining));
            let read = file.read_buf(&mut chunk).await?;
            if read == 0 {
                break;
            }
            remaining -= read;
            context.response.write_body(chunk.freeze()).await?;
        }
        Ok(())
    }

    /// `206 Partial Content` for `bytes=from-to` and `bytes=from-`;
    /// malformed or unsatisfiable specs fall back to the full file.
    async fn serve_ranged<'a>(
        &'a self,
        context: &'a mut HttpContext,
        next: Next<'a>,
        path: &str,
        mime: Bytes,
        if_modified_since: Bytes,
        range_header: &Bytes,
    ) -> HandlerResult {
        let Ok(metadata) = tokio::fs::metadata(path).await else {
            return next.invoke(context).await;
        };
        if !metadata.is_file() {
            return next.invoke(context).await;
        }
        let last_modified = modified_time(&metadata);
        let response = &mut context.response;
        if !self.cache_control.is_empty() {
            response
                .headers_mut()
                .set_cache_control(self.cache_control.clone());
        }
        if !if_modified_since.is_empty() && if_modified_since == last_modified {
            response.set_status(constants::STATUS_304, constants::NOT_MODIFIED);
            response.headers_mut().set_content_type(mime);
            response.headers_mut().set_last_modified(if_modified_since);
            return Ok(());
        }
        response.headers_mut().set_last_modified(last_modified);
        let size = metadata.len();
        let range = parse_range(range_header).filter(|(from, _)| *from < size);
        let Some((from, to)) = range else {
            // malformed or unsatisfiable: the whole file, uncached
            let content = Bytes::from(tokio::fs::read(path).await?);
            context.response.reply(content, mime).await?;
            return Ok(());
        };
        let end = to.map_or(size - 1, |to| to.min(size - 1));
        let length = end - from + 1;
        let mut file = tokio::fs::File::open(path).await?;
        file.seek(std::io::SeekFrom::Start(from)).await?;
        let mut content = vec![0u8; length as usize];
        file.read_exact(&mut content).await?;
        response.set_status(constants::STATUS_206, constants::PARTIAL_CONTENT);
        response.headers_mut().set_header(
            Bytes::from_static(b"Content-Range"),
            Bytes::from(format!("bytes {from}-{end}/{size}")),
        );
        context.response.reply(content, mime).await?;
        Ok(())
    }
}

/// Case-sensitive substring search used for `Accept-Encoding: gzip`.
trait WindowsContains {
    fn windows_contains(&self, needle: &[u8]) -> bool;
}

impl WindowsContains for Bytes {
    fn windows_contains(&self, needle: &[u8]) -> bool {
        !needle.is_empty()
            && self.len() >= needle.len()
            && self.windows(needle.len()).any(|window| window == needle)
    }
}

impl HttpHandler for StaticFileHandler {
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        next: Next<'a>,
    ) -> LocalBoxFuture<'a, HandlerResult> {
        Box::pin(self.serve(context, next))
    }
}
