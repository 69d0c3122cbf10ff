//! Streaming straight from upstream
//!
//! Used for non-cacheable resources and for ranged requests the cache
//! cannot answer. Nothing on disk is read or written.

use tracing::debug;

use crate::app::fetch::config::FetchConfig;
use crate::app::fetch::copy::copy_stream;
use crate::app::fetch::sink::ClientSink;
use crate::app::models::{CacheStatus, Resource};
use crate::app::throttle::ThrottledStream;
use crate::app::upstream::{MirrorSelector, Upstream};
use crate::constants::headers;
use crate::errors::FetchResult;

pub(crate) async fn serve(
    upstream: &dyn Upstream,
    mirrors: &dyn MirrorSelector,
    resource: &Resource,
    client: &mut dyn ClientSink,
    config: &FetchConfig,
) -> FetchResult<CacheStatus> {
    let offset = client.requested_offset();
    let mut response = super::get_upstream(upstream, mirrors, &resource.uri, offset).await?;
    debug!(
        "PASSTHROUGH {} from offset {}: HTTP {}",
        resource.id, offset, response.status
    );

    client.set_status(response.status);
    client.set_header(headers::X_CACHE, headers::CACHE_PASSTHROUGH.to_string());

    let upstream_headers = &response.headers;
    if let Some(length) = upstream_headers.content_length {
        client.set_content_length(length);
    }
    if let Some(range) = upstream_headers.content_range {
        client.set_header(headers::CONTENT_RANGE, range.to_string());
    }
    let copied = [
        (headers::LAST_MODIFIED, &upstream_headers.last_modified),
        (headers::ETAG, &upstream_headers.etag),
        (headers::ACCEPT_RANGES, &upstream_headers.accept_ranges),
    ];
    for (name, value) in copied {
        if let Some(value) = value {
            client.set_header(name, value.clone());
        }
    }

    let mut writer = ThrottledStream::writer(client.body(), config.foreground_read_max_speed);
    copy_stream(
        &mut response.body,
        &mut writer,
        config.buffer_size,
        Some(config.network_timeout),
    )
    .await?;

    Ok(CacheStatus::Passthrough)
}
