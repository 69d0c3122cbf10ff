//! Serving a complete cached file

use std::io::SeekFrom;

use tokio::io::AsyncSeekExt;
use tracing::debug;

use crate::app::fetch::config::FetchConfig;
use crate::app::fetch::copy::copy_stream;
use crate::app::fetch::sink::{format_http_date, ClientSink};
use crate::app::models::CacheStatus;
use crate::app::storage::ResourceHandle;
use crate::app::throttle::ThrottledStream;
use crate::app::upstream::ContentRange;
use crate::constants::headers;
use crate::errors::FetchResult;

/// Answer the client from the full file
///
/// Honours `If-Modified-Since` at whole-second precision and open-ended
/// byte ranges. The file is read at the foreground write ceiling.
pub(crate) async fn serve(
    full: &dyn ResourceHandle,
    client: &mut dyn ClientSink,
    config: &FetchConfig,
) -> FetchResult<CacheStatus> {
    let modified = full.modified().await?;
    let length = full.len().await?;

    client.set_header(headers::X_CACHE, headers::CACHE_HIT.to_string());
    client.set_header(headers::LAST_MODIFIED, format_http_date(modified));

    if let Some(since) = client.if_modified_since() {
        if modified.timestamp() <= since.timestamp() {
            debug!("{} not modified since {}", full.name(), since);
            client.set_status(304);
            return Ok(CacheStatus::NotModified);
        }
    }

    client.set_header(headers::ACCEPT_RANGES, "bytes".to_string());

    let offset = client.requested_offset();
    if offset > 0 && offset >= length {
        client.set_status(416);
        client.set_header(
            headers::CONTENT_RANGE,
            ContentRange::unsatisfied(length).to_string(),
        );
        client.set_content_length(0);
        return Ok(CacheStatus::Hit);
    }

    let mut file = full.open_read().await?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset)).await?;
        client.set_status(206);
        client.set_header(
            headers::CONTENT_RANGE,
            ContentRange::new(offset, length - 1, length).to_string(),
        );
    } else {
        client.set_status(200);
    }
    client.set_content_length(length - offset);

    debug!("HIT {} from offset {}", full.name(), offset);
    let mut reader = ThrottledStream::reader(file, config.foreground_write_max_speed);
    copy_stream(&mut reader, client.body(), config.buffer_size, None).await?;

    Ok(CacheStatus::Hit)
}
