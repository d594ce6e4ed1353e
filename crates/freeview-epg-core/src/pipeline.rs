//! Run orchestration: dispatch, aggregate, dedupe, build.

#![allow(clippy::future_not_send)]

use futures::stream::{self, StreamExt};
use tracing::instrument;

use crate::context::RunContext;
use crate::dedupe::dedupe_programmes;
use crate::http::LocalHttpFetch;
use crate::model::{Channel, Programme};
use crate::providers::Source;
use crate::xmltv::build_xmltv;

/// Default number of channels fetched at once.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Fetches one channel through its adapter.
///
/// Unknown source tags and adapter errors are logged and yield no
/// programmes.
async fn fetch_channel(
    channel: &Channel,
    ctx: &RunContext<impl LocalHttpFetch + Sync>,
) -> Vec<Programme> {
    let source = match channel.src.parse::<Source>() {
        Ok(source) => source,
        Err(e) => {
            tracing::warn!(channel = %channel.xmltv_id, src = %channel.src, error = %e, "Skipping channel");
            return Vec::new();
        }
    };

    match source.fetch(channel, ctx).await {
        Ok(programmes) => {
            tracing::info!(
                channel = %channel.xmltv_id,
                %source,
                count = programmes.len(),
                "Channel fetched"
            );
            programmes
        }
        Err(e) => {
            tracing::error!(
                channel = %channel.xmltv_id,
                %source,
                error = %e,
                "Channel failed, dropping its programmes"
            );
            Vec::new()
        }
    }
}

/// Fetches every channel and concatenates the results in channel order.
///
/// Up to `concurrency` channels are in flight at once; the aggregate order
/// does not depend on completion order.
pub async fn collect_programmes(
    channels: &[Channel],
    ctx: &RunContext<impl LocalHttpFetch + Sync>,
    concurrency: usize,
) -> Vec<Programme> {
    let per_channel: Vec<Vec<Programme>> = stream::iter(channels)
        .map(|channel| fetch_channel(channel, ctx))
        .buffered(concurrency.max(1))
        .collect()
        .await;
    per_channel.into_iter().flatten().collect()
}

/// Produces the XMLTV document for `channels`.
///
/// # Errors
///
/// Returns an error only if the document cannot be serialized; upstream
/// failures never abort the run.
#[instrument(skip_all, fields(channels = channels.len(), concurrency = concurrency))]
pub async fn build_guide(
    channels: &[Channel],
    ctx: &RunContext<impl LocalHttpFetch + Sync>,
    concurrency: usize,
) -> anyhow::Result<Vec<u8>> {
    let programmes = collect_programmes(channels, ctx, concurrency).await;
    let total = programmes.len();
    let deduped = dedupe_programmes(programmes);
    tracing::info!(
        total,
        unique = deduped.len(),
        "Aggregated programmes"
    );
    build_xmltv(channels, &deduped, ctx.tz())
}
