//! Upstream schedule adapters.
//!
//! Each adapter turns one channel's upstream JSON into canonical
//! [`Programme`] records. Upstream failures are logged and skipped per
//! window, request or item; only a channel that cannot be served at all
//! yields an error.

#![allow(clippy::future_not_send)]

mod extract;
pub mod freesat;
pub mod freeview;
pub mod radiotimes;
pub mod sky;
pub mod youview;

use std::fmt;
use std::str::FromStr;

use crate::context::RunContext;
use crate::error::FetchError;
use crate::http::LocalHttpFetch;
use crate::model::{Channel, Programme};

/// Upstream source selected by a channel's `src` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Sky (`sky`).
    Sky,
    /// Freeview Play (`freeview`).
    Freeview,
    /// Freesat (`freesat`).
    Freesat,
    /// RadioTimes (`rt`).
    RadioTimes,
    /// YouView (`yv`).
    YouView,
}

impl Source {
    /// Canonical source tag.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Sky => "sky",
            Self::Freeview => "freeview",
            Self::Freesat => "freesat",
            Self::RadioTimes => "rt",
            Self::YouView => "yv",
        }
    }

    /// Fetches a channel's programmes with this source's adapter.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Configuration`] if the channel lacks an
    /// identifier the adapter requires.
    pub async fn fetch(
        self,
        channel: &Channel,
        ctx: &RunContext<impl LocalHttpFetch + Sync>,
    ) -> Result<Vec<Programme>, FetchError> {
        match self {
            Self::Sky => sky::fetch_programmes(channel, ctx).await,
            Self::Freeview => freeview::fetch_programmes(channel, ctx).await,
            Self::Freesat => freesat::fetch_programmes(channel, ctx).await,
            Self::RadioTimes => radiotimes::fetch_programmes(channel, ctx).await,
            Self::YouView => youview::fetch_programmes(channel, ctx).await,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Source {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sky" => Ok(Self::Sky),
            "freeview" => Ok(Self::Freeview),
            "freesat" => Ok(Self::Freesat),
            "rt" | "radiotimes" => Ok(Self::RadioTimes),
            "yv" | "youview" => Ok(Self::YouView),
            other => Err(FetchError::Configuration(format!(
                "unknown source tag '{other}'"
            ))),
        }
    }
}
