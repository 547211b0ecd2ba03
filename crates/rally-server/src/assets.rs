//! Static client bundle.
//!
//! In production the router falls back to the files under `asset_dir`, and
//! any path without a matching file gets `index.html` so client-side routes
//! resolve. In development the bundle comes from an external dev server and
//! unmatched paths are plain 404s.

use std::path::Path;

use axum::Router;
use rally_settings::AssetMode;
use tower_http::services::{ServeDir, ServeFile};
use tracing::info;

/// Attach the asset fallback for `mode` to `router`.
pub fn with_assets(router: Router, mode: AssetMode, asset_dir: &Path) -> Router {
    match mode {
        AssetMode::Development => router,
        AssetMode::Production => {
            info!(asset_dir = %asset_dir.display(), "serving client bundle");
            let index = ServeFile::new(asset_dir.join("index.html"));
            router.fallback_service(ServeDir::new(asset_dir).fallback(index))
        }
    }
}
