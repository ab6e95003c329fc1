// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lookalike status` command implementation.
//!
//! Reports where the database lives, how large it is, and how many images
//! and similarity pairs it holds. A missing database is reported, not
//! created.

use std::path::Path;

use lookalike_config::StorageConfig;
use lookalike_core::LookalikeError;
use lookalike_storage::ImageStore;
use lookalike_storage::queries::{images, similar};
use serde::Serialize;
use tracing::debug;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub database_path: String,
    pub exists: bool,
    pub size_bytes: Option<u64>,
    pub images: Option<i64>,
    pub similar_pairs: Option<i64>,
    pub blocking_mode: bool,
}

/// Format a byte count with a binary unit.
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

async fn collect(config: &StorageConfig) -> Result<StatusResponse, LookalikeError> {
    let path = Path::new(&config.database_path);
    let mut response = StatusResponse {
        database_path: config.database_path.clone(),
        exists: path.exists(),
        size_bytes: None,
        images: None,
        similar_pairs: None,
        blocking_mode: config.blocking_mode,
    };
    if !response.exists {
        debug!(path = %config.database_path, "database missing, skipping counts");
        return Ok(response);
    }

    let store = ImageStore::open(config.clone()).await?;
    let counts = async {
        let db = store.database();
        Ok::<_, LookalikeError>((images::image_count(db).await?, similar::pair_count(db).await?))
    }
    .await;
    store.shutdown().await?;
    let (image_count, pair_count) = counts?;

    response.images = Some(image_count);
    response.similar_pairs = Some(pair_count);
    response.size_bytes = std::fs::metadata(path).ok().map(|m| m.len());
    debug!(images = image_count, pairs = pair_count, "collected database status");
    Ok(response)
}

/// Run the `lookalike status` command.
pub async fn run_status(config: &StorageConfig, json: bool) -> Result<(), LookalikeError> {
    let status = collect(config).await?;

    if json {
        let rendered = serde_json::to_string_pretty(&status)
            .map_err(|e| LookalikeError::Internal(format!("failed to render status: {e}")))?;
        println!("{rendered}");
    } else {
        print_status(&status);
    }
    Ok(())
}

fn print_status(status: &StatusResponse) {
    println!();
    println!("  lookalike status");
    println!("  {}", "-".repeat(35));
    println!("    Database: {}", status.database_path);

    if !status.exists {
        println!("    State:    [FAIL] not initialized");
        println!();
        println!("  Create it with: lookalike init");
        println!();
        return;
    }

    if let Some(size) = status.size_bytes {
        println!("    Size:     {}", format_size(size));
    }
    println!("    Images:   {}", status.images.unwrap_or_default());
    println!("    Pairs:    {}", status.similar_pairs.unwrap_or_default());
    println!(
        "    Mode:     {}",
        if status.blocking_mode { "blocking" } else { "concurrent" }
    );
    println!();
}
