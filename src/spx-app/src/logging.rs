// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging.
///
/// Level resolution order: explicit `level` argument, then the `LOGLEVEL`
/// environment variable, then INFO.
pub fn init_logging(level: Option<&str>) {
    let resolved = level
        .and_then(|s| s.parse::<Level>().ok())
        .or_else(|| {
            std::env::var("LOGLEVEL")
                .ok()
                .and_then(|s| s.parse::<Level>().ok())
        })
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_target(false)
        .with_max_level(resolved)
        .init();
}
