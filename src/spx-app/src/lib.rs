// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod logging;
pub mod util;

pub use logging::init_logging;
pub use util::{sanitize_filename, storage_usage_bytes};
