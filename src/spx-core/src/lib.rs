// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod bridge;
pub mod detect;
pub mod dsp;
pub mod radio;
pub mod recording;
pub mod session;
pub mod sweep;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use bridge::{BridgeItem, SampleBlock, SampleBridge};
pub use dsp::config::{AveragingMode, DspConfig, Overlap, WindowKind};
pub use radio::freq::Freq;
pub use session::command::SessionCommand;
pub use session::request::SessionRequest;
pub use session::response::{ErrorKind, SessionError, SessionResult};
pub use session::state::{SessionMode, StatusSnapshot};
