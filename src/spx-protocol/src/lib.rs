// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod codec;
pub mod types;
pub mod wire;

pub use codec::parse_command;
pub use types::{ClientCommand, ServerMessage};
pub use wire::{
    DecodedFrame, PanoramaMeta, SegmentMeta, SpectrumMeta, WireError, FLAG_PEAK_HOLD,
    FLAG_SWEEP_COMPLETE, FLAG_SWEEP_IN_PROGRESS, MSG_SPECTRUM, MSG_SWEEP_PANORAMA,
    MSG_SWEEP_SEGMENT, PROTOCOL_VERSION,
};
