// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Binary WebSocket frames, big-endian throughout.
//!
//! Frame header (8 bytes, all messages):
//! `version:u8 = 0x02 | msg_type:u8 | flags:u16 | payload_len:u32`
//!
//! Each encoder performs a single allocation sized up front and never keeps
//! references to caller buffers past the call.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

pub const PROTOCOL_VERSION: u8 = 0x02;

pub const MSG_SPECTRUM: u8 = 0x01;
pub const MSG_SWEEP_SEGMENT: u8 = 0x03;
pub const MSG_SWEEP_PANORAMA: u8 = 0x04;

pub const FLAG_PEAK_HOLD: u16 = 0x0001;
pub const FLAG_SWEEP_COMPLETE: u16 = 0x0002;
pub const FLAG_SWEEP_IN_PROGRESS: u16 = 0x0004;

const FRAME_HEADER_LEN: usize = 8;
const SPECTRUM_HEADER_LEN: usize = 56;
const SEGMENT_HEADER_LEN: usize = 44;
const PANORAMA_HEADER_LEN: usize = 40;

/// Spectrum payload header fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumMeta {
    pub center_freq: f64,
    pub sample_rate: f64,
    pub bandwidth: f64,
    pub gain: f32,
    pub fft_size: u32,
    pub noise_floor: f32,
    pub peak_power: f32,
    pub peak_freq_offset: f32,
    pub timestamp: f64,
}

/// Sweep segment payload header fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentMeta {
    pub sweep_id: u32,
    pub segment_idx: u16,
    pub total_segments: u16,
    pub freq_lo: f64,
    pub freq_hi: f64,
    pub sweep_start: f64,
    pub sweep_end: f64,
}

/// Sweep panorama payload header fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanoramaMeta {
    pub sweep_id: u32,
    pub sweep_mode: u8,
    pub freq_start: f64,
    pub freq_end: f64,
    pub sweep_time_ms: f32,
    pub timestamp: f64,
}

fn put_frame_header(buf: &mut BytesMut, msg_type: u8, flags: u16, payload_len: usize) {
    buf.put_u8(PROTOCOL_VERSION);
    buf.put_u8(msg_type);
    buf.put_u16(flags);
    buf.put_u32(payload_len as u32);
}

/// Encode a live spectrum frame. `extra_flags` lets the sweep path mark
/// frames with [`FLAG_SWEEP_IN_PROGRESS`].
#[must_use]
pub fn encode_spectrum(
    meta: &SpectrumMeta,
    bins: &[f32],
    peak_hold: Option<&[f32]>,
    extra_flags: u16,
) -> Bytes {
    let mut flags = extra_flags;
    if peak_hold.is_some() {
        flags |= FLAG_PEAK_HOLD;
    }
    let payload_len =
        SPECTRUM_HEADER_LEN + bins.len() * 4 + peak_hold.map_or(0, |p| p.len() * 4);
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload_len);
    put_frame_header(&mut buf, MSG_SPECTRUM, flags, payload_len);

    buf.put_f64(meta.center_freq);
    buf.put_f64(meta.sample_rate);
    buf.put_f64(meta.bandwidth);
    buf.put_f32(meta.gain);
    buf.put_u32(meta.fft_size);
    buf.put_u32(bins.len() as u32);
    buf.put_f32(meta.noise_floor);
    buf.put_f32(meta.peak_power);
    buf.put_f32(meta.peak_freq_offset);
    buf.put_f64(meta.timestamp);
    for &b in bins {
        buf.put_f32(b);
    }
    if let Some(held) = peak_hold {
        for &b in held {
            buf.put_f32(b);
        }
    }
    buf.freeze()
}

/// Encode one sweep segment.
#[must_use]
pub fn encode_sweep_segment(meta: &SegmentMeta, bins: &[f32], flags: u16) -> Bytes {
    let payload_len = SEGMENT_HEADER_LEN + bins.len() * 4;
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload_len);
    put_frame_header(&mut buf, MSG_SWEEP_SEGMENT, flags, payload_len);

    buf.put_u32(meta.sweep_id);
    buf.put_u16(meta.segment_idx);
    buf.put_u16(meta.total_segments);
    buf.put_f64(meta.freq_lo);
    buf.put_f64(meta.freq_hi);
    buf.put_f64(meta.sweep_start);
    buf.put_f64(meta.sweep_end);
    buf.put_u32(bins.len() as u32);
    for &b in bins {
        buf.put_f32(b);
    }
    buf.freeze()
}

/// Encode a completed panorama.
#[must_use]
pub fn encode_sweep_panorama(meta: &PanoramaMeta, bins: &[f32], flags: u16) -> Bytes {
    let payload_len = PANORAMA_HEADER_LEN + bins.len() * 4;
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload_len);
    put_frame_header(&mut buf, MSG_SWEEP_PANORAMA, flags, payload_len);

    buf.put_u32(meta.sweep_id);
    buf.put_u8(meta.sweep_mode);
    buf.put_bytes(0, 3);
    buf.put_f64(meta.freq_start);
    buf.put_f64(meta.freq_end);
    buf.put_u32(bins.len() as u32);
    buf.put_f32(meta.sweep_time_ms);
    buf.put_f64(meta.timestamp);
    for &b in bins {
        buf.put_f32(b);
    }
    buf.freeze()
}

/// A decoded binary frame (client side and tests).
#[derive(Debug, Clone)]
pub enum DecodedFrame {
    Spectrum {
        meta: SpectrumMeta,
        bins: Vec<f32>,
        peak_hold: Option<Vec<f32>>,
        flags: u16,
    },
    Segment {
        meta: SegmentMeta,
        bins: Vec<f32>,
        flags: u16,
    },
    Panorama {
        meta: PanoramaMeta,
        bins: Vec<f32>,
        flags: u16,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("frame truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("unsupported protocol version {0:#04x}")]
    BadVersion(u8),
    #[error("unknown message type {0:#04x}")]
    UnknownType(u8),
    #[error("payload length {declared} does not match remaining {actual}")]
    LengthMismatch { declared: usize, actual: usize },
}

pub fn decode_frame(frame: &[u8]) -> Result<DecodedFrame, WireError> {
    if frame.len() < FRAME_HEADER_LEN {
        return Err(WireError::Truncated {
            need: FRAME_HEADER_LEN,
            have: frame.len(),
        });
    }
    let mut buf = frame;
    let version = buf.get_u8();
    if version != PROTOCOL_VERSION {
        return Err(WireError::BadVersion(version));
    }
    let msg_type = buf.get_u8();
    let flags = buf.get_u16();
    let payload_len = buf.get_u32() as usize;
    if buf.remaining() != payload_len {
        return Err(WireError::LengthMismatch {
            declared: payload_len,
            actual: buf.remaining(),
        });
    }

    match msg_type {
        MSG_SPECTRUM => decode_spectrum(buf, flags),
        MSG_SWEEP_SEGMENT => decode_segment(buf, flags),
        MSG_SWEEP_PANORAMA => decode_panorama(buf, flags),
        other => Err(WireError::UnknownType(other)),
    }
}

fn need(buf: &impl Buf, bytes: usize) -> Result<(), WireError> {
    if buf.remaining() < bytes {
        Err(WireError::Truncated {
            need: bytes,
            have: buf.remaining(),
        })
    } else {
        Ok(())
    }
}

fn get_bins(buf: &mut &[u8], count: usize) -> Result<Vec<f32>, WireError> {
    need(buf, count * 4)?;
    let mut bins = Vec::with_capacity(count);
    for _ in 0..count {
        bins.push(buf.get_f32());
    }
    Ok(bins)
}

fn decode_spectrum(mut buf: &[u8], flags: u16) -> Result<DecodedFrame, WireError> {
    need(&buf, SPECTRUM_HEADER_LEN)?;
    let center_freq = buf.get_f64();
    let sample_rate = buf.get_f64();
    let bandwidth = buf.get_f64();
    let gain = buf.get_f32();
    let fft_size = buf.get_u32();
    let num_bins = buf.get_u32() as usize;
    let noise_floor = buf.get_f32();
    let peak_power = buf.get_f32();
    let peak_freq_offset = buf.get_f32();
    let timestamp = buf.get_f64();

    let bins = get_bins(&mut buf, num_bins)?;
    let peak_hold = if flags & FLAG_PEAK_HOLD != 0 {
        Some(get_bins(&mut buf, num_bins)?)
    } else {
        None
    };

    Ok(DecodedFrame::Spectrum {
        meta: SpectrumMeta {
            center_freq,
            sample_rate,
            bandwidth,
            gain,
            fft_size,
            noise_floor,
            peak_power,
            peak_freq_offset,
            timestamp,
        },
        bins,
        peak_hold,
        flags,
    })
}

fn decode_segment(mut buf: &[u8], flags: u16) -> Result<DecodedFrame, WireError> {
    need(&buf, SEGMENT_HEADER_LEN)?;
    let sweep_id = buf.get_u32();
    let segment_idx = buf.get_u16();
    let total_segments = buf.get_u16();
    let freq_lo = buf.get_f64();
    let freq_hi = buf.get_f64();
    let sweep_start = buf.get_f64();
    let sweep_end = buf.get_f64();
    let num_bins = buf.get_u32() as usize;
    let bins = get_bins(&mut buf, num_bins)?;

    Ok(DecodedFrame::Segment {
        meta: SegmentMeta {
            sweep_id,
            segment_idx,
            total_segments,
            freq_lo,
            freq_hi,
            sweep_start,
            sweep_end,
        },
        bins,
        flags,
    })
}

fn decode_panorama(mut buf: &[u8], flags: u16) -> Result<DecodedFrame, WireError> {
    need(&buf, PANORAMA_HEADER_LEN)?;
    let sweep_id = buf.get_u32();
    let sweep_mode = buf.get_u8();
    buf.advance(3);
    let freq_start = buf.get_f64();
    let freq_end = buf.get_f64();
    let num_bins = buf.get_u32() as usize;
    let sweep_time_ms = buf.get_f32();
    let timestamp = buf.get_f64();
    let bins = get_bins(&mut buf, num_bins)?;

    Ok(DecodedFrame::Panorama {
        meta: PanoramaMeta {
            sweep_id,
            sweep_mode,
            freq_start,
            freq_end,
            sweep_time_ms,
            timestamp,
        },
        bins,
        flags,
    })
}
