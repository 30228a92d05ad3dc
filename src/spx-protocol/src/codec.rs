// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Translation between transport DTOs and the typed session commands.
//!
//! All string-to-enum mapping and structural validation happens here so the
//! coordinator only ever sees well-formed tagged unions.

use spx_core::dsp::config::{AveragingMode, WindowKind};
use spx_core::session::command::{AgcUpdate, DspUpdate, SessionCommand, SweepParams};
use spx_core::session::response::SessionError;
use spx_core::sweep::plan::SweepMode;

use crate::types::{AgcParamsDto, ClientCommand, DspParamsDto, SweepStartDto};

/// Parse one JSON text frame into a client command.
pub fn parse_command(input: &str) -> Result<ClientCommand, serde_json::Error> {
    serde_json::from_str(input)
}

/// Translate a transport command into the coordinator's typed command.
pub fn to_session_command(cmd: ClientCommand) -> Result<SessionCommand, SessionError> {
    Ok(match cmd {
        ClientCommand::Start => SessionCommand::Start,
        ClientCommand::Stop => SessionCommand::Stop,
        ClientCommand::SetFrequency { value } => SessionCommand::SetFrequency(value),
        ClientCommand::SetGain { value } => SessionCommand::SetGain(value),
        ClientCommand::SetBandwidth { value } => SessionCommand::SetBandwidth(value),
        ClientCommand::SetSampleRate { value } => SessionCommand::SetSampleRate(value),
        ClientCommand::SetFftSize { value } => SessionCommand::SetFftSize(value),
        ClientCommand::SetDsp { params } => SessionCommand::SetDsp(dsp_update(&params)?),
        ClientCommand::SetAgc(params) => SessionCommand::SetAgc(agc_update(&params)),
        ClientCommand::SweepStart(dto) => SessionCommand::SweepStart(sweep_params(&dto)?),
        ClientCommand::SweepStop => SessionCommand::SweepStop,
        ClientCommand::DetectionEnable { enabled } => SessionCommand::DetectionEnable(enabled),
        ClientCommand::DetectionSet { params } => {
            let threshold = params.threshold_db.ok_or_else(|| {
                SessionError::invalid_config("detection_set requires params.threshold_db")
            })?;
            SessionCommand::DetectionSetThreshold(threshold)
        }
        ClientCommand::RecIqStart => SessionCommand::RecIqStart,
        ClientCommand::RecIqStop => SessionCommand::RecIqStop,
        ClientCommand::RecSpectrumStart => SessionCommand::RecSpectrumStart,
        ClientCommand::RecSpectrumStop => SessionCommand::RecSpectrumStop,
        ClientCommand::RecList => SessionCommand::RecList,
        ClientCommand::RecDelete { filename } => SessionCommand::RecDelete { filename },
        ClientCommand::PlaybackStart { filename } => SessionCommand::PlaybackStart { filename },
        ClientCommand::PlaybackPause => SessionCommand::PlaybackPause,
        ClientCommand::PlaybackResume => SessionCommand::PlaybackResume,
        ClientCommand::PlaybackStop => SessionCommand::PlaybackStop,
        ClientCommand::PlaybackSpeed { value } => SessionCommand::PlaybackSpeed(value),
        ClientCommand::PlaybackLoop { enabled } => SessionCommand::PlaybackLoop(enabled),
        ClientCommand::PlaybackSeek { value } => SessionCommand::PlaybackSeek(value),
        ClientCommand::GetStatus => SessionCommand::GetStatus,
        ClientCommand::CheckDevice => SessionCommand::CheckDevice,
    })
}

fn dsp_update(dto: &DspParamsDto) -> Result<DspUpdate, SessionError> {
    let window = match dto.window_kind.as_deref() {
        None => None,
        Some(name) => Some(WindowKind::parse(name).ok_or_else(|| {
            SessionError::invalid_config(format!("unknown window: {}", name))
        })?),
    };

    let averaging = match dto.averaging_mode.as_deref() {
        None => None,
        Some("none") => Some(AveragingMode::None),
        Some("linear") => Some(AveragingMode::Linear {
            count: dto.averaging_count.unwrap_or(8),
        }),
        Some("exponential") => Some(AveragingMode::Exponential {
            alpha: dto.averaging_alpha.unwrap_or(0.3),
        }),
        Some(other) => {
            return Err(SessionError::invalid_config(format!(
                "unknown averaging mode: {}",
                other
            )))
        }
    };

    if let Some(AveragingMode::Linear { count }) = averaging {
        if count == 0 {
            return Err(SessionError::invalid_config(
                "averaging_count must be positive",
            ));
        }
    }
    if let Some(AveragingMode::Exponential { alpha }) = averaging {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(SessionError::invalid_config(format!(
                "averaging_alpha {} must be in (0, 1]",
                alpha
            )));
        }
    }

    Ok(DspUpdate {
        window,
        averaging,
        dc_removal: dto.dc_removal,
        peak_hold: dto.peak_hold,
        peak_hold_decay_db: dto.peak_hold_decay,
        output_bins: dto.output_bins,
        reset_peak_hold: dto.peak_hold_reset.unwrap_or(false),
    })
}

fn agc_update(dto: &AgcParamsDto) -> AgcUpdate {
    AgcUpdate {
        enabled: dto.enabled,
        target_dbfs: dto.target_dbfs,
        hysteresis_db: dto.hysteresis,
        step_db: dto.gain_step,
        min_interval_secs: dto.min_interval,
    }
}

fn sweep_params(dto: &SweepStartDto) -> Result<SweepParams, SessionError> {
    let mode = SweepMode::parse(&dto.mode)
        .ok_or_else(|| SessionError::invalid_config(format!("unknown sweep mode: {}", dto.mode)))?;
    if dto.averages == 0 {
        return Err(SessionError::invalid_config(
            "sweep averages must be positive",
        ));
    }
    if !(dto.freq_start.is_finite() && dto.freq_end.is_finite()) || dto.freq_start >= dto.freq_end {
        return Err(SessionError::invalid_config(format!(
            "sweep range invalid: {} .. {}",
            dto.freq_start, dto.freq_end
        )));
    }
    if dto.sample_rate <= 0.0 {
        return Err(SessionError::invalid_config(
            "sweep sample_rate must be positive",
        ));
    }
    Ok(SweepParams {
        mode,
        freq_start: dto.freq_start,
        freq_end: dto.freq_end,
        sample_rate: dto.sample_rate,
        averages: dto.averages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_commands() {
        assert!(matches!(
            parse_command(r#"{"cmd":"start"}"#).unwrap(),
            ClientCommand::Start
        ));
        assert!(matches!(
            parse_command(r#"{"cmd":"get_status"}"#).unwrap(),
            ClientCommand::GetStatus
        ));
        assert!(matches!(
            parse_command(r#"{"cmd":"check_device"}"#).unwrap(),
            ClientCommand::CheckDevice
        ));
    }

    #[test]
    fn parse_value_commands() {
        match parse_command(r#"{"cmd":"set_frequency","value":433920000}"#).unwrap() {
            ClientCommand::SetFrequency { value } => assert_eq!(value, 433_920_000.0),
            other => panic!("unexpected: {:?}", other),
        }
        match parse_command(r#"{"cmd":"set_fft_size","value":4096}"#).unwrap() {
            ClientCommand::SetFftSize { value } => assert_eq!(value, 4096),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn parse_sweep_start_with_default_averages() {
        let cmd = parse_command(
            r#"{"cmd":"sweep_start","mode":"survey","freq_start":1e8,"freq_end":1.3e8,"sample_rate":1e7}"#,
        )
        .unwrap();
        match cmd {
            ClientCommand::SweepStart(dto) => {
                assert_eq!(dto.averages, 4);
                let params = sweep_params(&dto).unwrap();
                assert_eq!(params.mode, SweepMode::Survey);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn parse_rejects_unknown_command() {
        assert!(parse_command(r#"{"cmd":"transmogrify"}"#).is_err());
        assert!(parse_command("not json").is_err());
    }

    #[test]
    fn dsp_update_translates_window_and_averaging() {
        let dto = DspParamsDto {
            window_kind: Some("kaiser_10".into()),
            averaging_mode: Some("linear".into()),
            averaging_count: Some(16),
            ..DspParamsDto::default()
        };
        let update = dsp_update(&dto).unwrap();
        assert_eq!(update.window, Some(WindowKind::Kaiser10));
        assert_eq!(update.averaging, Some(AveragingMode::Linear { count: 16 }));
    }

    #[test]
    fn dsp_update_rejects_unknown_window() {
        let dto = DspParamsDto {
            window_kind: Some("triangular".into()),
            ..DspParamsDto::default()
        };
        assert!(dsp_update(&dto).is_err());
    }

    #[test]
    fn dsp_update_rejects_bad_alpha() {
        let dto = DspParamsDto {
            averaging_mode: Some("exponential".into()),
            averaging_alpha: Some(1.5),
            ..DspParamsDto::default()
        };
        assert!(dsp_update(&dto).is_err());
    }

    #[test]
    fn sweep_params_rejects_inverted_range() {
        let dto = SweepStartDto {
            mode: "survey".into(),
            freq_start: 130e6,
            freq_end: 100e6,
            sample_rate: 10e6,
            averages: 4,
        };
        assert!(sweep_params(&dto).is_err());
    }

    #[test]
    fn detection_set_requires_threshold() {
        let cmd = parse_command(r#"{"cmd":"detection_set","params":{}}"#).unwrap();
        assert!(to_session_command(cmd).is_err());
        let cmd = parse_command(r#"{"cmd":"detection_set","params":{"threshold_db":15}}"#).unwrap();
        match to_session_command(cmd).unwrap() {
            SessionCommand::DetectionSetThreshold(t) => assert_eq!(t, 15.0),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn rec_delete_carries_filename_untouched() {
        // Path sanitation is the coordinator's job, not the codec's.
        let cmd = parse_command(r#"{"cmd":"rec_delete","filename":"../../etc/passwd"}"#).unwrap();
        match to_session_command(cmd).unwrap() {
            SessionCommand::RecDelete { filename } => assert_eq!(filename, "../../etc/passwd"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn server_message_text_frames() {
        use crate::types::ServerMessage;
        let msg = ServerMessage::error("stop streaming before changing FFT size");
        let text = msg.to_text();
        assert!(text.contains(r#""type":"error""#));
        assert!(text.contains("FFT size"));
    }
}
