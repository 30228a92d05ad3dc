// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use tokio::sync::oneshot;

use crate::recording::RecordingDescriptor;
use crate::session::command::SessionCommand;
use crate::session::response::SessionResult;
use crate::session::state::{DeviceProbe, StatusSnapshot};

/// Successful command outcome.
#[derive(Debug, Clone)]
pub enum SessionReply {
    Status(Box<StatusSnapshot>),
    Recordings(Vec<RecordingDescriptor>),
    Device(DeviceProbe),
}

/// Request sent to the session coordinator.
#[derive(Debug)]
pub struct SessionRequest {
    pub cmd: SessionCommand,
    pub respond_to: oneshot::Sender<SessionResult<SessionReply>>,
}
