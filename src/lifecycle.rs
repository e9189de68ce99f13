// src/lifecycle.rs
//
// Audio context lifecycle: unlock, initialization, readiness, mute.
//
// Every operation here is infallible from the caller's point of view.
// Failures are logged and folded into the readiness state.

use log::{debug, error, info, warn};

use crate::device::{DeviceState, OutputDevice};
use crate::error::AudioError;
use crate::synth::SynthBank;

/// Amplitude of the primer buffer used to force the device awake.
const PRIMER_LEVEL: f32 = 1.0e-4;

/// Whether playback calls are honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioReadiness {
    Uninitialized,
    Unlocking,
    Ready,
    Failed,
}

/// Owns the output device, the synth bank, readiness and the mute flag.
pub struct AudioContextManager<D: OutputDevice> {
    device: D,
    readiness: AudioReadiness,
    muted: bool,
    bank: Option<SynthBank>,
    max_voices: usize,
    primer_frames: usize,
}

impl<D: OutputDevice> AudioContextManager<D> {
    pub fn new(device: D, max_voices: usize, primer_frames: usize) -> Self {
        Self {
            device,
            readiness: AudioReadiness::Uninitialized,
            muted: false,
            bank: None,
            max_voices,
            primer_frames: primer_frames.max(1),
        }
    }

    /// Try to bring the output device into a running state.
    ///
    /// Precondition: call from inside a user-gesture handler. Platforms
    /// refuse to start audio otherwise; this is not checked here.
    pub fn unlock(&mut self) {
        if self.device.state() == DeviceState::Running {
            return;
        }

        debug!("[Fretgate] Output suspended, requesting resume");
        match self.device.resume() {
            Ok(()) => debug!("[Fretgate] Resume accepted"),
            Err(e) => warn!("[Fretgate] Resume failed (continuing silent): {}", e),
        }

        if self.device.state() == DeviceState::Running {
            return;
        }

        // Resume was ignored; play a near-silent buffer to force the device awake
        let primer = vec![PRIMER_LEVEL; self.primer_frames];
        match self.device.play_buffer(&primer) {
            Ok(()) => debug!("[Fretgate] Primer buffer played"),
            Err(e) => warn!("[Fretgate] Primer buffer failed (continuing silent): {}", e),
        }
    }

    /// Build the synth bank once. Returns the resulting readiness.
    pub fn initialize(&mut self) -> AudioReadiness {
        if self.readiness == AudioReadiness::Ready && self.bank.is_some() {
            return self.readiness;
        }

        self.readiness = AudioReadiness::Unlocking;
        self.unlock();

        match SynthBank::new(self.device.sample_rate(), self.max_voices) {
            Ok(bank) => {
                self.bank = Some(bank);
                self.readiness = AudioReadiness::Ready;
                info!("[Fretgate] Audio ready ({:?})", self.device.state());
            }
            Err(e) => {
                self.bank = None;
                self.readiness = AudioReadiness::Failed;
                error!("[Fretgate] Synth creation failed: {}", e);
            }
        }
        self.readiness
    }

    /// Initialize if needed; wake the device if it was suspended since.
    pub fn ensure_ready(&mut self) -> AudioReadiness {
        if self.readiness != AudioReadiness::Ready {
            return self.initialize();
        }
        if self.device.state() == DeviceState::Suspended {
            warn!("[Fretgate] {}, unlocking again", AudioError::TransientSuspension);
            self.unlock();
        }
        self.readiness
    }

    /// Drop the voices. Scheduled callbacks will find nothing to play.
    pub fn shutdown(&mut self) {
        self.bank = None;
        self.readiness = AudioReadiness::Uninitialized;
        info!("[Fretgate] Audio shut down");
    }

    pub fn readiness(&self) -> AudioReadiness {
        self.readiness
    }

    pub fn is_ready(&self) -> bool {
        self.readiness == AudioReadiness::Ready
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Whether a sound may be triggered right now.
    #[inline]
    pub fn can_play(&self) -> bool {
        self.is_ready() && !self.muted && self.bank.is_some()
    }

    pub fn bank(&self) -> Option<&SynthBank> {
        self.bank.as_ref()
    }

    pub fn bank_mut(&mut self) -> Option<&mut SynthBank> {
        self.bank.as_mut()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}
