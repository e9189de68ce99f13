// src/device.rs
//
// Platform output device seam.
//
// The host owns the real output (a browser AudioContext, a native stream).
// The engine only asks it to wake up, to play a primer buffer, and for its
// running state and sample rate.

use crate::error::{AudioError, AudioResult};

/// Running state reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Suspended,
    Running,
    Closed,
}

impl DeviceState {
    /// Parse the state names used by web audio contexts.
    pub fn from_name(name: &str) -> Self {
        match name {
            "running" => DeviceState::Running,
            "closed" => DeviceState::Closed,
            _ => DeviceState::Suspended,
        }
    }
}

/// The single shared audio output.
pub trait OutputDevice {
    fn state(&self) -> DeviceState;

    fn sample_rate(&self) -> f64;

    /// Standard resume request. Some platforms accept it and stay suspended.
    fn resume(&mut self) -> AudioResult<()>;

    /// Play a mono buffer through the output graph right away.
    fn play_buffer(&mut self, samples: &[f32]) -> AudioResult<()>;
}

/// Headless output device.
///
/// Starts suspended, like a browser context created outside a gesture.
/// With `ignores_resume` it mimics platforms that only wake up once a buffer
/// is actually played.
#[derive(Debug, Clone)]
pub struct OfflineDevice {
    state: DeviceState,
    sample_rate: f64,
    ignores_resume: bool,
    resume_calls: usize,
    buffers_played: usize,
}

impl OfflineDevice {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            state: DeviceState::Suspended,
            sample_rate,
            ignores_resume: false,
            resume_calls: 0,
            buffers_played: 0,
        }
    }

    pub fn ignoring_resume(mut self) -> Self {
        self.ignores_resume = true;
        self
    }

    /// Simulate the platform suspending the output (tab hidden, call).
    pub fn suspend(&mut self) {
        if self.state == DeviceState::Running {
            self.state = DeviceState::Suspended;
        }
    }

    pub fn close(&mut self) {
        self.state = DeviceState::Closed;
    }

    pub fn resume_calls(&self) -> usize {
        self.resume_calls
    }

    pub fn buffers_played(&self) -> usize {
        self.buffers_played
    }
}

impl OutputDevice for OfflineDevice {
    fn state(&self) -> DeviceState {
        self.state
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn resume(&mut self) -> AudioResult<()> {
        self.resume_calls += 1;
        match self.state {
            DeviceState::Closed => Err(AudioError::PlatformUnavailable("device closed".into())),
            _ if self.ignores_resume => Ok(()),
            _ => {
                self.state = DeviceState::Running;
                Ok(())
            }
        }
    }

    fn play_buffer(&mut self, _samples: &[f32]) -> AudioResult<()> {
        if self.state == DeviceState::Closed {
            return Err(AudioError::PlatformUnavailable("device closed".into()));
        }
        self.buffers_played += 1;
        self.state = DeviceState::Running;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_device_resumes() {
        let mut device = OfflineDevice::new(48_000.0);
        assert_eq!(device.state(), DeviceState::Suspended);
        device.resume().unwrap();
        assert_eq!(device.state(), DeviceState::Running);
    }

    #[test]
    fn test_stubborn_device_needs_a_buffer() {
        let mut device = OfflineDevice::new(48_000.0).ignoring_resume();
        device.resume().unwrap();
        assert_eq!(device.state(), DeviceState::Suspended);
        device.play_buffer(&[0.0]).unwrap();
        assert_eq!(device.state(), DeviceState::Running);
    }

    #[test]
    fn test_closed_device_refuses() {
        let mut device = OfflineDevice::new(48_000.0);
        device.close();
        assert!(device.resume().is_err());
        assert!(device.play_buffer(&[0.0]).is_err());
    }

    #[test]
    fn test_state_names() {
        assert_eq!(DeviceState::from_name("running"), DeviceState::Running);
        assert_eq!(DeviceState::from_name("suspended"), DeviceState::Suspended);
        assert_eq!(DeviceState::from_name("interrupted"), DeviceState::Suspended);
        assert_eq!(DeviceState::from_name("closed"), DeviceState::Closed);
    }
}
