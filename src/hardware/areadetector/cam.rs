//! Camera control blocks (`cam1:`).

use super::IMAGE_MODES;
use crate::channel::soft_ioc::RecordKind;
use crate::channel::ChannelAccess;
use crate::device::{signal_entries, Component, SignalEntry};
use crate::signal::{Kind, Signal, SignalRo, SignalWithRbv};
use std::sync::Arc;

/// Controls shared by every areaDetector driver.
#[derive(Debug, Clone)]
pub struct CamBase {
    prefix: String,
    pub acquire: SignalWithRbv,
    pub acquire_time: SignalWithRbv,
    pub acquire_period: SignalWithRbv,
    pub image_mode: SignalWithRbv,
    pub num_images: SignalWithRbv,
    pub num_exposures: SignalWithRbv,
    pub trigger_mode: SignalWithRbv,
    pub array_counter: SignalWithRbv,
    pub array_callbacks: SignalWithRbv,
    pub detector_state: SignalRo,
    pub status_message: SignalRo,
    pub manufacturer: SignalRo,
    pub model: SignalRo,
    pub max_size_x: SignalRo,
    pub max_size_y: SignalRo,
    pub wait_for_plugins: Signal,
}

impl CamBase {
    /// `prefix` is the full camera prefix, e.g. `"1idPG4:cam1:"`.
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str) -> Self {
        let rbv = |suffix: &str| SignalWithRbv::new(client.clone(), format!("{}{}", prefix, suffix));
        let ro = |suffix: &str| {
            SignalRo::new(client.clone(), format!("{}{}", prefix, suffix)).with_kind(Kind::Config)
        };
        Self {
            prefix: prefix.to_string(),
            acquire: rbv("Acquire")
                .with_kind(Kind::Omitted)
                .with_record(RecordKind::Acquire),
            acquire_time: rbv("AcquireTime"),
            acquire_period: rbv("AcquirePeriod"),
            image_mode: rbv("ImageMode").with_record(RecordKind::Enum(IMAGE_MODES)),
            num_images: rbv("NumImages"),
            num_exposures: rbv("NumExposures"),
            trigger_mode: rbv("TriggerMode"),
            array_counter: rbv("ArrayCounter").with_kind(Kind::Normal),
            array_callbacks: rbv("ArrayCallbacks"),
            detector_state: ro("DetectorState_RBV").with_kind(Kind::Normal),
            status_message: ro("StatusMessage_RBV"),
            manufacturer: ro("Manufacturer_RBV"),
            model: ro("Model_RBV"),
            max_size_x: ro("MaxSizeX_RBV"),
            max_size_y: ro("MaxSizeY_RBV"),
            wait_for_plugins: Signal::new(client.clone(), format!("{}WaitForPlugins", prefix))
                .with_kind(Kind::Config),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Component for CamBase {
    fn signals(&self) -> Vec<SignalEntry<'_>> {
        signal_entries!(self;
            acquire,
            acquire_time,
            acquire_period,
            image_mode,
            num_images,
            num_exposures,
            trigger_mode,
            array_counter,
            array_callbacks,
            detector_state,
            status_message,
            manufacturer,
            model,
            max_size_x,
            max_size_y,
            wait_for_plugins,
        )
    }

    fn address(&self) -> &str {
        &self.prefix
    }
}

/// PointGrey Grasshopper3 camera, with the on/off and auto-mode controls
/// used at 6-ID-D.
#[derive(Debug, Clone)]
pub struct PointGreyCam {
    pub base: CamBase,
    pub auto_exposure_on_off: SignalWithRbv,
    pub auto_exposure_auto_mode: SignalWithRbv,
    pub sharpness_on_off: SignalWithRbv,
    pub sharpness_auto_mode: SignalWithRbv,
    pub gamma_on_off: SignalWithRbv,
    pub shutter_auto_mode: SignalWithRbv,
    pub gain_auto_mode: SignalWithRbv,
    pub trigger_mode_on_off: SignalWithRbv,
    pub trigger_mode_auto_mode: SignalWithRbv,
    pub trigger_delay_on_off: SignalWithRbv,
    pub frame_rate_on_off: SignalWithRbv,
    pub frame_rate_auto_mode: SignalWithRbv,
}

/// The simulation camera is driven as a PointGrey.
pub type SimDetectorCam = PointGreyCam;

impl PointGreyCam {
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str) -> Self {
        let rbv = |suffix: &str| SignalWithRbv::new(client.clone(), format!("{}{}", prefix, suffix));
        Self {
            base: CamBase::new(client.clone(), prefix),
            auto_exposure_on_off: rbv("AutoExposureOnOff"),
            auto_exposure_auto_mode: rbv("AutoExposureAutoMode"),
            sharpness_on_off: rbv("SharpnessOnOff"),
            sharpness_auto_mode: rbv("SharpnessAutoMode"),
            gamma_on_off: rbv("GammaOnOff"),
            shutter_auto_mode: rbv("ShutterAutoMode"),
            gain_auto_mode: rbv("GainAutoMode"),
            trigger_mode_on_off: rbv("TriggerModeOnOff"),
            trigger_mode_auto_mode: rbv("TriggerModeAutoMode"),
            trigger_delay_on_off: rbv("TriggerDelayOnOff"),
            frame_rate_on_off: rbv("FrameRateOnOff"),
            frame_rate_auto_mode: rbv("FrameRateAutoMode"),
        }
    }
}

impl Component for PointGreyCam {
    fn signals(&self) -> Vec<SignalEntry<'_>> {
        let mut entries = self.base.signals();
        entries.extend(signal_entries!(self;
            auto_exposure_on_off,
            auto_exposure_auto_mode,
            sharpness_on_off,
            sharpness_auto_mode,
            gamma_on_off,
            shutter_auto_mode,
            gain_auto_mode,
            trigger_mode_on_off,
            trigger_mode_auto_mode,
            trigger_delay_on_off,
            frame_rate_on_off,
            frame_rate_auto_mode,
        ));
        entries
    }

    fn address(&self) -> &str {
        self.base.prefix()
    }
}

/// Varex 4343CT flat panel on the PerkinElmer driver.
#[derive(Debug, Clone)]
pub struct VarexCam {
    pub base: CamBase,
    pub pe_gain: SignalWithRbv,
    pub pe_skip_frames: SignalWithRbv,
    pub pe_num_frames_to_skip: SignalWithRbv,
}

impl VarexCam {
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str) -> Self {
        let rbv = |suffix: &str| SignalWithRbv::new(client.clone(), format!("{}{}", prefix, suffix));
        Self {
            base: CamBase::new(client.clone(), prefix),
            pe_gain: rbv("PEGain"),
            pe_skip_frames: rbv("PESkipFrames"),
            pe_num_frames_to_skip: rbv("PENumFramesToSkip"),
        }
    }
}

impl Component for VarexCam {
    fn signals(&self) -> Vec<SignalEntry<'_>> {
        let mut entries = self.base.signals();
        entries.extend(signal_entries!(self; pe_gain, pe_skip_frames, pe_num_frames_to_skip));
        entries
    }

    fn address(&self) -> &str {
        self.base.prefix()
    }
}
