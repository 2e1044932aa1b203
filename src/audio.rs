//! Distance-reactive soundscape. The engine itself is pure state: the render
//! loop hands it the camera distance once per frame, it smooths that input
//! and derives drone/filter/pulse parameters. The WebAudio graph that turns
//! those numbers into sound exists only on wasm.

use crate::noise::hash11;

/// Smoothing time constant for the distance input, seconds.
pub const SMOOTHING_TAU: f32 = 0.3;

const DISTANCE_NEAR: f32 = 10.0;
const DISTANCE_FAR: f32 = 100.0;
const PULSE_BASE_INTERVAL: f32 = 6.0;
const PULSE_INTERVAL_PULL: f32 = 3.8;

/// Continuous control values for the drone layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioParams {
    pub drone_gain: f32,
    pub filter_cutoff_hz: f32,
    pub pulse_interval: f32,
}

/// One scheduled beacon tone.
#[derive(Clone, Copy, Debug)]
pub struct Pulse {
    pub frequency_hz: f32,
    pub gain: f32,
    pub duration: f32,
}

pub struct AudioEngine {
    target_distance: f32,
    smoothed_distance: f32,
    next_pulse_at: f64,
    pulse_seq: u32,
}

impl AudioEngine {
    pub fn new(distance: f32) -> Self {
        Self {
            target_distance: distance,
            smoothed_distance: distance,
            next_pulse_at: 0.0,
            pulse_seq: 0,
        }
    }

    /// One-way handoff from the render side; no audio state flows back.
    pub fn set_distance(&mut self, distance: f32) {
        self.target_distance = distance;
    }

    /// Advance the smoother by `dt` seconds. The exponential form makes the
    /// result independent of how the elapsed time is split into steps.
    pub fn advance(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let alpha = 1.0 - (-dt / SMOOTHING_TAU).exp();
        self.smoothed_distance += (self.target_distance - self.smoothed_distance) * alpha;
    }

    /// 1 at the closest approach the camera allows, 0 at the farthest.
    fn proximity(&self) -> f32 {
        1.0 - ((self.smoothed_distance - DISTANCE_NEAR) / (DISTANCE_FAR - DISTANCE_NEAR))
            .clamp(0.0, 1.0)
    }

    pub fn params(&self) -> AudioParams {
        let p = self.proximity();
        AudioParams {
            drone_gain: 0.05 + 0.17 * p,
            filter_cutoff_hz: 120.0 + 1400.0 * p * p,
            pulse_interval: PULSE_BASE_INTERVAL - PULSE_INTERVAL_PULL * p,
        }
    }

    /// Check the pulse timer against the audio clock. Emitting a pulse
    /// schedules the next one, with a hashed jitter so the rhythm drifts.
    pub fn next_pulse(&mut self, now: f64) -> Option<Pulse> {
        if now < self.next_pulse_at {
            return None;
        }
        let p = self.proximity();
        let jitter = 0.85 + 0.3 * hash11(self.pulse_seq as f32 + 0.5);
        self.pulse_seq += 1;
        self.next_pulse_at = now + (self.params().pulse_interval * jitter) as f64;
        Some(Pulse {
            frequency_hz: 48.0 + 110.0 * p,
            gain: 0.12 + 0.2 * p,
            duration: 2.5,
        })
    }
}

#[cfg(target_arch = "wasm32")]
pub use graph::AudioGraph;

#[cfg(target_arch = "wasm32")]
mod graph {
    use wasm_bindgen::JsValue;
    use web_sys::{AudioContext, BiquadFilterNode, BiquadFilterType, GainNode, OscillatorType};

    use super::{AudioParams, Pulse};

    const MASTER_GAIN: f32 = 0.8;

    /// WebAudio output chain: two detuned oscillators feed a shared drone
    /// gain, through a lowpass filter into the master gain. Pulses are
    /// short-lived oscillators spliced onto the filter input.
    pub struct AudioGraph {
        context: AudioContext,
        drone: GainNode,
        filter: BiquadFilterNode,
        master: GainNode,
    }

    impl AudioGraph {
        /// Build and start the graph. Must be called from a user gesture,
        /// otherwise the context comes up suspended and stays silent.
        pub fn new() -> Result<Self, JsValue> {
            let context = AudioContext::new()?;

            let master = context.create_gain()?;
            master.gain().set_value(MASTER_GAIN);
            master.connect_with_audio_node(&context.destination())?;

            let filter = context.create_biquad_filter()?;
            filter.set_type(BiquadFilterType::Lowpass);
            filter.frequency().set_value(160.0);
            filter.q().set_value(0.9);
            filter.connect_with_audio_node(&master)?;

            let drone = context.create_gain()?;
            drone.gain().set_value(0.0);
            drone.connect_with_audio_node(&filter)?;

            for detune in [0.0, 0.7] {
                let osc = context.create_oscillator()?;
                osc.set_type(OscillatorType::Sine);
                osc.frequency().set_value(55.0 + detune);
                osc.connect_with_audio_node(&drone)?;
                osc.start()?;
            }

            Ok(Self { context, drone, filter, master })
        }

        pub fn resume(&self) {
            // Best effort; browsers reject this outside a gesture.
            let _ = self.context.resume();
        }

        /// Fade the master bus out (or back in) without tearing the graph
        /// down; pulses keep scheduling silently while muted.
        pub fn set_muted(&self, muted: bool) {
            let target = if muted { 0.0 } else { MASTER_GAIN };
            let now = self.context.current_time();
            let _ = self.master.gain().set_target_at_time(target, now, 0.25);
        }

        pub fn current_time(&self) -> f64 {
            self.context.current_time()
        }

        /// Ease the drone controls toward the engine's current parameters.
        pub fn apply(&self, params: &AudioParams) {
            let now = self.context.current_time();
            let _ = self.drone.gain().set_target_at_time(params.drone_gain, now, 0.12);
            let _ = self
                .filter
                .frequency()
                .set_target_at_time(params.filter_cutoff_hz, now, 0.12);
        }

        /// Play one beacon tone with an attack/decay envelope.
        pub fn pulse(&self, pulse: &Pulse) -> Result<(), JsValue> {
            let now = self.context.current_time();
            let envelope = self.context.create_gain()?;
            envelope.gain().set_value(0.0);
            envelope.gain().set_value_at_time(0.0, now)?;
            envelope
                .gain()
                .linear_ramp_to_value_at_time(pulse.gain, now + 0.05)?;
            envelope
                .gain()
                .exponential_ramp_to_value_at_time(1e-4, now + pulse.duration as f64)?;
            envelope.connect_with_audio_node(&self.master)?;

            let osc = self.context.create_oscillator()?;
            osc.set_type(OscillatorType::Triangle);
            osc.frequency().set_value(pulse.frequency_hz);
            osc.connect_with_audio_node(&envelope)?;
            osc.start()?;
            osc.stop_with_when(now + pulse.duration as f64)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothing_follows_the_time_constant() {
        let mut engine = AudioEngine::new(100.0);
        engine.set_distance(10.0);
        engine.advance(SMOOTHING_TAU);
        // One time constant closes 1 - 1/e of the gap.
        let remaining = (engine.smoothed_distance - 10.0) / 90.0;
        assert!((remaining - (-1.0_f32).exp()).abs() < 1e-3);
    }

    #[test]
    fn smoothing_is_step_size_independent() {
        let mut coarse = AudioEngine::new(50.0);
        let mut fine = AudioEngine::new(50.0);
        coarse.set_distance(12.0);
        fine.set_distance(12.0);
        coarse.advance(0.3);
        for _ in 0..10 {
            fine.advance(0.03);
        }
        assert!((coarse.smoothed_distance - fine.smoothed_distance).abs() < 1e-3);
    }

    #[test]
    fn closer_means_louder_brighter_faster() {
        let near = AudioEngine::new(20.0).params();
        let far = AudioEngine::new(80.0).params();
        assert!(near.drone_gain > far.drone_gain);
        assert!(near.filter_cutoff_hz > far.filter_cutoff_hz);
        assert!(near.pulse_interval < far.pulse_interval);
    }

    #[test]
    fn proximity_saturates_outside_the_orbit_range() {
        let inside = AudioEngine::new(5.0).params();
        let at_min = AudioEngine::new(10.0).params();
        assert_eq!(inside, at_min);
        let outside = AudioEngine::new(500.0).params();
        let at_max = AudioEngine::new(100.0).params();
        assert_eq!(outside, at_max);
    }

    #[test]
    fn pulses_self_reschedule_with_jitter() {
        let mut engine = AudioEngine::new(35.0);
        let first = engine.next_pulse(0.0);
        assert!(first.is_some());
        assert!(engine.next_pulse(0.001).is_none());

        let base = engine.params().pulse_interval as f64;
        let gap = engine.next_pulse_at;
        assert!(gap >= base * 0.85 - 1e-6 && gap <= base * 1.15 + 1e-6);

        // Far enough in the future the timer must fire again, with a new
        // jittered deadline.
        let second_at = engine.next_pulse_at;
        assert!(engine.next_pulse(second_at + 0.01).is_some());
        assert!(engine.next_pulse_at > second_at);
    }
}
