use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::echogram::source::{DepthProfile, SampleGrid, SampleSource};
use crate::echogram::EchogramError;
/// Parameters for the simulated echosounder record.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub channels: Vec<String>,
    pub pings: usize,
    pub range_samples: usize,
    pub ping_interval_secs: f64,
    pub sample_spacing_m: f32,
    pub start_time: f64,
    pub seed: u64,
}
impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            channels: vec!["GPT 38 kHz".into(), "GPT 120 kHz".into()],
            pings: 2000,
            range_samples: 600,
            ping_interval_secs: 1.0,
            sample_spacing_m: 0.19,
            // 2022-07-04 16:22:37 UTC
            start_time: 1_656_951_757.0,
            seed: 7,
        }
    }
}
/// Deterministic fake echogram: noise floor, a drifting scattering layer and a seabed.
pub struct SyntheticSource {
    config: SyntheticConfig,
}
impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }
    fn check(&self, channel: &str) -> Result<usize, EchogramError> {
        self.config
            .channels
            .iter()
            .position(|c| c == channel)
            .ok_or_else(|| EchogramError::ChannelNotFound(channel.to_string()))
    }
    fn bottom_sample(&self, ping: usize) -> usize {
        let r = self.config.range_samples as f64;
        let wave = (ping as f64 / 180.0).sin() * 0.08 + 0.82;
        ((r * wave) as usize).min(self.config.range_samples)
    }
}
impl SampleSource for SyntheticSource {
    fn channels(&self) -> Vec<String> {
        self.config.channels.clone()
    }
    fn read_channel(&self, channel: &str) -> Result<SampleGrid, EchogramError> {
        let index = self.check(channel)?;
        let cfg = &self.config;
        let mut rng = StdRng::seed_from_u64(cfg.seed.wrapping_add(index as u64));
        // Higher frequencies attenuate faster.
        let attenuation = 0.02 * (index as f32 + 1.0);
        let mut values = Array2::from_elem((cfg.pings, cfg.range_samples), f32::NAN);
        for ping in 0..cfg.pings {
            let bottom = self.bottom_sample(ping);
            let layer = cfg.range_samples as f64 * (0.35 + (ping as f64 / 300.0).cos() * 0.05);
            for r in 0..bottom {
                let noise: f32 = rng.gen_range(-4.0..4.0);
                let mut sv = -88.0 - attenuation * r as f32 + noise;
                let dist = (r as f64 - layer).abs();
                if dist < 12.0 {
                    sv = sv.max(-52.0 - dist as f32 + noise);
                }
                if bottom - r <= 6 {
                    sv = -22.0 + noise;
                }
                values[[ping, r]] = sv;
            }
        }
        SampleGrid::new(
            channel,
            (0..cfg.pings)
                .map(|p| cfg.start_time + p as f64 * cfg.ping_interval_secs)
                .collect(),
            (0..cfg.range_samples as u32).collect(),
            values,
        )
    }
    fn read_offset_profile(&self, channel: &str) -> Result<DepthProfile, EchogramError> {
        self.check(channel)?;
        let spacing = self.config.sample_spacing_m;
        Ok(DepthProfile {
            offsets: Array2::from_shape_fn(
                (self.config.pings, self.config.range_samples),
                |(_, r)| r as f32 * spacing,
            ),
            transducer_offset: 5.0,
        })
    }
    fn describe(&self) -> String {
        format!(
            "synthetic channels: {:?} (ping_time: {}, range_sample: {})",
            self.config.channels, self.config.pings, self.config.range_samples
        )
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn small() -> SyntheticSource {
        SyntheticSource::new(SyntheticConfig {
            pings: 40,
            range_samples: 50,
            ..SyntheticConfig::default()
        })
    }
    #[test]
    fn synthetic_record_is_reproducible() {
        let a = small().read_channel("GPT 38 kHz").unwrap();
        let b = small().read_channel("GPT 38 kHz").unwrap();
        assert_eq!(a.values.dim(), (40, 50));
        assert!(a
            .values
            .iter()
            .zip(b.values.iter())
            .all(|(x, y)| x == y || (x.is_nan() && y.is_nan())));
        // below the seabed there is no data
        assert!(a.values[[0, 49]].is_nan());
        assert!(a.finite_values().count() > 0);
    }
    #[test]
    fn unknown_channel_is_reported() {
        assert!(matches!(
            small().read_channel("GPT 200 kHz"),
            Err(EchogramError::ChannelNotFound(_))
        ));
        let profile = small().read_offset_profile("GPT 120 kHz").unwrap();
        assert_eq!(profile.offsets.dim(), (40, 50));
    }
}
