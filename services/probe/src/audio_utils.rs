use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::{f32::consts::TAU, time::Duration};

/// Frames fed to the resampler per call.
pub const RESAMPLE_CHUNK: usize = 1024;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1, // mono
    )?;
    Ok(resampler)
}

/// Resamples mono `samples` from `in_rate` to `out_rate`.
///
/// The output holds exactly `len * out_rate / in_rate` samples, aligned with
/// the input: the resampler delay is skipped and the zero padding added to
/// the last block is cut off.
pub fn resample(samples: &[f32], in_rate: u32, out_rate: u32) -> anyhow::Result<Vec<f32>> {
    if in_rate == out_rate {
        return Ok(samples.to_vec());
    }
    let expected = (samples.len() as u64 * u64::from(out_rate) / u64::from(in_rate)) as usize;
    if expected == 0 {
        return Ok(Vec::new());
    }
    let mut resampler = create_resampler(f64::from(in_rate), f64::from(out_rate), RESAMPLE_CHUNK)?;
    let delay = resampler.output_delay();
    let wanted = delay + expected;
    let mut out = Vec::with_capacity(wanted + resampler.output_frames_max());

    let mut chunks = samples.chunks_exact(RESAMPLE_CHUNK);
    for chunk in &mut chunks {
        let frames = resampler.process(&[chunk][..], None)?;
        if let Some(channel) = frames.first() {
            out.extend_from_slice(channel);
        }
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let frames = resampler.process_partial(Some(&[rest][..]), None)?;
        if let Some(channel) = frames.first() {
            out.extend_from_slice(channel);
        }
    }
    // flush the tail still held back by the delay
    while out.len() < wanted {
        let frames = resampler.process_partial(None::<&[&[f32]]>, None)?;
        match frames.first() {
            Some(channel) if !channel.is_empty() => out.extend_from_slice(channel),
            _ => break,
        }
    }

    out.truncate(wanted);
    out.drain(..delay.min(out.len()));
    out.resize(expected, 0.0);
    Ok(out)
}

/// A sine tone as PCM16 samples.
pub fn tone(frequency: f32, duration: Duration, sample_rate: u32, amplitude: f32) -> Vec<i16> {
    let count = sample_count(duration, sample_rate);
    let amplitude = amplitude.clamp(0.0, 1.0);
    (0..count)
        .map(|n| {
            let t = n as f32 / sample_rate as f32;
            let v = amplitude * (TAU * frequency * t).sin();
            (v * i16::MAX as f32) as i16
        })
        .collect()
}

pub fn silence(duration: Duration, sample_rate: u32) -> Vec<i16> {
    vec![0; sample_count(duration, sample_rate)]
}

fn sample_count(duration: Duration, sample_rate: u32) -> usize {
    (u128::from(sample_rate) * duration.as_micros() / 1_000_000) as usize
}

/// Converts a slice of f32 samples to a vector of i16 samples.
pub fn convert_f32_to_i16(pcm32: &[f32]) -> Vec<i16> {
    pcm32
        .iter()
        .map(|&sample| (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

/// Converts a slice of i16 samples to a vector of f32 samples.
pub fn convert_i16_to_f32(pcm16: &[i16]) -> Vec<f32> {
    pcm16
        .iter()
        .map(|&sample| sample as f32 / 32768.0)
        .collect()
}

/// Little-endian PCM16 bytes, the layout the Live API expects.
pub fn samples_to_pcm_bytes(pcm16: &[i16]) -> Vec<u8> {
    pcm16.iter().flat_map(|sample| sample.to_le_bytes()).collect()
}

/// Inverse of [`samples_to_pcm_bytes`]. A trailing odd byte is dropped.
pub fn pcm_bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_create_resampler() {
        assert!(create_resampler(8000.0, 16000.0, RESAMPLE_CHUNK).is_ok());
        assert!(create_resampler(16000.0, 16000.0, RESAMPLE_CHUNK).is_ok());
        assert!(create_resampler(48000.0, 16000.0, RESAMPLE_CHUNK).is_ok());
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let input = vec![0.1f32, -0.2, 0.3];
        assert_eq!(resample(&input, 16000, 16000).unwrap(), input);
    }

    #[test]
    fn test_resample_doubles_length_when_upsampling() {
        let input = convert_i16_to_f32(&tone(440.0, Duration::from_secs(1), 8000, 0.5));
        let output = resample(&input, 8000, 16000).unwrap();
        assert_eq!(output.len(), 16000);
        for sample in output {
            assert!((-1.0..=1.0).contains(&sample));
        }
    }

    #[test]
    fn test_resample_short_input_adds_no_padding() {
        let output = resample(&[0.1; 1600], 8000, 16000).unwrap();
        assert_eq!(output.len(), 3200);
        // delay is skipped, so the level is already there mid-buffer
        assert_abs_diff_eq!(output[1600], 0.1, epsilon = 0.01);
        assert_abs_diff_eq!(output[3000], 0.1, epsilon = 0.01);

        let output = resample(&[0.1; 4800], 48000, 16000).unwrap();
        assert_eq!(output.len(), 1600);
        assert!(resample(&[0.1], 48000, 16000).unwrap().is_empty());
    }

    #[test]
    fn test_tone() {
        let samples = tone(440.0, Duration::from_millis(100), 16000, 0.5);
        assert_eq!(samples.len(), 1600);
        assert_eq!(samples[0], 0);

        let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert_abs_diff_eq!(
            peak as f32 / i16::MAX as f32,
            0.5,
            epsilon = 0.01
        );

        // amplitude is clamped
        let loud = tone(440.0, Duration::from_millis(10), 16000, 3.0);
        assert!(loud.iter().all(|s| *s > i16::MIN));
    }

    #[test]
    fn test_silence() {
        let samples = silence(Duration::from_millis(100), 16000);
        assert_eq!(samples.len(), 1600);
        assert!(samples.iter().all(|s| *s == 0));
        assert_eq!(samples_to_pcm_bytes(&samples).len(), 3200);
    }

    #[test]
    fn test_convert_f32_to_i16() {
        let input = vec![1.0f32, -1.0f32, 0.0f32, 0.5f32];
        let result = convert_f32_to_i16(&input);

        assert_eq!(result.len(), 4);
        assert_eq!(result[0], i16::MAX);
        // -1.0 * 32767 = -32767, not i16::MIN (-32768)
        assert_eq!(result[1], -32767);
        assert_eq!(result[2], 0);
        assert_eq!(result[3], (0.5 * i16::MAX as f32) as i16);

        let result = convert_f32_to_i16(&[2.0f32, -2.0f32]);
        assert_eq!(result[0], i16::MAX);
        assert_eq!(result[1], i16::MIN);

        assert!(convert_f32_to_i16(&[]).is_empty());
    }

    #[test]
    fn test_convert_i16_to_f32() {
        let input = vec![i16::MAX, i16::MIN, 0i16, 16384i16];
        let result = convert_i16_to_f32(&input);

        assert_eq!(result.len(), 4);
        assert_abs_diff_eq!(result[0], i16::MAX as f32 / 32768.0, epsilon = 0.0001);
        assert_abs_diff_eq!(result[1], -1.0, epsilon = 0.0001);
        assert_abs_diff_eq!(result[2], 0.0, epsilon = 0.0001);
        assert_abs_diff_eq!(result[3], 0.5, epsilon = 0.0001);
    }

    #[test]
    fn test_pcm_bytes_are_little_endian() {
        let bytes = samples_to_pcm_bytes(&[1, -2, 256]);
        assert_eq!(bytes, [0x01, 0x00, 0xFE, 0xFF, 0x00, 0x01]);
        assert_eq!(pcm_bytes_to_samples(&bytes), [1, -2, 256]);

        // odd trailing byte is ignored
        assert_eq!(pcm_bytes_to_samples(&[0x00, 0x40, 0x7F]), [16384]);
    }

    #[test]
    fn test_edge_cases() {
        let extreme_values = vec![f32::MAX, f32::MIN, f32::INFINITY, f32::NEG_INFINITY];
        let as_i16 = convert_f32_to_i16(&extreme_values);
        for value in convert_i16_to_f32(&as_i16) {
            assert!((-1.0..=1.0).contains(&value));
        }
    }
}
