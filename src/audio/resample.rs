pub(crate) fn resample_linear(samples: &[f32], input_rate: u32, output_rate: u32) -> Vec<f32> {
    let input_rate = input_rate.max(1);
    let output_rate = output_rate.max(1);
    if samples.is_empty() || input_rate == output_rate {
        return samples.to_vec();
    }
    let duration_seconds = samples.len() as f64 / input_rate as f64;
    let out_len = (duration_seconds * output_rate as f64).round().max(1.0) as usize;
    let step = input_rate as f64 / output_rate as f64;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        out.push(lerp_sample(samples, i as f64 * step));
    }
    out
}

fn lerp_sample(samples: &[f32], pos: f64) -> f32 {
    let last = samples.len() - 1;
    let idx0 = (pos.floor().max(0.0) as usize).min(last);
    let idx1 = (idx0 + 1).min(last);
    let frac = (pos - idx0 as f64).clamp(0.0, 1.0) as f32;
    let a = samples[idx0];
    let b = samples[idx1];
    a + (b - a) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_rates_pass_through() {
        let input = vec![0.25_f32, -0.5, 0.75];
        let out = resample_linear(&input, 16_000, 16_000);
        assert_eq!(out, input);
    }

    #[test]
    fn upsampling_interpolates_between_ramp_points() {
        let input = vec![0.0_f32, 0.5, 1.0];
        let out = resample_linear(&input, 2, 4);
        assert_eq!(out.len(), 6);
        // Positions advance by half an input sample, so odd outputs land
        // midway between the ramp points.
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[1] - 0.25).abs() < 1e-6);
        assert!((out[2] - 0.5).abs() < 1e-6);
        assert!((out[3] - 0.75).abs() < 1e-6);
        // Past the final input sample the last value holds.
        assert!((out[5] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn downsampling_scales_length_by_rate_ratio() {
        let input = vec![0.1_f32; 48_000];
        let out = resample_linear(&input, 48_000, 16_000);
        assert_eq!(out.len(), 16_000);
        assert!(out.iter().all(|v| (v - 0.1).abs() < 1e-6));
    }
}
