//! Channel layout constants and the up/down-mix table.

/// Internal channel count of the graph. Sources produce one sample per
/// internal channel; the output bridge adapts to whatever layout the device
/// grants.
pub const CHANNELS: usize = 2;

/// Left channel index.
pub const LEFT: usize = 0;
/// Right channel index.
pub const RIGHT: usize = 1;

/// One sample per internal channel at one instant in time.
pub type Frame = [f32; CHANNELS];

#[inline]
fn average(input: &[f32]) -> f32 {
    if input.is_empty() {
        return 0.0;
    }
    input.iter().sum::<f32>() / input.len() as f32
}

/// Convert one frame between channel layouts with 1..=6 channels on either
/// side.
///
/// Equal counts copy through unchanged; mono replicates; mixing down to mono
/// averages; the sixth (LFE) channel of a 5.1 input is folded into every
/// forward channel of the target layout. Layouts outside 1..=6 degrade to
/// averaging the input into every output channel.
pub fn mix_frame(output: &mut [f32], input: &[f32]) {
    if output.len() == input.len() {
        output.copy_from_slice(input);
        return;
    }
    match (output.len(), input.len()) {
        (1, _) => output[0] = average(input),
        (2, 1) => {
            output[0] = input[0];
            output[1] = input[0];
        }
        (2, 3) => {
            output[0] = (2.0 * input[0] + input[1]) / 3.0;
            output[1] = (input[1] + 2.0 * input[2]) / 3.0;
        }
        (2, 4) => {
            output[0] = (input[0] + input[2]) / 2.0;
            output[1] = (input[1] + input[3]) / 2.0;
        }
        (2, 5) => {
            output[0] = (2.0 * input[0] + input[1] + 2.0 * input[3]) / 5.0;
            output[1] = (2.0 * input[2] + input[1] + 2.0 * input[4]) / 5.0;
        }
        (2, 6) => {
            output[0] = (2.0 * input[0] + input[1] + 2.0 * input[3]) / 5.0 + input[5];
            output[1] = (2.0 * input[2] + input[1] + 2.0 * input[4]) / 5.0 + input[5];
        }
        (3, 1) => output.fill(input[0]),
        (3, 2) => {
            output[0] = (5.0 * input[0] - input[1]) / 4.0;
            output[1] = (input[0] + input[1]) / 2.0;
            output[2] = (5.0 * input[1] - input[0]) / 4.0;
        }
        (3, 4) => {
            output[0] = (5.0 * (input[0] + input[2]) - input[1] - input[3]) / 8.0;
            output[1] = (input[0] + input[1] + input[2] + input[3]) / 4.0;
            output[2] = (5.0 * (input[1] + input[3]) - input[0] - input[2]) / 8.0;
        }
        (3, 5) => {
            output[0] = (input[0] + input[3]) / 2.0;
            output[1] = input[1];
            output[2] = (input[2] + input[4]) / 2.0;
        }
        (3, 6) => {
            output[0] = (input[0] + input[3]) / 2.0 + input[5];
            output[1] = input[1] + input[5];
            output[2] = (input[2] + input[4]) / 2.0 + input[5];
        }
        (4, 1) => output.fill(input[0]),
        (4, 2) => {
            output[0] = input[0];
            output[1] = input[1];
            output[2] = input[0];
            output[3] = input[1];
        }
        (4, 3) => {
            output[0] = (2.0 * input[0] + input[1]) / 3.0;
            output[1] = (input[1] + 2.0 * input[2]) / 3.0;
            output[2] = (2.0 * input[0] + input[1]) / 3.0;
            output[3] = (input[1] + 2.0 * input[2]) / 3.0;
        }
        (4, 5) => {
            output[0] = (2.0 * input[0] + input[1]) / 3.0;
            output[1] = (2.0 * input[2] + input[1]) / 3.0;
            output[2] = input[3];
            output[3] = input[4];
        }
        (4, 6) => {
            output[0] = (2.0 * input[0] + input[1]) / 3.0 + input[5];
            output[1] = (2.0 * input[2] + input[1]) / 3.0 + input[5];
            output[2] = input[3] + input[5];
            output[3] = input[4] + input[5];
        }
        (5, 1) => output.fill(input[0]),
        (5, 2) => {
            output[0] = (5.0 * input[0] - input[1]) / 4.0;
            output[1] = (input[0] + input[1]) / 2.0;
            output[2] = (5.0 * input[1] - input[0]) / 4.0;
            output[3] = (5.0 * input[0] - input[1]) / 4.0;
            output[4] = (5.0 * input[1] - input[0]) / 4.0;
        }
        (5, 3) => {
            output[0] = input[0];
            output[1] = input[1];
            output[2] = input[2];
            output[3] = input[0];
            output[4] = input[2];
        }
        (5, 4) => {
            output[0] = (5.0 * input[0] - input[1]) / 4.0;
            output[1] = (input[0] + input[1] + input[2] + input[3]) / 4.0;
            output[2] = (5.0 * input[1] - input[0]) / 4.0;
            output[3] = (5.0 * input[0] - input[1]) / 4.0;
            output[4] = (5.0 * input[1] - input[0]) / 4.0;
        }
        (5, 6) => {
            for (out, value) in output.iter_mut().zip(input) {
                *out = value + input[5];
            }
        }
        (6, 1) => output.fill(input[0]),
        (6, 2) => {
            output[0] = (5.0 * input[0] - input[1]) / 4.0;
            output[1] = (input[0] + input[1]) / 2.0;
            output[2] = (5.0 * input[1] - input[0]) / 4.0;
            output[3] = (5.0 * input[0] - input[1]) / 4.0;
            output[4] = (5.0 * input[1] - input[0]) / 4.0;
            output[5] = (input[0] + input[1]) / 2.0;
        }
        (6, 3) => {
            output[0] = input[0];
            output[1] = input[1];
            output[2] = input[2];
            output[3] = input[0];
            output[4] = input[2];
            output[5] = average(input);
        }
        (6, 4) => {
            output[0] = (5.0 * input[0] - input[1]) / 4.0;
            output[1] = (input[0] + input[1] + input[2] + input[3]) / 4.0;
            output[2] = (5.0 * input[1] - input[0]) / 4.0;
            output[3] = (5.0 * input[0] - input[1]) / 4.0;
            output[4] = (5.0 * input[1] - input[0]) / 4.0;
            output[5] = (input[0] + input[1] + input[2] + input[3]) / 4.0;
        }
        (6, 5) => {
            output[..5].copy_from_slice(input);
            output[5] = average(input);
        }
        _ => output.fill(average(input)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_equal_counts_copy_verbatim() {
        let input = [0.25, -0.75];
        let mut output = [0.0; 2];
        mix_frame(&mut output, &input);
        assert_eq!(output, input);

        // Identity also holds past the tabulated range.
        let input = [0.1; 8];
        let mut output = [0.0; 8];
        mix_frame(&mut output, &input);
        assert_eq!(output, input);
    }

    #[test]
    fn test_mono_replicates() {
        for channels in 2..=6 {
            let mut output = vec![0.0; channels];
            mix_frame(&mut output, &[0.5]);
            assert!(output.iter().all(|&sample| sample == 0.5));
        }
    }

    #[test]
    fn test_stereo_to_mono_averages() {
        let mut output = [1.0];
        mix_frame(&mut output, &[1.0, -1.0]);
        assert_relative_eq!(output[0], 0.0);
    }

    #[test]
    fn test_surround_folds_lfe_forward() {
        let input = [0.1, 0.2, 0.3, 0.4, 0.5, 1.0];
        let mut output = [0.0; 2];
        mix_frame(&mut output, &input);
        assert_relative_eq!(output[0], (2.0 * 0.1 + 0.2 + 2.0 * 0.4) / 5.0 + 1.0);
        assert_relative_eq!(output[1], (2.0 * 0.3 + 0.2 + 2.0 * 0.5) / 5.0 + 1.0);
    }

    #[test]
    fn test_quad_to_stereo_pairs_front_and_rear() {
        let mut output = [0.0; 2];
        mix_frame(&mut output, &[1.0, 0.0, 0.0, 1.0]);
        assert_relative_eq!(output[0], 0.5);
        assert_relative_eq!(output[1], 0.5);
    }

    #[test]
    fn test_out_of_range_layout_averages() {
        let mut output = [0.0; 7];
        mix_frame(&mut output, &[0.2, 0.4]);
        for sample in output {
            assert_relative_eq!(sample, 0.3, epsilon = 1e-6);
        }
    }
}
