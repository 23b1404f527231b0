use rd_core::config::FeatureConfig;
use rd_core::tensor::FeatureTensor;

use crate::artifact::QuantizedNet;
use crate::error::ModelError;

/// Run the int8 network over one normalized feature tensor.
///
/// The whole pipeline up to the final dense layer runs on int8 activations
/// with i32 accumulators; the logits are dequantized and softmaxed in f32.
/// Returns one probability per class, summing to 1.
///
/// # Errors
/// Returns [`ModelError::InvalidInput`] if the tensor shape does not match
/// the network, or if the input is not in the normalized [0, 1] range the
/// quantizer assumed (values are clamped, never rejected, so this only
/// fires on shape problems).
pub fn run(
    net: &QuantizedNet,
    feature: &FeatureConfig,
    tensor: &FeatureTensor,
) -> Result<Vec<f32>, ModelError> {
    let (t, m, _) = tensor.shape();
    if t != feature.time_steps || m != feature.n_mfcc {
        return Err(ModelError::InvalidInput(format!(
            "feature tensor is {t}×{m}, model expects {}×{}",
            feature.time_steps, feature.n_mfcc
        )));
    }
    let k = net.kernel_size;
    if t < k + 1 || m < k + 1 {
        return Err(ModelError::InvalidInput(
            "input too small for conv + pool".into(),
        ));
    }

    // Quantize the normalized input.
    let input_q: Vec<i8> = tensor
        .as_slice()
        .iter()
        .map(|&v| net.input.quantize(v.clamp(0.0, 1.0)))
        .collect();

    // Conv 3×3 (valid) + ReLU, requantized to conv_out.
    let (ch, cw) = (t - k + 1, m - k + 1);
    let acc_scale = net.input.scale * net.conv_w_scale;
    let zp_in = net.input.zero_point;
    let mut conv_q = vec![0i8; net.conv_filters * ch * cw];
    for oc in 0..net.conv_filters {
        let w_base = oc * k * k;
        for oy in 0..ch {
            for ox in 0..cw {
                let mut acc = net.conv_b[oc];
                for ky in 0..k {
                    let row = (oy + ky) * m + ox;
                    let w_row = w_base + ky * k;
                    for kx in 0..k {
                        let x = i32::from(input_q[row + kx]) - zp_in;
                        let w = i32::from(net.conv_w[w_row + kx]);
                        acc += x * w;
                    }
                }
                let real = (acc as f32 * acc_scale).max(0.0);
                conv_q[(oc * ch + oy) * cw + ox] = net.conv_out.quantize(real);
            }
        }
    }

    // MaxPool 2×2 on int8 (monotonic, quantization params unchanged).
    let (ph, pw) = (ch / 2, cw / 2);
    let mut pool_q = vec![0i8; net.conv_filters * ph * pw];
    for oc in 0..net.conv_filters {
        for py in 0..ph {
            for px in 0..pw {
                let base = (oc * ch + py * 2) * cw + px * 2;
                let q = conv_q[base]
                    .max(conv_q[base + 1])
                    .max(conv_q[base + cw])
                    .max(conv_q[base + cw + 1]);
                pool_q[(oc * ph + py) * pw + px] = q;
            }
        }
    }

    // Hidden dense + ReLU, requantized to fc1_out.
    let flat = net.conv_filters * ph * pw;
    if net.fc1_w.len() != net.hidden_units * flat {
        return Err(ModelError::InvalidInput(format!(
            "fc1 weights cover {} inputs, flattened pool has {flat}",
            net.fc1_w.len() / net.hidden_units.max(1)
        )));
    }
    let fc1 = dense_i8(
        &pool_q,
        &net.fc1_w,
        &net.fc1_b,
        net.conv_out.zero_point,
        net.hidden_units,
        flat,
    );
    let fc1_scale = net.conv_out.scale * net.fc1_w_scale;
    let fc1_q: Vec<i8> = fc1
        .iter()
        .map(|&acc| net.fc1_out.quantize((acc as f32 * fc1_scale).max(0.0)))
        .collect();

    // Output dense → dequantized logits.
    let logits_acc = dense_i8(
        &fc1_q,
        &net.fc2_w,
        &net.fc2_b,
        net.fc1_out.zero_point,
        net.num_classes,
        net.hidden_units,
    );
    let logit_scale = net.fc1_out.scale * net.fc2_w_scale;
    let logits: Vec<f32> = logits_acc
        .iter()
        .map(|&acc| acc as f32 * logit_scale)
        .collect();

    Ok(softmax(&logits))
}

/// `out[j] = b[j] + Σ_i (x[i] - zp) · w[j·in + i]` with i32 accumulation.
fn dense_i8(x: &[i8], w: &[i8], b: &[i32], zp: i32, out_dim: usize, in_dim: usize) -> Vec<i32> {
    let mut out = Vec::with_capacity(out_dim);
    for j in 0..out_dim {
        let row = &w[j * in_dim..(j + 1) * in_dim];
        let mut acc = b[j];
        for (xi, wi) in x.iter().zip(row.iter()) {
            acc += (i32::from(*xi) - zp) * i32::from(*wi);
        }
        out.push(acc);
    }
    out
}

/// Numerically stable softmax.
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|&e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantize::QuantParams;

    /// 4×4 input, 1 filter → 2×2 conv → 1×1 pool → flat 1 → hidden 1 → 2 classes.
    fn tiny_feature() -> FeatureConfig {
        FeatureConfig {
            time_steps: 4,
            n_mfcc: 4,
            ..FeatureConfig::default()
        }
    }

    fn tiny_net() -> QuantizedNet {
        QuantizedNet {
            conv_filters: 1,
            kernel_size: 3,
            hidden_units: 1,
            num_classes: 2,
            input: QuantParams::unit_input(),
            conv_w: vec![0; 9],
            conv_w_scale: 1.0,
            conv_b: vec![0],
            conv_out: QuantParams::from_range(0.0, 1.0),
            fc1_w: vec![0],
            fc1_w_scale: 1.0,
            fc1_b: vec![0],
            fc1_out: QuantParams::from_range(0.0, 1.0),
            fc2_w: vec![0, 0],
            fc2_w_scale: 0.01,
            fc2_b: vec![0, 200],
        }
    }

    #[test]
    fn probabilities_sum_to_one() {
        let feature = tiny_feature();
        let tensor = FeatureTensor::zeroed(4, 4);
        let probs = run(&tiny_net(), &feature, &tensor).expect("run");
        assert_eq!(probs.len(), 2);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn output_bias_steers_the_prediction() {
        let feature = tiny_feature();
        let tensor = FeatureTensor::zeroed(4, 4);
        // fc2 biases are (0, 200) at scale fc1_out.scale · 0.01 → class 1 wins.
        let probs = run(&tiny_net(), &feature, &tensor).expect("run");
        assert!(probs[1] > probs[0]);
    }

    #[test]
    fn rejects_mismatched_tensor_shape() {
        let feature = tiny_feature();
        let tensor = FeatureTensor::zeroed(8, 8);
        assert!(matches!(
            run(&tiny_net(), &feature, &tensor),
            Err(ModelError::InvalidInput(_))
        ));
    }

    #[test]
    fn softmax_is_stable_for_large_logits() {
        let probs = softmax(&[1000.0, 1001.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!(probs[1] > probs[0]);
    }
}
