//! Fits a tiny linear model with the BERT optimizer setup: linear warmup, linear
//! decay, weight decay on everything except biases and layer norms, and
//! global norm clipping.
//!
//! There's no autodiff here, the gradients of the mean squared error are
//! written out by hand.
//!
//! Run with `RUST_LOG=debug` (or `trace`) to see what the optimizer does.

use rand::{rngs::StdRng, Rng, SeedableRng};
use wdopt::prelude::*;

#[derive(Debug, Clone, UpdateParams)]
struct Regressor<Elem: Dtype, Dev: Device<Elem>> {
    #[param]
    kernel: Tensor<Elem, Dev>,
    #[param]
    bias: Tensor<Elem, Dev>,
}

const FEATURES: usize = 3;
const TRUE_KERNEL: [f32; FEATURES] = [0.5, -1.5, 2.0];
const TRUE_BIAS: f32 = 0.25;

fn batch(rng: &mut StdRng, size: usize) -> Vec<([f32; FEATURES], f32)> {
    (0..size)
        .map(|_| {
            let x: [f32; FEATURES] = std::array::from_fn(|_| rng.gen_range(-1.0..1.0));
            let y = x.iter().zip(TRUE_KERNEL).map(|(a, b)| a * b).sum::<f32>() + TRUE_BIAS;
            (x, y)
        })
        .collect()
}

/// Mean squared error and its gradients.
fn loss_and_grads(
    model: &Regressor<f32, Cpu>,
    data: &[([f32; FEATURES], f32)],
) -> (f32, Gradients<f32, Cpu>) {
    let kernel = model.kernel.as_vec();
    let bias = model.bias.as_vec()[0];
    let n = data.len() as f32;

    let mut loss = 0.0;
    let mut d_kernel = vec![0.0; FEATURES];
    let mut d_bias = 0.0;
    for (x, y) in data {
        let pred = x.iter().zip(&kernel).map(|(a, b)| a * b).sum::<f32>() + bias;
        let err = pred - y;
        loss += err * err / n;
        for (d, a) in d_kernel.iter_mut().zip(x) {
            *d += 2.0 * err * a / n;
        }
        d_bias += 2.0 * err / n;
    }

    let mut grads = Gradients::leaky();
    grads.try_insert(&model.kernel, d_kernel).unwrap();
    grads.try_insert(&model.bias, vec![d_bias]).unwrap();
    (loss, grads)
}

fn main() {
    env_logger::init();

    let dev: Cpu = Cpu::seed_from_u64(0);
    let mut rng = StdRng::seed_from_u64(0);
    let mut model = Regressor {
        kernel: dev.sample_normal([FEATURES]),
        bias: dev.zeros([1]),
    };

    let num_train_steps = 300;
    let mut opt = create_optimizer(&model, 0.1, num_train_steps, 30).unwrap();

    for step in 0..num_train_steps {
        let data = batch(&mut rng, 32);
        let (loss, grads) = loss_and_grads(&model, &data);
        if step % 50 == 0 {
            println!("step {step:>3}: lr={:.5} loss={loss:.5}", opt.learning_rate());
        }
        opt.update(&mut model, &grads).unwrap();
    }
    println!("kernel = {:?} (true {TRUE_KERNEL:?})", model.kernel.as_vec());
    println!("bias   = {:?} (true {TRUE_BIAS})", model.bias.as_vec());

    // the config round-trips through JSON, schedule included
    let json = opt.get_config().unwrap().to_json().unwrap();
    println!("{json}");
    let config = OptimizerConfig::from_json(&json).unwrap();
    let rebuilt: AdamWeightDecay<Regressor<f32, Cpu>, f32, Cpu> =
        AdamWeightDecay::from_config(&config).unwrap();
    assert_eq!(rebuilt.should_decay("bias"), opt.should_decay("bias"));

    // and the moments can be checkpointed next to the model
    let path = std::env::temp_dir().join("bert-finetune-optimizer.safetensors");
    opt.save_safetensors(&model, &path).unwrap();
    let mut resumed: AdamWeightDecay<Regressor<f32, Cpu>, f32, Cpu> =
        create_optimizer(&model, 0.1, num_train_steps, 30).unwrap();
    resumed.load_safetensors(&model, &path).unwrap();
    assert_eq!(resumed.iterations(), opt.iterations());
    std::fs::remove_file(&path).unwrap();
}
