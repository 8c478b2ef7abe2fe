use rand::{rngs::StdRng, Rng, SeedableRng};
use wdopt::{optim::CLIP_NORM, prelude::*};

#[derive(Debug, Clone, UpdateParams)]
struct LayerNorm<Elem: Dtype, Dev: Device<Elem>> {
    #[param]
    gamma: Tensor<Elem, Dev>,
    #[param]
    beta: Tensor<Elem, Dev>,
    epsilon: f64,
}

#[derive(Debug, Clone, UpdateParams)]
struct Dense<Elem: Dtype, Dev: Device<Elem>> {
    #[param]
    kernel: Tensor<Elem, Dev>,
    #[param]
    bias: Tensor<Elem, Dev>,
}

#[derive(Debug, Clone, UpdateParams)]
struct Layer<Elem: Dtype, Dev: Device<Elem>> {
    #[module]
    attention: Dense<Elem, Dev>,
    #[module]
    layer_norm: LayerNorm<Elem, Dev>,
}

/// Concrete element and device types work too.
#[derive(Debug, Clone, UpdateParams)]
struct Encoder {
    #[param]
    embeddings: Tensor<f32, Cpu>,
    #[module]
    layers: Vec<Layer<f32, Cpu>>,
    #[module]
    pooler: (Dense<f32, Cpu>,),
}

#[derive(Debug, Clone, UpdateParams)]
struct Pair(#[param] Tensor<f32, Cpu>, Tensor<f32, Cpu>, #[param] Tensor<f32, Cpu>);

fn dense(dev: &Cpu, i: usize, o: usize) -> Dense<f32, Cpu> {
    Dense {
        kernel: dev.sample_normal([i, o]),
        bias: dev.zeros([o]),
    }
}

fn encoder(dev: &Cpu) -> Encoder {
    let layer = || Layer {
        attention: dense(dev, 4, 4),
        layer_norm: LayerNorm {
            gamma: dev.ones([4]),
            beta: dev.zeros([4]),
            epsilon: 1e-12,
        },
    };
    Encoder {
        embeddings: dev.sample_normal([10, 4]),
        layers: vec![layer(), layer()],
        pooler: (dense(dev, 4, 2),),
    }
}

fn random_grads(model: &Encoder, rng: &mut StdRng, scale: f32) -> Gradients<f32, Cpu> {
    let mut grads = Gradients::leaky();
    model.visit_params("", &mut |_: &str, t: &Tensor<f32, Cpu>| {
        let g = (0..t.len()).map(|_| rng.gen_range(-scale..scale)).collect();
        grads.try_insert(t, g).unwrap();
    });
    grads
}

fn norm(grads: &[Vec<f32>]) -> f64 {
    grads
        .iter()
        .flatten()
        .map(|&g| (g as f64).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[test]
fn test_derived_param_names() {
    let dev: Cpu = Default::default();
    let model = encoder(&dev);
    assert_eq!(
        model.param_names(),
        [
            "embeddings",
            "layers.0.attention.kernel",
            "layers.0.attention.bias",
            "layers.0.layer_norm.gamma",
            "layers.0.layer_norm.beta",
            "layers.1.attention.kernel",
            "layers.1.attention.bias",
            "layers.1.layer_norm.gamma",
            "layers.1.layer_norm.beta",
            "pooler.0.kernel",
            "pooler.0.bias",
        ]
    );

    let pair = Pair(dev.zeros([1]), dev.zeros([1]), dev.zeros([1]));
    assert_eq!(pair.param_names(), ["0", "2"]);
    assert_eq!(pair.param_ids(), vec![pair.0.id(), pair.2.id()]);
}

#[test]
fn test_bert_exclusions() {
    let dev: Cpu = Default::default();
    let model = encoder(&dev);
    let opt: AdamWeightDecay<_, f32, Cpu> = create_optimizer(&model, 1e-4, 100, 10).unwrap();
    let decayed: Vec<String> = model
        .param_names()
        .into_iter()
        .filter(|name| opt.should_decay(name))
        .collect();
    assert_eq!(
        decayed,
        [
            "embeddings",
            "layers.0.attention.kernel",
            "layers.1.attention.kernel",
            "pooler.0.kernel",
        ]
    );
}

#[test]
fn test_zero_gradients_only_decay() {
    let dev: Cpu = Default::default();
    let mut model = encoder(&dev);
    let before = model.clone();
    let mut grads = Gradients::leaky();
    model.visit_params("", &mut |_: &str, t: &Tensor<f32, Cpu>| {
        grads.try_insert(t, vec![0.0; t.len()]).unwrap();
    });

    let mut opt = AdamWeightDecay::new(
        &model,
        AdamWeightDecayConfig {
            learning_rate: std::sync::Arc::new(ConstantSchedule::new(0.5)),
            weight_decay_rate: 0.1,
            exclude_from_weight_decay: Some(vec!["layer_norm".into(), "bias".into()]),
            ..Default::default()
        },
    )
    .unwrap();
    opt.update(&mut model, &grads).unwrap();

    let shrunk: Vec<f32> = before.embeddings.as_vec().iter().map(|x| x * 0.95).collect();
    for (a, b) in model.embeddings.as_vec().iter().zip(shrunk) {
        assert!((a - b).abs() < 1e-5);
    }
    assert_eq!(
        model.layers[1].layer_norm.gamma.as_vec(),
        before.layers[1].layer_norm.gamma.as_vec()
    );
    assert_eq!(model.pooler.0.bias.as_vec(), before.pooler.0.bias.as_vec());
}

fn flat_values(model: &Encoder) -> Vec<f32> {
    let mut values = Vec::new();
    model.visit_params("", &mut |_: &str, t: &Tensor<f32, Cpu>| values.extend(t.as_vec()));
    values
}

#[test]
fn test_updates_follow_clipped_gradients() {
    let dev: Cpu = Default::default();
    let mut rng = StdRng::seed_from_u64(0);
    for scale in [0.01, 0.1, 1.0, 10.0] {
        let mut model = encoder(&dev);
        let grads = random_grads(&model, &mut rng, scale);
        let mut flat = Vec::new();
        model.visit_params("", &mut |_: &str, t: &Tensor<f32, Cpu>| {
            flat.push(grads.get_ref_checked(t).unwrap().clone());
        });
        let factor = CLIP_NORM / norm(&flat).max(CLIP_NORM);
        if scale >= 1.0 {
            assert!(factor < 1.0);
        }
        if scale <= 0.01 {
            assert_eq!(factor, 1.0);
        }

        // a large eps keeps the first update from being scale invariant
        let mut opt = AdamWeightDecay::new(
            &model,
            AdamWeightDecayConfig {
                learning_rate: std::sync::Arc::new(ConstantSchedule::new(1.0)),
                eps: 1.0,
                ..Default::default()
            },
        )
        .unwrap();
        let start = flat_values(&model);
        opt.update(&mut model, &grads).unwrap();
        let end = flat_values(&model);

        for ((p0, p1), g) in start.iter().zip(end).zip(flat.iter().flatten()) {
            let g = *g as f64 * factor;
            let expected = 0.1 * g / ((0.001 * g * g).sqrt() + 1.0);
            let step = (p0 - p1) as f64;
            assert!(
                (step - expected).abs() < 1e-5,
                "scale {scale}: {step} != {expected}"
            );
        }
    }
}

#[test]
fn test_sparse_gradients_are_rejected() {
    let dev: Cpu = Default::default();
    let mut model = encoder(&dev);
    let before = model.clone();
    let mut rng = StdRng::seed_from_u64(1);
    let mut grads = random_grads(&model, &mut rng, 1.0);
    grads
        .try_insert_sparse(&model.embeddings, vec![3, 7], vec![1.0, -1.0])
        .unwrap();

    let mut opt: AdamWeightDecay<_, f32, Cpu> = create_optimizer(&model, 1e-3, 10, 0).unwrap();
    let err = opt.update(&mut model, &grads).unwrap_err();
    assert!(matches!(
        err,
        OptimizerUpdateError::TensorError(Error::SparseGradientsUnsupported(ref name))
            if name == "embeddings"
    ));
    assert_eq!(err.to_string(), "sparse gradient updates are not supported (parameter `embeddings`)");
    for (a, b) in model.layers.iter().zip(before.layers.iter()) {
        assert_eq!(a.attention.kernel.as_vec(), b.attention.kernel.as_vec());
    }
    assert_eq!(opt.iterations(), 0);
}

#[test]
fn test_config_json_round_trip() {
    let dev: Cpu = Default::default();
    let model = encoder(&dev);
    let opt: AdamWeightDecay<_, f32, Cpu> = create_optimizer(&model, 3e-5, 2000, 200).unwrap();

    let json = opt.get_config().unwrap().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["name"], "AdamWeightDecay");
    assert_eq!(value["weight_decay_rate"], 0.01);
    assert_eq!(value["learning_rate"]["class_name"], "WarmUp");
    assert_eq!(value["learning_rate"]["config"]["warmup_steps"], 200);
    assert_eq!(
        value["learning_rate"]["config"]["decay_schedule_fn"]["class_name"],
        "PolynomialDecay"
    );

    let config = OptimizerConfig::from_json(&json).unwrap();
    let rebuilt: AdamWeightDecay<Encoder, f32, Cpu> = AdamWeightDecay::from_config(&config).unwrap();
    assert_eq!(rebuilt.config().betas, [0.9, 0.999]);
    assert_eq!(rebuilt.config().weight_decay_rate, 0.01);
    for step in [0, 1, 100, 199, 200, 1000, 2000, 5000] {
        let a = rebuilt.config().learning_rate.learning_rate(step);
        let b = opt.config().learning_rate.learning_rate(step);
        assert!((a - b).abs() <= 1e-15, "step {step}: {a} != {b}");
    }
    for name in model.param_names() {
        assert_eq!(rebuilt.should_decay(&name), opt.should_decay(&name));
    }
}

#[test]
fn test_unknown_schedule_in_json() {
    let json = r#"{
        "name": "AdamWeightDecay",
        "learning_rate": {"class_name": "CosineDecay", "config": {"initial_learning_rate": 0.1}},
        "beta_1": 0.9,
        "beta_2": 0.999,
        "epsilon": 1e-7,
        "weight_decay_rate": 0.0
    }"#;
    let config = OptimizerConfig::from_json(json).unwrap();
    let r: Result<AdamWeightDecay<Encoder, f32, Cpu>, _> = AdamWeightDecay::from_config(&config);
    assert!(matches!(r, Err(ConfigError::UnknownSchedule(ref n)) if n == "CosineDecay"));
}

#[test]
fn test_training_loop_with_warmup() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dev: Cpu = Default::default();
    let mut model = encoder(&dev);
    let mut opt = create_optimizer(&model, 1e-2, 20, 5).unwrap();
    let mut rng = StdRng::seed_from_u64(2);

    let mut rates = Vec::new();
    for _ in 0..25 {
        rates.push(opt.learning_rate());
        let grads = random_grads(&model, &mut rng, 1.0);
        opt.update(&mut model, &grads).unwrap();
    }
    assert_eq!(opt.iterations(), 25);
    assert_eq!(rates[0], 0.0);
    assert!(rates[..5].windows(2).all(|w| w[0] < w[1]));
    assert!(rates[5..20].windows(2).all(|w| w[0] > w[1]));
    assert!(rates[20..].iter().all(|&r| r == 0.0));
    assert!(model
        .embeddings
        .as_vec()
        .iter()
        .all(|x| x.is_finite()));
}
