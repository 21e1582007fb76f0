use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ksvm::{Example, Kernel, KernelFunction, SvmConfig, SVM};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn random_vectors(n: usize, dim: usize, rng: &mut SmallRng) -> Vec<Vec<f64>> {
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}

fn two_moons(n: usize, rng: &mut SmallRng) -> Vec<Example> {
    (0..n)
        .map(|i| {
            let t = rng.gen_range(0.0..std::f64::consts::PI);
            let noise = rng.gen_range(-0.1..0.1);
            if i % 2 == 0 {
                Example::new(vec![t.cos() + noise, t.sin() + noise], 0.0)
            } else {
                Example::new(vec![1.0 - t.cos() + noise, 0.5 - t.sin() + noise], 1.0)
            }
        })
        .collect()
}

fn bench_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel");
    let mut rng = SmallRng::seed_from_u64(42);
    let vectors = random_vectors(2, 256, &mut rng);

    let kernels = [
        Kernel::linear(),
        Kernel::polynomial(3, 0.5, 1.0).unwrap(),
        Kernel::rbf(0.5).unwrap(),
        Kernel::sigmoid(0.01, 0.0).unwrap(),
    ];
    for kernel in kernels {
        let id = BenchmarkId::new("compute", kernel.name());
        group.bench_with_input(id, &kernel, |b, k| {
            let (x, y) = (&vectors[0], &vectors[1]);
            b.iter(|| k.compute(black_box(x), black_box(y)))
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10);
    let mut rng = SmallRng::seed_from_u64(7);

    for n in [100, 400] {
        let examples = two_moons(n, &mut rng);
        let id = BenchmarkId::new("c_svc_rbf", n);
        group.bench_with_input(id, &examples, |b, examples| {
            let config = SvmConfig::c_svc(1.0).unwrap();
            let kernel = Kernel::rbf(1.0).unwrap();
            b.iter(|| {
                let svm = SVM::new(config, kernel).unwrap();
                svm.train(black_box(examples)).unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_kernels, bench_training);
criterion_main!(benches);
