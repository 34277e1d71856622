use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use petkin::prelude::*;

const DIMENSIONS: Dimensions = [64, 64, 32];

fn patlak() -> PatlakPlot {
    let frames = TimeFrameDefinitions::parse("6 10\n4 30\n4 60\n8 300").unwrap();
    let plasma = TimeActivityCurve::from_arrays(
        &[0.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0],
        &[0.0, 50.0, 120.0, 60.0, 30.0, 15.0, 10.0, 6.0, 4.0],
    )
    .unwrap();
    let mut patlak = PatlakPlot::with_inputs(frames, plasma, PatlakOptions::new(15));
    patlak.set_up().unwrap();
    patlak
}

fn operators_benchmark(c: &mut Criterion) {
    let patlak = patlak();
    let num_voxels = DIMENSIONS.iter().product::<usize>();
    let parametric = ParametricVolume::from_array(
        DIMENSIONS,
        Array2::from_shape_fn((num_voxels, 2), |(i, k)| {
            if k == 0 {
                1e-3 * (i % 97) as f64
            } else {
                0.1 * (i % 13) as f64
            }
        }),
    );
    let dynamic = patlak.forward(&parametric).unwrap();

    c.bench_function("Patlak fit 64x64x32", |b| {
        b.iter(|| black_box(patlak.fit(black_box(&dynamic)).unwrap()))
    });

    c.bench_function("Patlak forward 64x64x32", |b| {
        b.iter(|| black_box(patlak.forward(black_box(&parametric)).unwrap()))
    });

    c.bench_function("Patlak adjoint 64x64x32", |b| {
        b.iter(|| black_box(patlak.adjoint(black_box(&dynamic)).unwrap()))
    });
}

fn set_up_benchmark(c: &mut Criterion) {
    let frames = TimeFrameDefinitions::parse("6 10\n4 30\n4 60\n8 300").unwrap();
    let plasma = TimeActivityCurve::from_arrays(&[0.0, 30.0, 3600.0], &[0.0, 100.0, 5.0]).unwrap();
    c.bench_function("Patlak model matrix", |b| {
        b.iter(|| {
            let matrix = petkin::modelling::build_model_matrix(
                black_box(&frames),
                black_box(&plasma),
                &PatlakOptions::new(15),
            );
            black_box(matrix.unwrap())
        })
    });
}

criterion_group!(benches, operators_benchmark, set_up_benchmark);
criterion_main!(benches);
