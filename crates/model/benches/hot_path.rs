//! Hot-path benchmarks: descriptor encode + cache + NN forward, and the
//! pure analytical estimate, over the reference convolution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use vpucost_core::{
    DataType, Dim2, DpuWorkload, ExecutionMode, Layout, Operation, Padding, VpuDevice, VpuTensor,
};
use vpucost_model::{CostModelConfig, VpuCostModel};
use vpucost_nn::{encode_model, LayerOp, Preprocessor, Tensor};

fn conv_3x3() -> DpuWorkload {
    let t = VpuTensor::dense([56, 56, 64, 1], DataType::Uint8, Layout::Zmajor).unwrap();
    let mut wl = DpuWorkload::with_tensors(VpuDevice::Vpu2_7, Operation::Convolution, vec![t], t);
    wl.kernel = Dim2::square(3);
    wl.padding = Padding {
        top: 1,
        bottom: 1,
        left: 1,
        right: 1,
    };
    wl.execution_mode = ExecutionMode::Cuboid16x16;
    wl
}

fn nn_model() -> VpuCostModel {
    let len = Preprocessor::V11.descriptor_length();
    let layers = vec![
        LayerOp::Dense {
            weights: Tensor::from_slice(&vec![0.01; 64 * len], 64, len),
        },
        LayerOp::Bias {
            bias: vec![0.1; 64],
        },
        LayerOp::Sigmoid,
        LayerOp::Dense {
            weights: Tensor::from_slice(&vec![0.5; 64], 1, 64),
        },
        LayerOp::Bias {
            bias: vec![10_000.0],
        },
    ];
    let bytes = encode_model("bench-11-1", &layers);
    VpuCostModel::from_model_bytes(&bytes, true, CostModelConfig::default()).unwrap()
}

fn bench_dpu(c: &mut Criterion) {
    let analytical = VpuCostModel::analytical();
    c.bench_function("dpu_analytical", |b| {
        b.iter(|| analytical.dpu(black_box(conv_3x3())))
    });

    let with_nn = nn_model();
    c.bench_function("dpu_nn_cached", |b| {
        b.iter(|| with_nn.dpu(black_box(conv_3x3())))
    });

    c.bench_function("dpu_nn_cold", |b| {
        b.iter(|| {
            with_nn.clear_cache();
            with_nn.dpu(black_box(conv_3x3()))
        })
    });
}

criterion_group!(benches, bench_dpu);
criterion_main!(benches);
