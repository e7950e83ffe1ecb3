use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use detector::config::ModelFamily;
use detector::processing::{
    TransformParams,
    post::PostProcessor,
    pre::{Normalization, PreProcessor},
};
use detector::result::RawResult;
use detector::serialize_detections;
use image::RgbImage;
use ndarray::{Array, ArrayD, IxDyn};

const NUM_CLASSES: usize = 80;

fn transform(size: u32) -> TransformParams {
    TransformParams {
        orig_width: 1920,
        orig_height: 1080,
        input_width: size,
        input_height: size,
        scale: size as f32 / 1920.0,
        offset_x: 0.0,
        offset_y: (size as f32 - 1080.0 * size as f32 / 1920.0) / 2.0,
    }
}

/// YOLO head `[1, 4 + classes, anchors]` with `hits` confident anchors.
fn mock_yolo_output(anchors: usize, hits: usize) -> ArrayD<f32> {
    let mut output = Array::zeros(IxDyn(&[1, 4 + NUM_CLASSES, anchors]));
    for a in 0..anchors {
        output[[0, 0, a]] = (a % 600) as f32 + 20.0;
        output[[0, 1, a]] = (a % 400) as f32 + 20.0;
        output[[0, 2, a]] = 30.0;
        output[[0, 3, a]] = 30.0;
        output[[0, 4 + a % NUM_CLASSES, a]] = if a < hits { 0.9 } else { 0.01 };
    }
    output
}

/// RF-DETR heads with `hits` confident queries out of `queries`.
fn mock_detr_output(queries: usize, hits: usize) -> (ArrayD<f32>, ArrayD<f32>) {
    let classes = NUM_CLASSES + 1;
    let mut dets = Array::zeros(IxDyn(&[1, queries, 4]));
    let mut logits = Array::from_elem(IxDyn(&[1, queries, classes]), -6.0f32);
    for q in 0..queries {
        dets[[0, q, 0]] = 0.5;
        dets[[0, q, 1]] = 0.5;
        dets[[0, q, 2]] = 0.2;
        dets[[0, q, 3]] = 0.2;
        if q < hits {
            logits[[0, q, 1 + q % NUM_CLASSES]] = 4.0;
        }
    }
    (dets, logits)
}

fn bench_parse_yolo(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_yolo");
    let postprocessor = PostProcessor::new(0.25, 0.45);
    let transform = transform(640);

    for hits in [0, 10, 100, 1000] {
        let output = mock_yolo_output(8400, hits);
        group.bench_with_input(BenchmarkId::new("hits", hits), &output, |b, output| {
            b.iter(|| {
                postprocessor
                    .parse_yolo(black_box(&output.view()), &transform)
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_parse_detr(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_detr");
    let postprocessor = PostProcessor::new(0.5, 0.45);
    let transform = transform(512);

    for hits in [0, 10, 100, 300] {
        let (dets, logits) = mock_detr_output(300, hits);
        group.bench_function(BenchmarkId::new("hits", hits), |b| {
            b.iter(|| {
                postprocessor
                    .parse_detr(black_box(&dets.view()), black_box(&logits.view()), &transform)
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_preprocess(c: &mut Criterion) {
    let image = RgbImage::from_pixel(1920, 1080, image::Rgb([128, 64, 32]));
    let mut group = c.benchmark_group("preprocess");

    for family in [ModelFamily::Yolo, ModelFamily::Detr] {
        let preprocessor = PreProcessor::new(
            family.default_input_size(),
            Normalization::from(family),
        );
        group.bench_function(format!("{:?}", family), |b| {
            b.iter(|| preprocessor.preprocess(black_box(&image)).unwrap());
        });
    }
    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let postprocessor = PostProcessor::new(0.25, 0.45);
    let candidates = postprocessor
        .parse_yolo(&mock_yolo_output(8400, 300).view(), &transform(640))
        .unwrap();
    let raw = RawResult {
        names: Some(detector::labels::coco_names()),
        boxes: Some(candidates.into_iter().collect()),
    };

    c.bench_function("serialize_detections", |b| {
        b.iter(|| serialize_detections(black_box(&raw)));
    });
}

criterion_group!(
    benches,
    bench_parse_yolo,
    bench_parse_detr,
    bench_preprocess,
    bench_serialize
);
criterion_main!(benches);
