//! 单帧处理基准
//!
//! 采集线程不限速，单帧耗时直接决定控制回路能拿到的观测频率。

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::Rgb;
use linebot_tools::RobotConfig;
use linebot_vision::{Frame, LineAnalyzer, debug};

fn config() -> RobotConfig {
    RobotConfig::from_toml_str(include_str!("../../../config/robot.toml")).unwrap()
}

fn frame(width: u32, height: u32) -> Frame {
    let mut frame = Frame::from_pixel(width, height, Rgb([230, 230, 225]));
    for y in 0..height {
        let x0 = width / 2 - 20 + y / 16;
        for x in x0..x0 + 18 {
            frame.put_pixel(x, y, Rgb([25, 25, 25]));
        }
    }
    frame
}

fn bench_analyze(c: &mut Criterion) {
    let config = config();
    let frame = frame(config.camera.width, config.camera.height);
    let mut analyzer = LineAnalyzer::new(&config.camera);

    c.bench_function("analyze_frame_320x240", |b| {
        b.iter(|| analyzer.analyze_frame(black_box(&frame), &config.vision, &config.line))
    });

    let mut no_blur = config.vision.clone();
    no_blur.blur_kernel = 0;
    c.bench_function("analyze_frame_320x240_no_blur", |b| {
        b.iter(|| analyzer.analyze_frame(black_box(&frame), &no_blur, &config.line))
    });
}

fn bench_debug_render(c: &mut Criterion) {
    let config = config();
    let frame = frame(config.camera.width, config.camera.height);
    let mut analyzer = LineAnalyzer::new(&config.camera);
    let analysis = analyzer.analyze_frame(&frame, &config.vision, &config.line);

    c.bench_function("debug_render_jpeg_q60", |b| {
        b.iter(|| {
            debug::render(
                black_box(&frame),
                &analysis,
                analyzer.center_x(),
                config.vision.jpeg_quality,
            )
        })
    });
}

criterion_group!(benches, bench_analyze, bench_debug_render);
criterion_main!(benches);
