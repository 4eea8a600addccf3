//! 调试帧
//!
//! 在原始帧上叠加 ROI/边缘参考线、帧中心线、选中线的轮廓和质心、
//! 误差连线和模式文字，然后编码为 JPEG。

use crate::analyzer::Analysis;
use crate::error::VisionError;
use crate::Frame;
use bytes::Bytes;
use image::Rgb;
use image::codecs::jpeg::JpegEncoder;

pub const MARGIN_COLOR: Rgb<u8> = Rgb([0, 100, 255]);
pub const ROI_COLOR: Rgb<u8> = Rgb([255, 200, 0]);
pub const CENTER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const LINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const CONNECTOR_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
pub const LOST_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const TRACKING_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const ANGLE_COLOR: Rgb<u8> = Rgb([255, 165, 0]);

const CENTROID_RADIUS: i64 = 3;
const TEXT_ORIGIN: (i64, i64) = (2, 2);
const TEXT_SCALE: i64 = 2;

/// 模式文字和颜色
pub fn mode_label(analysis: &Analysis) -> (String, Rgb<u8>) {
    let obs = &analysis.observation;
    if obs.right_angle {
        ("ANGLE".to_string(), ANGLE_COLOR)
    } else if obs.lost {
        ("LOST".to_string(), LOST_COLOR)
    } else {
        (format!("E={:+.0}", obs.error), TRACKING_COLOR)
    }
}

/// 生成标注后的帧
pub fn annotate(frame: &Frame, analysis: &Analysis, center_x: i32) -> Frame {
    let mut canvas = frame.clone();
    let (width, height) = canvas.dimensions();
    let (w, h) = (width as i64, height as i64);
    let roi = &analysis.roi;
    let (top, bottom) = (roi.top as i64, roi.bottom as i64);
    let margin = roi.margin as i64;

    vline(&mut canvas, margin, top, bottom, MARGIN_COLOR);
    vline(&mut canvas, w - margin, top, bottom, MARGIN_COLOR);
    hline(&mut canvas, 0, w, top, ROI_COLOR);
    vline(&mut canvas, center_x as i64, 0, h, CENTER_COLOR);

    if let (Some(blob), Some((cx, cy))) = (&analysis.line, analysis.line_center()) {
        for &(x, y) in &blob.outline {
            plot(&mut canvas, x as i64, y as i64 + top, LINE_COLOR);
        }
        let (cx, cy) = (cx as i64, cy as i64);
        for dy in -CENTROID_RADIUS..=CENTROID_RADIUS {
            for dx in -CENTROID_RADIUS..=CENTROID_RADIUS {
                if dx * dx + dy * dy <= CENTROID_RADIUS * CENTROID_RADIUS {
                    plot(&mut canvas, cx + dx, cy + dy, LINE_COLOR);
                }
            }
        }
        hline(&mut canvas, center_x as i64, cx, cy, CONNECTOR_COLOR);
    }

    let (text, color) = mode_label(analysis);
    draw_text(&mut canvas, &text, TEXT_ORIGIN, color);
    canvas
}

/// JPEG 编码
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Bytes, VisionError> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder.encode_image(frame)?;
    Ok(Bytes::from(buf))
}

/// 标注并编码
pub fn render(
    frame: &Frame,
    analysis: &Analysis,
    center_x: i32,
    quality: u8,
) -> Result<Bytes, VisionError> {
    encode_jpeg(&annotate(frame, analysis, center_x), quality)
}

fn plot(canvas: &mut Frame, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && x < canvas.width() as i64 && y < canvas.height() as i64 {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

/// 水平线，两端都包含
fn hline(canvas: &mut Frame, x0: i64, x1: i64, y: i64, color: Rgb<u8>) {
    for x in x0.min(x1)..=x0.max(x1) {
        plot(canvas, x, y, color);
    }
}

/// 垂直线，两端都包含
fn vline(canvas: &mut Frame, x: i64, y0: i64, y1: i64, color: Rgb<u8>) {
    for y in y0.min(y1)..=y0.max(y1) {
        plot(canvas, x, y, color);
    }
}

// 3x5 点阵，每行低 3 位从左到右
fn glyph(c: char) -> [u8; 5] {
    match c {
        '0' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' | 'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        _ => [0; 5],
    }
}

fn draw_text(canvas: &mut Frame, text: &str, origin: (i64, i64), color: Rgb<u8>) {
    let advance = 4 * TEXT_SCALE;
    for (i, c) in text.chars().enumerate() {
        let x0 = origin.0 + i as i64 * advance;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..3i64 {
                if bits & (0b100u8 >> col) == 0 {
                    continue;
                }
                for sy in 0..TEXT_SCALE {
                    for sx in 0..TEXT_SCALE {
                        plot(
                            canvas,
                            x0 + col * TEXT_SCALE + sx,
                            origin.1 + row as i64 * TEXT_SCALE + sy,
                            color,
                        );
                    }
                }
            }
        }
    }
}
