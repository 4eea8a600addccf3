//! 单帧分析
//!
//! [`LineAnalyzer`] 持有中心历史，是唯一跨帧的视觉状态。它不做任何
//! I/O，也不加锁：采集线程独占一个实例。

use crate::blob::{Blob, find_blobs};
use crate::mask::{Roi, build_mask};
use crate::Frame;
use image::GrayImage;
use linebot_tools::{CameraSettings, LineSettings, Rotation, VisionSettings};
use std::collections::VecDeque;

/// 参与候选的最小面积（不含）
pub const MIN_CANDIDATE_AREA: u32 = 50;

/// 参与连续性评分的最小面积（含）
pub const MIN_SCORED_AREA: u32 = 100;

/// 直角检测需要的连续样本数
pub const RIGHT_ANGLE_SAMPLES: usize = 3;

/// 线位置观测
///
/// 三个字段总是一起发布，读者拿到的是同一帧的结果。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineObservation {
    /// 相对帧中心的像素误差（正 = 线在右侧）
    pub error: f64,
    /// 当前帧没有找到线
    pub lost: bool,
    /// 检测到直角
    pub right_angle: bool,
}

impl LineObservation {
    /// 丢线观测（也是启动时的初始值）
    pub const fn lost() -> Self {
        Self {
            error: 0.0,
            lost: true,
            right_angle: false,
        }
    }
}

impl Default for LineObservation {
    fn default() -> Self {
        Self::lost()
    }
}

/// 单帧分析结果
#[derive(Debug, Clone)]
pub struct Analysis {
    pub observation: LineObservation,
    pub roi: Roi,
    /// 选中的线（ROI 坐标），丢线时为 `None`
    pub line: Option<Blob>,
}

impl Analysis {
    /// 选中线的质心（帧坐标）
    pub fn line_center(&self) -> Option<(i32, i32)> {
        self.line
            .as_ref()
            .map(|b| (b.centroid_x, b.centroid_y + self.roi.top as i32))
    }
}

/// 线跟踪分析器
#[derive(Debug, Clone)]
pub struct LineAnalyzer {
    center_x: i32,
    rotation: Rotation,
    history: VecDeque<i32>,
}

impl LineAnalyzer {
    /// 以配置的帧宽确定中心列
    pub fn new(camera: &CameraSettings) -> Self {
        Self {
            center_x: camera.center_x(),
            rotation: camera.rotation,
            history: VecDeque::new(),
        }
    }

    pub fn center_x(&self) -> i32 {
        self.center_x
    }

    /// 中心历史（最旧在前）
    pub fn history(&self) -> impl Iterator<Item = i32> + '_ {
        self.history.iter().copied()
    }

    /// 清空中心历史
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// 分析一帧
    pub fn analyze_frame(
        &mut self,
        frame: &Frame,
        vision: &VisionSettings,
        line: &LineSettings,
    ) -> Analysis {
        let (width, height) = frame.dimensions();
        let roi = Roi::from_ratios(width, height, vision);
        let mask = build_mask(frame, &roi, vision);
        self.analyze_mask(&mask, roi, line)
    }

    /// 分析已经二值化的 ROI 掩码
    pub fn analyze_mask(&mut self, mask: &GrayImage, roi: Roi, line: &LineSettings) -> Analysis {
        let mut blobs = find_blobs(mask, MIN_CANDIDATE_AREA);

        let Some(best) = self.select(&blobs, line.continuity_weight_power) else {
            self.history.clear();
            tracing::trace!("no line candidate in ROI");
            return Analysis {
                observation: LineObservation::lost(),
                roi,
                line: None,
            };
        };
        let blob = blobs.swap_remove(best);

        let raw_error = (blob.centroid_x - self.center_x) as f64;
        let error = if self.rotation.is_inverted() {
            -raw_error
        } else {
            raw_error
        };

        self.history.push_back(blob.centroid_x);
        while self.history.len() > line.max_frames_memory.max(1) {
            self.history.pop_front();
        }

        let right_angle = line.right_angle_enabled && self.sustained_offset(line);

        tracing::trace!(
            "line at x={} area={} error={:+} right_angle={}",
            blob.centroid_x,
            blob.area,
            error,
            right_angle
        );

        Analysis {
            observation: LineObservation {
                error,
                lost: false,
                right_angle,
            },
            roi,
            line: Some(blob),
        }
    }

    /// 连续性加权选线
    ///
    /// 无历史时取最大面积；有历史时在面积 >= 100 的候选中取
    /// `area / (|cx - last| + 1)^power` 最大者，并列时先出现者胜出；
    /// 没有候选达到面积门限时退回最大面积。
    fn select(&self, blobs: &[Blob], power: f64) -> Option<usize> {
        let largest = largest_index(blobs)?;
        let Some(&last_x) = self.history.back() else {
            return Some(largest);
        };

        let mut best: Option<(usize, f64)> = None;
        for (index, blob) in blobs.iter().enumerate() {
            if blob.area < MIN_SCORED_AREA {
                continue;
            }
            let distance = ((blob.centroid_x - last_x).abs() + 1) as f64;
            let score = blob.area as f64 / distance.powf(power);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((index, score));
            }
        }

        Some(best.map_or(largest, |(index, _)| index))
    }

    fn sustained_offset(&self, line: &LineSettings) -> bool {
        if self.history.len() < RIGHT_ANGLE_SAMPLES {
            return false;
        }
        self.history
            .iter()
            .rev()
            .take(RIGHT_ANGLE_SAMPLES)
            .all(|&x| ((x - self.center_x).abs() as f64) > line.right_angle_error_threshold)
    }
}

fn largest_index(blobs: &[Blob]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (index, blob) in blobs.iter().enumerate() {
        if best.is_none_or(|(_, area)| blob.area > area) {
            best = Some((index, blob.area));
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::FOREGROUND;
    use image::{Luma, Rgb};

    const W: u32 = 320;
    const H: u32 = 120;

    fn camera(rotation: Rotation) -> CameraSettings {
        CameraSettings {
            width: W,
            height: 240,
            fps: 30,
            rotation,
            servo_angle: None,
        }
    }

    fn line_settings() -> LineSettings {
        LineSettings {
            continuity_weight_power: 2.0,
            max_frames_memory: 5,
            right_angle_error_threshold: 100.0,
            right_angle_enabled: true,
        }
    }

    fn roi() -> Roi {
        Roi {
            top: 120,
            bottom: 240,
            margin: 0,
            width: W,
        }
    }

    /// 以 (cx, cy) 为中心、宽 w 高 h 的矩形
    fn rect(mask: &mut GrayImage, cx: u32, cy: u32, w: u32, h: u32) {
        for y in cy - h / 2..cy - h / 2 + h {
            for x in cx - w / 2..cx - w / 2 + w {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }

    fn mask_with(rects: &[(u32, u32, u32, u32)]) -> GrayImage {
        let mut mask = GrayImage::new(W, H);
        for &(cx, cy, w, h) in rects {
            rect(&mut mask, cx, cy, w, h);
        }
        mask
    }

    #[test]
    fn test_initial_observation_is_lost() {
        assert_eq!(LineObservation::default(), LineObservation::lost());
        assert!(LineObservation::default().lost);
    }

    #[test]
    fn test_single_blob_error() {
        let mut analyzer = LineAnalyzer::new(&camera(Rotation::Deg0));
        // 40x25 = 1000 像素，中心 (200, 60)
        let mask = mask_with(&[(200, 60, 40, 25)]);
        let analysis = analyzer.analyze_mask(&mask, roi(), &line_settings());
        let blob = analysis.line.as_ref().unwrap();
        assert_eq!(blob.area, 1000);
        // 列 180..220 的均值 199.5 → 199
        assert!(!analysis.observation.lost);
        assert_eq!(analysis.observation.error, (199 - 160) as f64);
        assert_eq!(analysis.line_center(), Some((199, 120 + 60)));
    }

    #[test]
    fn test_single_blob_error_inverted_mount() {
        let mut analyzer = LineAnalyzer::new(&camera(Rotation::Deg180));
        let mask = mask_with(&[(200, 60, 40, 25)]);
        let analysis = analyzer.analyze_mask(&mask, roi(), &line_settings());
        assert_eq!(analysis.observation.error, -39.0);
    }

    #[test]
    fn test_empty_mask_clears_history() {
        let mut analyzer = LineAnalyzer::new(&camera(Rotation::Deg0));
        analyzer.analyze_mask(&mask_with(&[(150, 60, 20, 20)]), roi(), &line_settings());
        assert_eq!(analyzer.history().count(), 1);

        let analysis = analyzer.analyze_mask(&mask_with(&[]), roi(), &line_settings());
        assert_eq!(analysis.observation, LineObservation::lost());
        assert!(analysis.line.is_none());
        assert_eq!(analyzer.history().count(), 0);
    }

    #[test]
    fn test_small_blobs_are_ignored() {
        let mut analyzer = LineAnalyzer::new(&camera(Rotation::Deg0));
        // 7x7 = 49 像素
        let analysis =
            analyzer.analyze_mask(&mask_with(&[(100, 60, 7, 7)]), roi(), &line_settings());
        assert!(analysis.observation.lost);
    }

    #[test]
    fn test_continuity_prefers_near_blob() {
        let mut analyzer = LineAnalyzer::new(&camera(Rotation::Deg0));
        // 上一帧：线在 x=99
        analyzer.analyze_mask(&mask_with(&[(100, 60, 20, 20)]), roi(), &line_settings());
        assert_eq!(analyzer.history().last(), Some(99));

        // 大块 4000 像素距离 80，小块 1200 像素距离 3
        // 4000 / 81^2 ≈ 0.61 < 1200 / 4^2 = 75
        let mask = mask_with(&[(180, 50, 100, 40), (103, 60, 40, 30)]);
        let analysis = analyzer.analyze_mask(&mask, roi(), &line_settings());
        let blob = analysis.line.unwrap();
        assert_eq!(blob.area, 1200);
        assert_eq!(blob.centroid_x, 102);
    }

    #[test]
    fn test_without_history_largest_wins() {
        let mut analyzer = LineAnalyzer::new(&camera(Rotation::Deg0));
        let mask = mask_with(&[(180, 50, 100, 40), (103, 60, 40, 30)]);
        let analysis = analyzer.analyze_mask(&mask, roi(), &line_settings());
        assert_eq!(analysis.line.unwrap().area, 4000);
    }

    #[test]
    fn test_zero_power_picks_largest() {
        let mut analyzer = LineAnalyzer::new(&camera(Rotation::Deg0));
        let mut settings = line_settings();
        settings.continuity_weight_power = 0.0;
        analyzer.analyze_mask(&mask_with(&[(100, 60, 20, 20)]), roi(), &settings);
        let mask = mask_with(&[(180, 50, 100, 40), (103, 60, 40, 30)]);
        let analysis = analyzer.analyze_mask(&mask, roi(), &settings);
        assert_eq!(analysis.line.unwrap().area, 4000);
    }

    #[test]
    fn test_unscored_candidates_fall_back_to_largest() {
        let mut analyzer = LineAnalyzer::new(&camera(Rotation::Deg0));
        analyzer.analyze_mask(&mask_with(&[(100, 60, 20, 20)]), roi(), &line_settings());
        // 两块都在 (50, 100) 之间：8x8=64 与 9x9=81
        let mask = mask_with(&[(100, 60, 8, 8), (250, 60, 9, 9)]);
        let analysis = analyzer.analyze_mask(&mask, roi(), &line_settings());
        assert_eq!(analysis.line.unwrap().area, 81);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut analyzer = LineAnalyzer::new(&camera(Rotation::Deg0));
        let settings = line_settings();
        for i in 0..20 {
            analyzer.analyze_mask(&mask_with(&[(100 + i, 60, 20, 20)]), roi(), &settings);
            assert!(analyzer.history().count() <= settings.max_frames_memory);
        }
        assert_eq!(analyzer.history().count(), 5);
        assert_eq!(analyzer.history().last(), Some(99 + 19));
    }

    #[test]
    fn test_right_angle_needs_three_frames() {
        let mut analyzer = LineAnalyzer::new(&camera(Rotation::Deg0));
        let settings = line_settings();
        // |290 - 160| = 130 > 100
        let far = mask_with(&[(291, 60, 20, 20)]);

        let first = analyzer.analyze_mask(&far, roi(), &settings);
        assert!(!first.observation.right_angle);
        let second = analyzer.analyze_mask(&far, roi(), &settings);
        assert!(!second.observation.right_angle);
        let third = analyzer.analyze_mask(&far, roi(), &settings);
        assert!(third.observation.right_angle);
    }

    #[test]
    fn test_right_angle_requires_all_recent_samples() {
        let mut analyzer = LineAnalyzer::new(&camera(Rotation::Deg0));
        let settings = line_settings();
        let far = mask_with(&[(291, 60, 20, 20)]);
        let near = mask_with(&[(171, 60, 20, 20)]);

        analyzer.analyze_mask(&far, roi(), &settings);
        analyzer.analyze_mask(&near, roi(), &settings);
        analyzer.analyze_mask(&far, roi(), &settings);
        let analysis = analyzer.analyze_mask(&far, roi(), &settings);
        assert!(!analysis.observation.right_angle);
    }

    #[test]
    fn test_right_angle_disabled() {
        let mut analyzer = LineAnalyzer::new(&camera(Rotation::Deg0));
        let mut settings = line_settings();
        settings.right_angle_enabled = false;
        let far = mask_with(&[(291, 60, 20, 20)]);
        for _ in 0..5 {
            let analysis = analyzer.analyze_mask(&far, roi(), &settings);
            assert!(!analysis.observation.right_angle);
        }
    }

    #[test]
    fn test_analyze_frame_end_to_end() {
        let mut frame = Frame::from_pixel(W, 240, Rgb([230, 230, 230]));
        for y in 140..200 {
            for x in 60..80 {
                frame.put_pixel(x, y, Rgb([20, 20, 20]));
            }
        }
        let vision = VisionSettings {
            threshold_value: 60,
            blur_kernel: 1,
            roi_top_ratio: 0.5,
            roi_bottom_ratio: 1.0,
            side_margin_ratio: 0.05,
            debug_timeout_secs: 3.0,
            jpeg_quality: 60,
        };
        let mut analyzer = LineAnalyzer::new(&camera(Rotation::Deg0));
        let analysis = analyzer.analyze_frame(&frame, &vision, &line_settings());
        assert!(!analysis.observation.lost);
        // 列 60..80 的均值 69.5 → 69
        assert_eq!(analysis.observation.error, (69 - 160) as f64);
        assert_eq!(analysis.roi.top, 120);
        assert_eq!(analysis.roi.margin, 16);
    }
}
