//! ROI 二值掩码
//!
//! 帧 → 裁剪 ROI → 灰度 → 可选高斯模糊 → 反相阈值 → 屏蔽左右边缘。
//! 输出的掩码中 255 表示前景（暗线），0 表示背景。

use crate::Frame;
use image::{GrayImage, imageops};
use linebot_tools::VisionSettings;

/// 前景像素值
pub const FOREGROUND: u8 = 255;

/// 帧内的分析区域（帧坐标）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    /// 上边界（包含）
    pub top: u32,
    /// 下边界（不包含）
    pub bottom: u32,
    /// 左右各屏蔽的列数
    pub margin: u32,
    /// 帧宽
    pub width: u32,
}

impl Roi {
    /// 按比例计算 ROI（向下取整）
    pub fn from_ratios(width: u32, height: u32, settings: &VisionSettings) -> Self {
        let top = (height as f64 * settings.roi_top_ratio) as u32;
        let bottom = ((height as f64 * settings.roi_bottom_ratio) as u32).min(height);
        let margin = (width as f64 * settings.side_margin_ratio) as u32;
        Self {
            top: top.min(bottom),
            bottom,
            margin,
            width,
        }
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// ROI 中线所在的帧行
    pub fn mid_row(&self) -> u32 {
        self.top + self.height() / 2
    }
}

/// OpenCV 对 `sigma = 0` 的约定：由核大小推导 sigma
pub fn kernel_sigma(kernel: u32) -> f32 {
    let k = (kernel | 1) as f32;
    0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8
}

/// 构建 ROI 二值掩码
pub fn build_mask(frame: &Frame, roi: &Roi, settings: &VisionSettings) -> GrayImage {
    let (width, _) = frame.dimensions();
    if roi.height() == 0 || width == 0 {
        return GrayImage::new(width, 0);
    }

    let band = imageops::crop_imm(frame, 0, roi.top, width, roi.height()).to_image();
    let mut gray = imageops::grayscale(&band);

    if settings.blur_kernel > 1 {
        gray = imageops::blur(&gray, kernel_sigma(settings.blur_kernel));
    }

    let threshold = settings.threshold_value;
    for pixel in gray.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 0 } else { FOREGROUND };
    }

    mask_margins(&mut gray, roi.margin);
    gray
}

fn mask_margins(mask: &mut GrayImage, margin: u32) {
    let (width, height) = mask.dimensions();
    if margin == 0 {
        return;
    }
    let margin = margin.min(width);
    for y in 0..height {
        for x in (0..margin).chain(width - margin..width) {
            mask.put_pixel(x, y, image::Luma([0]));
        }
    }
}
