//! 连通区域提取（8 连通）
//!
//! 面积为像素数，质心为像素坐标均值向零取整。

use crate::mask::FOREGROUND;
use image::GrayImage;

/// 前景连通区域（ROI 坐标）
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    /// 像素数
    pub area: u32,
    /// 质心 x（像素，取整）
    pub centroid_x: i32,
    /// 质心 y（像素，取整）
    pub centroid_y: i32,
    /// 边界像素（至少一个 4 邻域是背景或越界）
    pub outline: Vec<(u32, u32)>,
}

const NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// 提取面积大于 `min_area` 的区域，按首个像素的扫描顺序返回
pub fn find_blobs(mask: &GrayImage, min_area: u32) -> Vec<Blob> {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as usize, height as usize);
    let is_fg = |x: usize, y: usize| mask.get_pixel(x as u32, y as u32).0[0] == FOREGROUND;

    let mut visited = vec![false; w * h];
    let mut stack = Vec::new();
    let mut blobs = Vec::new();

    for y0 in 0..h {
        for x0 in 0..w {
            if visited[y0 * w + x0] || !is_fg(x0, y0) {
                continue;
            }

            visited[y0 * w + x0] = true;
            stack.push((x0, y0));
            let mut area: u64 = 0;
            let (mut sum_x, mut sum_y) = (0u64, 0u64);
            let mut outline = Vec::new();

            while let Some((x, y)) = stack.pop() {
                area += 1;
                sum_x += x as u64;
                sum_y += y as u64;

                let edge = x == 0
                    || y == 0
                    || x + 1 == w
                    || y + 1 == h
                    || !is_fg(x - 1, y)
                    || !is_fg(x + 1, y)
                    || !is_fg(x, y - 1)
                    || !is_fg(x, y + 1);
                if edge {
                    outline.push((x as u32, y as u32));
                }

                for (dx, dy) in NEIGHBOURS {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }
                    let (nx, ny) = (nx as usize, ny as usize);
                    let idx = ny * w + nx;
                    if !visited[idx] && is_fg(nx, ny) {
                        visited[idx] = true;
                        stack.push((nx, ny));
                    }
                }
            }

            if area > min_area as u64 {
                blobs.push(Blob {
                    area: area as u32,
                    centroid_x: (sum_x / area) as i32,
                    centroid_y: (sum_y / area) as i32,
                    outline,
                });
            }
        }
    }

    blobs
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn rect(mask: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }

    #[test]
    fn test_single_rect() {
        let mut mask = GrayImage::new(100, 60);
        rect(&mut mask, 10, 20, 20, 10);
        let blobs = find_blobs(&mask, 50);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].area, 200);
        // 均值 (10+29)/2 = 19.5 → 19
        assert_eq!(blobs[0].centroid_x, 19);
        assert_eq!(blobs[0].centroid_y, 24);
        // 周长像素：2*20 + 2*10 - 4
        assert_eq!(blobs[0].outline.len(), 56);
    }

    #[test]
    fn test_min_area_is_exclusive() {
        let mut mask = GrayImage::new(40, 40);
        rect(&mut mask, 0, 0, 10, 5); // 50
        rect(&mut mask, 20, 20, 3, 17); // 51
        let blobs = find_blobs(&mask, 50);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].area, 51);
    }

    #[test]
    fn test_diagonal_pixels_connect() {
        let mut mask = GrayImage::new(20, 20);
        for i in 0..20 {
            mask.put_pixel(i, i, Luma([FOREGROUND]));
        }
        let blobs = find_blobs(&mask, 0);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].area, 20);
    }

    #[test]
    fn test_scan_order() {
        let mut mask = GrayImage::new(60, 30);
        rect(&mut mask, 40, 2, 10, 10);
        rect(&mut mask, 2, 15, 10, 10);
        let blobs = find_blobs(&mask, 50);
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].centroid_x, 44);
        assert_eq!(blobs[1].centroid_x, 6);
    }

    #[test]
    fn test_empty_mask() {
        assert!(find_blobs(&GrayImage::new(0, 0), 50).is_empty());
        assert!(find_blobs(&GrayImage::new(10, 10), 50).is_empty());
    }
}
