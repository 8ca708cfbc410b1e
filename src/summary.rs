/// 1ライン分の画素の簡易統計 (ログ出力用)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSummary {
    pub min: u16,
    pub max: u16,
    pub mean: f32,
    /// 最大値を持つ最初の画素位置
    pub peak_index: usize,
}

impl LineSummary {
    /// 空のラインでは `None`
    pub fn from_pixels(pixels: &[u16]) -> Option<Self> {
        let first = *pixels.first()?;
        let mut min = first;
        let mut max = first;
        let mut peak_index = 0;
        let mut sum: u64 = 0;

        for (i, &pixel) in pixels.iter().enumerate() {
            sum += u64::from(pixel);
            min = min.min(pixel);
            if pixel > max {
                max = pixel;
                peak_index = i;
            }
        }

        Some(Self {
            min,
            max,
            mean: sum as f32 / pixels.len() as f32,
            peak_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_line() {
        assert_eq!(LineSummary::from_pixels(&[]), None);
    }

    #[test]
    fn test_summary() {
        let summary = LineSummary::from_pixels(&[10, 30, 20, 30]).unwrap();
        assert_eq!(summary.min, 10);
        assert_eq!(summary.max, 30);
        assert_eq!(summary.peak_index, 1);
        assert!((summary.mean - 22.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_full_scale_line_does_not_overflow() {
        let pixels = [0x7FFFu16; epc901::PIXEL_COUNT];
        let summary = LineSummary::from_pixels(&pixels).unwrap();
        assert_eq!(summary.mean, 32767.0);
    }
}
