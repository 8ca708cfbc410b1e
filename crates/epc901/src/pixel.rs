/// 1ラインあたりの画素数
pub const PIXEL_COUNT: usize = 1024;

/// 読み出し開始直後に捨てるサンプル数
///
/// 3回のプリロードサイクルと、ADCのサンプル/変換パイプライン1段分。
pub const PIPELINE_DISCARD: usize = 4;

/// ADCから受信した2バイトを1画素の値に組み立てる
///
/// 上位バイトが上位7ビット、下位バイトの上位7ビットが下位ビットになる。
/// 下位バイトの最下位ビットは捨てる。
#[inline]
pub fn combine_sample(msb: u8, lsb: u8) -> u16 {
    (u16::from(msb) << 7) | (u16::from(lsb) >> 1)
}
