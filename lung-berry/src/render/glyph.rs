//! 3x5 点阵字形. 只覆盖切片标题所需的字符: 数字、`.`、`-`、`:`、空格以及
//! `SLICE`/`UID` 中的字母. 小写字母按大写处理.

/// 字形宽度 (点).
pub(crate) const GLYPH_W: u32 = 3;

/// 字形高度 (点).
pub(crate) const GLYPH_H: u32 = 5;

/// 获取字符 `c` 的点阵. 每行低 3 位有效, 最高位在左. 未收录的字符返回 `None`.
pub(crate) fn glyph(c: char) -> Option<[u8; 5]> {
    let rows = match c.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' | 'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        ' ' => [0b000; 5],
        'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        _ => return None,
    };
    Some(rows)
}

/// 点阵中 `(row, col)` 是否点亮.
#[inline]
pub(crate) fn lit(rows: &[u8; 5], row: u32, col: u32) -> bool {
    rows[row as usize] & (0b100 >> col) != 0
}
