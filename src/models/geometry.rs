//! 屏幕坐标、区域与选项集合

use std::fmt;

use crate::error::CaptureError;

/// 屏幕坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// 由两次点击确定的截图区域
///
/// 只能通过 [`CapturedRegion::from_corners`] 构造，宽高一定为正。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturedRegion {
    top_left: Point,
    bottom_right: Point,
}

impl CapturedRegion {
    /// 校验并构造区域
    ///
    /// # 返回
    /// 宽或高不为正、或超出 i32 范围时返回 `CaptureError::InvalidRegion`
    pub fn from_corners(top_left: Point, bottom_right: Point) -> Result<Self, CaptureError> {
        let width = bottom_right.x.checked_sub(top_left.x);
        let height = bottom_right.y.checked_sub(top_left.y);
        match (width, height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Ok(Self {
                top_left,
                bottom_right,
            }),
            _ => Err(CaptureError::InvalidRegion {
                width: bottom_right.x.saturating_sub(top_left.x),
                height: bottom_right.y.saturating_sub(top_left.y),
            }),
        }
    }

    pub fn top_left(&self) -> Point {
        self.top_left
    }

    pub fn bottom_right(&self) -> Point {
        self.bottom_right
    }

    pub fn width(&self) -> u32 {
        self.bottom_right.x.abs_diff(self.top_left.x)
    }

    pub fn height(&self) -> u32 {
        self.bottom_right.y.abs_diff(self.top_left.y)
    }
}

impl fmt::Display for CapturedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}, {}, {}, {}}}",
            self.top_left.x, self.top_left.y, self.bottom_right.x, self.bottom_right.y
        )
    }
}

/// 选择题选项位置，点击顺序即答案序号（从 1 开始）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSet {
    points: Vec<Point>,
}

impl OptionSet {
    pub const MIN_OPTIONS: usize = 2;

    pub fn new(points: Vec<Point>) -> Result<Self, CaptureError> {
        if points.len() < Self::MIN_OPTIONS {
            return Err(CaptureError::InsufficientOptions {
                count: points.len(),
            });
        }
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 按 1 开始的序号取选项位置
    pub fn point_for(&self, index: usize) -> Option<Point> {
        index
            .checked_sub(1)
            .and_then(|i| self.points.get(i))
            .copied()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }
}
