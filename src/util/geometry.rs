use std::fmt;
use std::ops::{Add, Sub};

/// A point in root-window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub x: i16,
    pub y: i16,
}

/// A window extent. Signed so resize deltas can be clamped before the
/// result is handed to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: i16,
    pub height: i16,
}

/// The difference between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vector {
    pub x: i16,
    pub y: i16,
}

impl Position {
    pub fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }
}

impl Size {
    pub fn new(width: i16, height: i16) -> Self {
        Self { width, height }
    }

    /// Build from a server geometry reply. The protocol reports unsigned
    /// extents; anything past `i16::MAX` saturates instead of wrapping
    /// negative.
    pub fn from_extent(width: u16, height: u16) -> Self {
        Self {
            width: i16::try_from(width).unwrap_or(i16::MAX),
            height: i16::try_from(height).unwrap_or(i16::MAX),
        }
    }
}

impl Vector {
    pub fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    /// Clamp each component so that `size + self` never goes below zero.
    pub fn clamp_against(self, size: Size) -> Vector {
        Vector {
            x: self.x.max(-size.width),
            y: self.y.max(-size.height),
        }
    }
}

impl Sub for Position {
    type Output = Vector;
    fn sub(self, rhs: Position) -> Vector {
        Vector { x: self.x - rhs.x, y: self.y - rhs.y }
    }
}

impl Add<Vector> for Position {
    type Output = Position;
    fn add(self, v: Vector) -> Position {
        Position { x: self.x + v.x, y: self.y + v.y }
    }
}

impl Sub<Vector> for Position {
    type Output = Position;
    fn sub(self, v: Vector) -> Position {
        Position { x: self.x - v.x, y: self.y - v.y }
    }
}

impl Add<Vector> for Size {
    type Output = Size;
    fn add(self, v: Vector) -> Size {
        Size { width: self.width + v.x, height: self.height + v.y }
    }
}

impl Sub<Vector> for Size {
    type Output = Size;
    fn sub(self, v: Vector) -> Size {
        Size { width: self.width - v.x, height: self.height - v.y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_difference_is_a_vector() {
        let a = Position::new(30, 50);
        let b = Position::new(10, 80);
        assert_eq!(a - b, Vector::new(20, -30));
    }

    #[test]
    fn position_vector_round_trip() {
        let p = Position::new(100, 200);
        let v = Vector::new(-15, 40);
        assert_eq!((p + v) - v, p);
    }

    #[test]
    fn size_grows_and_shrinks_by_vector() {
        let s = Size::new(640, 480);
        assert_eq!(s + Vector::new(10, -20), Size::new(650, 460));
        assert_eq!(s - Vector::new(40, 80), Size::new(600, 400));
    }

    #[test]
    fn oversized_extent_saturates_instead_of_wrapping() {
        assert_eq!(Size::from_extent(640, 480), Size::new(640, 480));
        assert_eq!(Size::from_extent(40000, 70), Size::new(i16::MAX, 70));
        assert_eq!(Size::from_extent(70, 65535), Size::new(70, i16::MAX));
    }

    #[test]
    fn clamp_floors_each_dimension_at_zero() {
        let s = Size::new(200, 100);
        // More negative than the whole extent: floored exactly at -extent.
        assert_eq!(Vector::new(-500, -101).clamp_against(s), Vector::new(-200, -100));
        assert_eq!(s + Vector::new(-500, -101).clamp_against(s), Size::new(0, 0));
        // Within range: untouched.
        assert_eq!(Vector::new(-50, 30).clamp_against(s), Vector::new(-50, 30));
    }
}
