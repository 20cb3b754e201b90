use snafu::ensure;

use crate::{
    consts::{POLY_LEN, UNSET},
    error::{EvalError, GeometrySnafu},
};

/// A 2D axis-aligned bounding box represented by minimum and maximum points.
///
/// Page coordinates have the origin at the top-left corner with Y growing
/// downward, so `min` is the top-left and `max` the bottom-right corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bbox {
    /// The minimum point of the bounding box (top-left corner).
    pub min: glam::Vec2,
    /// The maximum point of the bounding box (bottom-right corner).
    pub max: glam::Vec2,
}

impl Bbox {
    /// Sentinel box `[-1, -1, -1, -1]` returned when there is nothing to cover.
    pub const UNSET: Self = Self {
        min: glam::Vec2::new(UNSET as f32, UNSET as f32),
        max: glam::Vec2::new(UNSET as f32, UNSET as f32),
    };

    /// Creates a new bounding box from minimum and maximum points.
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use docbench_core::analysis::bbox::Bbox;
    /// let bbox = Bbox::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 5.0));
    /// ```
    pub fn new(min: glam::Vec2, max: glam::Vec2) -> Self {
        Self { min, max }
    }

    /// Derives the bounding box of a canonical quadrilateral.
    ///
    /// The box spans corner 0 (`poly[0]`, `poly[1]`) and the bottom-right
    /// coordinates (`poly[2]`, `poly[5]`). Both axes go through min/max, so the
    /// result is well formed whatever order the annotator clicked the corners in.
    ///
    /// # Errors
    /// `EvalError::Geometry` when `poly` does not hold exactly 8 values.
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use docbench_core::analysis::bbox::Bbox;
    /// let poly = [30.0, 40.0, 10.0, 40.0, 10.0, 20.0, 30.0, 20.0];
    /// let bbox = Bbox::from_poly(&poly).unwrap();
    /// assert_eq!(bbox.min, Vec2::new(10.0, 20.0));
    /// assert_eq!(bbox.max, Vec2::new(30.0, 40.0));
    /// ```
    pub fn from_poly(poly: &[f64]) -> Result<Self, EvalError> {
        ensure!(poly.len() == POLY_LEN, GeometrySnafu { len: poly.len() });

        let (left, top, right, bottom) = (poly[0], poly[1], poly[2], poly[5]);
        Ok(Self::new(
            glam::Vec2::new(left.min(right) as f32, top.min(bottom) as f32),
            glam::Vec2::new(left.max(right) as f32, top.max(bottom) as f32),
        ))
    }

    /// Returns `(left, top, right, bottom)`.
    pub fn ltrb(&self) -> [f32; 4] {
        [self.min.x, self.min.y, self.max.x, self.max.y]
    }

    /// Emits the clockwise quadrilateral of this box: top-left, top-right,
    /// bottom-right, bottom-left.
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use docbench_core::analysis::bbox::Bbox;
    /// let bbox = Bbox::new(Vec2::new(1.0, 2.0), Vec2::new(5.0, 6.0));
    /// assert_eq!(bbox.to_poly(), [1.0, 2.0, 5.0, 2.0, 5.0, 6.0, 1.0, 6.0]);
    /// ```
    pub fn to_poly(&self) -> [f64; POLY_LEN] {
        let [l, t, r, b] = self.ltrb().map(f64::from);
        [l, t, r, t, r, b, l, b]
    }

    /// True for the `[-1, -1, -1, -1]` sentinel.
    pub fn is_unset(&self) -> bool {
        *self == Self::UNSET
    }

    /// Calculates the area of the bounding box.
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use docbench_core::analysis::bbox::Bbox;
    /// let bbox = Bbox::new(Vec2::ZERO, Vec2::new(4.0, 3.0));
    /// assert_eq!(bbox.area(), 12.0);
    /// ```
    pub fn area(&self) -> f32 {
        let length = self.max - self.min;

        length.x * length.y
    }

    /// Calculates the area of intersection between this bounding box and another.
    ///
    /// Returns 0.0 when the boxes only touch or do not overlap at all.
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use docbench_core::analysis::bbox::Bbox;
    /// let bbox1 = Bbox::new(Vec2::new(0.0, 0.0), Vec2::new(4.0, 4.0));
    /// let bbox2 = Bbox::new(Vec2::new(2.0, 2.0), Vec2::new(6.0, 6.0));
    /// assert_eq!(bbox1.intersection(&bbox2), 4.0); // 2x2 intersection area
    /// ```
    pub fn intersection(&self, other: &Self) -> f32 {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);

        if max.x > min.x && max.y > min.y {
            (max.x - min.x) * (max.y - min.y)
        } else {
            0.
        }
    }

    /// Calculates the Intersection over Union (IoU) between this bounding box and another.
    ///
    /// # Returns
    /// The IoU value between 0.0 and 1.0. Boxes with an empty union (two
    /// zero-area boxes) yield 0.0 instead of dividing by zero.
    ///
    /// # Formula
    /// IoU = Intersection Area / Union Area
    /// Union Area = Area1 + Area2 - Intersection Area
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use docbench_core::analysis::bbox::Bbox;
    /// let bbox1 = Bbox::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 2.0));
    /// let bbox2 = Bbox::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 2.0));
    /// assert_eq!(bbox1.iou(&bbox2), 1.0); // Identical boxes
    /// ```
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection_area = self.intersection(other);
        let union_area = self.area() + other.area() - intersection_area;

        if union_area > 0.0 {
            (intersection_area / union_area).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Checks if this bounding box completely contains another bounding box.
    pub fn contains(&self, other: &Self) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
    }

    /// Creates a union bounding box that encompasses both this bounding box and another.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Tight bounding box around every input box.
    ///
    /// Used to derive a composite region, such as a table from its cells or a
    /// page's annotated extent from its elements. An empty input yields
    /// [`Bbox::UNSET`].
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use docbench_core::analysis::bbox::Bbox;
    /// let cells = [
    ///     Bbox::new(Vec2::new(0.0, 0.0), Vec2::new(5.0, 5.0)),
    ///     Bbox::new(Vec2::new(5.0, 0.0), Vec2::new(9.0, 7.0)),
    /// ];
    /// let table = Bbox::union_all(cells);
    /// assert_eq!(table.max, Vec2::new(9.0, 7.0));
    /// assert!(Bbox::union_all([]).is_unset());
    /// ```
    pub fn union_all<I: IntoIterator<Item = Bbox>>(boxes: I) -> Self {
        boxes
            .into_iter()
            .reduce(|acc, bbox| acc.union(&bbox))
            .unwrap_or(Self::UNSET)
    }
}

/// True when every coordinate of `poly` is the unset sentinel.
///
/// Such an element has no usable geometry and can only be matched by id.
pub fn is_degenerate_poly(poly: &[f64]) -> bool {
    poly.is_empty() || poly.iter().all(|v| *v == UNSET as f64)
}
