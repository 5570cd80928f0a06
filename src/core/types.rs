//! Core data types for the localization engine

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Position in the deployment area. In 2-D the z component stays zero.
pub type Point = Vector3<f64>;

/// Dimensionality of the deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum Dimensions {
    Two,
    Three,
}

impl Dimensions {
    /// Number of spatial coordinates
    pub fn count(self) -> usize {
        match self {
            Dimensions::Two => 2,
            Dimensions::Three => 3,
        }
    }

    /// Euclidean distance over the active coordinates only
    pub fn distance(self, a: &Point, b: &Point) -> f64 {
        let mut sum = 0.0;
        for d in 0..self.count() {
            sum += (a[d] - b[d]).powi(2);
        }
        sum.sqrt()
    }

    /// Build a point from a coordinate slice, zero-filling unused axes
    pub fn point(self, coords: &[f64]) -> Point {
        let mut p = Point::zeros();
        for (d, value) in coords.iter().take(self.count()).enumerate() {
            p[d] = *value;
        }
        p
    }

    /// Render a point as `<x,y>` or `<x,y,z>`
    pub fn format_point(self, p: &Point) -> String {
        match self {
            Dimensions::Two => format!("<{:.2},{:.2}>", p.x, p.y),
            Dimensions::Three => format!("<{:.2},{:.2},{:.2}>", p.x, p.y, p.z),
        }
    }
}

/// Rejected dimensionality, carries the offending value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("can't handle {0}-dimensional space")]
pub struct UnsupportedDimensions(pub usize);

impl TryFrom<usize> for Dimensions {
    type Error = UnsupportedDimensions;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Dimensions::Two),
            3 => Ok(Dimensions::Three),
            other => Err(UnsupportedDimensions(other)),
        }
    }
}

impl From<Dimensions> for usize {
    fn from(dims: Dimensions) -> usize {
        dims.count()
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_ignores_unused_axis() {
        let a = Point::new(0.0, 0.0, 5.0);
        let b = Point::new(3.0, 4.0, -5.0);
        assert_eq!(Dimensions::Two.distance(&a, &b), 5.0);
        assert!(Dimensions::Three.distance(&a, &b) > 5.0);
    }

    #[test]
    fn test_dimension_conversion() {
        assert_eq!(Dimensions::try_from(2), Ok(Dimensions::Two));
        assert_eq!(Dimensions::try_from(3), Ok(Dimensions::Three));
        assert_eq!(Dimensions::try_from(4), Err(UnsupportedDimensions(4)));
        assert_eq!(usize::from(Dimensions::Three), 3);
    }

    #[test]
    fn test_point_zero_fills() {
        let p = Dimensions::Two.point(&[1.0, 2.0, 9.0]);
        assert_eq!(p, Point::new(1.0, 2.0, 0.0));
        assert_eq!(Dimensions::Two.format_point(&p), "<1.00,2.00>");
    }
}
