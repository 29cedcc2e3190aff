//! Records exchanged with the data source.
//!
//! Column names follow the road-network exports (`REFLINK_OID`,
//! `MEASURE_FROM`, ...); lowercase field names are accepted as aliases.

use crate::attributes::{Attribute, AttributeKind, AttributeValue, DirectionCategory, ValueType};
use crate::errors::{AttributeError, GeometryError};
use crate::geometry_ops;
use geo::LineString;
use serde::Deserialize;

/// One slice of a network edge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EdgeRow {
    #[serde(rename = "REFLINK_OID", alias = "parent_id")]
    pub parent_id: String,
    #[serde(rename = "MEASURE_FROM", alias = "measure_from")]
    pub measure_from: f64,
    #[serde(rename = "MEASURE_TO", alias = "measure_to")]
    pub measure_to: f64,
    #[serde(rename = "REFNODE_OID_FROM", alias = "from_node_id")]
    pub from_node_id: String,
    #[serde(rename = "REFNODE_OID_TO", alias = "to_node_id")]
    pub to_node_id: String,
    #[serde(rename = "GEOM", alias = "geometry")]
    pub geometry: String,
    /// Informational; the length is recomputed from the geometry.
    #[serde(rename = "GEOMETRIC_LENGTH", alias = "length", default)]
    pub length: Option<f64>,
}

impl EdgeRow {
    pub fn line(&self) -> Result<LineString, GeometryError> {
        geometry_ops::parse_line(&self.geometry)
    }
}

/// One attribute observation. The attribute kind is a property of the batch,
/// not of the row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttributeRow {
    #[serde(rename = "REFLINK_OID", alias = "parent_id")]
    pub parent_id: String,
    #[serde(rename = "MEASURE_FROM", alias = "measure_from")]
    pub measure_from: f64,
    #[serde(rename = "MEASURE_TO", alias = "measure_to")]
    pub measure_to: f64,
    /// Blank or `POINT EMPTY` when the source has no geometry for the row.
    #[serde(rename = "GEOM", alias = "geometry", default)]
    pub geometry: String,
    #[serde(rename = "VALUE", alias = "value")]
    pub value: String,
    #[serde(rename = "VALUE_TYPE", alias = "value_type")]
    pub value_type: String,
    #[serde(rename = "DIRECTION", alias = "direction", default)]
    pub direction: String,
}

impl AttributeRow {
    pub fn line(&self) -> Result<Option<LineString>, GeometryError> {
        geometry_ops::parse_optional_line(&self.geometry)
    }

    pub fn attribute(&self, kind: AttributeKind) -> Result<Attribute, AttributeError> {
        let value_type: ValueType = self.value_type.parse()?;
        let value = AttributeValue::parse(&self.value, value_type)?;
        let direction: DirectionCategory = self.direction.parse()?;
        Attribute::new(kind, direction, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(value: &str, value_type: &str, direction: &str) -> AttributeRow {
        AttributeRow {
            parent_id: "L1".into(),
            measure_from: 0.2,
            measure_to: 0.6,
            geometry: "POINT EMPTY".into(),
            value: value.into(),
            value_type: value_type.into(),
            direction: direction.into(),
        }
    }

    #[test]
    fn attribute_rows_become_typed_attributes() {
        let attribute = row("50", "real", "1")
            .attribute(AttributeKind::SpeedLimit)
            .unwrap();
        assert_eq!(attribute.value(), &AttributeValue::Real(50.0));
        assert_eq!(attribute.direction, DirectionCategory::With);
        assert!(row("50", "real", "").line().unwrap().is_none());
    }

    #[test]
    fn bad_tags_are_reported() {
        assert!(matches!(
            row("50", "real", "7").attribute(AttributeKind::SpeedLimit),
            Err(AttributeError::UnknownDirection(_))
        ));
        assert!(matches!(
            row("50", "integer", "").attribute(AttributeKind::SpeedLimit),
            Err(AttributeError::Validation { .. })
        ));
        assert!(matches!(
            row("many", "integer", "").attribute(AttributeKind::NumberOfLanes),
            Err(AttributeError::UnparsableValue { .. })
        ));
    }
}
