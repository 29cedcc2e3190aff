//! Typed road attributes and their validation rules.

use crate::errors::AttributeError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    Integer,
    Real,
    Boolean,
    Text,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueType::Integer => "integer",
            ValueType::Real => "real",
            ValueType::Boolean => "boolean",
            ValueType::Text => "text",
        })
    }
}

impl FromStr for ValueType {
    type Err = AttributeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" | "bigint" => Ok(ValueType::Integer),
            "real" | "double" | "float" => Ok(ValueType::Real),
            "boolean" | "bool" => Ok(ValueType::Boolean),
            "text" | "string" | "varchar" => Ok(ValueType::Text),
            _ => Err(AttributeError::UnknownValueType(s.to_string())),
        }
    }
}

/// Travel direction an attribute applies to, relative to the stored geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectionCategory {
    With,
    Against,
    WithAndAgainst,
    NotSpecified,
}

impl DirectionCategory {
    pub fn is_directional(self) -> bool {
        self != DirectionCategory::NotSpecified
    }
}

impl fmt::Display for DirectionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DirectionCategory::With => "with",
            DirectionCategory::Against => "against",
            DirectionCategory::WithAndAgainst => "with_and_against",
            DirectionCategory::NotSpecified => "not_specified",
        })
    }
}

/// Accepts the names above or the NVDB direction codes (1, 2, 3, blank).
impl FromStr for DirectionCategory {
    type Err = AttributeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "with" => Ok(DirectionCategory::With),
            "2" | "against" => Ok(DirectionCategory::Against),
            "3" | "with_and_against" | "both" => Ok(DirectionCategory::WithAndAgainst),
            "" | "not_specified" => Ok(DirectionCategory::NotSpecified),
            _ => Err(AttributeError::UnknownDirection(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeKind {
    BridgeAndTunnel,
    FunctionalRoadClass,
    LimitedVehicleLength,
    LimitedVehicleWidth,
    LivingStreet,
    Motorway,
    MotorwayWithoutCentralReservation,
    NumberOfLanes,
    PedestrianStreet,
    ForbiddenDriverDirection,
    RoadManager,
    RoadWidth,
    SpeedLimit,
    UrbanArea,
    WearingCourse,
    GuardRail,
    Roundabout,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 17] = [
        AttributeKind::BridgeAndTunnel,
        AttributeKind::FunctionalRoadClass,
        AttributeKind::LimitedVehicleLength,
        AttributeKind::LimitedVehicleWidth,
        AttributeKind::LivingStreet,
        AttributeKind::Motorway,
        AttributeKind::MotorwayWithoutCentralReservation,
        AttributeKind::NumberOfLanes,
        AttributeKind::PedestrianStreet,
        AttributeKind::ForbiddenDriverDirection,
        AttributeKind::RoadManager,
        AttributeKind::RoadWidth,
        AttributeKind::SpeedLimit,
        AttributeKind::UrbanArea,
        AttributeKind::WearingCourse,
        AttributeKind::GuardRail,
        AttributeKind::Roundabout,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AttributeKind::BridgeAndTunnel => "bridge_and_tunnel",
            AttributeKind::FunctionalRoadClass => "functional_road_class",
            AttributeKind::LimitedVehicleLength => "limited_vehicle_length",
            AttributeKind::LimitedVehicleWidth => "limited_vehicle_width",
            AttributeKind::LivingStreet => "living_street",
            AttributeKind::Motorway => "motorway",
            AttributeKind::MotorwayWithoutCentralReservation => {
                "motorway_without_central_reservation"
            }
            AttributeKind::NumberOfLanes => "number_of_lanes",
            AttributeKind::PedestrianStreet => "pedestrian_street",
            AttributeKind::ForbiddenDriverDirection => "forbidden_driver_direction",
            AttributeKind::RoadManager => "road_manager",
            AttributeKind::RoadWidth => "road_width",
            AttributeKind::SpeedLimit => "speed_limit",
            AttributeKind::UrbanArea => "urban_area",
            AttributeKind::WearingCourse => "wearing_course",
            AttributeKind::GuardRail => "guard_rail",
            AttributeKind::Roundabout => "roundabout",
        }
    }

    /// Column header used in exported edge tables.
    pub fn column(self) -> String {
        self.name().to_ascii_uppercase()
    }

    pub fn expected_type(self) -> ValueType {
        match self {
            AttributeKind::BridgeAndTunnel
            | AttributeKind::RoadManager
            | AttributeKind::WearingCourse => ValueType::Text,
            AttributeKind::FunctionalRoadClass | AttributeKind::NumberOfLanes => {
                ValueType::Integer
            }
            AttributeKind::LimitedVehicleLength
            | AttributeKind::LimitedVehicleWidth
            | AttributeKind::RoadWidth
            | AttributeKind::SpeedLimit => ValueType::Real,
            AttributeKind::LivingStreet
            | AttributeKind::Motorway
            | AttributeKind::MotorwayWithoutCentralReservation
            | AttributeKind::PedestrianStreet
            | AttributeKind::ForbiddenDriverDirection
            | AttributeKind::UrbanArea
            | AttributeKind::GuardRail
            | AttributeKind::Roundabout => ValueType::Boolean,
        }
    }

    pub fn expected_range(self) -> &'static str {
        match self {
            AttributeKind::FunctionalRoadClass => "[0, 9]",
            AttributeKind::NumberOfLanes => "[0, inf)",
            AttributeKind::LimitedVehicleLength
            | AttributeKind::LimitedVehicleWidth
            | AttributeKind::RoadWidth
            | AttributeKind::SpeedLimit => "[0.0, inf)",
            _ => "any",
        }
    }

    fn accepts(self, value: &AttributeValue) -> bool {
        match (self, value) {
            (AttributeKind::FunctionalRoadClass, AttributeValue::Integer(v)) => (0..=9).contains(v),
            (AttributeKind::NumberOfLanes, AttributeValue::Integer(v)) => *v >= 0,
            (_, AttributeValue::Real(v)) => v.is_finite() && *v >= 0.0,
            _ => true,
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AttributeKind {
    type Err = AttributeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        match wanted.as_str() {
            "speed" => return Ok(AttributeKind::SpeedLimit),
            "lanes" => return Ok(AttributeKind::NumberOfLanes),
            "forbidden_direction" => return Ok(AttributeKind::ForbiddenDriverDirection),
            _ => {}
        }
        AttributeKind::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| AttributeError::UnsupportedKind(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Text(String),
}

impl AttributeValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            AttributeValue::Integer(_) => ValueType::Integer,
            AttributeValue::Real(_) => ValueType::Real,
            AttributeValue::Boolean(_) => ValueType::Boolean,
            AttributeValue::Text(_) => ValueType::Text,
        }
    }

    pub fn parse(text: &str, value_type: ValueType) -> Result<Self, AttributeError> {
        let unparsable = || AttributeError::UnparsableValue {
            text: text.to_string(),
            value_type,
        };
        let trimmed = text.trim();
        match value_type {
            ValueType::Integer => trimmed
                .parse()
                .map(AttributeValue::Integer)
                .map_err(|_| unparsable()),
            ValueType::Real => trimmed
                .parse()
                .map(AttributeValue::Real)
                .map_err(|_| unparsable()),
            ValueType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "t" | "true" | "1" => Ok(AttributeValue::Boolean(true)),
                "f" | "false" | "0" => Ok(AttributeValue::Boolean(false)),
                _ => Err(unparsable()),
            },
            ValueType::Text => Ok(AttributeValue::Text(text.to_string())),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Integer(v) => write!(f, "{}", v),
            AttributeValue::Real(v) => write!(f, "{}", v),
            AttributeValue::Boolean(true) => f.write_str("t"),
            AttributeValue::Boolean(false) => f.write_str("f"),
            AttributeValue::Text(v) => f.write_str(v),
        }
    }
}

/// One typed observation. Only the direction may change after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    kind: AttributeKind,
    pub direction: DirectionCategory,
    value: AttributeValue,
}

impl Attribute {
    pub fn new(
        kind: AttributeKind,
        direction: DirectionCategory,
        value: AttributeValue,
    ) -> Result<Self, AttributeError> {
        let attribute = Self {
            kind,
            direction,
            value,
        };
        attribute.validate()?;
        Ok(attribute)
    }

    pub fn validate(&self) -> Result<(), AttributeError> {
        if self.value.value_type() != self.kind.expected_type() || !self.kind.accepts(&self.value)
        {
            return Err(AttributeError::Validation {
                kind: self.kind,
                expected_type: self.kind.expected_type(),
                expected_range: self.kind.expected_range(),
                found: format!("{} {}", self.value.value_type(), self.value),
            });
        }
        Ok(())
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    pub fn value(&self) -> &AttributeValue {
        &self.value
    }

    pub fn is_directional(&self) -> bool {
        self.direction.is_directional()
    }

    /// Same kind and value, direction ignored.
    pub fn same_value(&self, other: &Attribute) -> bool {
        self.kind == other.kind && self.value == other.value
    }
}
