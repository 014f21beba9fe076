use std::fmt;

/// A `MM:SS` duration as written in the source.
///
/// Components are kept raw so the validator can report `12:75` instead of the
/// parser silently carrying the overflow into the minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    pub minutes: u32,
    pub seconds: u32,
}

impl Duration {
    pub fn new(minutes: u32, seconds: u32) -> Self {
        Duration { minutes, seconds }
    }

    pub fn from_seconds(total: u32) -> Self {
        Duration {
            minutes: total / 60,
            seconds: total % 60,
        }
    }

    /// Whole seconds, the unit the target format uses.
    pub fn total_seconds(&self) -> u64 {
        u64::from(self.minutes) * 60 + u64::from(self.seconds)
    }

    pub fn is_well_formed(&self) -> bool {
        self.seconds < 60
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes, self.seconds)
    }
}

/// A power zone shorthand: `Z<n>` or `SS` (sweet spot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    Numbered(u32),
    SweetSpot,
}

impl Zone {
    /// Only `Z1`..`Z7` and `SS` name a band on the platform.
    pub fn is_defined(&self) -> bool {
        match self {
            Zone::Numbered(n) => (1..=7).contains(n),
            Zone::SweetSpot => true,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Numbered(n) => write!(f, "Z{}", n),
            Zone::SweetSpot => write!(f, "SS"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Duration,
    Integer,
    Percent,
    Zone,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Duration => "duration",
            ScalarKind::Integer => "integer",
            ScalarKind::Percent => "percentage",
            ScalarKind::Zone => "zone",
        };
        f.write_str(name)
    }
}

/// A single typed value: the side of a range or a whole parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Duration(Duration),
    Integer(u32),
    Percent(u32),
    Zone(Zone),
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Duration(_) => ScalarKind::Duration,
            Scalar::Integer(_) => ScalarKind::Integer,
            Scalar::Percent(_) => ScalarKind::Percent,
            Scalar::Zone(_) => ScalarKind::Zone,
        }
    }

    /// Integer, percentage and zone values can all describe power.
    pub fn is_power(&self) -> bool {
        !matches!(self, Scalar::Duration(_))
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Duration(d) => write!(f, "{}", d),
            Scalar::Integer(n) => write!(f, "{}", n),
            Scalar::Percent(p) => write!(f, "{}%", p),
            Scalar::Zone(z) => write!(f, "{}", z),
        }
    }
}

/// A parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueExpr {
    Scalar(Scalar),
    /// `left -> right`
    Range { left: Scalar, right: Scalar },
    Text(String),
}

impl ValueExpr {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            ValueExpr::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<u32> {
        match self {
            ValueExpr::Scalar(Scalar::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ValueExpr::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<(&Scalar, &Scalar)> {
        match self {
            ValueExpr::Range { left, right } => Some((left, right)),
            _ => None,
        }
    }

    /// Iterate over the scalars this value is made of (none for text).
    pub fn scalars(&self) -> impl Iterator<Item = &Scalar> {
        let (first, second) = match self {
            ValueExpr::Scalar(s) => (Some(s), None),
            ValueExpr::Range { left, right } => (Some(left), Some(right)),
            ValueExpr::Text(_) => (None, None),
        };
        first.into_iter().chain(second)
    }

    /// Short description of the value's shape, for error messages.
    pub fn describe(&self) -> String {
        match self {
            ValueExpr::Scalar(s) => s.kind().to_string(),
            ValueExpr::Range { left, right } if left.kind() == right.kind() => {
                format!("{} range", left.kind())
            }
            ValueExpr::Range { left, right } => {
                format!("{} -> {} range", left.kind(), right.kind())
            }
            ValueExpr::Text(_) => "string".to_string(),
        }
    }
}

impl fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueExpr::Scalar(s) => write!(f, "{}", s),
            ValueExpr::Range { left, right } => write!(f, "{} -> {}", left, right),
            ValueExpr::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}
