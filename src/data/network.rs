//! High-voltage network geometry: substations, lines and the pylons carrying
//! them, plus loading from JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::core::bounds::Bounds;
use crate::core::geo::Coordinate;
use crate::{MapError, Result};

/// Opaque RGB color, written as `#rrggbb` in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rrggbb` (the leading `#` is optional)
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(MapError::Config(format!("invalid color {:?}", hex)));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| MapError::Config(format!("invalid color {:?}", hex)))
        };
        Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = MapError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// A substation, drawn as a filled circle at its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstationGraphic {
    pub id: String,
    /// Voltage class color
    pub color: Color,
    pub position: Coordinate,
    /// Layer the substation is drawn in; lower layers are painted first
    #[serde(default)]
    pub draw_order: i32,
}

impl SubstationGraphic {
    pub fn new(id: impl Into<String>, color: Color, position: Coordinate) -> Self {
        Self {
            id: id.into(),
            color,
            position,
            draw_order: 0,
        }
    }

    pub fn with_draw_order(mut self, draw_order: i32) -> Self {
        self.draw_order = draw_order;
        self
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_point(self.position)
    }
}

/// Identity and style shared by every piece of one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineGraphic {
    pub id: String,
    pub draw_order: i32,
    pub color: Color,
}

impl LineGraphic {
    pub fn new(id: impl Into<String>, draw_order: i32, color: Color) -> Self {
        Self {
            id: id.into(),
            draw_order,
            color,
        }
    }
}

/// The span of a line between two consecutive pylons.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentGraphic {
    pub start: Coordinate,
    pub end: Coordinate,
    pub line: LineGraphic,
}

impl SegmentGraphic {
    pub fn new(start: Coordinate, end: Coordinate, line: LineGraphic) -> Self {
        Self { start, end, line }
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds::from_point(self.start);
        bounds.extend(&self.end);
        bounds
    }
}

/// A whole line: its pylons in order and the line it belongs to.
///
/// The pylon list is never empty; [`BranchGraphic::new`] refuses one.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchGraphic {
    pylons: Vec<Coordinate>,
    line: LineGraphic,
    bounds: Bounds,
}

impl BranchGraphic {
    pub fn new(pylons: Vec<Coordinate>, line: LineGraphic) -> Result<Self> {
        let bounds = Bounds::from_coordinates(&pylons).ok_or_else(|| {
            MapError::InvalidGeometry(format!("branch {} has no pylons", line.id))
        })?;
        Ok(Self {
            pylons,
            line,
            bounds,
        })
    }

    pub fn pylons(&self) -> &[Coordinate] {
        &self.pylons
    }

    pub fn line(&self) -> &LineGraphic {
        &self.line
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// One segment per pair of consecutive pylons
    pub fn segments(&self) -> impl Iterator<Item = SegmentGraphic> + '_ {
        self.pylons
            .windows(2)
            .map(|pair| SegmentGraphic::new(pair[0], pair[1], self.line.clone()))
    }
}

/// Everything the network layers can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkGraphic {
    Substation(SubstationGraphic),
    Branch(BranchGraphic),
    Segment(SegmentGraphic),
}

impl NetworkGraphic {
    pub fn draw_order(&self) -> i32 {
        match self {
            NetworkGraphic::Substation(substation) => substation.draw_order,
            NetworkGraphic::Branch(branch) => branch.line.draw_order,
            NetworkGraphic::Segment(segment) => segment.line.draw_order,
        }
    }

    pub fn bounds(&self) -> Bounds {
        match self {
            NetworkGraphic::Substation(substation) => substation.bounds(),
            NetworkGraphic::Branch(branch) => branch.bounds(),
            NetworkGraphic::Segment(segment) => segment.bounds(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            NetworkGraphic::Substation(substation) => &substation.id,
            NetworkGraphic::Branch(branch) => &branch.line.id,
            NetworkGraphic::Segment(segment) => &segment.line.id,
        }
    }

    /// Rejects geometry that must never reach an index
    pub fn validate(&self) -> Result<()> {
        let coordinates: &[Coordinate] = match self {
            NetworkGraphic::Substation(substation) => std::slice::from_ref(&substation.position),
            NetworkGraphic::Branch(branch) => &branch.pylons,
            NetworkGraphic::Segment(segment) => {
                return check_coordinates(self.id(), &[segment.start, segment.end]);
            }
        };
        if coordinates.is_empty() {
            return Err(MapError::InvalidGeometry(format!(
                "branch {} has no pylons",
                self.id()
            )));
        }
        check_coordinates(self.id(), coordinates)
    }
}

fn check_coordinates(id: &str, coordinates: &[Coordinate]) -> Result<()> {
    match coordinates
        .iter()
        .find(|c| !c.lon.is_finite() || !c.lat.is_finite() || !c.is_valid())
    {
        Some(bad) => Err(MapError::InvalidGeometry(format!(
            "{} has an invalid coordinate ({}, {})",
            id, bad.lon, bad.lat
        ))),
        None => Ok(()),
    }
}

impl From<SubstationGraphic> for NetworkGraphic {
    fn from(substation: SubstationGraphic) -> Self {
        NetworkGraphic::Substation(substation)
    }
}

impl From<BranchGraphic> for NetworkGraphic {
    fn from(branch: BranchGraphic) -> Self {
        NetworkGraphic::Branch(branch)
    }
}

impl From<SegmentGraphic> for NetworkGraphic {
    fn from(segment: SegmentGraphic) -> Self {
        NetworkGraphic::Segment(segment)
    }
}

/// A line as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineData {
    #[serde(flatten)]
    pub line: LineGraphic,
    #[serde(default)]
    pub pylons: Vec<Coordinate>,
}

/// Network document:
///
/// ```json
/// {
///   "substations": [{ "id": "S1", "color": "#ff0000", "position": { "lon": 2.3, "lat": 48.8 } }],
///   "lines": [{ "id": "L1", "draw_order": 1, "color": "#00aa00",
///               "pylons": [{ "lon": 2.3, "lat": 48.8 }, { "lon": 2.4, "lat": 48.9 }] }]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkData {
    pub substations: Vec<SubstationGraphic>,
    pub lines: Vec<LineData>,
}

impl NetworkData {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let data = Self::from_json_str(&json)?;
        log::info!(
            "loaded {} substations and {} lines from {}",
            data.substations.len(),
            data.lines.len(),
            path.display()
        );
        Ok(data)
    }

    /// Substations plus one branch per line. Fails on the first line without
    /// pylons.
    pub fn into_graphics(self) -> Result<Vec<NetworkGraphic>> {
        let mut graphics: Vec<NetworkGraphic> = self
            .substations
            .into_iter()
            .map(NetworkGraphic::from)
            .collect();
        for line in self.lines {
            graphics.push(BranchGraphic::new(line.pylons, line.line)?.into());
        }
        Ok(graphics)
    }

    /// Like [`into_graphics`](Self::into_graphics) but lines are split into
    /// their segments, which keeps long lines from matching every query.
    /// A single-pylon line has no segment and is kept as a branch.
    pub fn into_segment_graphics(self) -> Result<Vec<NetworkGraphic>> {
        let mut graphics: Vec<NetworkGraphic> = self
            .substations
            .into_iter()
            .map(NetworkGraphic::from)
            .collect();
        for line in self.lines {
            let branch = BranchGraphic::new(line.pylons, line.line)?;
            if branch.pylons().len() < 2 {
                graphics.push(branch.into());
            } else {
                graphics.extend(branch.segments().map(NetworkGraphic::from));
            }
        }
        Ok(graphics)
    }
}
