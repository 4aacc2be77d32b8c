// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Performance row schema and formatting.
//!
//! A [`PerfRow`] holds typed values in logged units. It becomes text only
//! at the file boundary, via [`PerfRow::to_line`].

use crate::source::Snapshot;
use chrono::{DateTime, SecondsFormat, Utc};
use std::f64::consts::PI;

/// Column delimiter.
pub const DELIMITER: char = ',';

/// Meters per second to knots.
pub const MS_TO_KNOTS: f64 = 1.94384;

/// Radians to degrees.
pub const RAD_TO_DEG: f64 = 180.0 / PI;

/// Header line (without the trailing newline).
pub const HEADER: &str = "time,model,config,lon,lat,sog,cog,stw,aws,awa,dbk,engine";

pub const PATH_DATETIME: &str = "navigation.datetime";
pub const PATH_POSITION: &str = "navigation.position";
pub const PATH_SOG: &str = "navigation.speedOverGround";
pub const PATH_COG: &str = "navigation.courseOverGroundTrue";
pub const PATH_STW: &str = "navigation.speedThroughWater";
pub const PATH_AWS: &str = "environment.wind.speedApparent";
pub const PATH_AWA: &str = "environment.wind.angleApparent";
pub const PATH_DBK: &str = "environment.depth.belowKeel";

/// Paths captured on every sampling tick.
pub const SAMPLED_PATHS: [&str; 8] = [
    PATH_DATETIME,
    PATH_POSITION,
    PATH_SOG,
    PATH_COG,
    PATH_STW,
    PATH_AWS,
    PATH_AWA,
    PATH_DBK,
];

/// Columns of a performance row, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Time,
    Model,
    Config,
    Lon,
    Lat,
    Sog,
    Cog,
    Stw,
    Aws,
    Awa,
    Dbk,
    Engine,
}

/// Fixed column order.
pub const COLUMNS: [Column; 12] = [
    Column::Time,
    Column::Model,
    Column::Config,
    Column::Lon,
    Column::Lat,
    Column::Sog,
    Column::Cog,
    Column::Stw,
    Column::Aws,
    Column::Awa,
    Column::Dbk,
    Column::Engine,
];

impl Column {
    /// Header name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Model => "model",
            Self::Config => "config",
            Self::Lon => "lon",
            Self::Lat => "lat",
            Self::Sog => "sog",
            Self::Cog => "cog",
            Self::Stw => "stw",
            Self::Aws => "aws",
            Self::Awa => "awa",
            Self::Dbk => "dbk",
            Self::Engine => "engine",
        }
    }

    /// Decimal places for numeric columns, `None` for text columns.
    pub fn decimals(&self) -> Option<usize> {
        match self {
            Self::Lon | Self::Lat => Some(6),
            Self::Sog | Self::Stw | Self::Aws | Self::Dbk => Some(2),
            Self::Cog | Self::Awa => Some(1),
            Self::Time | Self::Model | Self::Config | Self::Engine => None,
        }
    }
}

/// Static strings copied verbatim into every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSettings {
    pub model: String,
    pub sail_config: String,
    pub engine: String,
}

/// One sampled row, values already in logged units (knots, degrees, meters).
#[derive(Debug, Clone, PartialEq)]
pub struct PerfRow {
    pub time: DateTime<Utc>,
    pub model: String,
    pub sail_config: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub sog: Option<f64>,
    pub cog: Option<f64>,
    pub stw: Option<f64>,
    pub aws: Option<f64>,
    pub awa: Option<f64>,
    pub dbk: Option<f64>,
    pub engine: String,
}

impl PerfRow {
    /// Build a row from a snapshot.
    ///
    /// Missing or mistyped readings stay `None` and render as empty fields.
    pub fn from_snapshot(
        snapshot: &Snapshot,
        sample_time: DateTime<Utc>,
        settings: &RowSettings,
    ) -> Self {
        let number = |path: &str| snapshot.get(path).and_then(|r| r.as_number());
        let position = snapshot.get(PATH_POSITION).and_then(|r| r.as_position());

        Self {
            time: sample_time,
            model: settings.model.clone(),
            sail_config: settings.sail_config.clone(),
            longitude: position.map(|p| p.longitude),
            latitude: position.map(|p| p.latitude),
            sog: number(PATH_SOG).map(|v| v * MS_TO_KNOTS),
            cog: number(PATH_COG).map(|v| v * RAD_TO_DEG),
            stw: number(PATH_STW).map(|v| v * MS_TO_KNOTS),
            aws: number(PATH_AWS).map(|v| v * MS_TO_KNOTS),
            awa: number(PATH_AWA).map(|v| v * RAD_TO_DEG),
            dbk: number(PATH_DBK),
            engine: settings.engine.clone(),
        }
    }

    /// Rendered fields in column order.
    pub fn fields(&self) -> Vec<String> {
        COLUMNS.iter().map(|c| self.field(*c)).collect()
    }

    /// Render a single column.
    pub fn field(&self, column: Column) -> String {
        let numeric = |value: Option<f64>| match (value, column.decimals()) {
            (Some(v), Some(decimals)) if v.is_finite() => format!("{:.*}", decimals, v),
            _ => String::new(),
        };

        match column {
            Column::Time => self.time.to_rfc3339_opts(SecondsFormat::Millis, true),
            Column::Model => self.model.clone(),
            Column::Config => self.sail_config.clone(),
            Column::Lon => numeric(self.longitude),
            Column::Lat => numeric(self.latitude),
            Column::Sog => numeric(self.sog),
            Column::Cog => numeric(self.cog),
            Column::Stw => numeric(self.stw),
            Column::Aws => numeric(self.aws),
            Column::Awa => numeric(self.awa),
            Column::Dbk => numeric(self.dbk),
            Column::Engine => self.engine.clone(),
        }
    }

    /// Serialize as a newline-terminated delimited line.
    pub fn to_line(&self) -> String {
        let delimiter = DELIMITER.to_string();
        let mut line = self.fields().join(delimiter.as_str());
        line.push('\n');
        line
    }
}

/// Header line including the trailing newline.
pub fn header_line() -> String {
    format!("{}\n", HEADER)
}
