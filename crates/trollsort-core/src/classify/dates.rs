use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Date tags in the order they are trusted.
pub const DATE_TAGS_PRIORITY: [&str; 5] = [
    "DateTimeOriginal",
    "MediaCreateDate",
    "CreateDate",
    "TrackCreateDate",
    "ModifyDate",
];

const EXIF_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// A capture timestamp as written in the file: wall-clock time plus the
/// offset it was recorded in, if any. Never converted to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTime {
    pub local: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

impl CaptureTime {
    /// Calendar date in the timestamp's own offset.
    pub fn date(&self) -> NaiveDate {
        self.local.date()
    }

    pub fn year(&self) -> i32 {
        self.local.year()
    }
}

impl fmt::Display for CaptureTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.local.format("%Y-%m-%dT%H:%M:%S"))?;
        if let Some(offset) = self.offset {
            write!(f, "{}", offset)?;
        }
        Ok(())
    }
}

impl Serialize for CaptureTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parses `YYYY:MM:DD HH:MM:SS`, optionally followed by `+HH:MM`, `+HHMM` or `Z`.
pub fn parse_exif_datetime(value: &str) -> Option<CaptureTime> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }

    if let Some(body) = v.strip_suffix('Z') {
        let local = NaiveDateTime::parse_from_str(body, EXIF_FORMAT).ok()?;
        return Some(CaptureTime {
            local,
            offset: FixedOffset::east_opt(0),
        });
    }

    for fmt in ["%Y:%m:%d %H:%M:%S%:z", "%Y:%m:%d %H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(v, fmt) {
            return Some(CaptureTime {
                local: dt.naive_local(),
                offset: Some(*dt.offset()),
            });
        }
    }

    NaiveDateTime::parse_from_str(v, EXIF_FORMAT)
        .ok()
        .map(|local| CaptureTime {
            local,
            offset: None,
        })
}

/// First tag in priority order whose value parses.
pub fn pick_best_date(
    timestamps: &BTreeMap<String, String>,
) -> Option<(CaptureTime, &'static str)> {
    DATE_TAGS_PRIORITY.iter().find_map(|tag| {
        timestamps
            .get(*tag)
            .and_then(|v| parse_exif_datetime(v))
            .map(|dt| (dt, *tag))
    })
}
