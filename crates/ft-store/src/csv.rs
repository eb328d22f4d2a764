//! CSV export of a shipment's location history.
//!
//! Columns: `shipment_id,recorded_at,lat,lng,speed_kmh,heading`, with
//! `recorded_at` as RFC 3339 UTC at millisecond precision.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::SecondsFormat;
use csv::Writer;

use crate::{LocationSample, StoreResult};

pub const LOCATION_HEADER: [&str; 6] = ["shipment_id", "recorded_at", "lat", "lng", "speed_kmh", "heading"];

/// Write `samples` with a header row to `out`.
pub fn write_locations<W: Write>(out: W, samples: &[LocationSample]) -> StoreResult<()> {
    let mut writer = Writer::from_writer(out);
    writer.write_record(LOCATION_HEADER)?;
    for s in samples {
        writer.write_record(&[
            s.shipment_id.to_string(),
            s.recorded_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            format!("{:.6}", s.point.lat),
            format!("{:.6}", s.point.lng),
            format!("{:.2}", s.speed_kmh),
            format!("{:.1}", s.heading),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Create (or truncate) `path` and write `samples` to it.
pub fn write_locations_csv(path: &Path, samples: &[LocationSample]) -> StoreResult<()> {
    write_locations(File::create(path)?, samples)
}
