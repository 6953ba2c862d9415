use crate::types::station_table::{StationTable, TIME_COLUMN};
use log::{debug, warn};
use polars::prelude::*;

/// Stacks `frames` (columns matched by name), sorts them by time and keeps the
/// first row of every timestamp. Ties keep the order of `frames`, so earlier
/// frames win.
pub(crate) fn merge_keep_first(frames: Vec<LazyFrame>) -> PolarsResult<DataFrame> {
    concat(
        frames,
        UnionArgs {
            rechunk: true,
            to_supertypes: true,
            diagonal: true,
            ..Default::default()
        },
    )?
    .sort(
        [TIME_COLUMN],
        SortMultipleOptions::default().with_maintain_order(true),
    )
    .filter(col(TIME_COLUMN).is_first_distinct())
    .collect()
}

/// Combines the per-window tables of one station, given in window order.
///
/// Windows share their boundary instants, so a timestamp may appear in two
/// neighbouring tables; the row from the earlier window is kept. When no
/// window produced rows an empty table is returned.
pub fn aggregate(station_code: &str, frames: Vec<DataFrame>) -> PolarsResult<StationTable> {
    let frames: Vec<DataFrame> = frames.into_iter().filter(|f| f.height() > 0).collect();
    if frames.is_empty() {
        warn!("{}: No data. Creating an empty table", station_code);
        return Ok(StationTable::empty(station_code));
    }

    let total: usize = frames.iter().map(DataFrame::height).sum();
    let merged = merge_keep_first(frames.into_iter().map(DataFrame::lazy).collect())?;
    debug!("{}: Total timestamps : {}", station_code, total);
    debug!("{}: Unique timestamps: {}", station_code, merged.height());
    Ok(StationTable::new(station_code, merged))
}
