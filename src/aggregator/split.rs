use crate::aggregator::StopTimeEntry;

/// Cuts a sequence-ordered stop-time list wherever arrivals go backwards.
///
/// A backwards arrival that still lies more than `late_correction_threshold`
/// seconds after the response timestamp is a late correction: it replaces the
/// arrival of the preceding entry and is not kept as an entry of its own.
/// Any other backwards arrival starts a new segment, and the scan continues
/// over the remainder with the running arrival reset.
pub(crate) fn split_segments(
    entries: Vec<StopTimeEntry>,
    response_timestamp: i64,
    late_correction_threshold: i64,
) -> Vec<Vec<StopTimeEntry>> {
    let mut segments = Vec::new();
    let mut current: Vec<StopTimeEntry> = Vec::with_capacity(entries.len());
    let mut previous_arrival = 0i64;

    for entry in entries {
        if entry.arrival < previous_arrival && !current.is_empty() {
            let delay = entry.arrival - response_timestamp;
            if delay > late_correction_threshold {
                if let Some(last) = current.last_mut() {
                    last.arrival = entry.arrival;
                }
                previous_arrival = entry.arrival;
                continue;
            }

            segments.push(std::mem::take(&mut current));
        }

        previous_arrival = entry.arrival;
        current.push(entry);
    }

    if !current.is_empty() {
        segments.push(current);
    }
    segments
}
