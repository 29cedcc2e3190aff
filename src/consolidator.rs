//! Merging of adjacent, property-equal fragments.

use crate::fragment::Part;
use crate::geometry_ops;

pub fn sort_by_measure<P: Part>(parts: &mut [P]) {
    parts.sort_by(|a, b| {
        a.fragment()
            .measure_from()
            .total_cmp(&b.fragment().measure_from())
    });
}

/// Adds `part` to `parts`, keeping the list sorted by `measure_from`.
///
/// If a property-equal entry ends exactly where `part` starts (or starts
/// exactly where it ends), `part` absorbs that entry and takes its place.
/// Otherwise it is appended.
pub fn consolidate<P: Part>(parts: &mut Vec<P>, mut part: P) {
    let mut replaced = None;

    for (i, existing) in parts.iter().enumerate() {
        if !existing.property_equal(&part) {
            continue;
        }
        let (existing_start, existing_end) = (existing.fragment().start(), existing.fragment().end());
        let (start, end) = (part.fragment().start(), part.fragment().end());

        if existing_end.is_some() && existing_end == start {
            part.absorb_predecessor(existing);
            replaced = Some(i);
            break;
        } else if end.is_some() && end == existing_start {
            part.absorb_successor(existing);
            replaced = Some(i);
            break;
        }
    }

    match replaced {
        Some(i) => parts[i] = part,
        None => parts.push(part),
    }

    sort_by_measure(parts);
}

/// Gives a geometry-less `part` the connector between its neighbours by
/// measure, then consolidates it. Hands the part back when it has no
/// predecessor or successor to borrow geometry from.
pub fn consolidate_without_geometry<P: Part>(parts: &mut Vec<P>, mut part: P) -> Result<(), P> {
    sort_by_measure(parts);

    let measure_from = part.fragment().measure_from();
    let position = parts.partition_point(|p| p.fragment().measure_from() <= measure_from);
    if position == 0 || position >= parts.len() {
        return Err(part);
    }

    let connector = match (
        parts[position - 1].fragment().geometry(),
        parts[position].fragment().geometry(),
    ) {
        (Some(prev), Some(next)) => geometry_ops::between(prev, next),
        _ => None,
    };

    match connector {
        Some(line) => {
            part.fragment_mut().set_geometry(line);
            consolidate(parts, part);
            Ok(())
        }
        None => Err(part),
    }
}
