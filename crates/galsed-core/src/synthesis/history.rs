//! Merger-tree flattening into star formation histories.
//!
//! A tree is walked iteratively over an explicit stack of (snapshot, galaxy)
//! pairs, preserving the preorder of the recursive formulation: a node's
//! burst, then its first-progenitor branch one snapshot earlier, then its
//! next-progenitor branch at the same snapshot. Link targets were pinned by
//! table validation, so the walk indexes the tables directly.

use crate::common::constants::{MAX_TREE_BURSTS, METALLICITY_BINS_PER_UNIT};
use crate::domain::{
    Burst, MergerTreeTables, StarFormationHistory, SynthesisError, SynthesisResult,
};

/// Flattens the merger tree of every requested galaxy at `target_snapshot`
/// into a star formation history.
///
/// A node contributes a burst only when its star formation rate is strictly
/// positive; the burst's age bucket is the node's snapshot lag behind the
/// output epoch. A tree emitting more than [`MAX_TREE_BURSTS`] bursts is
/// rejected as pathological.
pub fn flatten_forest(
    tables: &MergerTreeTables,
    target_snapshot: usize,
    galaxies: &[usize],
) -> SynthesisResult<Vec<StarFormationHistory>> {
    tables.validate()?;
    let snapshots = tables.snapshot_count();
    if target_snapshot >= snapshots {
        return Err(SynthesisError::TreeSnapshotRange {
            snapshot: target_snapshot,
            snapshots,
        });
    }
    let row = tables.galaxy_count(target_snapshot);
    galaxies
        .iter()
        .map(|&galaxy| {
            if galaxy >= row {
                return Err(SynthesisError::TreeGalaxyRange {
                    snapshot: target_snapshot,
                    galaxy,
                    galaxies: row,
                });
            }
            flatten_tree(tables, target_snapshot, galaxy)
        })
        .collect()
}

fn flatten_tree(
    tables: &MergerTreeTables,
    target_snapshot: usize,
    galaxy: usize,
) -> SynthesisResult<StarFormationHistory> {
    let mut bursts = Vec::new();
    emit_node(
        tables,
        target_snapshot,
        target_snapshot,
        galaxy,
        galaxy,
        &mut bursts,
    )?;

    // The root's next-progenitor link names a sibling in its descendant's
    // tree, not part of this galaxy's history; only the first-progenitor
    // branch is seeded.
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let first = tables.first_progenitor[target_snapshot][galaxy];
    if first >= 0 {
        stack.push((target_snapshot - 1, first as usize));
    }

    while let Some((snapshot, index)) = stack.pop() {
        emit_node(tables, target_snapshot, snapshot, index, galaxy, &mut bursts)?;
        // Next-progenitor sits below first-progenitor on the stack, so the
        // first branch is exhausted before the next sibling starts.
        let next = tables.next_progenitor[snapshot][index];
        if next >= 0 {
            stack.push((snapshot, next as usize));
        }
        let first = tables.first_progenitor[snapshot][index];
        if first >= 0 {
            stack.push((snapshot - 1, first as usize));
        }
    }

    Ok(StarFormationHistory::new(bursts))
}

fn emit_node(
    tables: &MergerTreeTables,
    target_snapshot: usize,
    snapshot: usize,
    index: usize,
    galaxy: usize,
    bursts: &mut Vec<Burst>,
) -> SynthesisResult<()> {
    let sfr = tables.sfr[snapshot][index];
    if sfr > 0.0 {
        if bursts.len() >= MAX_TREE_BURSTS {
            return Err(SynthesisError::BurstCapacity {
                galaxy,
                limit: MAX_TREE_BURSTS,
            });
        }
        bursts.push(Burst {
            age_index: target_snapshot - snapshot,
            metallicity: tables.metallicity[snapshot][index],
            sfr,
        });
    }
    Ok(())
}

/// Moves burst metallicities whose bin falls outside `[min_bin, max_bin]`
/// onto the nearest covered bin centre.
///
/// Downstream binning clamps as well; rebinning up front keeps the stored
/// histories consistent with the rows actually reduced.
pub(crate) fn trim_to_bin_range(
    histories: &mut [StarFormationHistory],
    min_bin: usize,
    max_bin: usize,
) {
    let lower = bin_centre(min_bin);
    let upper = bin_centre(max_bin);
    for history in histories.iter_mut() {
        for burst in &mut history.bursts {
            let raw = (burst.metallicity * METALLICITY_BINS_PER_UNIT - 0.5).floor();
            if raw < min_bin as f64 {
                burst.metallicity = lower;
            } else if raw > max_bin as f64 {
                burst.metallicity = upper;
            }
        }
    }
}

fn bin_centre(bin: usize) -> f64 {
    (bin + 1) as f64 / METALLICITY_BINS_PER_UNIT
}
