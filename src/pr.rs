//! PR evaluation and one-rep-max estimation
//!
//! Pure functions over (weight, reps) history, usable directly by display
//! code. Weights are in kilograms.

/// Decide whether a candidate set is a personal record given the full prior
/// history for its exercise.
///
/// The first set ever logged for an exercise is always a PR. Otherwise the
/// candidate is compared against the best rep count previously recorded at
/// exactly its weight; when heavier sets exist, beating that same-weight rep
/// count is the only way to set a record. A candidate above the historical
/// max weight has no same-weight history, so it qualifies at any rep count.
pub fn is_personal_record<I>(weight: f64, reps: i32, prior: I) -> bool
where
    I: IntoIterator<Item = (f64, i32)>,
{
    let mut seen_any = false;
    let mut has_heavier = false;
    let mut has_same_weight = false;
    let mut max_reps_at_weight = 0;

    for (w, r) in prior {
        seen_any = true;
        if w > weight {
            has_heavier = true;
        } else if w == weight {
            has_same_weight = true;
            max_reps_at_weight = max_reps_at_weight.max(r);
        }
    }

    if !seen_any {
        return true;
    }

    if has_heavier {
        // A heavier lift exists; only a new rep record at this exact
        // weight counts.
        reps > max_reps_at_weight
    } else {
        // Candidate ties or exceeds the historical max weight.
        !has_same_weight || reps > max_reps_at_weight
    }
}

/// Epley estimate of the one-rep max
pub fn estimate_one_rep_max(weight: f64, reps: i32) -> f64 {
    if weight <= 0.0 || reps <= 0 {
        return 0.0;
    }
    if reps == 1 {
        return weight;
    }
    weight * (1.0 + reps as f64 / 30.0)
}

/// Inverse of [`estimate_one_rep_max`]: the working weight expected to
/// allow `target_reps` repetitions given an estimated 1RM
pub fn weight_for_target_reps(one_rep_max: f64, target_reps: i32) -> f64 {
    if one_rep_max <= 0.0 || target_reps <= 0 {
        return 0.0;
    }
    if target_reps == 1 {
        return one_rep_max;
    }
    one_rep_max / (1.0 + target_reps as f64 / 30.0)
}
