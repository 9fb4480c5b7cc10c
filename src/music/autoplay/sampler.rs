use rand::Rng;

use crate::music::track::Track;

/// Draw `wanted` tracks at random from `candidates`, skipping any whose
/// identifier is already known (or missing).
///
/// Candidates are drawn without replacement, so the search makes at most
/// `candidates.len()` draws. Returns `None` if the candidates run out before
/// `wanted` tracks were found; nothing is partially returned.
pub fn pick_unique<R, F>(
    rng: &mut R,
    candidates: &[Track],
    wanted: usize,
    is_known: F,
) -> Option<Vec<Track>>
where
    R: Rng,
    F: Fn(&str) -> bool,
{
    let mut remaining: Vec<&Track> = candidates.iter().collect();
    let mut picks: Vec<Track> = Vec::with_capacity(wanted);

    while picks.len() < wanted {
        if remaining.is_empty() {
            return None;
        }

        let candidate = remaining.swap_remove(rng.random_range(0..remaining.len()));
        let Some(id) = candidate.id() else {
            continue;
        };

        // Results can repeat an identifier, so staged picks count as known too.
        if is_known(id) || picks.iter().any(|pick| pick.id() == Some(id)) {
            continue;
        }

        picks.push(candidate.clone());
    }

    Some(picks)
}
