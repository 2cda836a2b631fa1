//! Pure calculation functions for derivative dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Pick the widths to generate for an image `original_width` pixels wide.
///
/// Candidates wider than the original are dropped (no upscaling) and the
/// original width is appended when it is not already a candidate, so the
/// full-resolution variant always exists. The result is ascending and unique.
///
/// ```
/// # use srcsetter::imaging::plan_breakpoints;
/// assert_eq!(plan_breakpoints(1000, &[320, 640, 960, 1280]), vec![320, 640, 960, 1000]);
/// assert_eq!(plan_breakpoints(640, &[320, 640, 960, 1280]), vec![320, 640]);
/// assert_eq!(plan_breakpoints(200, &[320, 640]), vec![200]);
/// ```
pub fn plan_breakpoints(original_width: u32, candidates: &[u32]) -> Vec<u32> {
    let mut widths: Vec<u32> = candidates
        .iter()
        .copied()
        .filter(|&w| w > 0 && w <= original_width)
        .collect();
    if original_width > 0 && !widths.contains(&original_width) {
        widths.push(original_width);
    }
    widths.sort_unstable();
    widths.dedup();
    widths
}

/// Height of a derivative `target_width` pixels wide, preserving the
/// original aspect ratio. Rounds to the nearest pixel, never below 1.
pub fn scaled_height(original: (u32, u32), target_width: u32) -> u32 {
    let (orig_w, orig_h) = original;
    if orig_w == 0 {
        return 0;
    }
    let h = (orig_h as f64 * target_width as f64 / orig_w as f64).round() as u32;
    h.max(1)
}

/// A single responsive size to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponsiveSize {
    pub width: u32,
    pub height: u32,
}

/// Calculate which sizes to generate and their dimensions.
pub fn calculate_responsive_sizes(original: (u32, u32), candidates: &[u32]) -> Vec<ResponsiveSize> {
    plan_breakpoints(original.0, candidates)
        .into_iter()
        .map(|width| ResponsiveSize {
            width,
            height: scaled_height(original, width),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BREAKPOINTS: &[u32] = &[320, 640, 960, 1280];

    // =========================================================================
    // plan_breakpoints tests
    // =========================================================================

    #[test]
    fn breakpoints_drop_wider_than_original_and_append_original() {
        assert_eq!(plan_breakpoints(1000, BREAKPOINTS), vec![320, 640, 960, 1000]);
    }

    #[test]
    fn breakpoints_original_matches_candidate_once() {
        let widths = plan_breakpoints(960, BREAKPOINTS);
        assert_eq!(widths, vec![320, 640, 960]);
        assert_eq!(widths.iter().filter(|&&w| w == 960).count(), 1);
    }

    #[test]
    fn breakpoints_original_smaller_than_all() {
        assert_eq!(plan_breakpoints(100, BREAKPOINTS), vec![100]);
    }

    #[test]
    fn breakpoints_original_larger_than_all() {
        assert_eq!(
            plan_breakpoints(4000, BREAKPOINTS),
            vec![320, 640, 960, 1280, 4000]
        );
    }

    #[test]
    fn breakpoints_empty_candidates_returns_original() {
        assert_eq!(plan_breakpoints(500, &[]), vec![500]);
    }

    #[test]
    fn breakpoints_zero_width_is_empty() {
        assert!(plan_breakpoints(0, BREAKPOINTS).is_empty());
    }

    #[test]
    fn breakpoints_never_exceed_original_and_strictly_ascend() {
        for original in [1, 319, 320, 321, 639, 999, 1280, 1281, 5000] {
            let widths = plan_breakpoints(original, BREAKPOINTS);
            assert!(widths.iter().all(|&w| w <= original), "{original}: {widths:?}");
            assert!(widths.windows(2).all(|p| p[0] < p[1]), "{original}: {widths:?}");
            assert_eq!(widths.last(), Some(&original));
        }
    }

    // =========================================================================
    // scaled_height tests
    // =========================================================================

    #[test]
    fn height_preserves_aspect() {
        assert_eq!(scaled_height((1000, 500), 320), 160);
        assert_eq!(scaled_height((1000, 500), 1000), 500);
    }

    #[test]
    fn height_rounds_to_nearest() {
        // 333 * 320 / 1000 = 106.56
        assert_eq!(scaled_height((1000, 333), 320), 107);
        // 3 * 1 / 2 = 1.5 rounds up
        assert_eq!(scaled_height((2, 3), 1), 2);
    }

    #[test]
    fn height_never_below_one() {
        assert_eq!(scaled_height((5000, 1), 320), 1);
    }

    #[test]
    fn responsive_sizes_for_banner() {
        let sizes = calculate_responsive_sizes((1000, 500), BREAKPOINTS);
        let dims: Vec<(u32, u32)> = sizes.iter().map(|s| (s.width, s.height)).collect();
        assert_eq!(dims, vec![(320, 160), (640, 320), (960, 480), (1000, 500)]);
    }

    #[test]
    fn responsive_sizes_portrait() {
        let sizes = calculate_responsive_sizes((600, 900), BREAKPOINTS);
        let dims: Vec<(u32, u32)> = sizes.iter().map(|s| (s.width, s.height)).collect();
        assert_eq!(dims, vec![(320, 480), (600, 900)]);
    }
}
