//! Blue-noise placement of reservoir neurons.
//!
//! Fast Poisson-disk sampling (Bridson) over the rectangle
//! `[0, xmax] × [0, ymax]`. The minimum spacing is derived from the requested
//! count so that the realized count lands near the request; the caller must
//! treat the realized count as authoritative, not the request.

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

/// Minimum spacing that yields approximately `n` points in the rectangle:
/// `r = sqrt(xmax·ymax / (n·√3))`.
pub fn optimal_radius(n: usize, xmax: f32, ymax: f32) -> f32 {
    ((xmax * ymax) / (n as f32 * 3.0f32.sqrt())).sqrt()
}

/// Sample approximately `n_target` points with pairwise spacing ≥ the
/// count-derived radius. `k` is the candidate budget per active point.
///
/// Deterministic for a fixed RNG state.
pub fn bridson_sampling(
    n_target: usize,
    xmax: f32,
    ymax: f32,
    k: usize,
    rng: &mut StdRng,
) -> Vec<[f32; 2]> {
    let radius = optimal_radius(n_target, xmax, ymax);
    let points = sample_with_radius(radius, xmax, ymax, k, rng);
    debug!(
        requested = n_target,
        realized = points.len(),
        radius,
        "blue-noise sampling complete"
    );
    points
}

/// Bridson's algorithm with an explicit minimum spacing.
pub fn sample_with_radius(
    radius: f32,
    xmax: f32,
    ymax: f32,
    k: usize,
    rng: &mut StdRng,
) -> Vec<[f32; 2]> {
    // Background grid with one point per cell; cell diagonal = radius.
    let cell = radius / std::f32::consts::SQRT_2;
    let cols = (xmax / cell).ceil() as usize + 1;
    let rows = (ymax / cell).ceil() as usize + 1;
    let mut grid: Vec<Option<usize>> = vec![None; cols * rows];

    let mut points: Vec<[f32; 2]> = Vec::new();
    let mut active: Vec<usize> = Vec::new();

    let cell_of = |p: [f32; 2]| -> (usize, usize) {
        (
            ((p[0] / cell) as usize).min(cols - 1),
            ((p[1] / cell) as usize).min(rows - 1),
        )
    };

    let first = [rng.gen::<f32>() * xmax, rng.gen::<f32>() * ymax];
    let (cx, cy) = cell_of(first);
    grid[cy * cols + cx] = Some(0);
    points.push(first);
    active.push(0);

    while !active.is_empty() {
        let slot = rng.gen_range(0..active.len());
        let center = points[active[slot]];
        let mut placed = false;

        for _ in 0..k {
            let angle = rng.gen::<f32>() * std::f32::consts::TAU;
            let dist = radius * (1.0 + rng.gen::<f32>());
            let candidate = [
                center[0] + dist * angle.cos(),
                center[1] + dist * angle.sin(),
            ];
            if candidate[0] < 0.0
                || candidate[0] >= xmax
                || candidate[1] < 0.0
                || candidate[1] >= ymax
            {
                continue;
            }
            if !fits(candidate, radius, &points, &grid, cols, rows, cell) {
                continue;
            }

            let index = points.len();
            let (gx, gy) = cell_of(candidate);
            grid[gy * cols + gx] = Some(index);
            points.push(candidate);
            active.push(index);
            placed = true;
            break;
        }

        if !placed {
            active.swap_remove(slot);
        }
    }

    points
}

/// True when `candidate` keeps distance ≥ `radius` to every accepted point.
/// Only the 5×5 cell neighborhood can contain a conflict.
fn fits(
    candidate: [f32; 2],
    radius: f32,
    points: &[[f32; 2]],
    grid: &[Option<usize>],
    cols: usize,
    rows: usize,
    cell: f32,
) -> bool {
    let gx = ((candidate[0] / cell) as usize).min(cols - 1) as isize;
    let gy = ((candidate[1] / cell) as usize).min(rows - 1) as isize;
    let r2 = radius * radius;

    for dy in -2..=2isize {
        for dx in -2..=2isize {
            let nx = gx + dx;
            let ny = gy + dy;
            if nx < 0 || ny < 0 || nx >= cols as isize || ny >= rows as isize {
                continue;
            }
            if let Some(index) = grid[ny as usize * cols + nx as usize] {
                let p = points[index];
                let ddx = p[0] - candidate[0];
                let ddy = p[1] - candidate[1];
                if ddx * ddx + ddy * ddy < r2 {
                    return false;
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_realized_count_positive_and_near_target() {
        let mut rng = StdRng::seed_from_u64(21);
        let points = bridson_sampling(200, 1.0, 0.5, 30, &mut rng);
        assert!(!points.is_empty());
        assert!(
            points.len() >= 100 && points.len() <= 500,
            "realized count {} far from target 200",
            points.len()
        );
    }

    #[test]
    fn test_minimum_spacing_holds() {
        let n = 150;
        let radius = optimal_radius(n, 1.0, 0.5);
        let mut rng = StdRng::seed_from_u64(7);
        let points = bridson_sampling(n, 1.0, 0.5, 30, &mut rng);

        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                let dx = points[i][0] - points[j][0];
                let dy = points[i][1] - points[j][1];
                let dist = (dx * dx + dy * dy).sqrt();
                assert!(
                    dist >= radius * 0.999,
                    "points {i} and {j} too close: {dist} < {radius}"
                );
            }
        }
    }

    #[test]
    fn test_points_inside_rectangle() {
        let mut rng = StdRng::seed_from_u64(3);
        let points = bridson_sampling(100, 1.0, 0.5, 30, &mut rng);
        for p in &points {
            assert!(p[0] >= 0.0 && p[0] < 1.0);
            assert!(p[1] >= 0.0 && p[1] < 0.5);
        }
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let a = bridson_sampling(120, 1.0, 0.5, 30, &mut rng_a);
        let b = bridson_sampling(120, 1.0, 0.5, 30, &mut rng_b);
        assert_eq!(a, b);
    }
}
