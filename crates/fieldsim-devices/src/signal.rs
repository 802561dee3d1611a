//! Signal helpers shared by several models.

use std::f64::consts::PI;

use rand::Rng;

/// Lower bound on the first uniform draw of the Box-Muller transform.
const BOX_MULLER_FLOOR: f64 = 1e-10;

/// One draw from `N(0, std_dev)` using the Box-Muller transform.
pub fn gaussian(rng: &mut impl Rng, std_dev: f64) -> f64 {
    let u1 = rng.random::<f64>().max(BOX_MULLER_FLOOR);
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos() * std_dev
}

/// A Bernoulli trial with success probability `p`.
///
/// Unlike `Rng::random_bool` this never panics; `p <= 0` never succeeds and
/// `p >= 1` always does.
pub fn chance(rng: &mut impl Rng, p: f64) -> bool {
    rng.random::<f64>() < p
}

/// Cosine easing from 0 to 1 over `progress` in `[0, 1]`.
pub fn cosine_ease(progress: f64) -> f64 {
    (1.0 - (progress * PI).cos()) / 2.0
}

/// Position within a repeating cycle, always in `[0, period)`.
pub fn cycle_time(elapsed: f64, period: f64) -> f64 {
    let c = elapsed.rem_euclid(period);
    // Tiny negative inputs round up to exactly `period`.
    if c < period { c } else { 0.0 }
}

/// A boolean that flips every `period` seconds of elapsed time.
///
/// Edges are scheduled at whole multiples of the period after the last
/// edge, so a tick that lands slightly past an edge never pushes the next
/// edge later.
#[derive(Debug, Clone, PartialEq)]
pub struct Toggle {
    state: bool,
    last_edge: f64,
    period: f64,
}

impl Toggle {
    /// A toggle starting in `state` with its first edge one period out.
    pub const fn new(state: bool, period: f64) -> Self {
        Self {
            state,
            last_edge: 0.0,
            period,
        }
    }

    /// Current state.
    pub const fn state(&self) -> bool {
        self.state
    }

    /// Force the state without moving the edge schedule.
    pub const fn set(&mut self, state: bool) {
        self.state = state;
    }

    /// Flip if an edge is due at `elapsed` and return the resulting state.
    ///
    /// A tick that spans several periods flips once, and the schedule moves
    /// on to the latest due edge.
    pub fn advance(&mut self, elapsed: f64) -> bool {
        let edges = ((elapsed - self.last_edge) / self.period).floor();
        if edges >= 1.0 {
            self.state = !self.state;
            self.last_edge = edges.mul_add(self.period, self.last_edge);
        }
        self.state
    }

    /// Back to `state` with the schedule restarted at zero.
    pub const fn reset(&mut self, state: bool) {
        self.state = state;
        self.last_edge = 0.0;
    }
}
