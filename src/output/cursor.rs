//! Cursor motion planning
//!
//! Picks the shortest byte sequence that moves the terminal cursor between
//! two positions, out of:
//! - Absolute addressing (`cup`)
//! - Column and row addressing (`hpa`, `vpa`)
//! - Relative moves, parameterized or repeated single steps
//! - Carriage return followed by relative moves
//! - Home followed by relative moves

use std::sync::Arc;

use crate::capability::CapabilityTable;
use crate::core::Point;

/// Chooses cursor motion sequences for one terminal type
#[derive(Debug, Clone)]
pub struct CursorPlanner {
    caps: Arc<CapabilityTable>,
    optimize: bool,
}

impl CursorPlanner {
    /// With `optimize` off, absolute addressing is used whenever available
    pub fn new(caps: Arc<CapabilityTable>, optimize: bool) -> Self {
        Self { caps, optimize }
    }

    /// Sequence moving the cursor from `from` (unknown when `None`) to `to`.
    ///
    /// Returns `None` when the terminal offers no way to get there.
    pub fn plan(&self, from: Option<Point>, to: Point) -> Option<Vec<u8>> {
        if to.x < 0 || to.y < 0 {
            return None;
        }
        if from == Some(to) {
            return Some(Vec::new());
        }

        let cursor = &self.caps.cursor;
        let absolute = self
            .caps
            .expand(cursor.cursor_address.as_deref(), &[to.y, to.x]);
        if !self.optimize && absolute.is_some() {
            return absolute;
        }

        let mut candidates = vec![absolute];
        if let Some(from) = from {
            candidates.push(join(
                self.vertical(from.y, to.y),
                self.horizontal(from.x, to.x),
            ));
            if let Some(cr) = self.caps.expand(cursor.carriage_return.as_deref(), &[]) {
                candidates.push(join(
                    join(Some(cr), self.vertical(from.y, to.y)),
                    self.horizontal(0, to.x),
                ));
            }
        }
        if let Some(home) = self.caps.expand(cursor.cursor_home.as_deref(), &[]) {
            candidates.push(join(
                join(Some(home), self.vertical(0, to.y)),
                self.horizontal(0, to.x),
            ));
        }
        shortest(candidates)
    }

    /// Byte cost of [`plan`](Self::plan)
    pub fn cost(&self, from: Option<Point>, to: Point) -> Option<usize> {
        self.plan(from, to).map(|seq| seq.len())
    }

    fn horizontal(&self, from: i32, to: i32) -> Option<Vec<u8>> {
        let cursor = &self.caps.cursor;
        let delta = to - from;
        let relative = if delta == 0 {
            return Some(Vec::new());
        } else if delta > 0 {
            self.relative(
                delta,
                cursor.parm_right_cursor.as_deref(),
                cursor.cursor_right.as_deref(),
            )
        } else {
            self.relative(
                -delta,
                cursor.parm_left_cursor.as_deref(),
                cursor.cursor_left.as_deref(),
            )
        };
        let address = self.caps.expand(cursor.column_address.as_deref(), &[to]);
        shortest([relative, address])
    }

    fn vertical(&self, from: i32, to: i32) -> Option<Vec<u8>> {
        let cursor = &self.caps.cursor;
        let delta = to - from;
        let relative = if delta == 0 {
            return Some(Vec::new());
        } else if delta > 0 {
            self.relative(
                delta,
                cursor.parm_down_cursor.as_deref(),
                cursor.cursor_down.as_deref(),
            )
        } else {
            self.relative(
                -delta,
                cursor.parm_up_cursor.as_deref(),
                cursor.cursor_up.as_deref(),
            )
        };
        let address = self.caps.expand(cursor.row_address.as_deref(), &[to]);
        shortest([relative, address])
    }

    /// `count` steps in one direction
    fn relative(&self, count: i32, parm: Option<&str>, step: Option<&str>) -> Option<Vec<u8>> {
        let count = count as usize;
        let parm = self.caps.expand(parm, &[count as i32]);
        let step = self.caps.expand(step, &[]);
        match (parm, step) {
            (Some(parm), Some(step)) if step.len().saturating_mul(count) < parm.len() => {
                Some(step.repeat(count))
            },
            (Some(parm), _) => Some(parm),
            (None, Some(step)) => Some(step.repeat(count)),
            (None, None) => None,
        }
    }
}

fn join(a: Option<Vec<u8>>, b: Option<Vec<u8>>) -> Option<Vec<u8>> {
    let mut a = a?;
    a.extend_from_slice(&b?);
    Some(a)
}

/// First of the shortest available candidates
fn shortest(candidates: impl IntoIterator<Item = Option<Vec<u8>>>) -> Option<Vec<u8>> {
    candidates.into_iter().flatten().min_by_key(Vec::len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner(caps: CapabilityTable) -> CursorPlanner {
        CursorPlanner::new(Arc::new(caps), true)
    }

    #[test]
    fn test_single_step_right() {
        let p = planner(CapabilityTable::ansi());
        assert_eq!(
            p.plan(Some(Point::new(5, 3)), Point::new(6, 3)).unwrap(),
            b"\x1b[C"
        );
    }

    #[test]
    fn test_carriage_return_and_down() {
        let p = planner(CapabilityTable::ansi());
        assert_eq!(
            p.plan(Some(Point::new(70, 3)), Point::new(0, 4)).unwrap(),
            b"\r\x1b[B"
        );
    }

    #[test]
    fn test_long_horizontal_jump() {
        let p = planner(CapabilityTable::ansi());
        assert_eq!(
            p.plan(Some(Point::new(0, 3)), Point::new(40, 3)).unwrap(),
            b"\x1b[40C"
        );
    }

    #[test]
    fn test_unknown_origin() {
        let p = planner(CapabilityTable::ansi());
        assert_eq!(p.plan(None, Point::new(0, 0)).unwrap(), b"\x1b[H");
        assert_eq!(p.plan(None, Point::new(9, 4)).unwrap(), b"\x1b[5;10H");
    }

    #[test]
    fn test_optimization_disabled_uses_address() {
        let p = CursorPlanner::new(Arc::new(CapabilityTable::ansi()), false);
        assert_eq!(
            p.plan(Some(Point::new(5, 3)), Point::new(6, 3)).unwrap(),
            b"\x1b[4;7H"
        );
    }

    #[test]
    fn test_no_motion() {
        let p = planner(CapabilityTable::ansi());
        assert_eq!(p.plan(Some(Point::new(2, 2)), Point::new(2, 2)).unwrap(), b"");
        assert_eq!(p.plan(None, Point::new(-1, 0)), None);
    }

    #[test]
    fn test_dumb_terminal() {
        let p = planner(CapabilityTable::dumb());
        assert_eq!(p.plan(None, Point::new(0, 0)), None);
        assert_eq!(p.plan(Some(Point::new(0, 0)), Point::new(0, 1)).unwrap(), b"\n");
        assert_eq!(p.plan(Some(Point::new(5, 0)), Point::new(0, 1)).unwrap(), b"\r\n");
        assert_eq!(p.plan(Some(Point::new(0, 0)), Point::new(3, 0)), None);
    }
}
