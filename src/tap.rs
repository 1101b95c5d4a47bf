//! IEEE 1149.1 TAP state machine tracking and shortest-TMS-path search.
//!
//! This generalizes the path-search approach of a conventional JTAG state
//! machine helper (walk edges, breadth-first, until the target state is
//! found) into a small trait so the executor in [`crate::jtag`] can be
//! phrased against TAP bookkeeping without owning a concrete graph type.

use std::vec::Vec;

/// The 16 stable and unstable states of the IEEE 1149.1 TAP controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TapState {
    TestLogicReset,
    RunTestIdle,
    SelectDrScan,
    CaptureDr,
    ShiftDr,
    Exit1Dr,
    PauseDr,
    Exit2Dr,
    UpdateDr,
    SelectIrScan,
    CaptureIr,
    ShiftIr,
    Exit1Ir,
    PauseIr,
    Exit2Ir,
    UpdateIr,
}

impl TapState {
    /// All 16 states, in a fixed order used for table indexing.
    pub const ALL: [TapState; 16] = [
        TapState::TestLogicReset,
        TapState::RunTestIdle,
        TapState::SelectDrScan,
        TapState::CaptureDr,
        TapState::ShiftDr,
        TapState::Exit1Dr,
        TapState::PauseDr,
        TapState::Exit2Dr,
        TapState::UpdateDr,
        TapState::SelectIrScan,
        TapState::CaptureIr,
        TapState::ShiftIr,
        TapState::Exit1Ir,
        TapState::PauseIr,
        TapState::Exit2Ir,
        TapState::UpdateIr,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Stable states are the ones a debugger is allowed to name as a scan's
    /// `end_state` or a STATEMOVE target: RESET, IDLE, and the four PAUSE/
    /// SHIFT-adjacent pause states.
    pub fn is_stable(self) -> bool {
        matches!(
            self,
            TapState::TestLogicReset
                | TapState::RunTestIdle
                | TapState::ShiftDr
                | TapState::PauseDr
                | TapState::ShiftIr
                | TapState::PauseIr
        )
    }
}

/// The next state reached from `state` on a single TCK edge with the given
/// TMS level. This is the IEEE 1149.1 state diagram, transcribed once and
/// used both by [`StateGraph::transition`] and to build [`StateGraph`]'s
/// path table.
fn next_state(state: TapState, tms: bool) -> TapState {
    use TapState::*;
    match (state, tms) {
        (TestLogicReset, false) => RunTestIdle,
        (TestLogicReset, true) => TestLogicReset,

        (RunTestIdle, false) => RunTestIdle,
        (RunTestIdle, true) => SelectDrScan,

        (SelectDrScan, false) => CaptureDr,
        (SelectDrScan, true) => SelectIrScan,

        (CaptureDr, false) => ShiftDr,
        (CaptureDr, true) => Exit1Dr,

        (ShiftDr, false) => ShiftDr,
        (ShiftDr, true) => Exit1Dr,

        (Exit1Dr, false) => PauseDr,
        (Exit1Dr, true) => UpdateDr,

        (PauseDr, false) => PauseDr,
        (PauseDr, true) => Exit2Dr,

        (Exit2Dr, false) => ShiftDr,
        (Exit2Dr, true) => UpdateDr,

        (UpdateDr, false) => RunTestIdle,
        (UpdateDr, true) => SelectDrScan,

        (SelectIrScan, false) => CaptureIr,
        (SelectIrScan, true) => TestLogicReset,

        (CaptureIr, false) => ShiftIr,
        (CaptureIr, true) => Exit1Ir,

        (ShiftIr, false) => ShiftIr,
        (ShiftIr, true) => Exit1Ir,

        (Exit1Ir, false) => PauseIr,
        (Exit1Ir, true) => UpdateIr,

        (PauseIr, false) => PauseIr,
        (PauseIr, true) => Exit2Ir,

        (Exit2Ir, false) => ShiftIr,
        (Exit2Ir, true) => UpdateIr,

        (UpdateIr, false) => RunTestIdle,
        (UpdateIr, true) => SelectIrScan,
    }
}

/// TAP bookkeeping the executor needs: where the TAP is, where a scan or
/// state-move should end up, and how to get between two states.
pub trait TapWalker {
    fn current_state(&self) -> TapState;
    fn set_state(&mut self, state: TapState);
    /// The state reached by a single TCK edge from `from` with the given
    /// TMS level.
    fn transition(&self, from: TapState, tms: bool) -> TapState;
    /// The shortest TMS bit sequence (LSB = first bit clocked) and its
    /// length that drives the TAP from `from` to `to`.
    fn tms_path(&self, from: TapState, to: TapState) -> (u32, u8);
}

/// Concrete [`TapWalker`]: owns the current state and answers `transition`/
/// `tms_path` queries against the fixed IEEE 1149.1 graph.
pub struct StateGraph {
    state: TapState,
}

impl StateGraph {
    pub fn new() -> Self {
        Self {
            state: TapState::TestLogicReset,
        }
    }
}

impl Default for StateGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl TapWalker for StateGraph {
    fn current_state(&self) -> TapState {
        self.state
    }

    fn set_state(&mut self, state: TapState) {
        self.state = state;
    }

    fn transition(&self, from: TapState, tms: bool) -> TapState {
        next_state(from, tms)
    }

    fn tms_path(&self, from: TapState, to: TapState) -> (u32, u8) {
        if from == to {
            return (0, 0);
        }

        // Breadth-first search over the 16-state graph for the shortest TMS
        // sequence; the state space is tiny and fixed so this runs to
        // completion in a handful of steps every time.
        struct Candidate {
            state: TapState,
            bits: u32,
            len: u8,
        }

        let mut frontier = Vec::new();
        frontier.push(Candidate {
            state: next_state(from, false),
            bits: 0,
            len: 1,
        });
        frontier.push(Candidate {
            state: next_state(from, true),
            bits: 1,
            len: 1,
        });

        loop {
            for c in &frontier {
                if c.state == to {
                    return (c.bits, c.len);
                }
            }

            let mut next = Vec::new();
            for c in frontier {
                let bit0 = next_state(c.state, false);
                next.push(Candidate {
                    state: bit0,
                    bits: c.bits,
                    len: c.len + 1,
                });
                let bit1 = next_state(c.state, true);
                next.push(Candidate {
                    state: bit1,
                    bits: c.bits | (1 << c.len),
                    len: c.len + 1,
                });
            }
            frontier = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_to_idle_is_one_bit_low() {
        let g = StateGraph::new();
        let (bits, len) = g.tms_path(TapState::TestLogicReset, TapState::RunTestIdle);
        assert_eq!(len, 1);
        assert_eq!(bits, 0);
    }

    #[test]
    fn idle_to_shift_dr_is_100() {
        let g = StateGraph::new();
        let (bits, len) = g.tms_path(TapState::RunTestIdle, TapState::ShiftDr);
        assert_eq!(len, 3);
        // TMS sequence 1,0,0 (first bit clocked is the LSB)
        assert_eq!(bits & 0b111, 0b001);
    }

    #[test]
    fn pathmove_edges_match_standard_graph() {
        // DRSHIFT -(1)-> DREXIT2 is not a direct edge; DRSHIFT -(1)-> DREXIT1
        assert_eq!(next_state(TapState::ShiftDr, true), TapState::Exit1Dr);
        assert_eq!(next_state(TapState::PauseDr, true), TapState::Exit2Dr);
        assert_eq!(next_state(TapState::Exit2Dr, false), TapState::ShiftDr);
    }

    #[test]
    fn same_state_path_is_empty() {
        let g = StateGraph::new();
        assert_eq!(g.tms_path(TapState::RunTestIdle, TapState::RunTestIdle), (0, 0));
    }
}
