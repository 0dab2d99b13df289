//! Liveness analysis and dead-code elimination.
//!
//! The use-def structure of a model is a dataflow graph from each value to
//! the values computed from it. Roots are the operands of every assertion
//! and every value yielded by `init` or `next`; a value is live when a root
//! is reachable from it, i.e. when it belongs to the reverse reachability set
//! of the roots.
use std::collections::BTreeSet;

use btorinstr::modules::{
    Model,
    instructions::{Instruction, Operation},
    operand::Value,
};
use log::{debug, info, warn};
use petgraph::{
    graphmap::DiGraphMap,
    visit::{Dfs, Reversed},
};

use crate::{
    pass::{Dialects, Pass, PassKind},
    utils::error::BtorResult,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Liveness {
    live: BTreeSet<Value>,
}

impl Liveness {
    /// Dataflow graph of `model`: an edge `a -> b` when `b` is computed from `a`.
    pub fn dataflow_graph(model: &Model) -> DiGraphMap<Value, ()> {
        let mut graph = DiGraphMap::new();
        for (value, _) in &model.states {
            graph.add_node(*value);
        }
        for op in model.operations() {
            let Some(dest) = op.destination() else {
                continue;
            };
            graph.add_node(dest);
            for operand in op.operands() {
                graph.add_edge(operand.value, dest, ());
            }
        }
        graph
    }

    /// Values every observable effect of the model depends on directly.
    pub fn roots(model: &Model) -> BTreeSet<Value> {
        let asserted = model
            .operations()
            .filter(|op| op.is_meta_instruction())
            .flat_map(|op| op.dependencies());
        let yielded = model
            .blocks()
            .flat_map(|(_, block)| block.yields.iter().map(|operand| operand.value));
        asserted.chain(yielded).collect()
    }

    pub fn compute(model: &Model) -> Self {
        let graph = Self::dataflow_graph(model);
        let reversed = Reversed(&graph);

        let mut live = BTreeSet::new();
        let mut dfs = Dfs::empty(reversed);
        for root in Self::roots(model) {
            if !graph.contains_node(root) {
                continue;
            }
            dfs.move_to(root);
            while let Some(value) = dfs.next(reversed) {
                live.insert(value);
            }
        }

        Self { live }
    }

    pub fn is_live(&self, value: Value) -> bool {
        self.live.contains(&value)
    }

    /// Assertions are always live, other operations when their result is.
    pub fn is_op_live(&self, op: &Operation) -> bool {
        op.is_meta_instruction() || op.destination().is_some_and(|v| self.is_live(v))
    }

    pub fn live_values(&self) -> &BTreeSet<Value> {
        &self.live
    }
}

/// Removes every operation that does not contribute to an assertion or a
/// state update.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadCodeElimination;

impl Pass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        PassKind::Liveness.name()
    }

    fn introduces(&self) -> Dialects {
        PassKind::Liveness.introduces()
    }

    fn run(&mut self, model: &mut Model) -> BtorResult<()> {
        let liveness = Liveness::compute(model);
        let before = model.op_count();

        for block in [&mut model.init, &mut model.next] {
            block.operations.retain(|op| {
                if liveness.is_op_live(op) {
                    return true;
                }
                if op.is_nondet() {
                    warn!("Dropping unused nondeterministic source `{}`", op);
                } else {
                    debug!("Dropping dead operation `{}`", op);
                }
                false
            });
        }

        info!(
            "{}: {} operations before, {} after",
            self.name(),
            before,
            model.op_count()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use btorinstr::parser::parse_model;

    use super::*;

    const MODEL: &str = r#"
btor.model @dce {
  init {
    %0 = btor.constant 0 : !btor.bv<4>
    %1 = btor.constant 7 : !btor.bv<4>
    btor.yield %0 : !btor.bv<4>
  }
  next(%2: !btor.bv<4>) {
    %3 = btor.input 0 : !btor.bv<4>
    %4 = btor.input 1 : !btor.bv<4>
    %5 = btor.add %2, %3 : !btor.bv<4>
    %6 = btor.mul %4, %4 : !btor.bv<4>
    %7 = btor.redor %6 : !btor.bv<4>
    %8 = btor.constant 1 : !btor.bv<1>
    btor.constraint %8 : !btor.bv<1>
    btor.yield %5 : !btor.bv<4>
  }
}
"#;

    #[test]
    fn live_values_reach_a_root() {
        let model = parse_model(MODEL).unwrap();
        let liveness = Liveness::compute(&model);
        for live in [0, 2, 3, 5, 8] {
            assert!(liveness.is_live(Value(live)), "%{live} should be live");
        }
        for dead in [1, 4, 6, 7] {
            assert!(!liveness.is_live(Value(dead)), "%{dead} should be dead");
        }
    }

    #[test]
    fn dead_code_is_removed() {
        let mut model = parse_model(MODEL).unwrap();
        DeadCodeElimination.run(&mut model).unwrap();
        model.verify().unwrap();
        assert_eq!(model.init.operations.len(), 1);
        assert_eq!(model.next.operations.len(), 4);

        let again = model.clone();
        DeadCodeElimination.run(&mut model).unwrap();
        assert_eq!(model, again);
    }
}
