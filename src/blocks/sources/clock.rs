use std::any::Any;

use tracing::debug;

use crate::{
    blocks::{Block, BlockBase, BlockError, BlockKind, BlockState, Position, TickContext},
    flowchart::{Port, PortType, Value},
};

/// A pausable step counter.
///
/// Each tick the clock emits its count on `count` and whether it is
/// running on `running`, then advances the count unless paused. Gated
/// solvers downstream skip their work while the clock is paused.
#[derive(Debug, Clone)]
pub struct Clock {
    base: BlockBase,
    count: u64,
    paused: bool,
}

impl Clock {
    #[must_use]
    pub fn new(uid: &str, position: Position) -> Self {
        Self::with_state(uid, position, 0, false)
    }

    #[must_use]
    pub fn with_state(uid: &str, position: Position, count: u64, paused: bool) -> Self {
        Self {
            base: BlockBase::new(
                uid,
                position,
                vec![
                    Port::output("count", PortType::Number),
                    Port::output("running", PortType::Boolean),
                ],
            ),
            count,
            paused,
        }
    }

    /// The count the next tick will emit.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn pause(&mut self) {
        debug!(block = self.base.uid(), "clock paused");
        self.paused = true;
    }

    pub fn resume(&mut self) {
        debug!(block = self.base.uid(), "clock resumed");
        self.paused = false;
    }
}

impl Block for Clock {
    fn base(&self) -> &BlockBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BlockBase {
        &mut self.base
    }

    fn kind(&self) -> BlockKind {
        BlockKind::Clock
    }

    fn update_model(&mut self, _ctx: &TickContext<'_>) -> Result<(), BlockError> {
        #[allow(clippy::cast_precision_loss)]
        let count = self.count as f64;
        self.base.set_output("count", Some(Value::Number(count)));
        self.base.set_output("running", Some(Value::Boolean(!self.paused)));
        if !self.paused {
            self.count += 1;
        }
        Ok(())
    }

    fn state(&self) -> BlockState {
        BlockState::Clock {
            count: self.count,
            paused: self.paused,
        }
    }

    fn reset(&mut self) {
        self.count = 0;
    }

    fn is_paused(&self) -> Option<bool> {
        Some(self.paused)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::support::environment::Environment;

    fn output(clock: &Clock, name: &str) -> Option<Value> {
        clock.base().port(name).and_then(Port::value).cloned()
    }

    #[test]
    fn counts_while_running() {
        let globals = Environment::new();
        let ctx = TickContext::new(&globals);
        let mut clock = Clock::new("clk", Position::default());

        clock.update_model(&ctx).unwrap();
        clock.update_model(&ctx).unwrap();
        assert_eq!(output(&clock, "count"), Some(Value::Number(1.0)));
        assert_eq!(output(&clock, "running"), Some(Value::Boolean(true)));

        clock.pause();
        clock.update_model(&ctx).unwrap();
        clock.update_model(&ctx).unwrap();
        assert_eq!(output(&clock, "count"), Some(Value::Number(2.0)));
        assert_eq!(output(&clock, "running"), Some(Value::Boolean(false)));
        assert_eq!(clock.is_paused(), Some(true));

        clock.resume();
        clock.reset();
        clock.update_model(&ctx).unwrap();
        assert_eq!(output(&clock, "count"), Some(Value::Number(0.0)));
    }
}
