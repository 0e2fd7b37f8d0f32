use crate::session::{MapSession, SessionEvent};

use super::input::InputSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookCommand {
    #[default]
    Continue,
    Quit,
}

/// Application behaviour layered on top of a running `MapSession`.
///
/// The frame loop calls these from its own thread; the session is always
/// borrowed exclusively, so hooks can mutate it freely.
pub trait SessionHooks {
    fn on_load(&mut self, _session: &mut MapSession) {}

    /// Runs once per fixed simulation tick, after the tick's input has been
    /// handed to the controller and before the session advances.
    fn on_tick(
        &mut self,
        _session: &mut MapSession,
        _input: &InputSnapshot,
        _fixed_dt_seconds: f64,
    ) -> HookCommand {
        HookCommand::Continue
    }

    fn on_event(&mut self, _session: &mut MapSession, _event: &SessionEvent) {}

    /// Window title override; `None` keeps the configured title.
    fn title(&self, _session: &MapSession) -> Option<String> {
        None
    }

    fn on_unload(&mut self, _session: &mut MapSession) {}
}

/// Hooks that leave the session untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl SessionHooks for NoHooks {}
