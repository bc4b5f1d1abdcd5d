//! Add/remove interception hooks
//!
//! Callbacks run synchronously in registration order and share one mutable
//! canceled flag; the controller checks the flag after the full list has run.
//! A later hook may therefore un-cancel what an earlier one canceled.

use crate::mods::Mod;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModEventKind {
    Adding,
    Removing,
}

/// The event handed to each hook
pub struct ModEvent<'a> {
    pub kind: ModEventKind,
    pub subject: &'a Mod,
}

type Hook = Box<dyn Fn(&ModEvent<'_>, &mut bool) + Send + Sync>;

/// Ordered list of registered callbacks
#[derive(Default)]
pub struct HookList {
    hooks: Mutex<Vec<Hook>>,
}

impl HookList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, hook: F)
    where
        F: Fn(&ModEvent<'_>, &mut bool) + Send + Sync + 'static,
    {
        self.hooks.lock().unwrap().push(Box::new(hook));
    }

    /// Invoke every hook in order; returns the final canceled flag
    pub fn fire(&self, event: &ModEvent<'_>) -> bool {
        let hooks = self.hooks.lock().unwrap();
        let mut canceled = false;
        for hook in hooks.iter() {
            hook(event, &mut canceled);
        }
        canceled
    }

    pub fn len(&self) -> usize {
        self.hooks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.lock().unwrap().is_empty()
    }
}
