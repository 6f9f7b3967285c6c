// src/event/matching.rs

//! Variant-aware event equality.

use tracing::trace;

use crate::errors::Result;
use crate::event::descriptor::{EventDescriptor, Modifier, ResolvedUserEvent, UserEventRef};
use crate::event::internal::InternalCode;

/// Lookups event matching needs from the running application.
pub trait EventContext {
    /// Locate the user-event table slot `index` of the task tagged `owner_tag`.
    fn user_event(&self, owner_tag: &str, index: usize) -> Option<ResolvedUserEvent>;

    /// Keyboard mapping of the currently active task.
    fn keyboard_action(&self, key_code: u16, modifier: Modifier) -> Option<InternalCode>;
}

impl UserEventRef {
    /// Resolve (once) the target of this reference.
    ///
    /// A reference that cannot be resolved is a structurally invalid
    /// definition and is reported as an error.
    pub fn find_user_event(&self, ctx: &dyn EventContext) -> Result<&ResolvedUserEvent> {
        self.resolve_with(|tag, index| ctx.user_event(tag, index))
    }
}

impl EventDescriptor {
    /// Does `self` denote the same event as `other`?
    pub fn matches(&self, other: &EventDescriptor, ctx: &dyn EventContext) -> Result<bool> {
        use EventDescriptor::*;

        if std::ptr::eq(self, other) {
            return Ok(true);
        }

        let equal = match (self, other) {
            (
                System { key_code: k1, modifier: m1 },
                System { key_code: k2, modifier: m2 },
            ) => k1 == k2 && m1 == m2,
            (Internal { code: c1 }, Internal { code: c2 }) => c1 == c2,
            (Timer { seconds: s1 }, Timer { seconds: s2 }) => s1 == s2,
            (Expression { expr: e1 }, Expression { expr: e2 }) => e1 == e2,
            (Public { name: n1, expr: e1 }, Public { name: n2, expr: e2 }) => match (e1, e2) {
                (Some(a), Some(b)) => a == b,
                (None, None) => n1 == n2,
                _ => false,
            },
            (User { target: t1 }, User { target: t2 }) => {
                let r1 = t1.find_user_event(ctx)?;
                let r2 = t2.find_user_event(ctx)?;
                r1.same_target(r2)
            }
            (
                UserFunction { name: n1, name_hash: h1 },
                UserFunction { name: n2, name_hash: h2 },
            ) => h1 == h2 && n1.to_lowercase() == n2.to_lowercase(),
            (Public { name, .. }, User { target }) | (User { target }, Public { name, .. }) => {
                let resolved = target.find_user_event(ctx)?;
                resolved.public_name.as_deref() == Some(name.as_str())
            }
            (Internal { code }, System { key_code, modifier })
            | (System { key_code, modifier }, Internal { code }) => {
                let mapped = ctx.keyboard_action(*key_code, *modifier);
                trace!(key_code, ?mapped, code, "matching keyboard event to internal code");
                mapped == Some(*code)
            }
            _ => false,
        };
        Ok(equal)
    }
}
