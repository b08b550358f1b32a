//! Access-area policy.
//!
//! A call declares the areas it `uses`; an enclosing call may declare areas
//! as `forbidden`. Both sets accumulate down the lane, so a nested call can
//! never lift a restriction set by its caller.

use crate::error::ContextError;
use crate::execution::invocation::CallScope;
use crate::execution::registry::{registration_fn, SegmentRegistration};
use crate::execution::segment::{parse_options, PreExecute, PreExecuteHook};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

pub const KIND: &str = "security";

/// Resource class a call can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Area {
    Io,
    Url,
    Credentials,
}

impl std::fmt::Display for Area {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Area::Io => "IO",
            Area::Url => "URL",
            Area::Credentials => "CREDENTIALS",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SecurityOptions {
    #[serde(default)]
    forbidden: BTreeSet<Area>,
    #[serde(default)]
    uses: BTreeSet<Area>,
}

/// The forbidden and used areas in effect for a lane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityRules {
    forbidden: BTreeSet<Area>,
    uses: BTreeSet<Area>,
}

impl SecurityRules {
    pub fn forbidden(&self) -> &BTreeSet<Area> {
        &self.forbidden
    }

    pub fn uses(&self) -> &BTreeSet<Area> {
        &self.uses
    }

    /// First used area that is also forbidden.
    pub fn violation(&self) -> Option<Area> {
        self.uses.intersection(&self.forbidden).next().copied()
    }
}

impl PreExecuteHook for SecurityRules {
    fn create_child(&self, options: &Value) -> Result<Self, ContextError> {
        let options: SecurityOptions = parse_options(KIND, options)?;
        let mut forbidden = options.forbidden;
        forbidden.extend(self.forbidden.iter().copied());
        let mut uses = options.uses;
        uses.extend(self.uses.iter().copied());
        Ok(SecurityRules { forbidden, uses })
    }

    fn before_invocation(&self, scope: &CallScope) -> Result<(), ContextError> {
        if let Some(area) = self.violation() {
            debug!(call = %scope.label(), %area, "Security policy refused invocation");
            return Err(ContextError::Refused {
                kind: KIND.to_string(),
                reason: format!("use of forbidden area {}", area),
            });
        }
        Ok(())
    }
}

pub type Security = PreExecute<SecurityRules>;

/// Registration with an unrestricted root.
pub fn registration() -> Arc<dyn SegmentRegistration> {
    registration_fn(KIND, || Arc::new(PreExecute(SecurityRules::default())))
}
