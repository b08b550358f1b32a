//! Segment registry: kind name to root factory.

use crate::error::{ContextError, RegistrationSite};
use crate::execution::segment::SegmentRef;
use chrono::Utc;
use std::collections::HashMap;
use std::panic::Location;
use std::sync::Arc;
use tracing::debug;

/// Declares a segment kind and how to build its root instance.
pub trait SegmentRegistration: Send + Sync {
    fn kind(&self) -> &str;

    fn create_initial(&self) -> SegmentRef;
}

type RootFactory = Arc<dyn Fn() -> SegmentRef + Send + Sync>;

struct FnRegistration {
    kind: String,
    factory: RootFactory,
}

impl SegmentRegistration for FnRegistration {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn create_initial(&self) -> SegmentRef {
        (self.factory)()
    }
}

/// Wrap a closure as a registration.
pub fn registration_fn<F>(kind: impl Into<String>, factory: F) -> Arc<dyn SegmentRegistration>
where
    F: Fn() -> SegmentRef + Send + Sync + 'static,
{
    Arc::new(FnRegistration {
        kind: kind.into(),
        factory: Arc::new(factory),
    })
}

struct Entry {
    registration: Arc<dyn SegmentRegistration>,
    site: RegistrationSite,
}

/// Registered kinds, in registration order.
///
/// The registry never caches root instances; the model owns that cache.
#[derive(Default)]
pub struct SegmentRegistry {
    entries: HashMap<String, Entry>,
    order: Vec<String>,
}

impl SegmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind. A second registration of the same kind is always an error.
    #[track_caller]
    pub fn register(
        &mut self,
        registration: Arc<dyn SegmentRegistration>,
    ) -> Result<(), ContextError> {
        self.register_at(registration, Location::caller())
    }

    pub(crate) fn register_at(
        &mut self,
        registration: Arc<dyn SegmentRegistration>,
        location: &'static Location<'static>,
    ) -> Result<(), ContextError> {
        let kind = registration.kind().to_string();
        if let Some(existing) = self.entries.get(&kind) {
            return Err(ContextError::AlreadyRegistered {
                kind,
                original: existing.site,
            });
        }
        debug!(kind = %kind, site = %location, "Registered execution context kind");
        self.order.push(kind.clone());
        self.entries.insert(
            kind,
            Entry {
                registration,
                site: RegistrationSite {
                    location,
                    registered_at: Utc::now(),
                },
            },
        );
        Ok(())
    }

    /// Build a fresh root instance for `kind`.
    pub fn create_initial_context(&self, kind: &str) -> Result<SegmentRef, ContextError> {
        self.entries
            .get(kind)
            .map(|entry| entry.registration.create_initial())
            .ok_or_else(|| ContextError::NotRegistered(kind.to_string()))
    }

    /// Registered kinds in registration order. Composition order depends on this.
    pub fn kinds(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    pub fn site(&self, kind: &str) -> Option<RegistrationSite> {
        self.entries.get(kind).map(|entry| entry.site)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
