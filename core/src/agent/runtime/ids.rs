//! Identifier generation for tasks, contexts and messages

/// Produces globally unique identifiers when the caller omits one
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random v4 UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic generator for assertions
    #[derive(Default)]
    pub(crate) struct SequentialIds(AtomicUsize);

    impl IdGenerator for SequentialIds {
        fn generate(&self) -> String {
            format!("gen-{}", self.0.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    #[test]
    fn test_uuid_ids_are_unique() {
        let ids = UuidGenerator;
        let a = ids.generate();
        assert_ne!(a, ids.generate());
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIds::default();
        assert_eq!(ids.generate(), "gen-1");
        assert_eq!(ids.generate(), "gen-2");
    }
}
