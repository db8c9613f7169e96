use std::sync::Arc;

use tracing::debug;

use crate::error::{CodecError, CodecResult};
use crate::session::Session;

/// Second pass over a parsed stream: point every reference cell at its record.
///
/// Classes shadow objects when both registries hold the same id. An id with
/// no registered record is corruption.
pub fn resolve_references(session: &mut Session) -> CodecResult<()> {
    let Session {
        classes,
        objects,
        references,
        ..
    } = session;
    for (&id, cell) in references.iter_mut() {
        let target = classes
            .get(&id)
            .or_else(|| objects.get(&id))
            .ok_or(CodecError::UnresolvedReference { id })?;
        *cell = Some(Arc::clone(target));
    }
    debug!(references = references.len(), "references resolved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{MemberReference, Record, StringRecord};

    fn reference(id_ref: i32) -> Arc<Record> {
        Arc::new(Record::Reference(MemberReference { id_ref }))
    }

    #[test]
    fn forward_reference_resolves() {
        let mut session = Session::new();
        // Reference seen before its target.
        session.register(&reference(4));
        let target = Arc::new(Record::String(StringRecord {
            object_id: 4,
            value: "late".into(),
        }));
        session.register(&target);

        resolve_references(&mut session).unwrap();
        assert!(Arc::ptr_eq(session.resolve(4).unwrap(), &target));
    }

    #[test]
    fn repeated_references_share_one_cell() {
        let mut session = Session::new();
        session.register(&reference(4));
        session.register(&reference(4));
        assert_eq!(session.reference_count(), 1);
    }

    #[test]
    fn dangling_reference_fails() {
        let mut session = Session::new();
        session.register(&reference(11));
        let err = resolve_references(&mut session).unwrap_err();
        assert!(err.is_reference());
        assert!(!err.is_structural());
    }
}
