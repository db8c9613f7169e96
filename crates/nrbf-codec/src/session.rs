use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::warn;

use crate::error::{CodecError, CodecResult};
use crate::record::{ClassDefinition, ClassLayout, Node, Record};

/// Per-stream registries: classes, objects, libraries and reference cells.
///
/// One `Session` lives for exactly one decode. Records register themselves as
/// they are parsed; reference cells stay empty until
/// [`resolve_references`](crate::resolve_references) fills them.
#[derive(Debug, Default)]
pub struct Session {
    pub(crate) classes: HashMap<i32, Node>,
    pub(crate) objects: HashMap<i32, Node>,
    pub(crate) libraries: HashMap<i32, String>,
    pub(crate) references: BTreeMap<i32, Option<Node>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly parsed node in the registry its kind belongs to.
    pub fn register(&mut self, node: &Node) {
        match node.as_ref() {
            Record::Class(class) => {
                let table = match class.layout {
                    ClassLayout::Inline => &mut self.classes,
                    ClassLayout::Reuse { .. } => &mut self.objects,
                };
                insert_unique(table, class.object_id, node);
            }
            Record::String(_)
            | Record::BinaryArray(_)
            | Record::ArraySinglePrimitive(_)
            | Record::ArraySingleObject(_)
            | Record::ArraySingleString(_) => {
                if let Some(id) = node.object_id() {
                    insert_unique(&mut self.objects, id, node);
                }
            }
            Record::Library(lib) => {
                self.libraries.insert(lib.library_id, lib.name.clone());
            }
            Record::Reference(r) => {
                self.references.entry(r.id_ref).or_insert(None);
            }
            _ => {}
        }
    }

    /// Metadata of an earlier full class record, for `ClassWithId`.
    pub fn definition(&self, metadata_id: i32) -> CodecResult<Arc<ClassDefinition>> {
        self.classes
            .get(&metadata_id)
            .and_then(|node| node.as_class())
            .map(|class| Arc::clone(&class.definition))
            .ok_or(CodecError::UnknownMetadata { metadata_id })
    }

    /// Find a registered record by id, classes first.
    pub fn lookup(&self, id: i32) -> Option<&Node> {
        self.classes.get(&id).or_else(|| self.objects.get(&id))
    }

    /// Read a reference cell. Fails if the id was never resolved.
    pub fn resolve(&self, id_ref: i32) -> CodecResult<&Node> {
        self.references
            .get(&id_ref)
            .and_then(Option::as_ref)
            .ok_or(CodecError::UnresolvedReference { id: id_ref })
    }

    pub fn library(&self, library_id: i32) -> Option<&str> {
        self.libraries.get(&library_id).map(String::as_str)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    pub fn libraries(&self) -> impl Iterator<Item = (i32, &str)> {
        self.libraries.iter().map(|(&id, name)| (id, name.as_str()))
    }

    /// Empty every registry.
    pub fn clear(&mut self) {
        self.classes.clear();
        self.objects.clear();
        self.libraries.clear();
        self.references.clear();
    }
}

fn insert_unique(table: &mut HashMap<i32, Node>, id: i32, node: &Node) {
    if table.insert(id, Arc::clone(node)).is_some() {
        warn!(object_id = id, "duplicate object id; later record wins");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{BinaryLibrary, ClassRecord, MemberReference, StringRecord};

    fn class(object_id: i32, layout: ClassLayout) -> Node {
        Arc::new(Record::Class(ClassRecord {
            object_id,
            layout,
            definition: Arc::new(ClassDefinition {
                name: "Thing".into(),
                member_names: vec![],
                member_types: Some(vec![]),
                library_id: Some(2),
            }),
            members: vec![],
        }))
    }

    #[test]
    fn records_land_in_their_registry() {
        let mut session = Session::new();
        session.register(&class(1, ClassLayout::Inline));
        session.register(&class(5, ClassLayout::Reuse { metadata_id: 1 }));
        session.register(&Arc::new(Record::String(StringRecord {
            object_id: 6,
            value: "s".into(),
        })));
        session.register(&Arc::new(Record::Library(BinaryLibrary {
            library_id: 2,
            name: "Lib".into(),
        })));
        session.register(&Arc::new(Record::Reference(MemberReference { id_ref: 6 })));

        assert_eq!(session.class_count(), 1);
        assert_eq!(session.object_count(), 2);
        assert_eq!(session.library(2), Some("Lib"));
        assert_eq!(session.reference_count(), 1);
        assert!(session.lookup(5).is_some());
    }

    #[test]
    fn unknown_metadata() {
        let session = Session::new();
        assert_eq!(
            session.definition(3).unwrap_err(),
            CodecError::UnknownMetadata { metadata_id: 3 }
        );
    }

    #[test]
    fn definition_shared_by_instances() {
        let mut session = Session::new();
        let node = class(1, ClassLayout::Inline);
        session.register(&node);
        let def = session.definition(1).unwrap();
        assert!(Arc::ptr_eq(&def, &node.as_class().unwrap().definition));
    }

    #[test]
    fn unresolved_cell_is_an_error() {
        let mut session = Session::new();
        session.register(&Arc::new(Record::Reference(MemberReference { id_ref: 9 })));
        assert_eq!(
            session.resolve(9).unwrap_err(),
            CodecError::UnresolvedReference { id: 9 }
        );
    }

    #[test]
    fn clear_empties_everything() {
        let mut session = Session::new();
        session.register(&class(1, ClassLayout::Inline));
        session.clear();
        assert_eq!(session.class_count(), 0);
        assert!(session.lookup(1).is_none());
    }
}
