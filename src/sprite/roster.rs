use crate::error::SpecError;
use crate::sprite::CharacterSpec;
use std::collections::HashMap;
use std::rc::Rc;

/// Validated character types, shared by every entity spawned from them.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    specs: HashMap<String, Rc<CharacterSpec>>,
}

impl Roster {
    pub fn new(specs: impl IntoIterator<Item = CharacterSpec>) -> Result<Self, SpecError> {
        let mut roster = Roster::default();
        for spec in specs {
            roster.insert(spec)?;
        }
        Ok(roster)
    }

    pub fn insert(&mut self, spec: CharacterSpec) -> Result<(), SpecError> {
        spec.validate()?;
        if self.specs.contains_key(&spec.kind) {
            return Err(SpecError::DuplicateKind(spec.kind));
        }
        self.specs.insert(spec.kind.clone(), Rc::new(spec));
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Option<Rc<CharacterSpec>> {
        self.specs.get(kind).cloned()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
