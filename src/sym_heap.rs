// Copyright (c) The Diem Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use std::{collections::BTreeMap, fmt, rc::Rc};

use crate::{
    status::{SymError, SymResult},
    sym_exp::{SymExp, SymExpRef},
    sym_typing::ExpTy,
};

/// A heap object. Structs hold field slots, arrays hold element slots;
/// scalar allocations are single-cell objects addressed through field 0.
#[derive(Debug, Clone, PartialEq)]
pub struct HeapObject {
    kind: ExpTy,
    fields: BTreeMap<u32, SymExpRef>,
    elems: BTreeMap<i64, SymExpRef>,
}

impl HeapObject {
    fn new(kind: ExpTy) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
            elems: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> ExpTy {
        self.kind
    }
}

/// Symbolic heap: an id-keyed object store plus an alias map collapsing
/// equivalent references onto a canonical id. Cloning the heap clones the
/// outer maps only; objects stay shared until written, so a forked state
/// never observes its sibling's writes.
#[derive(Debug, Clone)]
pub struct SymHeap {
    objects: BTreeMap<u64, Rc<HeapObject>>,
    aliases: BTreeMap<u64, u64>,
    next_object_id: u64,
}

impl SymHeap {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            aliases: BTreeMap::new(),
            next_object_id: 1,
        }
    }

    /// Fresh object of the given kind, no slots populated
    pub fn allocate(&mut self, kind: ExpTy) -> SymExpRef {
        let id = self.fresh_id();
        self.objects.insert(id, Rc::new(HeapObject::new(kind)));
        SymExp::heap_ref(id, kind)
    }

    /// Fresh struct with `field_count` fields initialised to 0
    pub fn allocate_struct(&mut self, field_count: u32) -> SymExpRef {
        let id = self.fresh_id();
        let mut object = HeapObject::new(ExpTy::Struct);
        for index in 0..field_count {
            object.fields.insert(index, SymExp::int_const(0));
        }
        self.objects.insert(id, Rc::new(object));
        SymExp::heap_ref(id, ExpTy::Struct)
    }

    /// Fresh array with `length` elements initialised to 0
    pub fn allocate_array(&mut self, length: u32) -> SymExpRef {
        let id = self.fresh_id();
        let mut object = HeapObject::new(ExpTy::Array);
        for index in 0..length {
            object.elems.insert(index as i64, SymExp::int_const(0));
        }
        self.objects.insert(id, Rc::new(object));
        SymExp::heap_ref(id, ExpTy::Array)
    }

    pub fn assign_field(
        &mut self,
        target: &SymExp,
        field_index: u32,
        value: SymExpRef,
    ) -> SymResult<()> {
        let id = self.canonical(self.ref_id(target)?);
        let object = self.object_mut(id)?;
        if object.kind == ExpTy::Array {
            return Err(SymError::Type(format!(
                "field write on array object ref_{}",
                id
            )));
        }
        object.fields.insert(field_index, value);
        Ok(())
    }

    /// Field read; an unset index yields the zero element
    pub fn get_field(&self, target: &SymExp, field_index: u32) -> SymResult<SymExpRef> {
        let id = self.canonical(self.ref_id(target)?);
        let object = self.object(id)?;
        if object.kind == ExpTy::Array {
            return Err(SymError::Type(format!(
                "field read on array object ref_{}",
                id
            )));
        }
        Ok(object
            .fields
            .get(&field_index)
            .cloned()
            .unwrap_or_else(|| SymExp::int_const(0)))
    }

    pub fn assign_elem(&mut self, target: &SymExp, index: i64, value: SymExpRef) -> SymResult<()> {
        let id = self.canonical(self.ref_id(target)?);
        let object = self.object_mut(id)?;
        if object.kind != ExpTy::Array {
            return Err(SymError::Type(format!(
                "element write on non-array object ref_{}",
                id
            )));
        }
        object.elems.insert(index, value);
        Ok(())
    }

    /// Element read; an unset index yields the zero element
    pub fn get_elem(&self, target: &SymExp, index: i64) -> SymResult<SymExpRef> {
        let id = self.canonical(self.ref_id(target)?);
        let object = self.object(id)?;
        if object.kind != ExpTy::Array {
            return Err(SymError::Type(format!(
                "element read on non-array object ref_{}",
                id
            )));
        }
        Ok(object
            .elems
            .get(&index)
            .cloned()
            .unwrap_or_else(|| SymExp::int_const(0)))
    }

    /// Register `alias_id` as another name for the object behind `original`.
    /// The map stores canonical ids, so chains collapse on insertion and
    /// cycles cannot form.
    pub fn create_alias(&mut self, original: &SymExp, alias_id: u64) -> SymResult<SymExpRef> {
        let id = self.canonical(self.ref_id(original)?);
        let kind = self.object(id)?.kind;
        if alias_id == id || self.objects.contains_key(&alias_id) {
            return Err(SymError::Internal(format!(
                "alias id {} already names an object",
                alias_id
            )));
        }
        self.aliases.insert(alias_id, id);
        Ok(SymExp::heap_ref(alias_id, kind))
    }

    /// Kind of the object behind a reference
    pub fn kind_of(&self, target: &SymExp) -> SymResult<ExpTy> {
        let id = self.canonical(self.ref_id(target)?);
        Ok(self.object(id)?.kind)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    fn fresh_id(&mut self) -> u64 {
        let id = self.next_object_id;
        self.next_object_id += 1;
        id
    }

    fn ref_id(&self, target: &SymExp) -> SymResult<u64> {
        match target {
            SymExp::Ref { id, .. } => Ok(*id),
            other => Err(SymError::Type(format!(
                "heap access through non-ref expression: {}",
                other
            ))),
        }
    }

    fn canonical(&self, id: u64) -> u64 {
        let mut current = id;
        while let Some(next) = self.aliases.get(&current) {
            current = *next;
        }
        current
    }

    fn object(&self, id: u64) -> SymResult<&HeapObject> {
        self.objects
            .get(&id)
            .map(|object| object.as_ref())
            .ok_or_else(|| SymError::Internal(format!("no heap object with id {}", id)))
    }

    fn object_mut(&mut self, id: u64) -> SymResult<&mut HeapObject> {
        self.objects
            .get_mut(&id)
            .map(Rc::make_mut)
            .ok_or_else(|| SymError::Internal(format!("no heap object with id {}", id)))
    }
}

impl Default for SymHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SymHeap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Symbolic heap state:")?;
        for (id, object) in &self.objects {
            writeln!(f, "  Object {} ({}):", id, object.kind)?;
            for (index, field) in &object.fields {
                writeln!(f, "    Field[{}]: {}", index, field)?;
            }
            for (index, elem) in &object.elems {
                writeln!(f, "    Elem[{}]: {}", index, elem)?;
            }
        }
        writeln!(f, "Aliases:")?;
        for (alias, original) in &self.aliases {
            writeln!(f, "  {} -> {}", alias, original)?;
        }
        Ok(())
    }
}
