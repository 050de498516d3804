// Copyright (c) The Diem Core Contributors
// SPDX-License-Identifier: Apache-2.0

use z3::{SatResult, Solver};

use ssa_symexec::{
    sym_exp::{BinaryOperator, LogicalOperator, SymExp, SymExpRef},
    sym_heap::SymHeap,
    sym_smtlib::SmtTranslator,
    sym_typing::ExpTy,
};

fn int_eq(lhs: SymExpRef, value: i64) -> SymExpRef {
    SymExp::binary(BinaryOperator::Eq, lhs, SymExp::int_const(value)).unwrap()
}

#[test]
fn struct_basic() {
    let mut heap = SymHeap::new();
    let person = heap.allocate(ExpTy::Struct);

    heap.assign_field(&person, 0, SymExp::variable("name", ExpTy::Int))
        .unwrap();
    heap.assign_field(&person, 1, SymExp::int_const(25)).unwrap();
    heap.assign_field(&person, 2, SymExp::int_const(1001))
        .unwrap();

    assert_eq!(heap.get_field(&person, 0).unwrap().to_string(), "name");
    assert_eq!(heap.get_field(&person, 1).unwrap().to_string(), "25");
    assert_eq!(heap.get_field(&person, 2).unwrap().to_string(), "1001");
}

#[test]
fn struct_modification() {
    let mut heap = SymHeap::new();
    let person = heap.allocate(ExpTy::Struct);

    heap.assign_field(&person, 1, SymExp::int_const(25)).unwrap();
    heap.assign_field(&person, 2, SymExp::int_const(1001))
        .unwrap();

    let new_age = SymExp::binary(
        BinaryOperator::Add,
        heap.get_field(&person, 1).unwrap(),
        SymExp::int_const(1),
    )
    .unwrap();
    let new_id = SymExp::binary(
        BinaryOperator::Mul,
        heap.get_field(&person, 2).unwrap(),
        SymExp::int_const(2),
    )
    .unwrap();
    heap.assign_field(&person, 1, new_age).unwrap();
    heap.assign_field(&person, 2, new_id).unwrap();

    assert_eq!(heap.get_field(&person, 1).unwrap().to_string(), "(25 + 1)");
    assert_eq!(heap.get_field(&person, 2).unwrap().to_string(), "(1001 * 2)");
}

#[test]
fn array_fixed() {
    let mut heap = SymHeap::new();
    let arr = heap.allocate(ExpTy::Array);

    for i in 0..5 {
        let value = SymExp::binary(
            BinaryOperator::Mul,
            SymExp::variable("k", ExpTy::Int),
            SymExp::int_const(i),
        )
        .unwrap();
        heap.assign_elem(&arr, i, value).unwrap();
    }
    for i in 0..5 {
        assert_eq!(
            heap.get_elem(&arr, i).unwrap().to_string(),
            format!("(k * {})", i)
        );
    }
}

#[test]
fn array_modification() {
    let mut heap = SymHeap::new();
    let arr = heap.allocate(ExpTy::Array);

    for i in 0..5 {
        heap.assign_elem(&arr, i, SymExp::int_const(i * 2)).unwrap();
    }
    for i in 0..5 {
        let bumped = SymExp::binary(
            BinaryOperator::Add,
            heap.get_elem(&arr, i).unwrap(),
            SymExp::int_const(1),
        )
        .unwrap();
        heap.assign_elem(&arr, i, bumped).unwrap();
    }
    for i in 0..5 {
        assert_eq!(
            heap.get_elem(&arr, i).unwrap().to_string(),
            format!("({} + 1)", i * 2)
        );
    }
}

#[test]
fn struct_with_array() {
    let mut heap = SymHeap::new();
    let student = heap.allocate(ExpTy::Struct);

    heap.assign_field(&student, 0, SymExp::variable("charlie", ExpTy::Int))
        .unwrap();

    let grades = heap.allocate(ExpTy::Array);
    for (i, grade) in [85i64, 90, 78, 92, 88].iter().enumerate() {
        heap.assign_elem(&grades, i as i64, SymExp::int_const(*grade))
            .unwrap();
    }
    heap.assign_field(&student, 1, grades.clone()).unwrap();

    let mut sum = SymExp::int_const(0);
    for i in 0..5 {
        sum = SymExp::binary(BinaryOperator::Add, sum, heap.get_elem(&grades, i).unwrap())
            .unwrap();
    }
    let average = SymExp::binary(BinaryOperator::Div, sum, SymExp::int_const(5)).unwrap();
    heap.assign_field(&student, 2, average).unwrap();

    assert_eq!(heap.get_field(&student, 0).unwrap().to_string(), "charlie");
    let grades_ref = heap.get_field(&student, 1).unwrap();
    assert_eq!(heap.get_elem(&grades_ref, 0).unwrap().to_string(), "85");
}

#[test]
fn nested_structs() {
    let mut heap = SymHeap::new();
    let employee = heap.allocate(ExpTy::Struct);

    let person = heap.allocate(ExpTy::Struct);
    heap.assign_field(&person, 0, SymExp::variable("david", ExpTy::Int))
        .unwrap();
    heap.assign_field(&person, 1, SymExp::int_const(35)).unwrap();
    heap.assign_field(&person, 2, SymExp::int_const(3003))
        .unwrap();

    let address = heap.allocate(ExpTy::Struct);
    heap.assign_field(&address, 0, SymExp::variable("main_st", ExpTy::Int))
        .unwrap();
    heap.assign_field(&address, 1, SymExp::variable("boston", ExpTy::Int))
        .unwrap();
    heap.assign_field(&address, 2, SymExp::int_const(12345))
        .unwrap();

    heap.assign_field(&employee, 0, person).unwrap();
    heap.assign_field(&employee, 1, address).unwrap();
    heap.assign_field(&employee, 2, SymExp::int_const(75000))
        .unwrap();

    let person_ref = heap.get_field(&employee, 0).unwrap();
    assert_eq!(heap.get_field(&person_ref, 0).unwrap().to_string(), "david");
    let address_ref = heap.get_field(&employee, 1).unwrap();
    assert_eq!(
        heap.get_field(&address_ref, 2).unwrap().to_string(),
        "12345"
    );
    assert_eq!(heap.get_field(&employee, 2).unwrap().to_string(), "75000");
}

#[test]
fn array_of_structs() {
    let mut heap = SymHeap::new();
    let people = heap.allocate(ExpTy::Array);

    for i in 0..3 {
        let person = heap.allocate(ExpTy::Struct);
        heap.assign_field(&person, 0, SymExp::variable("name", ExpTy::Int))
            .unwrap();
        heap.assign_field(&person, 1, SymExp::int_const(25 + i * 5))
            .unwrap();
        heap.assign_field(&person, 2, SymExp::int_const(i + 1))
            .unwrap();
        heap.assign_elem(&people, i, person).unwrap();
    }

    let second = heap.get_elem(&people, 1).unwrap();
    let old_age = heap.get_field(&second, 1).unwrap();
    let new_age = SymExp::binary(BinaryOperator::Add, old_age, SymExp::int_const(5)).unwrap();
    heap.assign_field(&second, 1, new_age).unwrap();

    assert_eq!(heap.get_field(&second, 1).unwrap().to_string(), "(30 + 5)");
}

#[test]
fn distinct_objects_do_not_alias() {
    let mut heap = SymHeap::new();
    let foo1 = heap.allocate(ExpTy::Struct);
    let foo2 = heap.allocate(ExpTy::Struct);

    heap.assign_field(&foo1, 0, SymExp::int_const(0)).unwrap();
    heap.assign_field(&foo2, 0, SymExp::int_const(0)).unwrap();
    heap.assign_field(&foo2, 0, SymExp::int_const(5)).unwrap();
    heap.assign_field(&foo1, 0, SymExp::int_const(2)).unwrap();

    assert_eq!(heap.get_field(&foo1, 0).unwrap().to_string(), "2");
    assert_eq!(heap.get_field(&foo2, 0).unwrap().to_string(), "5");
}

#[test]
fn alias_writes_reach_the_original() {
    let mut heap = SymHeap::new();
    let original = heap.allocate(ExpTy::Struct);
    heap.assign_field(&original, 0, SymExp::int_const(10))
        .unwrap();

    let alias = heap.create_alias(&original, 100).unwrap();
    heap.assign_field(&alias, 0, SymExp::int_const(20)).unwrap();

    assert_eq!(heap.get_field(&original, 0).unwrap().to_string(), "20");
}

#[test]
fn allocate_struct_prezeroes_every_field() {
    let mut heap = SymHeap::new();
    let person = heap.allocate_struct(3);
    assert_eq!(heap.kind_of(&person).unwrap(), ExpTy::Struct);

    for i in 0..3 {
        assert_eq!(heap.get_field(&person, i).unwrap().to_string(), "0");
    }

    heap.assign_field(&person, 0, SymExp::variable("name", ExpTy::Int))
        .unwrap();
    heap.assign_field(&person, 1, SymExp::int_const(25)).unwrap();
    heap.assign_field(&person, 2, SymExp::int_const(1001))
        .unwrap();
    assert_eq!(heap.get_field(&person, 0).unwrap().to_string(), "name");
    assert_eq!(heap.get_field(&person, 1).unwrap().to_string(), "25");
    assert_eq!(heap.get_field(&person, 2).unwrap().to_string(), "1001");
}

#[test]
fn allocate_array_prezeroes_every_element() {
    let mut heap = SymHeap::new();
    let arr = heap.allocate_array(5);
    assert_eq!(heap.kind_of(&arr).unwrap(), ExpTy::Array);

    for i in 0..5 {
        assert_eq!(heap.get_elem(&arr, i).unwrap().to_string(), "0");
    }
    for i in 0..5 {
        let square = SymExp::binary(
            BinaryOperator::Mul,
            SymExp::int_const(i),
            SymExp::int_const(i),
        )
        .unwrap();
        heap.assign_elem(&arr, i, square).unwrap();
    }
    for i in 0..5 {
        assert_eq!(
            heap.get_elem(&arr, i).unwrap().to_string(),
            format!("({} * {})", i, i)
        );
    }
}

#[test]
fn empty_and_large_allocations() {
    let mut heap = SymHeap::new();

    let empty_struct = heap.allocate_struct(0);
    assert_eq!(heap.kind_of(&empty_struct).unwrap(), ExpTy::Struct);
    let empty_array = heap.allocate_array(0);
    assert_eq!(heap.kind_of(&empty_array).unwrap(), ExpTy::Array);

    let large_struct = heap.allocate_struct(1000);
    for i in (0..1000).step_by(97) {
        assert_eq!(heap.get_field(&large_struct, i).unwrap().to_string(), "0");
    }
    let large_array = heap.allocate_array(1000);
    for i in (0..1000).step_by(97) {
        assert_eq!(heap.get_elem(&large_array, i).unwrap().to_string(), "0");
    }
}

#[test]
fn z3_verifies_struct_aliasing() {
    let mut heap = SymHeap::new();
    let mut translator = SmtTranslator::new();

    let struct1 = heap.allocate_struct(1);
    let struct2 = heap.allocate_struct(1);
    heap.assign_field(&struct1, 0, SymExp::int_const(10)).unwrap();
    heap.assign_field(&struct2, 0, SymExp::int_const(20)).unwrap();

    let alias = heap.create_alias(&struct1, 100).unwrap();
    heap.assign_field(&alias, 0, SymExp::int_const(30)).unwrap();

    // through the alias struct1.f0 became 30, struct2.f0 is untouched
    let cond1 = int_eq(heap.get_field(&struct1, 0).unwrap(), 30);
    let cond2 = int_eq(heap.get_field(&struct2, 0).unwrap(), 20);
    let combined = SymExp::logical(LogicalOperator::And, vec![cond1, cond2]).unwrap();

    let solver = Solver::new();
    solver.assert(&translator.translate_bool(&combined).unwrap());
    assert_eq!(solver.check(), SatResult::Sat);
}

#[test]
fn z3_verifies_array_aliasing() {
    let mut heap = SymHeap::new();
    let mut translator = SmtTranslator::new();

    let arr = heap.allocate_array(3);
    for i in 0..3 {
        heap.assign_elem(&arr, i, SymExp::int_const(i * 10)).unwrap();
    }

    let alias = heap.create_alias(&arr, 200).unwrap();
    heap.assign_elem(&alias, 1, SymExp::int_const(999)).unwrap();

    let mut conditions = Vec::new();
    for i in 0..3 {
        let expected = if i == 1 { 999 } else { i * 10 };
        conditions.push(int_eq(heap.get_elem(&arr, i).unwrap(), expected));
    }
    let combined = SymExp::logical(LogicalOperator::And, conditions).unwrap();

    let solver = Solver::new();
    solver.assert(&translator.translate_bool(&combined).unwrap());
    assert_eq!(solver.check(), SatResult::Sat);
}

#[test]
fn z3_verifies_writes_reach_every_alias() {
    let mut heap = SymHeap::new();
    let mut translator = SmtTranslator::new();

    let person = heap.allocate_struct(2);
    heap.assign_field(&person, 0, SymExp::variable("name", ExpTy::Int))
        .unwrap();
    heap.assign_field(&person, 1, SymExp::int_const(25)).unwrap();

    let alias1 = heap.create_alias(&person, 101).unwrap();
    let alias2 = heap.create_alias(&person, 102).unwrap();
    heap.assign_field(&alias1, 1, SymExp::int_const(30)).unwrap();

    let conditions = vec![
        int_eq(heap.get_field(&person, 1).unwrap(), 30),
        int_eq(heap.get_field(&alias1, 1).unwrap(), 30),
        int_eq(heap.get_field(&alias2, 1).unwrap(), 30),
    ];
    let combined = SymExp::logical(LogicalOperator::And, conditions).unwrap();

    let solver = Solver::new();
    solver.assert(&translator.translate_bool(&combined).unwrap());
    assert_eq!(solver.check(), SatResult::Sat);
}
