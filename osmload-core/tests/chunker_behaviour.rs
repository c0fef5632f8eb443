//! Behavioural coverage for [`DocumentChunker`].

use osmload_core::{Batch, DocumentChunker};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};
use std::cell::RefCell;

#[derive(Default)]
struct ChunkerWorld {
    chunker: RefCell<Option<DocumentChunker<Value>>>,
    last: RefCell<Option<Batch<Value>>>,
}

impl ChunkerWorld {
    fn push(&self, document: Value) {
        let closed = self
            .chunker
            .borrow_mut()
            .as_mut()
            .unwrap_or_else(|| panic!("chunker must be configured"))
            .push(document, None);
        *self.last.borrow_mut() = closed;
    }

    fn expect_batch(&self, expected: &[Value]) {
        let last = self.last.borrow();
        let batch = last
            .as_ref()
            .unwrap_or_else(|| panic!("expected a closed batch"));
        assert_eq!(batch.documents(), expected);
    }
}

#[fixture]
fn world() -> ChunkerWorld {
    ChunkerWorld::default()
}

#[given("a chunker with a budget of 10 bytes")]
fn budget_of_ten(world: &ChunkerWorld) {
    *world.chunker.borrow_mut() = Some(DocumentChunker::new(10));
}

#[given("a chunker with a budget of 4 bytes")]
fn budget_of_four(world: &ChunkerWorld) {
    *world.chunker.borrow_mut() = Some(DocumentChunker::new(4));
}

#[when("I push a small document")]
fn push_first(world: &ChunkerWorld) {
    world.push(json!({"a": 1}));
}

#[when("I push another small document")]
fn push_second(world: &ChunkerWorld) {
    world.push(json!({"a": 2}));
}

#[when("I push a large document")]
fn push_large(world: &ChunkerWorld) {
    world.push(json!({"name": "a long value"}));
}

#[when("I flush the chunker")]
fn flush(world: &ChunkerWorld) {
    let flushed = world
        .chunker
        .borrow_mut()
        .as_mut()
        .unwrap_or_else(|| panic!("chunker must be configured"))
        .flush();
    *world.last.borrow_mut() = flushed;
}

#[then("no batch is returned")]
fn no_batch(world: &ChunkerWorld) {
    assert!(world.last.borrow().is_none(), "no batch should close yet");
}

#[then("a batch holding the first document is returned")]
fn first_batch(world: &ChunkerWorld) {
    world.expect_batch(&[json!({"a": 1})]);
}

#[then("a batch holding the second document is returned")]
fn second_batch(world: &ChunkerWorld) {
    world.expect_batch(&[json!({"a": 2})]);
}

#[then("a batch holding the large document is returned")]
fn large_batch(world: &ChunkerWorld) {
    world.expect_batch(&[json!({"name": "a long value"})]);
}

#[scenario(path = "tests/features/document_chunker.feature", index = 0)]
fn closing_a_batch(world: ChunkerWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/document_chunker.feature", index = 1)]
fn oversized_document(world: ChunkerWorld) {
    let _ = world;
}
