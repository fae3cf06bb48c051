//! Shared fixtures for the integration suite. Not every test binary uses
//! every helper.
#![allow(dead_code)]

use cirjson::io::{EmptyReadContext, EmptyWriteContext};
use cirjson::writer::IdProvider;
use cirjson::{CirJsonFactory, TokenKind, TokenRead};
use std::any::Any;
use std::collections::VecDeque;

pub fn factory() -> CirJsonFactory {
    CirJsonFactory::builder().build().expect("valid defaults")
}

/// One observed token with its text and the pointer at that point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: TokenKind,
    pub text: Option<String>,
    pub pointer: String,
}

pub fn drain_events(reader: &mut impl TokenRead) -> cirjson::Result<Vec<Event>> {
    let mut events = Vec::new();
    while let Some(kind) = reader.next_token()? {
        assert_ne!(kind, TokenKind::NotAvailable, "blocking reader suspended");
        events.push(Event {
            kind,
            text: reader.text().map(str::to_string),
            pointer: reader.pointer().as_str().to_string(),
        });
    }
    Ok(events)
}

/// Parses `doc` with the blocking reader and returns all events.
pub fn events_of(doc: &str) -> Vec<Event> {
    let factory = factory();
    let mut reader = factory
        .reader_for_str(&EmptyReadContext, doc)
        .expect("reader construction");
    drain_events(&mut reader).expect("valid document")
}

/// Identity provider replaying a pre-recorded id sequence.
pub struct QueueIdProvider {
    ids: VecDeque<String>,
}

impl QueueIdProvider {
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids: ids.into() }
    }
}

impl IdProvider for QueueIdProvider {
    fn object_id(&mut self, _current_value: Option<&dyn Any>) -> String {
        self.ids.pop_front().expect("an id for every structure")
    }

    fn array_id(&mut self, current_value: Option<&dyn Any>) -> String {
        self.object_id(current_value)
    }
}

/// Collects the identity strings of `doc` in structure-open order.
pub fn collect_ids(doc: &str) -> Vec<String> {
    let events = events_of(doc);
    let mut ids = Vec::new();
    let mut pending_id = false;
    for event in &events {
        match event.kind {
            TokenKind::IdPropertyName | TokenKind::StartArray => pending_id = true,
            TokenKind::ValueString if pending_id => {
                ids.push(event.text.clone().expect("id strings carry text"));
                pending_id = false;
            }
            TokenKind::StartObject => {}
            _ => pending_id = false,
        }
    }
    ids
}

/// Parses `doc` and re-emits it through a writer, replaying the original
/// identities. For compact input this reproduces the document verbatim.
pub fn reemit(doc: &str) -> String {
    let factory = factory();
    let mut reader = factory
        .reader_for_str(&EmptyReadContext, doc)
        .expect("reader construction");
    let mut writer = factory
        .writer_for_string(&EmptyWriteContext)
        .expect("writer construction");
    writer.set_id_provider(Box::new(QueueIdProvider::new(collect_ids(doc))));

    while let Some(kind) = reader.next_token().expect("valid document") {
        match kind {
            TokenKind::StartObject => {
                writer.write_start_object().unwrap();
                // The reader reports the identity name and value; the
                // writer has already emitted them.
                assert_eq!(
                    reader.next_token().unwrap(),
                    Some(TokenKind::IdPropertyName)
                );
                assert_eq!(reader.next_token().unwrap(), Some(TokenKind::ValueString));
            }
            TokenKind::StartArray => {
                writer.write_start_array().unwrap();
                assert_eq!(reader.next_token().unwrap(), Some(TokenKind::ValueString));
            }
            TokenKind::EndObject => writer.write_end_object().unwrap(),
            TokenKind::EndArray => writer.write_end_array().unwrap(),
            TokenKind::PropertyName => {
                writer.write_name(reader.text().unwrap()).unwrap();
            }
            TokenKind::ValueString => {
                writer.write_string(reader.text().unwrap()).unwrap();
            }
            TokenKind::ValueNumberInt | TokenKind::ValueNumberFloat => {
                writer.write_number_text(reader.text().unwrap()).unwrap();
            }
            TokenKind::ValueTrue => writer.write_boolean(true).unwrap(),
            TokenKind::ValueFalse => writer.write_boolean(false).unwrap(),
            TokenKind::ValueNull => writer.write_null().unwrap(),
            TokenKind::IdPropertyName
            | TokenKind::EmbeddedObject
            | TokenKind::NotAvailable => {
                panic!("unexpected token {kind:?} while re-emitting")
            }
        }
    }
    writer
        .into_target()
        .expect("writer close")
        .into_string()
}

/// The nested fixture from the pointer scenarios.
pub const NESTED_DOC: &str = "{\"__cirJsonId__\":\"root\",\"a\":123,\"array\":[\"root/a\",1,2,[\"root/a/2\",3],5,{\"__cirJsonId__\":\"root/a/4\",\"obInArray\":4}],\"ob\":{\"__cirJsonId__\":\"root/ob\",\"first\":[\"root/ob/first\",false,true],\"second\":{\"__cirJsonId__\":\"root/ob/second\",\"sub\":37}},\"b\":true}";
