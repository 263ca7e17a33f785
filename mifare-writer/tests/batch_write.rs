//! End-to-end runs of the public API against the in-memory card

use std::collections::HashMap;
use std::time::Duration;

use mifare_writer::transport::{MemoryCard, SIMULATED_READER};
use mifare_writer::{
    read_driver_info, write_articles, write_driver_info, ArticleRecord, AuthenticationKey,
    CardLayout, CardSession, Inventory, Outcome, SessionState, TimedTransport, WriteSummary,
    WriterConfig,
};

fn catalog() -> HashMap<String, String> {
    [
        ("0210462016561", "Premium Coffee Beans"),
        ("0210460765236", "Organic Green Tea"),
        ("0004859272", "Fresh Orange Juice"),
    ]
    .into_iter()
    .map(|(tag, name)| (tag.to_string(), name.to_string()))
    .collect()
}

#[test]
fn scan_and_write_through_timed_transport() {
    let card = MemoryCard::new(SIMULATED_READER).with_hex_dump();
    let config = WriterConfig {
        reader_name: SIMULATED_READER.to_string(),
        ..WriterConfig::default()
    };
    config.validate().unwrap();

    let transport = TimedTransport::new(card.clone(), config.timeout()).unwrap();
    let mut session = CardSession::new(
        transport,
        config.reader_name.clone(),
        config.authentication_key().unwrap(),
    );
    session.connect().unwrap();

    let catalog = catalog();
    let mut inventory = Inventory::new();
    for tag in [
        "0210460765236",
        "0210462016561",
        "0210460765236",
        "1111111111",
        "0004859272",
    ] {
        inventory.scan(tag, &catalog);
    }
    assert_eq!(inventory.unique_count(), 3);

    assert!(write_driver_info(&mut session, "Alice Johnson"));
    let results = write_articles(&mut session, &inventory, config.start_block);

    let blocks: Vec<_> = results.iter().map(|r| r.block).collect();
    assert_eq!(blocks, vec![Some(8), Some(9), Some(10)]);
    assert_eq!(results[0].text, "Organic Green Te");
    assert_eq!(results[1].to_string(), "Block 9: Premium Coffee B -> OK");
    assert_eq!(
        WriteSummary::from(results.as_slice()).to_string(),
        "3/3 articles written"
    );

    assert_eq!(read_driver_info(&mut session).unwrap(), "Alice Johnson");
    assert_eq!(session.read_block(10).unwrap(), "Fresh Orange Jui");
    assert_eq!(session.read_block(11).unwrap(), "");
    assert_eq!(card.text(8), "Organic Green Te");

    session.close();
    assert_eq!(session.state(), SessionState::Closed);
    assert!(!card.is_connected());
}

#[test]
fn batch_continues_past_failures_and_card_end() {
    let card = MemoryCard::with_layout(SIMULATED_READER, CardLayout::MINI);
    card.fail_writes_at(17);

    let mut session = CardSession::new(card.clone(), SIMULATED_READER, AuthenticationKey::FACTORY)
        .with_layout(CardLayout::MINI);
    session.connect().unwrap();

    let records: Vec<ArticleRecord> = ["A:1", "B:2", "C:3", "D:4"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();
    let results = write_articles(&mut session, &records, 16);

    let placed: Vec<_> = results.iter().map(|r| (r.block, r.outcome)).collect();
    assert_eq!(
        placed,
        vec![
            (Some(16), Outcome::Ok),
            (Some(17), Outcome::Fail),
            (Some(18), Outcome::Ok),
            (Some(20), Outcome::Fail),
        ]
    );

    let summary = WriteSummary::from(results.as_slice());
    assert!(!summary.all_written());
    assert_eq!(summary.to_string(), "2/4 articles written");

    let written: Vec<_> = card.writes().into_iter().map(|(block, _)| block).collect();
    assert_eq!(written, vec![16, 18]);
    assert_eq!(card.text(18), "C:3");
}

#[test]
fn wrong_key_fails_every_block() {
    let card = MemoryCard::new(SIMULATED_READER)
        .with_key(AuthenticationKey::new([0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5]));
    let mut session = CardSession::new(card.clone(), SIMULATED_READER, AuthenticationKey::FACTORY);
    session.connect().unwrap();

    let records = vec![ArticleRecord::new("Coffee", 2), ArticleRecord::new("Tea", 5)];
    let results = write_articles(&mut session, &records, 8);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.outcome == Outcome::Fail));

    let err = session.read_block(8).unwrap_err();
    assert_eq!(err.to_string(), "ERROR: Read failed");
    assert_eq!(session.read_block_text(8), "ERROR: Read failed");
    assert!(card.writes().is_empty());
}

#[test]
fn dropping_session_releases_reader() {
    let card = MemoryCard::new(SIMULATED_READER);
    {
        let transport = TimedTransport::new(card.clone(), Duration::from_secs(1)).unwrap();
        let mut session = CardSession::new(transport, SIMULATED_READER, AuthenticationKey::FACTORY);
        session.connect().unwrap();
        assert!(card.is_connected());
    }
    assert!(!card.is_connected());
    assert_eq!(card.cleanups(), 1);
}

#[test]
fn card_removed_between_batches() {
    let card = MemoryCard::new(SIMULATED_READER);
    let mut session = CardSession::new(card.clone(), SIMULATED_READER, AuthenticationKey::FACTORY);
    session.connect().unwrap();

    let first = vec![ArticleRecord::new("Coffee", 2)];
    assert!(write_articles(&mut session, &first, 8)[0].is_ok());

    card.remove_card();
    let second = vec![ArticleRecord::new("Tea", 5), ArticleRecord::new("Juice", 1)];
    let results = write_articles(&mut session, &second, 9);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.outcome == Outcome::Fail));
    assert_eq!(session.read_block_text(8), "ERROR: Read failed");

    assert_eq!(card.writes().len(), 1);
    assert_eq!(card.text(8), "Coffee:2");
}
