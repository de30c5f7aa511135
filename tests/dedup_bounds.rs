// tests/dedup_bounds.rs
use market_feed::dedup::{Deduplicator, DEFAULT_CEILING, DEFAULT_FLOOR};

#[test]
fn marked_identity_is_seen() {
    let mut d = Deduplicator::default();
    for i in 0..100 {
        let id = format!("https://example.test/{i}");
        d.mark(&id);
        assert!(d.seen(&id));
    }
}

#[test]
fn size_never_exceeds_ceiling_after_mark() {
    let mut d = Deduplicator::default();
    for i in 0..25_000 {
        d.mark(&format!("id-{i}"));
        assert!(d.len() <= DEFAULT_CEILING, "len {} after mark {i}", d.len());
    }
}

#[test]
fn prune_lands_on_floor_and_keeps_newest() {
    let mut d = Deduplicator::default();
    for i in 0..=DEFAULT_CEILING {
        d.mark(&format!("id-{i}"));
    }
    // the 10_001st mark triggers the prune
    assert_eq!(d.len(), DEFAULT_FLOOR);
    assert!(d.seen(&format!("id-{DEFAULT_CEILING}")));
}

#[test]
fn unseen_identity_is_not_reported() {
    let mut d = Deduplicator::default();
    d.mark("https://x/1");
    assert!(!d.seen("https://x/2"));
    assert!(!d.seen(""));
}
