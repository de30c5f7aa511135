// tests/providers_status_invest.rs
use chrono::Utc;
use market_feed::ingest::providers::status_invest::{extract_indicators, StatusInvestFetcher};
use market_feed::{Fetcher, PublishableRecord, SourceKind};

const PAGE: &str = include_str!("fixtures/status_invest_petr4.html");

#[test]
fn indicators_are_read_from_cards() {
    let raw = extract_indicators("petr4", PAGE).expect("indicators on page");
    assert_eq!(raw.str_at("symbol"), Some("PETR4"));
    assert_eq!(raw.str_at("dividend_yield"), Some("12,45"));
    assert_eq!(raw.str_at("p_l"), Some("4,01"));
    assert_eq!(raw.str_at("liquidity"), Some("1.234.567,89"));
}

#[tokio::test]
async fn fixture_normalizes_to_snapshot() {
    let f = StatusInvestFetcher::from_fixture(PAGE);
    let raws = f.fetch("PETR4").await.unwrap();
    assert_eq!(raws.len(), 1);

    let rec = SourceKind::Fundamentals
        .normalize(&raws[0], "PETR4", Utc::now())
        .expect("symbol present");
    assert_eq!(rec.identity(), "PETR4");

    let PublishableRecord::Fundamentals(s) = rec else {
        panic!("expected a fundamentals snapshot");
    };
    assert_eq!(s.symbol, "PETR4");
    assert_eq!(s.dividend_yield, Some(12.45));
    assert_eq!(s.p_vp, Some(1.15));
    assert_eq!(s.p_l, Some(4.01));
    assert_eq!(s.liquidity, Some(1_234_567.89));
    assert_eq!(s.roe, None);
    assert_eq!(s.query, "PETR4");
}

#[tokio::test]
async fn page_without_cards_yields_nothing() {
    let f = StatusInvestFetcher::from_fixture("<html><body>Ativo não encontrado</body></html>");
    assert!(f.fetch("XXXX3").await.unwrap().is_empty());
}
