use super::{is_store_failure, open_window, parse_price, store_error};

use anyhow::anyhow;
use shared::error::{ApiError, ErrorCode};

#[test]
fn window_hours_out_of_range_are_rejected() {
    assert_eq!(open_window(24).expect("window").num_hours(), 24);

    let err = open_window(i64::MAX).expect_err("too wide");
    assert_eq!(err.code, ErrorCode::Validation);
    assert!(!err.is_fatal());
}

#[test]
fn only_store_failures_are_reported_as_fatal() {
    let store: anyhow::Error = store_error(anyhow!("disk I/O error")).into();
    assert!(is_store_failure(&store));
    assert!(store.to_string().starts_with("store: disk I/O error"));

    let rejected: anyhow::Error = ApiError::new(ErrorCode::ItemInUse, "Latte").into();
    assert!(!is_store_failure(&rejected));

    let usage = anyhow!("--login and --password are required for this command");
    assert!(!is_store_failure(&usage));
}

#[test]
fn bad_price_is_a_validation_error() {
    let err = parse_price("1.005").expect_err("three decimals");
    assert_eq!(err.code, ErrorCode::Validation);
    assert_eq!(parse_price("2.5").expect("price").cents(), 250);
}
