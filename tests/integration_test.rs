//! Tests for the public surface that does not need a Bluetooth daemon.

use pumplink::{prefix_filter, Address, Config, DiscoveryStopReason, Error};

#[test]
fn test_address_parse_format_identity() {
    for text in ["AA:BB:CC:11:22:33", "00:0E:2F:01:02:03", "FF:FF:FF:FF:FF:FF"] {
        let address: Address = text.parse().unwrap();
        assert_eq!(address.to_string(), text);
    }
}

#[test]
fn test_address_parse_rejects_garbage() {
    assert!("".parse::<Address>().is_err());
    assert!("AA-BB-CC-11-22-33".parse::<Address>().is_err());
    assert!("AA:BB:CC:11:22:33:44".parse::<Address>().is_err());
}

#[test]
fn test_prefix_filter_matches_family() {
    let filter = prefix_filter([0x00, 0x0E, 0x2F]);
    assert!(filter("00:0E:2F:DE:AD:BE".parse().unwrap()));
    assert!(!filter("00:0E:30:DE:AD:BE".parse().unwrap()));
    assert!(!filter("AA:BB:CC:DE:AD:BE".parse().unwrap()));
}

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.client_channel, 1);
    assert_eq!(config.listener_channel, 0);
}

#[test]
fn test_stop_reasons_are_distinct() {
    let reasons = [
        DiscoveryStopReason::ManuallyStopped,
        DiscoveryStopReason::Timeout,
        DiscoveryStopReason::Error,
    ];
    for (i, a) in reasons.iter().enumerate() {
        for (j, b) in reasons.iter().enumerate() {
            assert_eq!(i == j, a == b);
        }
    }
}

#[test]
fn test_cancelled_errors_are_recognizable() {
    let cancelled = Error::Cancelled("receive");
    assert!(cancelled.is_cancelled());

    let io: Error = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "down").into();
    assert!(!io.is_cancelled());
    assert!(matches!(io, Error::Io(_)));
}
